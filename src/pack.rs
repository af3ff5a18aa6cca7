//! Bit/byte packing of raw samples.
//!
//! Sub-byte and odd-width samples form an MSB-first bit stream with the
//! trailing partial byte zero-padded. Whole-byte widths (8/16/24/32) honor
//! the requested byte order.

use crate::error::RasterError;
use crate::quantum::max_for_bits;

/// Byte order of multi-byte samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Most significant byte first ("MSB").
    #[default]
    Big,
    /// Least significant byte first ("LSB").
    Little,
}

impl Endian {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// Packs and unpacks runs of samples of one bit width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packer {
    bits: u8,
    endian: Endian,
    min_is_white: bool,
}

impl Packer {
    /// `bits` must be in `1..=32`.
    pub fn new(bits: u8, endian: Endian) -> Result<Self, RasterError> {
        if !(1..=32).contains(&bits) {
            return Err(RasterError::SampleRangeInvalid(format!(
                "{bits} bits per sample"
            )));
        }
        Ok(Self {
            bits,
            endian,
            min_is_white: false,
        })
    }

    /// Invert values (`max - value`) on both pack and unpack.
    pub fn with_min_is_white(mut self, min_is_white: bool) -> Self {
        self.min_is_white = min_is_white;
        self
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_min_is_white(&self) -> bool {
        self.min_is_white
    }

    pub fn max_value(&self) -> u32 {
        max_for_bits(self.bits)
    }

    /// Bytes occupied by `count` packed samples.
    #[inline]
    pub fn packed_len(&self, count: usize) -> usize {
        (count * self.bits as usize).div_ceil(8)
    }

    /// Append `values` to `out`. Values above the bit width are masked.
    pub fn pack(&self, values: &[u32], out: &mut Vec<u8>) {
        let start = out.len();
        out.reserve(self.packed_len(values.len()));
        let max = self.max_value();
        let invert = |v: u32| if self.min_is_white { max - v.min(max) } else { v };
        match self.bits {
            1 => pack_sub_byte::<1>(values.iter().map(|&v| invert(v)), out),
            2 => pack_sub_byte::<2>(values.iter().map(|&v| invert(v)), out),
            4 => pack_sub_byte::<4>(values.iter().map(|&v| invert(v)), out),
            8 => pack_whole::<1>(values.iter().map(|&v| invert(v)), self.endian, out),
            16 => pack_whole::<2>(values.iter().map(|&v| invert(v)), self.endian, out),
            24 => pack_whole::<3>(values.iter().map(|&v| invert(v)), self.endian, out),
            32 => pack_whole::<4>(values.iter().map(|&v| invert(v)), self.endian, out),
            bits => pack_bit_stream(values.iter().map(|&v| invert(v)), u32::from(bits), out),
        }
        debug_assert_eq!(out.len() - start, self.packed_len(values.len()));
    }

    /// Fill `out` from the front of `bytes`, returning the bytes consumed.
    ///
    /// Fails with `UnexpectedEndOfStream` (offset = `bytes.len()`) when
    /// `bytes` is shorter than `out.len()` packed samples.
    pub fn unpack_into(&self, bytes: &[u8], out: &mut [u32]) -> Result<usize, RasterError> {
        let needed = self.packed_len(out.len());
        let src = bytes
            .get(..needed)
            .ok_or(RasterError::UnexpectedEndOfStream {
                offset: bytes.len() as u64,
            })?;
        match self.bits {
            1 => unpack_sub_byte::<1>(src, out),
            2 => unpack_sub_byte::<2>(src, out),
            4 => unpack_sub_byte::<4>(src, out),
            8 => unpack_whole::<1>(src, self.endian, out),
            16 => unpack_whole::<2>(src, self.endian, out),
            24 => unpack_whole::<3>(src, self.endian, out),
            32 => unpack_whole::<4>(src, self.endian, out),
            bits => unpack_bit_stream(src, u32::from(bits), out),
        }
        if self.min_is_white {
            let max = self.max_value();
            for v in out.iter_mut() {
                *v = max - *v;
            }
        }
        Ok(needed)
    }

    /// Replace the contents of `out` with `count` unpacked samples.
    pub fn unpack(&self, bytes: &[u8], count: usize, out: &mut Vec<u32>) -> Result<usize, RasterError> {
        out.clear();
        out.try_reserve(count)?;
        out.resize(count, 0);
        self.unpack_into(bytes, out)
    }
}

/// Pack `values` at `bits` per sample.
pub fn pack_samples(values: &[u32], bits: u8, endian: Endian) -> Result<Vec<u8>, RasterError> {
    let packer = Packer::new(bits, endian)?;
    let mut out = Vec::new();
    packer.pack(values, &mut out);
    Ok(out)
}

/// Unpack `count` samples of `bits` width.
pub fn unpack_samples(bytes: &[u8], bits: u8, endian: Endian, count: usize) -> Result<Vec<u32>, RasterError> {
    let packer = Packer::new(bits, endian)?;
    let mut out = Vec::new();
    packer.unpack(bytes, count, &mut out)?;
    Ok(out)
}

/// Reverse the bit order within each byte (TIFF FillOrder 2).
pub fn reverse_bits(buf: &mut [u8]) {
    for b in buf {
        *b = b.reverse_bits();
    }
}

// ── Generic kernels ─────────────────────────────────────────────────

#[inline]
fn pack_sub_byte<const BITS: u32>(values: impl Iterator<Item = u32>, out: &mut Vec<u8>) {
    let mask = (1u32 << BITS) - 1;
    let mut byte = 0u8;
    let mut filled = 0u32;
    for v in values {
        byte |= ((v & mask) << (8 - BITS - filled)) as u8;
        filled += BITS;
        if filled == 8 {
            out.push(byte);
            byte = 0;
            filled = 0;
        }
    }
    if filled > 0 {
        out.push(byte);
    }
}

#[inline]
fn unpack_sub_byte<const BITS: u32>(bytes: &[u8], out: &mut [u32]) {
    let per_byte = (8 / BITS) as usize;
    let mask = (1u32 << BITS) - 1;
    for (chunk, &byte) in out.chunks_mut(per_byte).zip(bytes) {
        for (i, v) in chunk.iter_mut().enumerate() {
            *v = (u32::from(byte) >> (8 - BITS * (i as u32 + 1))) & mask;
        }
    }
}

#[inline]
fn pack_whole<const N: usize>(values: impl Iterator<Item = u32>, endian: Endian, out: &mut Vec<u8>) {
    for v in values {
        let be = v.to_be_bytes();
        let bytes = &be[4 - N..];
        match endian {
            Endian::Big => out.extend_from_slice(bytes),
            Endian::Little => out.extend(bytes.iter().rev()),
        }
    }
}

#[inline]
fn unpack_whole<const N: usize>(bytes: &[u8], endian: Endian, out: &mut [u32]) {
    for (v, c) in out.iter_mut().zip(bytes.chunks_exact(N)) {
        *v = match endian {
            Endian::Big => c.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
            Endian::Little => c.iter().rev().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
        };
    }
}

fn pack_bit_stream(values: impl Iterator<Item = u32>, bits: u32, out: &mut Vec<u8>) {
    let mask = u64::from(max_for_bits(bits as u8));
    let mut acc = 0u64;
    let mut pending = 0u32;
    for v in values {
        acc = (acc << bits) | (u64::from(v) & mask);
        pending += bits;
        while pending >= 8 {
            pending -= 8;
            out.push((acc >> pending) as u8);
        }
        acc &= (1u64 << pending) - 1;
    }
    if pending > 0 {
        out.push((acc << (8 - pending)) as u8);
    }
}

fn unpack_bit_stream(bytes: &[u8], bits: u32, out: &mut [u32]) {
    let mask = u64::from(max_for_bits(bits as u8));
    let mut src = bytes.iter().copied();
    let mut acc = 0u64;
    let mut pending = 0u32;
    for v in out {
        while pending < bits {
            acc = (acc << 8) | u64::from(src.next().unwrap_or(0));
            pending += 8;
        }
        pending -= bits;
        *v = ((acc >> pending) & mask) as u32;
        acc &= (1u64 << pending) - 1;
    }
}
