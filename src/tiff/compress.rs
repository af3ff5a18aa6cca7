//! Strip and tile compression: PackBits, LZW, zlib Deflate and the
//! horizontal differencing predictor.

use crate::error::RasterError;
use crate::header::Compression;
use crate::pack::Endian;

/// zlib level used for Deflate output.
const DEFLATE_LEVEL: u8 = 6;

/// Decompress one chunk. `expected` bounds the output size; shorter output
/// is returned as-is for the caller to judge.
pub(crate) fn decompress(
    compression: Compression,
    src: &[u8],
    expected: usize,
    offset: u64,
) -> Result<Vec<u8>, RasterError> {
    match compression {
        Compression::None => Ok(src[..src.len().min(expected)].to_vec()),
        Compression::PackBits => Ok(packbits_decode(src, expected)),
        Compression::Lzw => lzw_decode(src, expected, offset),
        Compression::Deflate => miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(src, expected)
            .map_err(|e| RasterError::corrupt(offset, format!("deflate: {:?}", e.status))),
        other => Err(RasterError::UnsupportedCompression(format!("{other:?}"))),
    }
}

pub(crate) fn compress(compression: Compression, src: &[u8]) -> Result<Vec<u8>, RasterError> {
    match compression {
        Compression::None => Ok(src.to_vec()),
        Compression::PackBits => {
            let mut out = Vec::with_capacity(src.len() + src.len() / 128 + 1);
            packbits_encode(src, &mut out);
            Ok(out)
        }
        Compression::Lzw => lzw_encoder()
            .encode(src)
            .map_err(|e| RasterError::ResourceExhausted(format!("lzw: {e}"))),
        Compression::Deflate => Ok(miniz_oxide::deflate::compress_to_vec_zlib(src, DEFLATE_LEVEL)),
        other => Err(RasterError::UnsupportedCompression(format!("{other:?}"))),
    }
}

/// Whether the writer can produce `compression`.
pub(crate) fn can_compress(compression: Compression) -> bool {
    matches!(
        compression,
        Compression::None | Compression::PackBits | Compression::Lzw | Compression::Deflate
    )
}

// ── LZW ─────────────────────────────────────────────────────────────

/// MSB-first codes with the TIFF early code-width switch.
fn lzw_encoder() -> weezl::encode::Encoder {
    weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
}

/// Decode at most `expected` bytes. A stream without an end code stops
/// where the input does.
fn lzw_decode(src: &[u8], expected: usize, offset: u64) -> Result<Vec<u8>, RasterError> {
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    let mut out = vec![0u8; expected];
    let (mut read, mut written) = (0, 0);
    while written < expected {
        let result = decoder.decode_bytes(&src[read..], &mut out[written..]);
        read += result.consumed_in;
        written += result.consumed_out;
        match result.status {
            Ok(weezl::LzwStatus::Ok) if result.consumed_in + result.consumed_out > 0 => {}
            Ok(_) => break,
            Err(e) => return Err(RasterError::corrupt(offset, format!("lzw: {e}"))),
        }
    }
    out.truncate(written);
    Ok(out)
}

// ── PackBits ────────────────────────────────────────────────────────

/// Header byte `n`: 0..=127 copies `n + 1` literal bytes, -127..=-1 repeats
/// the next byte `1 - n` times, -128 is a no-op.
pub(crate) fn packbits_decode(src: &[u8], expected: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while i < src.len() && out.len() < expected {
        let n = src[i] as i8;
        i += 1;
        match n {
            0..=127 => {
                let len = n as usize + 1;
                let end = (i + len).min(src.len());
                out.extend_from_slice(&src[i..end]);
                i = end;
            }
            -127..=-1 => {
                let Some(&b) = src.get(i) else { break };
                i += 1;
                out.extend(std::iter::repeat_n(b, 1 + (-n) as usize));
            }
            -128 => {}
        }
    }
    out.truncate(expected);
    out
}

pub(crate) fn packbits_encode(src: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < src.len() {
        let run = src[i..].iter().take(128).take_while(|&&b| b == src[i]).count();
        if run >= 2 {
            out.push((1 - run as i32) as i8 as u8);
            out.push(src[i]);
            i += run;
            continue;
        }
        // Literal run ends where a repeat of two or more begins.
        let start = i;
        while i < src.len() && i - start < 128 {
            if i + 1 < src.len() && src[i] == src[i + 1] {
                break;
            }
            i += 1;
        }
        if i == start {
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&src[start..i]);
    }
}

// ── Predictor ───────────────────────────────────────────────────────

/// Sample widths the horizontal predictor supports.
pub(crate) fn predictor_supported(bits: u8) -> bool {
    matches!(bits, 8 | 16 | 32)
}

/// Undo horizontal differencing in place over rows of `row_bytes`, with
/// `stride` samples per pixel.
pub(crate) fn predictor_decode(
    buf: &mut [u8],
    row_bytes: usize,
    stride: usize,
    bits: u8,
    endian: Endian,
) -> Result<(), RasterError> {
    for row in buf.chunks_mut(row_bytes) {
        match bits {
            8 => {
                for i in stride..row.len() {
                    row[i] = row[i].wrapping_add(row[i - stride]);
                }
            }
            16 => accumulate::<2>(row, stride, endian),
            32 => accumulate::<4>(row, stride, endian),
            _ => return Err(predictor_unsupported(bits)),
        }
    }
    Ok(())
}

/// Apply horizontal differencing in place.
pub(crate) fn predictor_encode(
    buf: &mut [u8],
    row_bytes: usize,
    stride: usize,
    bits: u8,
    endian: Endian,
) -> Result<(), RasterError> {
    for row in buf.chunks_mut(row_bytes) {
        match bits {
            8 => {
                for i in (stride..row.len()).rev() {
                    row[i] = row[i].wrapping_sub(row[i - stride]);
                }
            }
            16 => difference::<2>(row, stride, endian),
            32 => difference::<4>(row, stride, endian),
            _ => return Err(predictor_unsupported(bits)),
        }
    }
    Ok(())
}

fn predictor_unsupported(bits: u8) -> RasterError {
    RasterError::UnsupportedVariant(format!("horizontal predictor with {bits}-bit samples"))
}

#[inline]
fn get<const N: usize>(row: &[u8], i: usize, endian: Endian) -> u32 {
    let mut v = 0u32;
    let bytes = &row[i * N..i * N + N];
    match endian {
        Endian::Big => bytes.iter().for_each(|&b| v = (v << 8) | u32::from(b)),
        Endian::Little => bytes.iter().rev().for_each(|&b| v = (v << 8) | u32::from(b)),
    }
    v
}

#[inline]
fn put<const N: usize>(row: &mut [u8], i: usize, v: u32, endian: Endian) {
    let bytes = &mut row[i * N..i * N + N];
    for (k, b) in bytes.iter_mut().enumerate() {
        let shift = match endian {
            Endian::Big => 8 * (N - 1 - k),
            Endian::Little => 8 * k,
        };
        *b = (v >> shift) as u8;
    }
}

fn accumulate<const N: usize>(row: &mut [u8], stride: usize, endian: Endian) {
    let count = row.len() / N;
    for i in stride..count {
        let v = get::<N>(row, i, endian).wrapping_add(get::<N>(row, i - stride, endian));
        put::<N>(row, i, v, endian);
    }
}

fn difference<const N: usize>(row: &mut [u8], stride: usize, endian: Endian) {
    let count = row.len() / N;
    for i in (stride..count).rev() {
        let v = get::<N>(row, i, endian).wrapping_sub(get::<N>(row, i - stride, endian));
        put::<N>(row, i, v, endian);
    }
}
