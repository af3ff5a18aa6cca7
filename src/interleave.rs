//! Channel interleaving: packed sample rows to and from quantum pixel rows.

use crate::error::RasterError;
use crate::pack::{Endian, Packer};
use crate::pixel::{AlphaMode, TupleType};
use crate::quantum::{QUANTUM_RANGE, Quantum, QuantumScaler, SampleFormat, max_for_bits};

/// How one sample is stored in the packed row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleSpec {
    pub bits: u8,
    /// Largest unsigned sample value; may be below `2^bits - 1` (PNM maxval).
    pub maxval: u32,
    pub format: SampleFormat,
    pub endian: Endian,
    pub min_is_white: bool,
    /// Multiplier for float samples before quantization.
    pub float_scale: f64,
}

impl SampleSpec {
    /// Unsigned samples using the full `bits` range.
    pub fn unsigned(bits: u8, endian: Endian) -> Self {
        Self {
            bits,
            maxval: max_for_bits(bits),
            format: SampleFormat::Unsigned,
            endian,
            min_is_white: false,
            float_scale: 1.0,
        }
    }

    pub fn with_maxval(mut self, maxval: u32) -> Self {
        self.maxval = maxval;
        self
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_min_is_white(mut self, min_is_white: bool) -> Self {
        self.min_is_white = min_is_white;
        self
    }

    pub fn with_float_scale(mut self, scale: f64) -> Self {
        self.float_scale = scale;
        self
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self::unsigned(8, Endian::Big)
    }
}

/// Maps packed rows of `channels + pad` samples per pixel to quantum rows of
/// `channels` values per pixel, and back.
///
/// Pad samples are skipped on read and written as zero.
#[derive(Clone, Debug)]
pub struct Interleaver {
    tuple: TupleType,
    pad: usize,
    alpha: AlphaMode,
    packer: Packer,
    scaler: QuantumScaler,
}

impl Interleaver {
    pub fn new(tuple: TupleType, spec: SampleSpec) -> Result<Self, RasterError> {
        let packer = Packer::new(spec.bits, spec.endian)?.with_min_is_white(spec.min_is_white);
        let scaler = match spec.format {
            SampleFormat::Unsigned => QuantumScaler::new(spec.maxval)?,
            format => QuantumScaler::with_format(spec.bits, format, spec.float_scale)?,
        };
        Ok(Self {
            tuple,
            pad: 0,
            alpha: AlphaMode::Unassociated,
            packer,
            scaler,
        })
    }

    /// Extra samples per pixel beyond the tuple's channels.
    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = pad;
        self
    }

    pub fn with_alpha_mode(mut self, alpha: AlphaMode) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn tuple_type(&self) -> TupleType {
        self.tuple
    }

    pub fn scaler(&self) -> &QuantumScaler {
        &self.scaler
    }

    /// Samples per packed pixel, including pad.
    pub fn samples_per_pixel(&self) -> usize {
        self.tuple.channels() + self.pad
    }

    /// Packed bytes for one interleaved row.
    pub fn row_bytes(&self, width: usize) -> usize {
        self.packer.packed_len(width * self.samples_per_pixel())
    }

    /// Packed bytes for one row of a single plane.
    pub fn plane_row_bytes(&self, width: usize) -> usize {
        self.packer.packed_len(width)
    }

    /// Decode one packed row into `row`, returning the bytes consumed.
    pub fn deinterleave(&self, packed: &[u8], row: &mut [Quantum]) -> Result<usize, RasterError> {
        let mut scratch = Vec::new();
        self.deinterleave_with(packed, row, &mut scratch)
    }

    pub(crate) fn deinterleave_with(
        &self,
        packed: &[u8],
        row: &mut [Quantum],
        scratch: &mut Vec<u32>,
    ) -> Result<usize, RasterError> {
        let width = self.width_of(row)?;
        let used = self.packer.unpack(packed, width * self.samples_per_pixel(), scratch)?;
        let spp = self.samples_per_pixel();
        match self.tuple.channels() {
            1 => self.scatter::<1>(scratch, spp, row),
            2 => self.scatter::<2>(scratch, spp, row),
            3 => self.scatter::<3>(scratch, spp, row),
            4 => self.scatter::<4>(scratch, spp, row),
            _ => self.scatter::<5>(scratch, spp, row),
        }
        if self.alpha == AlphaMode::Associated {
            disassociate(self.tuple, row);
        }
        Ok(used)
    }

    /// Encode `row` and append the packed bytes to `out`.
    pub fn interleave(&self, row: &[Quantum], out: &mut Vec<u8>) -> Result<(), RasterError> {
        let width = self.width_of(row)?;
        let spp = self.samples_per_pixel();
        let mut raw = Vec::new();
        raw.try_reserve_exact(width * spp)?;
        raw.resize(width * spp, 0);
        match self.tuple.channels() {
            1 => self.gather::<1>(row, spp, &mut raw),
            2 => self.gather::<2>(row, spp, &mut raw),
            3 => self.gather::<3>(row, spp, &mut raw),
            4 => self.gather::<4>(row, spp, &mut raw),
            _ => self.gather::<5>(row, spp, &mut raw),
        }
        self.packer.pack(&raw, out);
        Ok(())
    }

    /// Decode one row of plane `plane` into its channel slot of `row`.
    ///
    /// Planes beyond the tuple's channels are pad and only consume bytes.
    /// Associated alpha is resolved when the alpha plane arrives, so color
    /// planes must be decoded first.
    pub fn deinterleave_plane(
        &self,
        packed: &[u8],
        plane: usize,
        row: &mut [Quantum],
    ) -> Result<usize, RasterError> {
        let width = self.width_of(row)?;
        let channels = self.tuple.channels();
        let mut raw = Vec::new();
        let used = self.packer.unpack(packed, width, &mut raw)?;
        if plane >= channels {
            return Ok(used);
        }
        for (px, &v) in row.chunks_exact_mut(channels).zip(&raw) {
            px[plane] = self.import(plane, v);
        }
        if self.alpha == AlphaMode::Associated && Some(plane) == self.tuple.alpha_index() {
            disassociate(self.tuple, row);
        }
        Ok(used)
    }

    /// Encode plane `plane` of `row` and append the packed bytes to `out`.
    pub fn interleave_plane(&self, row: &[Quantum], plane: usize, out: &mut Vec<u8>) -> Result<(), RasterError> {
        let width = self.width_of(row)?;
        let channels = self.tuple.channels();
        let raw: Vec<u32> = if plane >= channels {
            vec![0; width]
        } else {
            row.chunks_exact(channels)
                .map(|px| self.export(plane, px))
                .collect()
        };
        self.packer.pack(&raw, out);
        Ok(())
    }

    fn width_of(&self, row: &[Quantum]) -> Result<usize, RasterError> {
        let channels = self.tuple.channels();
        if row.len() % channels != 0 {
            return Err(RasterError::BufferTooSmall {
                needed: row.len().next_multiple_of(channels),
                actual: row.len(),
            });
        }
        Ok(row.len() / channels)
    }

    #[inline]
    fn is_index(&self, channel: usize) -> bool {
        channel == 0 && self.tuple.is_indexed()
    }

    #[inline]
    fn import(&self, channel: usize, raw: u32) -> Quantum {
        if self.is_index(channel) {
            raw.min(QUANTUM_RANGE as u32) as Quantum
        } else {
            self.scaler.import(raw)
        }
    }

    #[inline]
    fn export(&self, channel: usize, px: &[Quantum]) -> u32 {
        let q = px[channel];
        if self.is_index(channel) {
            return q as u32;
        }
        let q = match (self.alpha, self.tuple.alpha_index()) {
            (AlphaMode::Associated, Some(a)) if channel != a => associate(q, px[a]),
            _ => q,
        };
        self.scaler.export(q)
    }

    #[inline]
    fn scatter<const CH: usize>(&self, raw: &[u32], spp: usize, row: &mut [Quantum]) {
        for (px, src) in row.chunks_exact_mut(CH).zip(raw.chunks_exact(spp)) {
            for c in 0..CH {
                px[c] = self.import(c, src[c]);
            }
        }
    }

    #[inline]
    fn gather<const CH: usize>(&self, row: &[Quantum], spp: usize, raw: &mut [u32]) {
        for (px, dst) in row.chunks_exact(CH).zip(raw.chunks_exact_mut(spp)) {
            for c in 0..CH {
                dst[c] = self.export(c, px);
            }
        }
    }
}

#[inline]
fn associate(color: Quantum, alpha: Quantum) -> Quantum {
    let qr = QUANTUM_RANGE as u64;
    ((color as u64 * alpha as u64 + qr / 2) / qr) as Quantum
}

fn disassociate(tuple: TupleType, row: &mut [Quantum]) {
    let Some(a) = tuple.alpha_index() else {
        return;
    };
    let qr = QUANTUM_RANGE as u64;
    let first = usize::from(tuple.is_indexed());
    for px in row.chunks_exact_mut(tuple.channels()) {
        let alpha = px[a] as u64;
        if alpha == 0 {
            continue;
        }
        for c in &mut px[first..a] {
            *c = ((*c as u64 * qr + alpha / 2) / alpha).min(qr) as Quantum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::QUANTUM_DEPTH;

    fn noise(len: usize, seed: u32) -> Vec<Quantum> {
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as u64 % (QUANTUM_RANGE as u64 + 1)) as Quantum
            })
            .collect()
    }

    #[test]
    fn round_trip_at_quantum_depth() {
        let tuples = [
            TupleType::Gray,
            TupleType::GrayAlpha,
            TupleType::Rgb,
            TupleType::Rgba,
            TupleType::Cmyk,
            TupleType::Cmyka,
        ];
        for (i, tuple) in tuples.into_iter().enumerate() {
            for endian in [Endian::Big, Endian::Little] {
                let spec = SampleSpec::unsigned(QUANTUM_DEPTH as u8, endian);
                let il = Interleaver::new(tuple, spec).unwrap();
                let row = noise(9 * tuple.channels(), i as u32 + 7);
                let mut packed = Vec::new();
                il.interleave(&row, &mut packed).unwrap();
                assert_eq!(packed.len(), il.row_bytes(9));
                let mut back = vec![0; row.len()];
                il.deinterleave(&packed, &mut back).unwrap();
                assert_eq!(back, row, "{tuple:?}");
            }
        }
    }

    #[test]
    fn pad_samples_are_skipped() {
        let il = Interleaver::new(TupleType::Rgb, SampleSpec::unsigned(8, Endian::Big))
            .unwrap()
            .with_pad(2);
        let packed = [255, 0, 255, 9, 9, 0, 255, 0, 7, 7];
        let mut row = [0 as Quantum; 6];
        assert_eq!(il.deinterleave(&packed, &mut row).unwrap(), 10);
        let q = QUANTUM_RANGE;
        assert_eq!(row, [q, 0, q, 0, q, 0]);

        let mut out = Vec::new();
        il.interleave(&row, &mut out).unwrap();
        assert_eq!(out, vec![255, 0, 255, 0, 0, 0, 255, 0, 0, 0]);
    }

    #[test]
    fn indexed_values_are_not_scaled() {
        let il = Interleaver::new(TupleType::IndexedAlpha, SampleSpec::unsigned(4, Endian::Big)).unwrap();
        let mut row = [0 as Quantum; 4];
        il.deinterleave(&[0x3F, 0x9F], &mut row).unwrap();
        assert_eq!(row, [3, QUANTUM_RANGE, 9, QUANTUM_RANGE]);
        let mut out = Vec::new();
        il.interleave(&row, &mut out).unwrap();
        assert_eq!(out, vec![0x3F, 0x9F]);
    }

    #[test]
    fn associated_alpha_is_resolved() {
        let il = Interleaver::new(TupleType::GrayAlpha, SampleSpec::unsigned(8, Endian::Big))
            .unwrap()
            .with_alpha_mode(AlphaMode::Associated);
        // Half-transparent mid gray stored premultiplied.
        let mut row = [0 as Quantum; 2];
        il.deinterleave(&[64, 128], &mut row).unwrap();
        let expected_alpha = crate::quantum::to_quantum(128, 255);
        assert_eq!(row[1], expected_alpha);
        let straight = row[0] as f64 / QUANTUM_RANGE as f64;
        assert!((straight - 0.5).abs() < 0.01, "{straight}");

        let mut out = Vec::new();
        il.interleave(&row, &mut out).unwrap();
        assert_eq!(out, vec![64, 128]);
    }

    #[test]
    fn maxval_below_bit_range() {
        let spec = SampleSpec::unsigned(16, Endian::Big).with_maxval(1000);
        let il = Interleaver::new(TupleType::Gray, spec).unwrap();
        let mut row = [0 as Quantum; 2];
        il.deinterleave(&[0x03, 0xE8, 0x01, 0xF4], &mut row).unwrap();
        assert_eq!(row[0], QUANTUM_RANGE);
        assert_eq!(row[1], crate::quantum::to_quantum(500, 1000));
    }

    #[test]
    fn planar_rows() {
        let il = Interleaver::new(TupleType::Rgba, SampleSpec::unsigned(8, Endian::Big)).unwrap();
        let row: Vec<Quantum> = noise(12, 99);
        let mut back = vec![0 as Quantum; 12];
        for plane in 0..4 {
            let mut packed = Vec::new();
            il.interleave_plane(&row, plane, &mut packed).unwrap();
            assert_eq!(packed.len(), il.plane_row_bytes(3));
            il.deinterleave_plane(&packed, plane, &mut back).unwrap();
        }
        let mut a = Vec::new();
        let mut b = Vec::new();
        il.interleave(&row, &mut a).unwrap();
        il.interleave(&back, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_packed_row_fails() {
        let il = Interleaver::new(TupleType::Rgb, SampleSpec::unsigned(8, Endian::Big)).unwrap();
        let mut row = [0 as Quantum; 6];
        let err = il.deinterleave(&[1, 2, 3, 4], &mut row).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEndOfStream { .. }));
    }
}
