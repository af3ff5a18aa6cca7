//! Quantum scaling: external N-bit samples to and from the internal
//! fixed-width quantum.
//!
//! The quantum width is fixed at build time. The default is 16 bits; the
//! `quantum-8` and `quantum-32` features select the other widths.

use crate::error::RasterError;

#[cfg(all(feature = "quantum-8", feature = "quantum-32"))]
compile_error!("features `quantum-8` and `quantum-32` are mutually exclusive");

/// Internal sample value.
#[cfg(feature = "quantum-8")]
pub type Quantum = u8;
/// Internal sample value.
#[cfg(feature = "quantum-32")]
pub type Quantum = u32;
/// Internal sample value.
#[cfg(not(any(feature = "quantum-8", feature = "quantum-32")))]
pub type Quantum = u16;

/// Bits per quantum.
pub const QUANTUM_DEPTH: u32 = Quantum::BITS;

/// Largest quantum value (full intensity, fully opaque).
pub const QUANTUM_RANGE: Quantum = Quantum::MAX;

const QR: u64 = QUANTUM_RANGE as u64;

/// Largest sample value for which a lookup table is built.
const TABLE_LIMIT: u32 = 65535;

/// Numeric interpretation of external samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    #[default]
    Unsigned,
    /// Two's complement, mapped to quantum through offset binary.
    Signed,
    /// IEEE-754 binary16 or binary32.
    Float,
}

/// Largest value representable in `bits` bits (1..=32).
#[inline]
pub const fn max_for_bits(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Smallest bit depth `d` with `2^d - 1 >= max`.
#[inline]
pub const fn depth_for_max(max: u32) -> u8 {
    if max == 0 {
        1
    } else {
        (32 - max.leading_zeros()) as u8
    }
}

/// `round(sample * QUANTUM_RANGE / max)`, identity when `max == QUANTUM_RANGE`.
///
/// Samples above `max` clamp to `QUANTUM_RANGE`. A `max` of zero yields zero;
/// header validation rejects it before any scaling happens.
#[inline]
pub fn to_quantum(sample: u32, max: u32) -> Quantum {
    if max == 0 {
        return 0;
    }
    let s = u64::from(sample.min(max));
    let m = u64::from(max);
    if m == QR {
        return s as Quantum;
    }
    ((s * QR + m / 2) / m) as Quantum
}

/// `round(q * max / QUANTUM_RANGE)`, identity when `max == QUANTUM_RANGE`.
#[inline]
pub fn from_quantum(q: Quantum, max: u32) -> u32 {
    let m = u64::from(max);
    if m == QR {
        return q as u32;
    }
    ((q as u64 * m + QR / 2) / QR) as u32
}

/// Quantize a float sample after multiplying by `scale`; 1.0 maps to `QUANTUM_RANGE`.
#[inline]
pub fn float_to_quantum(value: f64, scale: f64) -> Quantum {
    let v = value * scale * QR as f64;
    if v.is_nan() || v <= 0.0 {
        0
    } else if v >= QR as f64 {
        QUANTUM_RANGE
    } else {
        (v + 0.5) as Quantum
    }
}

/// Inverse of [`float_to_quantum`].
#[inline]
pub fn quantum_to_float(q: Quantum, scale: f64) -> f64 {
    let scale = if scale == 0.0 { 1.0 } else { scale };
    q as f64 / (QR as f64 * scale)
}

/// Converts raw packed samples of one bit depth and numeric format to quantum
/// values and back.
///
/// Built once per frame and shared read-only between row workers.
#[derive(Clone, Debug)]
pub struct QuantumScaler {
    max: u32,
    bits: u8,
    format: SampleFormat,
    float_scale: f64,
    table: Option<Box<[Quantum]>>,
}

impl QuantumScaler {
    /// Unsigned samples in `0..=max`.
    pub fn new(max: u32) -> Result<Self, RasterError> {
        if max == 0 {
            return Err(RasterError::SampleRangeInvalid("maxval is zero".into()));
        }
        Ok(Self {
            max,
            bits: depth_for_max(max),
            format: SampleFormat::Unsigned,
            float_scale: 1.0,
            table: build_table(max)?,
        })
    }

    /// Samples of `bits` width in the given numeric format.
    ///
    /// `float_scale` multiplies float samples before quantization and is
    /// ignored for integer formats.
    pub fn with_format(bits: u8, format: SampleFormat, float_scale: f64) -> Result<Self, RasterError> {
        if !(1..=32).contains(&bits) {
            return Err(RasterError::SampleRangeInvalid(format!(
                "{bits} bits per sample"
            )));
        }
        if format == SampleFormat::Float && bits != 16 && bits != 32 {
            return Err(RasterError::SampleRangeInvalid(format!(
                "{bits}-bit floating point samples"
            )));
        }
        let max = max_for_bits(bits);
        let table = match format {
            SampleFormat::Float => None,
            _ => build_table(max)?,
        };
        Ok(Self {
            max,
            bits,
            format,
            float_scale,
            table,
        })
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Whether unsigned scaling is a no-op.
    pub fn is_identity(&self) -> bool {
        self.format == SampleFormat::Unsigned && u64::from(self.max) == QR
    }

    /// Scale an unsigned sample to quantum.
    #[inline]
    pub fn to_quantum(&self, sample: u32) -> Quantum {
        match &self.table {
            Some(table) => table.get(sample as usize).copied().unwrap_or(QUANTUM_RANGE),
            None => to_quantum(sample, self.max),
        }
    }

    /// Scale a quantum to an unsigned sample.
    #[inline]
    pub fn from_quantum(&self, q: Quantum) -> u32 {
        from_quantum(q, self.max)
    }

    /// Convert a raw packed sample in this scaler's format.
    #[inline]
    pub fn import(&self, raw: u32) -> Quantum {
        match self.format {
            SampleFormat::Unsigned => self.to_quantum(raw),
            SampleFormat::Signed => self.to_quantum(raw ^ self.sign_bit()),
            SampleFormat::Float => {
                let value = if self.bits == 16 {
                    half::f16::from_bits(raw as u16).to_f64()
                } else {
                    f64::from(f32::from_bits(raw))
                };
                float_to_quantum(value, self.float_scale)
            }
        }
    }

    /// Produce the raw packed sample for a quantum in this scaler's format.
    #[inline]
    pub fn export(&self, q: Quantum) -> u32 {
        match self.format {
            SampleFormat::Unsigned => self.from_quantum(q),
            SampleFormat::Signed => self.from_quantum(q) ^ self.sign_bit(),
            SampleFormat::Float => {
                let value = quantum_to_float(q, self.float_scale);
                if self.bits == 16 {
                    u32::from(half::f16::from_f64(value).to_bits())
                } else {
                    (value as f32).to_bits()
                }
            }
        }
    }

    #[inline]
    fn sign_bit(&self) -> u32 {
        1u32 << (self.bits - 1)
    }
}

fn build_table(max: u32) -> Result<Option<Box<[Quantum]>>, RasterError> {
    if max > TABLE_LIMIT || u64::from(max) == QR {
        return Ok(None);
    }
    let mut table = Vec::new();
    table.try_reserve_exact(max as usize + 1)?;
    table.extend((0..=max).map(|s| to_quantum(s, max)));
    Ok(Some(table.into_boxed_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_at_quantum_range() {
        let max = QUANTUM_RANGE as u32;
        let scaler = QuantumScaler::new(max).unwrap();
        assert!(scaler.is_identity());
        for s in [0u32, 1, 2, max / 2, max - 1, max] {
            assert_eq!(scaler.to_quantum(s) as u32, s);
            assert_eq!(scaler.from_quantum(s as Quantum), s);
        }
    }

    #[test]
    fn rounds_to_nearest() {
        let qr = QR;
        let expected = ((85 * qr + 127) / 255) as Quantum;
        assert_eq!(to_quantum(85, 255), expected);
        assert_eq!(to_quantum(0, 255), 0);
        assert_eq!(to_quantum(255, 255), QUANTUM_RANGE);
        assert_eq!(to_quantum(1, 1), QUANTUM_RANGE);
    }

    #[test]
    fn clamps_out_of_range_samples() {
        assert_eq!(to_quantum(300, 255), QUANTUM_RANGE);
        let scaler = QuantumScaler::new(15).unwrap();
        assert_eq!(scaler.to_quantum(16), QUANTUM_RANGE);
    }

    #[test]
    fn scaling_round_trip_within_one() {
        let maxes = [1u32, 3, 7, 15, 100, 255, 1000, 4095, 65535];
        for max in maxes.into_iter().filter(|&m| u64::from(m) <= QR) {
            let scaler = QuantumScaler::new(max).unwrap();
            for s in 0..=max {
                let back = scaler.from_quantum(scaler.to_quantum(s));
                assert!(back.abs_diff(s) <= 1, "max {max}: {s} -> {back}");
            }
        }
    }

    #[test]
    fn inline_path_above_table_limit() {
        let scaler = QuantumScaler::with_format(32, SampleFormat::Unsigned, 1.0).unwrap();
        assert!(scaler.table.is_none());
        assert_eq!(scaler.import(u32::MAX), QUANTUM_RANGE);
        assert_eq!(scaler.import(0), 0);
        assert_eq!(scaler.export(QUANTUM_RANGE), u32::MAX);
    }

    #[test]
    fn zero_max_rejected() {
        assert!(matches!(
            QuantumScaler::new(0),
            Err(RasterError::SampleRangeInvalid(_))
        ));
    }

    #[test]
    fn signed_is_offset_binary() {
        let scaler = QuantumScaler::with_format(8, SampleFormat::Signed, 1.0).unwrap();
        // -128 is the darkest sample, 127 the brightest.
        assert_eq!(scaler.import(0x80), 0);
        assert_eq!(scaler.import(0x7F), QUANTUM_RANGE);
        assert_eq!(scaler.export(0), 0x80);
        assert_eq!(scaler.export(QUANTUM_RANGE), 0x7F);
    }

    #[test]
    fn float_samples() {
        let scaler = QuantumScaler::with_format(32, SampleFormat::Float, 1.0).unwrap();
        assert_eq!(scaler.import(1.0f32.to_bits()), QUANTUM_RANGE);
        assert_eq!(scaler.import(0.0f32.to_bits()), 0);
        assert_eq!(scaler.import((-3.0f32).to_bits()), 0);
        assert_eq!(scaler.import(7.5f32.to_bits()), QUANTUM_RANGE);
        assert_eq!(f32::from_bits(scaler.export(QUANTUM_RANGE)), 1.0);

        let half = QuantumScaler::with_format(16, SampleFormat::Float, 1.0).unwrap();
        let one = half::f16::from_f32(1.0).to_bits() as u32;
        assert_eq!(half.import(one), QUANTUM_RANGE);
        assert_eq!(half.export(QUANTUM_RANGE), one);

        let scaled = QuantumScaler::with_format(32, SampleFormat::Float, 0.5).unwrap();
        assert_eq!(scaled.import(2.0f32.to_bits()), QUANTUM_RANGE);
    }

    #[test]
    fn float_rejects_odd_widths() {
        assert!(QuantumScaler::with_format(24, SampleFormat::Float, 1.0).is_err());
        assert!(QuantumScaler::with_format(0, SampleFormat::Unsigned, 1.0).is_err());
        assert!(QuantumScaler::with_format(33, SampleFormat::Unsigned, 1.0).is_err());
    }

    #[test]
    fn depth_for_max_values() {
        assert_eq!(depth_for_max(1), 1);
        assert_eq!(depth_for_max(255), 8);
        assert_eq!(depth_for_max(256), 9);
        assert_eq!(depth_for_max(1000), 10);
        assert_eq!(depth_for_max(65535), 16);
    }
}
