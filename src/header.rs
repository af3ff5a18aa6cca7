use crate::error::RasterError;
use crate::pack::Endian;
use crate::pixel::{AlphaMode, TupleType};
use crate::quantum::{SampleFormat, depth_for_max};

/// Pixel data compression of a frame.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    /// PackBits byte runs (TIFF 32773).
    PackBits,
    /// zlib Deflate (TIFF 8 / 32946).
    Deflate,
    /// PostScript hex run-length packets.
    RunLength,
    Lzw,
    Jpeg,
    /// CCITT modified Huffman RLE (TIFF 2).
    CcittRle,
    Group3,
    Group4,
    /// Any other TIFF compression code.
    Other(u16),
}

/// Physical unit of [`Resolution`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResolutionUnit {
    #[default]
    Undefined,
    PixelsPerInch,
    PixelsPerCentimeter,
}

/// Pixel density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub x: f64,
    pub y: f64,
    pub unit: ResolutionUnit,
}

/// Everything a row codec needs to know about one frame.
///
/// Built fresh for every frame; never patched in place between frames.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatHeader {
    pub width: u32,
    pub height: u32,
    /// Largest sample value.
    pub maxval: u32,
    /// Bits per stored sample.
    pub depth: u8,
    pub tuple: TupleType,
    /// Stored samples per pixel beyond `tuple.channels()`.
    pub extra_samples: usize,
    pub sample_format: SampleFormat,
    pub alpha_mode: AlphaMode,
    pub compression: Compression,
    pub resolution: Option<Resolution>,
    pub endian: Endian,
    /// Frames in the sequence, when the format declares it.
    pub frames: Option<u32>,
    /// Byte offset of this frame's header.
    pub offset: u64,
}

impl FormatHeader {
    /// Header with defaults for everything but geometry and samples.
    pub fn new(width: u32, height: u32, maxval: u32, tuple: TupleType) -> Self {
        Self {
            width,
            height,
            maxval,
            depth: depth_for_max(maxval),
            tuple,
            extra_samples: 0,
            sample_format: SampleFormat::Unsigned,
            alpha_mode: AlphaMode::Unassociated,
            compression: Compression::None,
            resolution: None,
            endian: Endian::Big,
            frames: None,
            offset: 0,
        }
    }

    /// Reject zero dimensions and zero maxval.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::DimensionInvalid {
                width: u64::from(self.width),
                height: u64::from(self.height),
            });
        }
        if self.maxval == 0 && self.sample_format != SampleFormat::Float {
            return Err(RasterError::SampleRangeInvalid("maxval is zero".into()));
        }
        if !(1..=32).contains(&self.depth) {
            return Err(RasterError::SampleRangeInvalid(format!(
                "{} bits per sample",
                self.depth
            )));
        }
        Ok(())
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.tuple.channels() + self.extra_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_follows_maxval() {
        assert_eq!(FormatHeader::new(1, 1, 255, TupleType::Gray).depth, 8);
        assert_eq!(FormatHeader::new(1, 1, 1, TupleType::Gray).depth, 1);
        assert_eq!(FormatHeader::new(1, 1, 4095, TupleType::Gray).depth, 12);
    }

    #[test]
    fn validation() {
        assert!(FormatHeader::new(640, 480, 255, TupleType::Rgb).validate().is_ok());
        assert!(matches!(
            FormatHeader::new(0, 480, 255, TupleType::Rgb).validate(),
            Err(RasterError::DimensionInvalid { .. })
        ));
        assert!(matches!(
            FormatHeader::new(1, 1, 0, TupleType::Rgb).validate(),
            Err(RasterError::SampleRangeInvalid(_))
        ));
    }
}
