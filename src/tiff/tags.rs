//! TIFF tag dictionary: field types, tag IDs and the enumerated values the
//! codec understands.

use crate::header::Compression;

// ── Field types ─────────────────────────────────────────────────────

/// Encoding of an IFD entry's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    /// BigTIFF only.
    Long8 = 16,
    /// BigTIFF only.
    SLong8 = 17,
    /// BigTIFF only.
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            16 => FieldType::Long8,
            17 => FieldType::SLong8,
            18 => FieldType::Ifd8,
            _ => return None,
        })
    }

    /// Whether `count` values fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64, big_tiff: bool) -> bool {
        let limit = if big_tiff { 8 } else { 4 };
        (self.size_in_bytes() as u64).saturating_mul(count) <= limit
    }
}

// ── Tags ────────────────────────────────────────────────────────────

/// Tag IDs read or written by this codec. Anything else is reported as an
/// unknown tag and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TiffTag {
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    Photometric = 262,
    FillOrder = 266,
    DocumentName = 269,
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    StripOffsets = 273,
    Orientation = 274,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    MinSampleValue = 280,
    MaxSampleValue = 281,
    XResolution = 282,
    YResolution = 283,
    PlanarConfig = 284,
    PageName = 285,
    XPosition = 286,
    YPosition = 287,
    ResolutionUnit = 296,
    PageNumber = 297,
    Software = 305,
    DateTime = 306,
    Artist = 315,
    HostComputer = 316,
    Predictor = 317,
    ColorMap = 320,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    ExtraSamples = 338,
    SampleFormat = 339,
    SMinSampleValue = 340,
    SMaxSampleValue = 341,
    Copyright = 33432,
}

impl TiffTag {
    pub fn from_u16(value: u16) -> Option<Self> {
        use TiffTag::*;
        Some(match value {
            254 => NewSubfileType,
            256 => ImageWidth,
            257 => ImageLength,
            258 => BitsPerSample,
            259 => Compression,
            262 => Photometric,
            266 => FillOrder,
            269 => DocumentName,
            270 => ImageDescription,
            271 => Make,
            272 => Model,
            273 => StripOffsets,
            274 => Orientation,
            277 => SamplesPerPixel,
            278 => RowsPerStrip,
            279 => StripByteCounts,
            280 => MinSampleValue,
            281 => MaxSampleValue,
            282 => XResolution,
            283 => YResolution,
            284 => PlanarConfig,
            285 => PageName,
            286 => XPosition,
            287 => YPosition,
            296 => ResolutionUnit,
            297 => PageNumber,
            305 => Software,
            306 => DateTime,
            315 => Artist,
            316 => HostComputer,
            317 => Predictor,
            320 => ColorMap,
            322 => TileWidth,
            323 => TileLength,
            324 => TileOffsets,
            325 => TileByteCounts,
            338 => ExtraSamples,
            339 => SampleFormat,
            340 => SMinSampleValue,
            341 => SMaxSampleValue,
            33432 => Copyright,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// ASCII tags carried as frame properties, with the property key.
pub const TEXT_TAGS: [(TiffTag, &str); 10] = [
    (TiffTag::ImageDescription, "comment"),
    (TiffTag::PageName, "label"),
    (TiffTag::DocumentName, "tiff:document"),
    (TiffTag::Software, "tiff:software"),
    (TiffTag::Artist, "tiff:artist"),
    (TiffTag::DateTime, "tiff:timestamp"),
    (TiffTag::Copyright, "tiff:copyright"),
    (TiffTag::Make, "tiff:make"),
    (TiffTag::Model, "tiff:model"),
    (TiffTag::HostComputer, "tiff:hostcomputer"),
];

// ── Enumerated values ───────────────────────────────────────────────

/// PhotometricInterpretation values this codec maps to a tuple type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Photometric {
    MinIsWhite = 0,
    MinIsBlack = 1,
    Rgb = 2,
    Palette = 3,
    Separated = 5,
}

impl Photometric {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Photometric::MinIsWhite,
            1 => Photometric::MinIsBlack,
            2 => Photometric::Rgb,
            3 => Photometric::Palette,
            5 => Photometric::Separated,
            _ => return None,
        })
    }

    /// Value of the `tiff:photometric` property.
    pub const fn name(self) -> &'static str {
        match self {
            Photometric::MinIsWhite => "min-is-white",
            Photometric::MinIsBlack => "min-is-black",
            Photometric::Rgb => "RGB",
            Photometric::Palette => "palette",
            Photometric::Separated => "separated",
        }
    }
}

pub const PLANAR_CONTIG: u16 = 1;
pub const PLANAR_SEPARATE: u16 = 2;

pub const PREDICTOR_NONE: u16 = 1;
pub const PREDICTOR_HORIZONTAL: u16 = 2;

pub const EXTRA_ASSOCIATED: u16 = 1;
pub const EXTRA_UNASSOCIATED: u16 = 2;

pub const SAMPLE_UNSIGNED: u16 = 1;
pub const SAMPLE_SIGNED: u16 = 2;
pub const SAMPLE_FLOAT: u16 = 3;

pub const RESUNIT_NONE: u16 = 1;
pub const RESUNIT_INCH: u16 = 2;
pub const RESUNIT_CENTIMETER: u16 = 3;

/// Compression scheme for a Compression tag value.
pub fn compression_from_code(code: u16) -> Compression {
    match code {
        1 => Compression::None,
        2 => Compression::CcittRle,
        3 => Compression::Group3,
        4 => Compression::Group4,
        5 => Compression::Lzw,
        7 => Compression::Jpeg,
        8 | 32946 => Compression::Deflate,
        32773 => Compression::PackBits,
        other => Compression::Other(other),
    }
}

/// Compression tag value for a scheme.
pub fn compression_code(compression: Compression) -> u16 {
    match compression {
        Compression::None => 1,
        Compression::CcittRle => 2,
        Compression::Group3 => 3,
        Compression::Group4 => 4,
        Compression::Lzw => 5,
        Compression::Jpeg => 7,
        Compression::Deflate => 8,
        Compression::PackBits | Compression::RunLength => 32773,
        Compression::Other(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_sizes() {
        assert_eq!(FieldType::Ascii.size_in_bytes(), 1);
        assert_eq!(FieldType::Short.size_in_bytes(), 2);
        assert_eq!(FieldType::Rational.size_in_bytes(), 8);
        assert_eq!(FieldType::from_u16(16), Some(FieldType::Long8));
        assert_eq!(FieldType::from_u16(13), None);
    }

    #[test]
    fn inline_threshold() {
        assert!(FieldType::Short.fits_inline(2, false));
        assert!(!FieldType::Short.fits_inline(3, false));
        assert!(FieldType::Short.fits_inline(4, true));
        assert!(!FieldType::Rational.fits_inline(1, false));
        assert!(FieldType::Rational.fits_inline(1, true));
    }

    #[test]
    fn tag_ids_round_trip() {
        for (tag, _) in TEXT_TAGS {
            assert_eq!(TiffTag::from_u16(tag.as_u16()), Some(tag));
        }
        assert_eq!(TiffTag::from_u16(33432), Some(TiffTag::Copyright));
        assert_eq!(TiffTag::from_u16(50000), None);
    }

    #[test]
    fn compression_codes() {
        assert_eq!(compression_from_code(32946), Compression::Deflate);
        assert_eq!(compression_from_code(32773), Compression::PackBits);
        assert_eq!(compression_from_code(34712), Compression::Other(34712));
        assert_eq!(compression_code(Compression::Deflate), 8);
        assert_eq!(Photometric::from_u16(4), None);
    }
}
