use crate::error::{LogSink, RasterError};
use crate::header::{Compression, FormatHeader};
use crate::pixel::TupleType;
use crate::quantum::SampleFormat;
use crate::sequence::{self, Codec, SceneRange};

/// Summary of a stream's first frame, read without decoding pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub codec: Codec,
    pub tuple: TupleType,
    /// Bits per stored sample.
    pub depth: u8,
    pub maxval: u32,
    pub sample_format: SampleFormat,
    pub compression: Compression,
    /// Frame count when the container declares one.
    pub frames: Option<u32>,
}

impl ImageInfo {
    /// Probe `data` for format and first-frame geometry.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RasterError> {
        let codec = Codec::detect(data).ok_or(RasterError::UnrecognizedFormat)?;
        let header = sequence::read_headers(data, SceneRange::single(0), &mut LogSink)?
            .into_iter()
            .next()
            .ok_or(RasterError::UnrecognizedFormat)?;
        Ok(Self::from_header(codec, &header))
    }

    pub fn from_header(codec: Codec, header: &FormatHeader) -> Self {
        Self {
            width: header.width,
            height: header.height,
            codec,
            tuple: header.tuple,
            depth: header.depth,
            maxval: header.maxval,
            sample_format: header.sample_format,
            compression: header.compression,
            frames: header.frames,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.tuple.has_alpha()
    }
}
