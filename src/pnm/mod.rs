//! PNM family: P1–P3 (ASCII), P4–P6 (binary), P7 (PAM), Pf/PF (PFM).
//!
//! Frames may be concatenated; each starts with its own `P` magic.

mod decode;
mod encode;
mod header;

pub(crate) use encode::encode_frame;
pub(crate) use header::PnmHeader;

use enough::Stop;

use crate::error::{LogSink, RasterError, Warning, WarningSink};
use crate::header::FormatHeader;
use crate::sequence::{FrameCodec, RowMonitor};
use crate::store::{Image, PixelStore};
use crate::stream::ByteReader;

/// Which PNM sub-format to use.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PnmFormat {
    /// P1/P4, bilevel (PBM).
    Pbm,
    /// P2/P5, grayscale (PGM).
    Pgm,
    /// P3/P6, RGB (PPM).
    Ppm,
    /// P7, PAM: arbitrary channels named by TUPLTYPE.
    Pam,
    /// Pf/PF, floating-point grayscale or RGB (PFM).
    Pfm,
    /// Write only: PBM, PGM or PPM, whichever fits the image content.
    Pnm,
}

/// Textual or binary samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PnmEncoding {
    #[default]
    Binary,
    /// Whitespace-separated decimal samples (P1–P3).
    Ascii,
}

/// A PNM sub-format together with its sample encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PnmVariant {
    pub format: PnmFormat,
    pub encoding: PnmEncoding,
}

impl PnmVariant {
    pub const fn new(format: PnmFormat, encoding: PnmEncoding) -> Self {
        Self { format, encoding }
    }

    /// Variant for the byte following `P`.
    pub const fn from_magic(digit: u8) -> Option<Self> {
        use PnmEncoding::*;
        use PnmFormat::*;
        let (format, encoding) = match digit {
            b'1' => (Pbm, Ascii),
            b'2' => (Pgm, Ascii),
            b'3' => (Ppm, Ascii),
            b'4' => (Pbm, Binary),
            b'5' => (Pgm, Binary),
            b'6' => (Ppm, Binary),
            b'7' => (Pam, Binary),
            b'F' | b'f' => (Pfm, Binary),
            _ => return None,
        };
        Some(Self { format, encoding })
    }

    /// Byte following `P`. PAM and PFM have no ASCII form.
    pub(crate) const fn magic(self, gray: bool) -> u8 {
        match (self.format, self.encoding) {
            (PnmFormat::Pbm, PnmEncoding::Ascii) => b'1',
            (PnmFormat::Pgm, PnmEncoding::Ascii) => b'2',
            (PnmFormat::Ppm | PnmFormat::Pnm, PnmEncoding::Ascii) => b'3',
            (PnmFormat::Pbm, PnmEncoding::Binary) => b'4',
            (PnmFormat::Pgm, PnmEncoding::Binary) => b'5',
            (PnmFormat::Ppm | PnmFormat::Pnm, PnmEncoding::Binary) => b'6',
            (PnmFormat::Pam, _) => b'7',
            (PnmFormat::Pfm, _) if gray => b'f',
            (PnmFormat::Pfm, _) => b'F',
        }
    }
}

/// Parse the first frame's header.
pub fn parse_header(data: &[u8]) -> Result<FormatHeader, RasterError> {
    let mut r = ByteReader::new(data);
    Ok(header::parse_header(&mut r, &mut LogSink)?.header)
}

/// Decode the first frame into a caller-owned store, row by row.
///
/// The store must match the frame's width, height and tuple type. Rows
/// committed before a failure stay in the store.
pub fn decode_into<S: PixelStore>(data: &[u8], store: &mut S, stop: &dyn Stop) -> Result<FormatHeader, RasterError> {
    let mut r = ByteReader::new(data);
    let h = header::parse_header(&mut r, &mut LogSink)?;
    decode::read_pixels(&mut r, &h, store, &RowMonitor::new(stop), false)?;
    Ok(h.header)
}

// ── Sequence support ────────────────────────────────────────────────

/// Concatenated PNM frames.
pub(crate) struct PnmFrames<'a> {
    reader: ByteReader<'a>,
}

impl<'a> PnmFrames<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(data),
        }
    }
}

impl FrameCodec for PnmFrames<'_> {
    type Frame = PnmHeader;

    fn next_frame(&mut self, index: u32, sink: &mut dyn WarningSink) -> Result<Option<PnmHeader>, RasterError> {
        if index > 0 {
            while self
                .reader
                .peek_u8()
                .is_some_and(|b| b.is_ascii_whitespace() || b == 0)
            {
                self.reader.read_u8();
            }
            match self.reader.peek_u8() {
                None => return Ok(None),
                Some(b'P') => {}
                Some(_) => {
                    sink.warn(Warning::TrailingData {
                        offset: self.reader.tell(),
                        length: self.reader.remaining() as u64,
                    });
                    return Ok(None);
                }
            }
        }
        header::parse_header(&mut self.reader, sink).map(Some)
    }

    fn header<'f>(&self, frame: &'f PnmHeader) -> &'f FormatHeader {
        &frame.header
    }

    fn annotate(&self, frame: &PnmHeader, image: &mut Image) {
        if !frame.comments.is_empty() {
            image.set_property("comment", frame.comments.join("\n"));
        }
    }

    fn decode(
        &mut self,
        frame: &PnmHeader,
        store: &mut dyn PixelStore,
        monitor: &RowMonitor<'_>,
        parallel: bool,
    ) -> Result<(), RasterError> {
        decode::read_pixels(&mut self.reader, frame, store, monitor, parallel)
    }

    fn skip(&mut self, frame: &PnmHeader) -> Result<(), RasterError> {
        decode::skip_pixels(&mut self.reader, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_round_trip() {
        for digit in [b'1', b'2', b'3', b'4', b'5', b'6', b'7'] {
            let v = PnmVariant::from_magic(digit).unwrap();
            assert_eq!(v.magic(false), digit);
        }
        let pfm = PnmVariant::from_magic(b'f').unwrap();
        assert_eq!(pfm.magic(true), b'f');
        assert_eq!(pfm.magic(false), b'F');
        assert!(PnmVariant::from_magic(b'8').is_none());
    }
}
