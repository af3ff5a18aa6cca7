use std::io::Write;

use enough::Stop;

use crate::error::RasterError;
use crate::pnm::{self, PnmEncoding, PnmFormat};
use crate::ps::{self, PsOptions};
use crate::sequence::{ProgressFn, RowMonitor};
use crate::store::Image;
use crate::tiff::{self, TiffOptions};

#[derive(Clone, Debug)]
enum Target {
    Pnm(PnmFormat, PnmEncoding),
    Tiff(TiffOptions),
    Ps(PsOptions),
}

/// Builder for one encode operation.
///
/// ```
/// use zenraster::{EncodeRequest, Image, TupleType, Unstoppable, pnm::PnmFormat};
///
/// let image = Image::new(2, 2, TupleType::Gray)?;
/// let pgm = EncodeRequest::pnm(PnmFormat::Pgm).encode(&image, Unstoppable)?;
/// assert!(pgm.starts_with(b"P5\n"));
/// # Ok::<(), zenraster::RasterError>(())
/// ```
#[derive(Clone)]
pub struct EncodeRequest<'a> {
    target: Target,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> EncodeRequest<'a> {
    /// Binary PNM output (P4–P7, PFM).
    pub fn pnm(format: PnmFormat) -> Self {
        Self::new(Target::Pnm(format, PnmEncoding::Binary))
    }

    /// ASCII PNM output (P1–P3). PAM and PFM have no ASCII form and are
    /// written binary.
    pub fn pnm_ascii(format: PnmFormat) -> Self {
        Self::new(Target::Pnm(format, PnmEncoding::Ascii))
    }

    pub fn tiff(options: TiffOptions) -> Self {
        Self::new(Target::Tiff(options))
    }

    pub fn ps(options: PsOptions) -> Self {
        Self::new(Target::Ps(options))
    }

    fn new(target: Target) -> Self {
        Self {
            target,
            progress: None,
        }
    }

    /// Called after every written row as `(row, rows)`; returning false aborts.
    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn encode(&self, image: &Image, stop: impl Stop) -> Result<Vec<u8>, RasterError> {
        self.encode_all(std::slice::from_ref(image), stop)
    }

    /// Encode a sequence: concatenated PNM frames, chained TIFF
    /// directories or one PostScript page per frame.
    pub fn encode_all(&self, images: &[Image], stop: impl Stop) -> Result<Vec<u8>, RasterError> {
        let monitor = RowMonitor::new(&stop);
        let monitor = match self.progress {
            Some(progress) => monitor.with_progress(progress),
            None => monitor,
        };
        match &self.target {
            Target::Pnm(format, encoding) => {
                if images.is_empty() {
                    return Err(RasterError::UnsupportedVariant("no frames to write".into()));
                }
                let mut out = Vec::new();
                for image in images {
                    pnm::encode_frame(image, *format, *encoding, &monitor, &mut out)?;
                }
                Ok(out)
            }
            Target::Tiff(options) => tiff::write_frames(images, options, &monitor),
            Target::Ps(options) => ps::write_document(images, options, &monitor),
        }
    }

    /// Encode a sequence into `writer`.
    pub fn encode_to<W: Write>(&self, images: &[Image], mut writer: W, stop: impl Stop) -> Result<(), RasterError> {
        let bytes = self.encode_all(images, stop)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::TupleType;
    use enough::Unstoppable;

    #[test]
    fn empty_sequence_rejected() {
        for request in [
            EncodeRequest::pnm(PnmFormat::Ppm),
            EncodeRequest::tiff(TiffOptions::new()),
            EncodeRequest::ps(PsOptions::new()),
        ] {
            assert!(matches!(
                request.encode_all(&[], Unstoppable),
                Err(RasterError::UnsupportedVariant(_))
            ));
        }
    }

    #[test]
    fn pnm_frames_concatenate() {
        let mut image = Image::new(1, 1, TupleType::Gray).unwrap();
        image.depth = 8;
        let out = EncodeRequest::pnm(PnmFormat::Pgm)
            .encode_all(&[image.clone(), image], Unstoppable)
            .unwrap();
        assert_eq!(out, b"P5\n1 1\n255\n\0P5\n1 1\n255\n\0");
    }

    #[test]
    fn encode_to_writer() {
        let image = Image::new(2, 1, TupleType::Gray).unwrap();
        let mut sink = Vec::new();
        EncodeRequest::pnm_ascii(PnmFormat::Pgm)
            .encode_to(std::slice::from_ref(&image), &mut sink, Unstoppable)
            .unwrap();
        assert!(sink.starts_with(b"P2\n2 1\n"));
    }

    #[test]
    fn progress_aborts_encode() {
        let image = Image::new(1, 8, TupleType::Gray).unwrap();
        let progress = |row: u32, _rows: u32| row < 4;
        let err = EncodeRequest::pnm(PnmFormat::Pgm)
            .with_progress(&progress)
            .encode(&image, Unstoppable)
            .unwrap_err();
        assert!(matches!(err, RasterError::Aborted { .. }));
    }
}
