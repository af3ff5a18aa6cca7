use enough::Stop;

use crate::error::{RasterError, Warning};
use crate::header::FormatHeader;
use crate::limits::Limits;
use crate::sequence::{self, Codec, ProgressFn, RowMonitor, SceneRange, SequenceOptions};
use crate::store::{Image, PixelStore};

/// Frames (or, in ping mode, headers) read from one stream.
#[derive(Debug)]
pub struct DecodeOutput {
    pub codec: Codec,
    /// Decoded frames in stream order. Empty in ping mode.
    pub frames: Vec<Image>,
    /// Frame headers. Filled in ping mode only.
    pub headers: Vec<FormatHeader>,
    pub warnings: Vec<Warning>,
}

impl DecodeOutput {
    /// First decoded frame.
    pub fn first(&self) -> Option<&Image> {
        self.frames.first()
    }

    pub fn into_frames(self) -> Vec<Image> {
        self.frames
    }

    /// Number of frames or headers returned.
    pub fn len(&self) -> usize {
        self.frames.len().max(self.headers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for one decode operation.
///
/// ```
/// use zenraster::{DecodeRequest, SceneRange, Unstoppable};
///
/// let data = b"P2\n2 1\n255\n0 255\nP2\n2 1\n255\n10 20\n";
/// let out = DecodeRequest::new(data)
///     .scenes(SceneRange::single(1))
///     .decode(Unstoppable)?;
/// assert_eq!(out.frames.len(), 1);
/// assert_eq!(out.frames[0].scene, 1);
/// # Ok::<(), zenraster::RasterError>(())
/// ```
#[derive(Clone, Copy)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    limits: Option<&'a Limits>,
    scenes: SceneRange,
    ping: bool,
    parallel: bool,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            limits: None,
            scenes: SceneRange::ALL,
            ping: false,
            parallel: false,
            progress: None,
        }
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Restrict decoding to a range of frames. Defaults to every frame.
    pub fn scenes(mut self, scenes: SceneRange) -> Self {
        self.scenes = scenes;
        self
    }

    /// Read headers only; no pixel storage is allocated.
    pub fn ping(mut self, ping: bool) -> Self {
        self.ping = ping;
        self
    }

    /// Decode binary PNM rows on the rayon pool (`parallel` feature).
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Called after every row as `(row, rows)`; returning false aborts.
    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Container detected from the leading bytes.
    pub fn codec(&self) -> Option<Codec> {
        Codec::detect(self.data)
    }

    pub fn decode(self, stop: impl Stop) -> Result<DecodeOutput, RasterError> {
        let codec = self.codec().ok_or(RasterError::UnrecognizedFormat)?;
        let mut warnings = Vec::new();
        if self.ping {
            let headers = self.headers_into(&mut warnings)?;
            return Ok(DecodeOutput {
                codec,
                frames: Vec::new(),
                headers,
                warnings,
            });
        }
        let monitor = self.monitor(&stop);
        let options = SequenceOptions {
            scenes: self.scenes,
            limits: self.limits,
            parallel: self.parallel,
        };
        let frames = sequence::read_frames(self.data, &options, &monitor, &mut warnings)?;
        log::debug!("decoded {} frame(s) as {codec:?}", frames.len());
        Ok(DecodeOutput {
            codec,
            frames,
            headers: Vec::new(),
            warnings,
        })
    }

    /// Decode and keep only the frames; warnings go to the `log` facade.
    pub fn decode_all(self, stop: impl Stop) -> Result<Vec<Image>, RasterError> {
        let out = self.ping(false).decode(stop)?;
        for warning in &out.warnings {
            log::warn!("{warning}");
        }
        Ok(out.frames)
    }

    /// Headers of the selected frames, without decoding pixels.
    pub fn headers(self) -> Result<Vec<FormatHeader>, RasterError> {
        let mut warnings = Vec::new();
        let headers = self.headers_into(&mut warnings)?;
        for warning in &warnings {
            log::warn!("{warning}");
        }
        Ok(headers)
    }

    /// Decode the first selected frame into a caller-owned store.
    ///
    /// The store must match the frame's width, height and tuple type. On
    /// error, rows committed so far stay in the store.
    pub fn decode_into<S: PixelStore>(self, store: &mut S, stop: impl Stop) -> Result<FormatHeader, RasterError> {
        let mut warnings = Vec::new();
        let monitor = self.monitor(&stop);
        let header = sequence::read_into(self.data, self.scenes.first, store, self.limits, &monitor, &mut warnings)?;
        for warning in &warnings {
            log::warn!("{warning}");
        }
        Ok(header)
    }

    fn headers_into(&self, warnings: &mut Vec<Warning>) -> Result<Vec<FormatHeader>, RasterError> {
        let headers = sequence::read_headers(self.data, self.scenes, warnings)?;
        if let Some(limits) = self.limits {
            for header in &headers {
                limits.check(header.width, header.height)?;
            }
        }
        Ok(headers)
    }

    fn monitor<'s>(&self, stop: &'s dyn Stop) -> RowMonitor<'s>
    where
        'a: 's,
    {
        let monitor = RowMonitor::new(stop);
        match self.progress {
            Some(progress) => monitor.with_progress(progress),
            None => monitor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::TupleType;
    use crate::quantum::to_quantum;
    use enough::Unstoppable;

    const TWO_FRAMES: &[u8] = b"P2\n2 1\n255\n0 255\nP2\n2 1\n255\n10 20\n";

    #[test]
    fn ping_returns_headers_only() {
        let out = DecodeRequest::new(TWO_FRAMES).ping(true).decode(Unstoppable).unwrap();
        assert!(out.frames.is_empty());
        assert_eq!(out.headers.len(), 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out.headers[1].tuple, TupleType::Gray);
    }

    #[test]
    fn unknown_magic() {
        let err = DecodeRequest::new(b"GIF89a").decode(Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::UnrecognizedFormat));
    }

    #[test]
    fn limits_apply_to_ping() {
        let limits = Limits {
            max_width: Some(1),
            ..Limits::default()
        };
        let err = DecodeRequest::new(TWO_FRAMES)
            .with_limits(&limits)
            .ping(true)
            .decode(Unstoppable)
            .unwrap_err();
        assert!(matches!(err, RasterError::LimitExceeded(_)));
    }

    #[test]
    fn decode_into_checks_geometry() {
        let mut store = Image::new(3, 1, TupleType::Gray).unwrap();
        let err = DecodeRequest::new(TWO_FRAMES)
            .decode_into(&mut store, Unstoppable)
            .unwrap_err();
        assert!(matches!(err, RasterError::UnsupportedVariant(_)));
    }

    #[test]
    fn decode_into_second_scene() {
        let mut store = Image::new(2, 1, TupleType::Gray).unwrap();
        let header = DecodeRequest::new(TWO_FRAMES)
            .scenes(SceneRange::single(1))
            .decode_into(&mut store, Unstoppable)
            .unwrap();
        assert_eq!(header.maxval, 255);
        assert_eq!(store.committed_rows(), 1);
        assert_eq!(store.row(0).unwrap(), &[to_quantum(10, 255), to_quantum(20, 255)]);
    }

    #[test]
    fn progress_can_abort() {
        let data = b"P5\n1 4\n255\n\x00\x01\x02\x03";
        let progress = |row: u32, _rows: u32| row < 2;
        let err = DecodeRequest::new(data)
            .with_progress(&progress)
            .decode(Unstoppable)
            .unwrap_err();
        assert!(matches!(err, RasterError::Aborted { .. }));
    }
}
