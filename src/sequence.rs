//! Multi-image sequence driver.
//!
//! Format detection picks a [`Codec`]; the driver then walks frames through
//! that codec's [`FrameCodec`] implementation, decoding frames inside the
//! requested [`SceneRange`] and skipping the rest header-only.

use enough::Stop;

use crate::error::{RasterError, WarningSink};
use crate::header::FormatHeader;
use crate::limits::Limits;
use crate::pnm::{PnmFrames, PnmVariant};
use crate::store::{Image, PixelStore};
use crate::tiff::TiffFrames;

/// Progress callback: `(row, rows)`; returning false aborts at the next row boundary.
pub type ProgressFn<'a> = &'a (dyn Fn(u32, u32) -> bool + Sync);

/// Cancellation and progress, polled once per row.
#[derive(Clone, Copy)]
pub struct RowMonitor<'a> {
    stop: &'a dyn Stop,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> RowMonitor<'a> {
    pub fn new(stop: &'a dyn Stop) -> Self {
        Self {
            stop,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn check(&self) -> Result<(), RasterError> {
        self.stop.check()?;
        Ok(())
    }

    /// Called after row `row` of `rows` is committed or written.
    pub fn row_done(&self, row: u32, rows: u32) -> Result<(), RasterError> {
        self.stop.check()?;
        if let Some(progress) = self.progress
            && !progress(row, rows)
        {
            return Err(RasterError::Aborted { row });
        }
        Ok(())
    }
}

/// Zero-based frame selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneRange {
    pub first: u32,
    /// `None` reads through the last frame.
    pub count: Option<u32>,
}

impl SceneRange {
    pub const ALL: Self = Self {
        first: 0,
        count: None,
    };

    pub const fn new(first: u32, count: u32) -> Self {
        Self {
            first,
            count: Some(count),
        }
    }

    pub const fn single(index: u32) -> Self {
        Self::new(index, 1)
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.first && !self.is_past(index)
    }

    /// Whether `index` and every later frame lie beyond the range.
    pub fn is_past(&self, index: u32) -> bool {
        match self.count {
            Some(count) => u64::from(index) >= u64::from(self.first) + u64::from(count),
            None => false,
        }
    }
}

/// Container family, chosen from the leading magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Pnm(PnmVariant),
    Tiff,
}

impl Codec {
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data {
            [b'P', d, ..] => PnmVariant::from_magic(*d).map(Codec::Pnm),
            [b'I', b'I', 42 | 43, 0, ..] | [b'M', b'M', 0, 42 | 43, ..] => Some(Codec::Tiff),
            _ => None,
        }
    }
}

/// Per-format frame iteration used by the driver.
pub(crate) trait FrameCodec {
    type Frame;

    /// Parse the header of frame `index`, or `None` when the stream holds no more frames.
    fn next_frame(&mut self, index: u32, sink: &mut dyn WarningSink) -> Result<Option<Self::Frame>, RasterError>;

    fn header<'f>(&self, frame: &'f Self::Frame) -> &'f FormatHeader;

    /// Copy frame metadata (properties, colormap) onto the image.
    fn annotate(&self, frame: &Self::Frame, image: &mut Image);

    fn decode(
        &mut self,
        frame: &Self::Frame,
        store: &mut dyn PixelStore,
        monitor: &RowMonitor<'_>,
        parallel: bool,
    ) -> Result<(), RasterError>;

    /// Advance past the frame's pixel data without decoding it.
    fn skip(&mut self, frame: &Self::Frame) -> Result<(), RasterError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SequenceOptions<'a> {
    pub scenes: SceneRange,
    pub limits: Option<&'a Limits>,
    pub parallel: bool,
}

/// Decode every frame in `options.scenes`.
pub(crate) fn read_frames(
    data: &[u8],
    options: &SequenceOptions<'_>,
    monitor: &RowMonitor<'_>,
    sink: &mut dyn WarningSink,
) -> Result<Vec<Image>, RasterError> {
    match Codec::detect(data).ok_or(RasterError::UnrecognizedFormat)? {
        Codec::Pnm(_) => drive(&mut PnmFrames::new(data), options, monitor, sink),
        Codec::Tiff => drive(&mut TiffFrames::new(data)?.with_limits(options.limits), options, monitor, sink),
    }
}

/// Headers of every frame in `scenes`, without touching pixel data.
pub(crate) fn read_headers(
    data: &[u8],
    scenes: SceneRange,
    sink: &mut dyn WarningSink,
) -> Result<Vec<FormatHeader>, RasterError> {
    match Codec::detect(data).ok_or(RasterError::UnrecognizedFormat)? {
        Codec::Pnm(_) => ping(&mut PnmFrames::new(data), scenes, sink),
        Codec::Tiff => ping(&mut TiffFrames::new(data)?, scenes, sink),
    }
}

/// Decode frame `scene` into a caller-owned store.
///
/// Rows committed before a failure stay in the store.
pub(crate) fn read_into(
    data: &[u8],
    scene: u32,
    store: &mut dyn PixelStore,
    limits: Option<&Limits>,
    monitor: &RowMonitor<'_>,
    sink: &mut dyn WarningSink,
) -> Result<FormatHeader, RasterError> {
    match Codec::detect(data).ok_or(RasterError::UnrecognizedFormat)? {
        Codec::Pnm(_) => decode_one(&mut PnmFrames::new(data), scene, store, monitor, sink),
        Codec::Tiff => decode_one(&mut TiffFrames::new(data)?.with_limits(limits), scene, store, monitor, sink),
    }
}

fn drive<C: FrameCodec>(
    codec: &mut C,
    options: &SequenceOptions<'_>,
    monitor: &RowMonitor<'_>,
    sink: &mut dyn WarningSink,
) -> Result<Vec<Image>, RasterError> {
    let mut images: Vec<Image> = Vec::new();
    let mut index = 0u32;
    while !options.scenes.is_past(index) {
        let Some(frame) = codec.next_frame(index, sink)? else {
            break;
        };
        if !options.scenes.contains(index) {
            codec.skip(&frame)?;
            index += 1;
            continue;
        }
        monitor.check()?;
        let mut image = Image::from_header(codec.header(&frame), options.limits)?;
        image.scene = index;
        codec.annotate(&frame, &mut image);
        if let Some(previous) = images.last() {
            image.properties.inherit(&previous.properties);
        }
        codec.decode(&frame, &mut image, monitor, options.parallel)?;
        images.push(image);
        index += 1;
    }
    if images.is_empty() {
        return Err(scene_missing(options.scenes.first));
    }
    Ok(images)
}

fn ping<C: FrameCodec>(
    codec: &mut C,
    scenes: SceneRange,
    sink: &mut dyn WarningSink,
) -> Result<Vec<FormatHeader>, RasterError> {
    let mut headers = Vec::new();
    let mut index = 0u32;
    while !scenes.is_past(index) {
        let Some(frame) = codec.next_frame(index, sink)? else {
            break;
        };
        if scenes.contains(index) {
            headers.push(codec.header(&frame).clone());
        }
        index += 1;
        if scenes.is_past(index) {
            break;
        }
        codec.skip(&frame)?;
    }
    if headers.is_empty() {
        return Err(scene_missing(scenes.first));
    }
    Ok(headers)
}

fn decode_one<C: FrameCodec>(
    codec: &mut C,
    scene: u32,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
    sink: &mut dyn WarningSink,
) -> Result<FormatHeader, RasterError> {
    for index in 0..=scene {
        let frame = codec.next_frame(index, sink)?.ok_or_else(|| scene_missing(scene))?;
        if index < scene {
            codec.skip(&frame)?;
            continue;
        }
        let header = codec.header(&frame).clone();
        codec.decode(&frame, store, monitor, false)?;
        return Ok(header);
    }
    Err(scene_missing(scene))
}

fn scene_missing(scene: u32) -> RasterError {
    RasterError::UnsupportedVariant(format!("scene {scene} not present in stream"))
}

/// Reject a store whose geometry differs from the frame.
pub(crate) fn check_store(header: &FormatHeader, store: &dyn PixelStore) -> Result<(), RasterError> {
    if store.width() != header.width || store.height() != header.height || store.tuple_type() != header.tuple {
        return Err(RasterError::UnsupportedVariant(format!(
            "pixel store is {}x{} {:?}, frame is {}x{} {:?}",
            store.width(),
            store.height(),
            store.tuple_type(),
            header.width,
            header.height,
            header.tuple
        )));
    }
    Ok(())
}

/// Publish row `y` and poll the monitor.
pub(crate) fn commit(
    store: &mut dyn PixelStore,
    y: u32,
    done: u32,
    rows: u32,
    monitor: &RowMonitor<'_>,
) -> Result<(), RasterError> {
    if !store.commit_row(y) {
        return Err(RasterError::ResourceExhausted(format!("pixel store rejected row {y}")));
    }
    monitor.row_done(done, rows)
}
