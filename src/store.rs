//! Pixel store and metadata collaborators.
//!
//! Codecs only touch pixels through [`PixelStore`] row calls. [`Image`] is
//! the in-memory store returned by [`crate::DecodeRequest`].

use std::collections::BTreeMap;

#[cfg(feature = "rgb")]
use rgb::FromSlice as _;

use crate::error::RasterError;
use crate::header::{Compression, FormatHeader, Resolution};
use crate::limits::Limits;
use crate::pack::Endian;
use crate::pixel::{AlphaMode, TupleType};
use crate::quantum::{QUANTUM_RANGE, Quantum, SampleFormat};

/// Row-level access to the authoritative pixel storage of one frame.
///
/// Rows are `width * tuple_type().channels()` quantum values, interleaved
/// in the tuple's channel order.
pub trait PixelStore {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn tuple_type(&self) -> TupleType;

    /// Mutable access to row `y` for writing.
    fn queue_row(&mut self, y: u32) -> Result<&mut [Quantum], RasterError>;

    /// Mutable access to `count` consecutive rows starting at `y`, as one
    /// contiguous slice. Used to hand independent rows to parallel workers.
    fn queue_rows(&mut self, y: u32, count: u32) -> Result<&mut [Quantum], RasterError>;

    /// Read access to row `y`.
    fn get_row(&self, y: u32) -> Result<&[Quantum], RasterError>;

    /// Publish a queued row. Returns false if the store refuses it.
    fn commit_row(&mut self, y: u32) -> bool;
}

// ── Properties ──────────────────────────────────────────────────────

/// String key/value metadata attached to a frame (comments, labels, TIFF text tags).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Append to an existing value, separated by a newline.
    pub fn append(&mut self, key: &str, value: &str) {
        match self.0.get_mut(key) {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => self.set(key, value),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy entries from `other` that are not already set.
    pub fn inherit(&mut self, other: &Properties) {
        for (k, v) in other.iter() {
            self.0.entry(k.to_owned()).or_insert_with(|| v.to_owned());
        }
    }
}

// ── Image ───────────────────────────────────────────────────────────

/// One decoded frame held in memory.
///
/// `depth`, `sample_format`, `endian` and `compression` describe how the
/// frame was stored and are the defaults used when writing it back.
#[derive(Clone, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    tuple: TupleType,
    pixels: Vec<Quantum>,
    committed: u32,
    pub depth: u8,
    pub sample_format: SampleFormat,
    pub alpha_mode: AlphaMode,
    pub endian: Endian,
    pub compression: Compression,
    pub resolution: Option<Resolution>,
    /// RGB entries for indexed frames.
    pub colormap: Vec<[Quantum; 3]>,
    pub properties: Properties,
    /// Zero-based position within its sequence.
    pub scene: u32,
}

impl Image {
    /// A black, fully transparent (if alpha) frame.
    pub fn new(width: u32, height: u32, tuple: TupleType) -> Result<Self, RasterError> {
        Self::with_limits(width, height, tuple, None)
    }

    pub(crate) fn with_limits(
        width: u32,
        height: u32,
        tuple: TupleType,
        limits: Option<&Limits>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::DimensionInvalid {
                width: u64::from(width),
                height: u64::from(height),
            });
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(tuple.channels()))
            .ok_or_else(|| {
                RasterError::ResourceExhausted(format!("{width}x{height} pixel store"))
            })?;
        if let Some(limits) = limits {
            limits.check(width, height)?;
            limits.check_memory(len.saturating_mul(size_of::<Quantum>()))?;
        }
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, 0);
        Ok(Self {
            width,
            height,
            tuple,
            pixels,
            committed: 0,
            depth: crate::quantum::QUANTUM_DEPTH as u8,
            sample_format: SampleFormat::Unsigned,
            alpha_mode: AlphaMode::Unassociated,
            endian: Endian::Big,
            compression: Compression::None,
            resolution: None,
            colormap: Vec::new(),
            properties: Properties::new(),
            scene: 0,
        })
    }

    /// Build from interleaved quantum samples.
    pub fn from_samples(
        width: u32,
        height: u32,
        tuple: TupleType,
        samples: Vec<Quantum>,
    ) -> Result<Self, RasterError> {
        let mut image = Self::new(width, height, tuple)?;
        if samples.len() != image.pixels.len() {
            return Err(RasterError::BufferTooSmall {
                needed: image.pixels.len(),
                actual: samples.len(),
            });
        }
        image.pixels = samples;
        image.committed = height;
        Ok(image)
    }

    /// Empty frame shaped by a parsed header.
    pub(crate) fn from_header(header: &FormatHeader, limits: Option<&Limits>) -> Result<Self, RasterError> {
        let mut image = Self::with_limits(header.width, header.height, header.tuple, limits)?;
        image.depth = header.depth;
        image.sample_format = header.sample_format;
        image.alpha_mode = header.alpha_mode;
        image.endian = header.endian;
        image.compression = header.compression;
        image.resolution = header.resolution;
        Ok(image)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tuple_type(&self) -> TupleType {
        self.tuple
    }

    /// All samples, row-major, interleaved.
    pub fn samples(&self) -> &[Quantum] {
        &self.pixels
    }

    pub fn samples_mut(&mut self) -> &mut [Quantum] {
        &mut self.pixels
    }

    /// Rows committed so far by the last decode.
    pub fn committed_rows(&self) -> u32 {
        self.committed
    }

    pub fn row(&self, y: u32) -> Option<&[Quantum]> {
        let stride = self.stride();
        let start = (y as usize).checked_mul(stride)?;
        self.pixels.get(start..start + stride)
    }

    /// Channels of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[Quantum]> {
        let ch = self.tuple.channels();
        let row = self.row(y)?;
        row.get(x as usize * ch..(x as usize + 1) * ch)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.set(key, value);
    }

    /// Color of a pixel as RGB, resolving indexes and CMYK.
    pub fn rgb(&self, px: &[Quantum]) -> [Quantum; 3] {
        let qr = QUANTUM_RANGE as u64;
        match self.tuple {
            TupleType::Gray | TupleType::GrayAlpha => [px[0]; 3],
            TupleType::Rgb | TupleType::Rgba => [px[0], px[1], px[2]],
            TupleType::Cmyk | TupleType::Cmyka => {
                let k = px[3] as u64;
                let inv = |c: Quantum| ((qr - c as u64) * (qr - k) / qr) as Quantum;
                [inv(px[0]), inv(px[1]), inv(px[2])]
            }
            TupleType::Indexed | TupleType::IndexedAlpha => self
                .colormap
                .get(px[0] as usize)
                .copied()
                .unwrap_or([0; 3]),
        }
    }

    /// Alpha of a pixel, `QUANTUM_RANGE` when the frame is opaque.
    pub fn alpha(&self, px: &[Quantum]) -> Quantum {
        match self.tuple.alpha_index() {
            Some(a) => px[a],
            None => QUANTUM_RANGE,
        }
    }

    /// Rec. 601 luma of a pixel.
    pub fn intensity(&self, px: &[Quantum]) -> Quantum {
        if self.tuple.is_gray() {
            return px[0];
        }
        let [r, g, b] = self.rgb(px);
        ((r as u64 * 299 + g as u64 * 587 + b as u64 * 114 + 500) / 1000) as Quantum
    }

    /// Whether every pixel has equal red, green and blue.
    pub fn is_gray(&self) -> bool {
        self.tuple.is_gray()
            || self.pixels.chunks_exact(self.tuple.channels()).all(|px| {
                let [r, g, b] = self.rgb(px);
                r == g && g == b
            })
    }

    /// Whether the frame is gray and every intensity is 0 or `QUANTUM_RANGE`.
    pub fn is_bilevel(&self) -> bool {
        self.is_gray()
            && self.pixels.chunks_exact(self.tuple.channels()).all(|px| {
                let y = self.intensity(px);
                y == 0 || y == QUANTUM_RANGE
            })
    }

    /// Typed view of an RGB frame.
    #[cfg(feature = "rgb")]
    pub fn as_rgb(&self) -> Option<&[rgb::RGB<Quantum>]> {
        (self.tuple == TupleType::Rgb).then(|| self.pixels.as_rgb())
    }

    /// Typed view of an RGBA frame.
    #[cfg(feature = "rgb")]
    pub fn as_rgba(&self) -> Option<&[rgb::RGBA<Quantum>]> {
        (self.tuple == TupleType::Rgba).then(|| self.pixels.as_rgba())
    }

    /// Zero-copy 2D view of an RGB frame.
    #[cfg(feature = "imgref")]
    pub fn as_imgref_rgb(&self) -> Option<imgref::ImgRef<'_, rgb::RGB<Quantum>>> {
        self.as_rgb()
            .map(|px| imgref::ImgRef::new(px, self.width as usize, self.height as usize))
    }

    /// Zero-copy 2D view of an RGBA frame.
    #[cfg(feature = "imgref")]
    pub fn as_imgref_rgba(&self) -> Option<imgref::ImgRef<'_, rgb::RGBA<Quantum>>> {
        self.as_rgba()
            .map(|px| imgref::ImgRef::new(px, self.width as usize, self.height as usize))
    }

    fn stride(&self) -> usize {
        self.width as usize * self.tuple.channels()
    }

    fn out_of_bounds(&self, y: u32) -> RasterError {
        RasterError::DimensionInvalid {
            width: u64::from(self.width),
            height: u64::from(y) + 1,
        }
    }
}

impl PixelStore for Image {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn tuple_type(&self) -> TupleType {
        self.tuple
    }

    fn queue_row(&mut self, y: u32) -> Result<&mut [Quantum], RasterError> {
        self.queue_rows(y, 1)
    }

    fn queue_rows(&mut self, y: u32, count: u32) -> Result<&mut [Quantum], RasterError> {
        if u64::from(y) + u64::from(count) > u64::from(self.height) {
            return Err(self.out_of_bounds(y + count.saturating_sub(1)));
        }
        let stride = self.stride();
        let start = y as usize * stride;
        Ok(&mut self.pixels[start..start + count as usize * stride])
    }

    fn get_row(&self, y: u32) -> Result<&[Quantum], RasterError> {
        self.row(y).ok_or_else(|| self.out_of_bounds(y))
    }

    fn commit_row(&mut self, y: u32) -> bool {
        if y >= self.height {
            return false;
        }
        self.committed = (self.committed + 1).min(self.height);
        true
    }
}
