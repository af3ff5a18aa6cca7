//! TIFF: classic and BigTIFF, strips or tiles, contiguous or planar
//! samples, uncompressed, PackBits, LZW or Deflate.
//!
//! Every directory in the IFD chain is one frame.

mod compress;
mod decode;
mod encode;
mod ifd;
mod tags;

pub(crate) use encode::write_frames;

pub use ifd::TiffHeader;
pub use tags::{FieldType, Photometric, TiffTag};

use crate::error::{LogSink, RasterError, Warning, WarningSink};
use crate::header::{Compression, FormatHeader};
use crate::limits::Limits;
use crate::pack::Endian;
use crate::sequence::{FrameCodec, RowMonitor};
use crate::store::{Image, PixelStore};
use decode::TiffFrame;
use ifd::Directory;

/// Writer settings.
#[derive(Clone, Debug, PartialEq)]
pub struct TiffOptions {
    /// `None`, `PackBits`, `Lzw` or `Deflate`.
    pub compression: Compression,
    /// Horizontal differencing; ignored for sample widths other than 8, 16 and 32.
    pub predictor: bool,
    /// Defaults to about 8 KiB of packed samples per strip.
    pub rows_per_strip: Option<u32>,
    /// Tile width and height, both multiples of 16. Overrides strips.
    pub tile: Option<(u32, u32)>,
    /// One plane per sample instead of interleaved pixels.
    pub planar: bool,
    pub big_tiff: bool,
    pub endian: Endian,
}

impl Default for TiffOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            predictor: false,
            rows_per_strip: None,
            tile: None,
            planar: false,
            big_tiff: false,
            endian: Endian::Little,
        }
    }
}

impl TiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_predictor(mut self, predictor: bool) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn with_tiles(mut self, width: u32, height: u32) -> Self {
        self.tile = Some((width, height));
        self
    }

    pub fn with_planar(mut self, planar: bool) -> Self {
        self.planar = planar;
        self
    }

    pub fn with_big_tiff(mut self, big_tiff: bool) -> Self {
        self.big_tiff = big_tiff;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }
}

/// Parse the first directory's header.
pub fn parse_header(data: &[u8]) -> Result<FormatHeader, RasterError> {
    let mut frames = TiffFrames::new(data)?;
    let frame = frames
        .next_frame(0, &mut LogSink)?
        .ok_or_else(|| RasterError::header(4, "no image directory"))?;
    Ok(frame.header)
}

// ── Block geometry ──────────────────────────────────────────────────

/// Chunk grid shared by strips and tiles. A strip is a tile as wide as
/// the image; only tiles store rows past the bottom edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Blocks {
    pub width: u32,
    pub height: u32,
    pub across: u32,
    pub down: u32,
    pub planes: usize,
    pub tiled: bool,
}

impl Blocks {
    pub fn strips(width: u32, height: u32, rows_per_strip: u32, planes: usize) -> Self {
        let rows = rows_per_strip.clamp(1, height);
        Self {
            width,
            height: rows,
            across: 1,
            down: height.div_ceil(rows),
            planes,
            tiled: false,
        }
    }

    pub fn tiles(width: u32, height: u32, tile_width: u32, tile_height: u32, planes: usize) -> Self {
        Self {
            width: tile_width,
            height: tile_height,
            across: width.div_ceil(tile_width),
            down: height.div_ceil(tile_height),
            planes,
            tiled: true,
        }
    }

    pub fn count(&self) -> usize {
        self.across as usize * self.down as usize * self.planes
    }

    /// Chunk index: planes outermost, then bands, then columns.
    pub fn index(&self, plane: usize, band: u32, col: u32) -> usize {
        (plane * self.down as usize + band as usize) * self.across as usize + col as usize
    }

    /// Rows inside the image for `band`.
    pub fn visible_rows(&self, band: u32, image_height: u32) -> u32 {
        self.height.min(image_height - band * self.height)
    }

    /// Rows stored in a chunk of `band`.
    pub fn stored_rows(&self, band: u32, image_height: u32) -> u32 {
        if self.tiled {
            self.height
        } else {
            self.visible_rows(band, image_height)
        }
    }

    /// Pixels inside the image for `col`.
    pub fn visible_width(&self, col: u32, image_width: u32) -> u32 {
        self.width.min(image_width - col * self.width)
    }
}

// ── Sequence support ────────────────────────────────────────────────

/// Directories of one TIFF file, in chain order.
pub(crate) struct TiffFrames<'a> {
    data: &'a [u8],
    header: TiffHeader,
    next: u64,
    seen: Vec<u64>,
    limits: Option<&'a Limits>,
}

impl<'a> TiffFrames<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Result<Self, RasterError> {
        let header = TiffHeader::parse(data)?;
        log::debug!(
            "TIFF {:?}{}, first IFD at {}",
            header.endian,
            if header.big_tiff { " BigTIFF" } else { "" },
            header.first_ifd
        );
        Ok(Self {
            data,
            header,
            next: header.first_ifd,
            seen: Vec::new(),
            limits: None,
        })
    }

    /// Bound the per-chunk buffers by `limits`.
    pub(crate) fn with_limits(mut self, limits: Option<&'a Limits>) -> Self {
        self.limits = limits;
        self
    }
}

impl FrameCodec for TiffFrames<'_> {
    type Frame = TiffFrame;

    fn next_frame(&mut self, index: u32, sink: &mut dyn WarningSink) -> Result<Option<TiffFrame>, RasterError> {
        if self.next == 0 {
            return Ok(None);
        }
        if self.seen.contains(&self.next) {
            sink.warn(Warning::IgnoredField(format!(
                "directory chain loops back to byte {}",
                self.next
            )));
            return Ok(None);
        }
        if index > 0 && self.next >= self.data.len() as u64 {
            sink.warn(Warning::UnexpectedEndOfFile { frame: index });
            return Ok(None);
        }
        self.seen.push(self.next);
        let dir = Directory::read(self.data, &self.header, self.next, sink)?;
        self.next = dir.next;
        decode::parse_frame(&dir, self.header.endian, sink).map(Some)
    }

    fn header<'f>(&self, frame: &'f TiffFrame) -> &'f FormatHeader {
        &frame.header
    }

    fn annotate(&self, frame: &TiffFrame, image: &mut Image) {
        image.colormap.clone_from(&frame.colormap);
        for (key, value) in &frame.properties {
            image.set_property(key.clone(), value.clone());
        }
    }

    fn decode(
        &mut self,
        frame: &TiffFrame,
        store: &mut dyn PixelStore,
        monitor: &RowMonitor<'_>,
        _parallel: bool,
    ) -> Result<(), RasterError> {
        decode::read_pixels(self.data, frame, store, monitor, self.limits)
    }

    fn skip(&mut self, _frame: &TiffFrame) -> Result<(), RasterError> {
        Ok(())
    }
}
