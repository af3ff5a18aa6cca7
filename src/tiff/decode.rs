//! TIFF directory interpretation and the strip/tile row reader.

use std::borrow::Cow;

use super::Blocks;
use super::compress::{decompress, predictor_decode, predictor_supported};
use super::ifd::Directory;
use super::tags::{
    EXTRA_ASSOCIATED, EXTRA_UNASSOCIATED, PLANAR_SEPARATE, PREDICTOR_HORIZONTAL, PREDICTOR_NONE,
    Photometric, RESUNIT_CENTIMETER, RESUNIT_INCH, SAMPLE_FLOAT, SAMPLE_SIGNED, SAMPLE_UNSIGNED,
    TEXT_TAGS, TiffTag, compression_from_code,
};
use crate::error::{RasterError, Warning, WarningSink};
use crate::header::{Compression, FormatHeader, Resolution, ResolutionUnit};
use crate::interleave::{Interleaver, SampleSpec};
use crate::limits::Limits;
use crate::pack::{Endian, reverse_bits};
use crate::pixel::{AlphaMode, TupleType};
use crate::quantum::{Quantum, SampleFormat, max_for_bits, to_quantum};
use crate::sequence::{RowMonitor, check_store, commit};
use crate::store::PixelStore;
use crate::stream::ByteReader;

/// One directory, resolved to everything the row reader needs.
#[derive(Clone, Debug)]
pub(crate) struct TiffFrame {
    pub header: FormatHeader,
    pub photometric: Photometric,
    pub blocks: Blocks,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    predictor: bool,
    reverse_fill: bool,
    float_scale: f64,
    pub colormap: Vec<[Quantum; 3]>,
    pub properties: Vec<(String, String)>,
}

impl TiffFrame {
    fn interleaver(&self) -> Result<Interleaver, RasterError> {
        let h = &self.header;
        let spec = SampleSpec::unsigned(h.depth, h.endian)
            .with_format(h.sample_format)
            .with_min_is_white(self.photometric == Photometric::MinIsWhite)
            .with_float_scale(self.float_scale);
        Ok(Interleaver::new(h.tuple, spec)?
            .with_pad(h.extra_samples)
            .with_alpha_mode(h.alpha_mode))
    }

    fn planar(&self) -> bool {
        self.blocks.planes > 1
    }

    /// Decoded bytes of chunk `index`, `expected` long.
    fn chunk(
        &self,
        data: &[u8],
        index: usize,
        expected: usize,
        row_bytes: usize,
    ) -> Result<Vec<u8>, RasterError> {
        let offset = self.offsets[index];
        let count = self.byte_counts[index];
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let raw = ByteReader::new(data).slice_at(offset, count).or_else(|e| {
            // Keep what exists of a chunk cut short by the end of the file.
            data.get(start..).ok_or(e)
        })?;
        let stored = raw.len() as u64;
        let raw = if self.reverse_fill {
            let mut owned = raw.to_vec();
            reverse_bits(&mut owned);
            Cow::Owned(owned)
        } else {
            Cow::Borrowed(raw)
        };
        let mut out = decompress(self.header.compression, &raw, expected, offset)?;
        if out.len() < expected {
            return Err(RasterError::UnexpectedEndOfStream { offset: offset + stored });
        }
        if self.predictor {
            let stride = if self.planar() { 1 } else { self.header.samples_per_pixel() };
            predictor_decode(&mut out, row_bytes, stride, self.header.depth, self.header.endian)?;
        }
        Ok(out)
    }
}

/// Interpret a directory as a frame.
pub(crate) fn parse_frame(
    dir: &Directory<'_>,
    endian: Endian,
    sink: &mut dyn WarningSink,
) -> Result<TiffFrame, RasterError> {
    let at = dir.offset;
    let required = |tag: TiffTag| -> Result<u64, RasterError> {
        dir.uint(tag)?
            .ok_or_else(|| RasterError::header(at, format!("missing {tag:?}")))
    };
    let (width, height) = geometry(required(TiffTag::ImageWidth)?, required(TiffTag::ImageLength)?)?;
    let samples = dir.uint(TiffTag::SamplesPerPixel)?.unwrap_or(1) as usize;
    if samples == 0 || samples > 64 {
        return Err(RasterError::header(at, format!("{samples} samples per pixel")));
    }

    let bits = dir.uints(TiffTag::BitsPerSample)?.unwrap_or_else(|| vec![1]);
    let depth = bits.first().copied().unwrap_or(1);
    if bits.iter().any(|&b| b != depth) {
        return Err(RasterError::UnsupportedVariant(format!("mixed BitsPerSample {bits:?}")));
    }
    if !(1..=32).contains(&depth) {
        return Err(RasterError::SampleRangeInvalid(format!("{depth} bits per sample")));
    }
    let depth = depth as u8;

    let sample_format = match dir.uints(TiffTag::SampleFormat)?.and_then(|v| v.first().copied()) {
        None => SampleFormat::Unsigned,
        Some(v) if v == u64::from(SAMPLE_UNSIGNED) => SampleFormat::Unsigned,
        Some(v) if v == u64::from(SAMPLE_SIGNED) => SampleFormat::Signed,
        Some(v) if v == u64::from(SAMPLE_FLOAT) => {
            if depth != 16 && depth != 32 {
                return Err(RasterError::UnsupportedVariant(format!("{depth}-bit float samples")));
            }
            SampleFormat::Float
        }
        Some(v) => return Err(RasterError::UnsupportedVariant(format!("SampleFormat {v}"))),
    };

    let photometric = match dir.uint(TiffTag::Photometric)? {
        Some(v) => u16::try_from(v)
            .ok()
            .and_then(Photometric::from_u16)
            .ok_or_else(|| RasterError::UnsupportedVariant(format!("photometric interpretation {v}")))?,
        None if samples >= 3 => Photometric::Rgb,
        None => Photometric::MinIsBlack,
    };
    let base = match photometric {
        Photometric::MinIsWhite | Photometric::MinIsBlack => TupleType::Gray,
        Photometric::Rgb => TupleType::Rgb,
        Photometric::Palette => TupleType::Indexed,
        Photometric::Separated => TupleType::Cmyk,
    };

    let mut properties = vec![("tiff:photometric".to_owned(), photometric.name().to_owned())];
    let extra = dir.uints(TiffTag::ExtraSamples)?.unwrap_or_default();
    let (alpha, alpha_mode) = match extra.first() {
        Some(&v) if samples > base.channels() => {
            let (mode, name) = match u16::try_from(v) {
                Ok(EXTRA_ASSOCIATED) => (AlphaMode::Associated, "associated"),
                Ok(EXTRA_UNASSOCIATED) => (AlphaMode::Unassociated, "unassociated"),
                _ => (AlphaMode::Unassociated, "unspecified"),
            };
            properties.push(("tiff:alpha".to_owned(), name.to_owned()));
            (true, mode)
        }
        None if photometric == Photometric::Rgb && samples == 4 => {
            properties.push(("tiff:alpha".to_owned(), "unspecified".to_owned()));
            (true, AlphaMode::Unassociated)
        }
        _ => (false, AlphaMode::Unassociated),
    };
    let tuple = base.with_alpha(alpha);
    if samples < tuple.channels() {
        return Err(RasterError::header(
            at,
            format!("{samples} samples per pixel for {photometric:?}"),
        ));
    }
    if photometric == Photometric::MinIsWhite && alpha {
        return Err(RasterError::UnsupportedVariant("min-is-white with alpha".into()));
    }

    let compression_code = dir.uint(TiffTag::Compression)?.unwrap_or(1);
    let compression = compression_from_code(u16::try_from(compression_code).unwrap_or(0));
    if !matches!(
        compression,
        Compression::None | Compression::PackBits | Compression::Lzw | Compression::Deflate
    ) {
        return Err(RasterError::UnsupportedCompression(format!(
            "TIFF compression {compression_code} ({compression:?})"
        )));
    }

    let predictor = match dir.uint(TiffTag::Predictor)? {
        None => false,
        Some(v) if v == u64::from(PREDICTOR_NONE) => false,
        Some(v) if v == u64::from(PREDICTOR_HORIZONTAL) && predictor_supported(depth) => true,
        Some(v) => {
            return Err(RasterError::UnsupportedVariant(format!(
                "predictor {v} with {depth}-bit samples"
            )));
        }
    };
    let reverse_fill = dir.uint(TiffTag::FillOrder)? == Some(2);
    let planes = if dir.uint(TiffTag::PlanarConfig)? == Some(u64::from(PLANAR_SEPARATE)) {
        samples
    } else {
        1
    };

    let mut header = FormatHeader::new(width, height, max_for_bits(depth), tuple);
    header.depth = depth;
    header.extra_samples = samples - tuple.channels();
    header.sample_format = sample_format;
    header.alpha_mode = alpha_mode;
    header.compression = compression;
    header.endian = endian;
    header.offset = at;
    header.resolution = resolution(dir)?;
    if let Some(page) = dir.uints(TiffTag::PageNumber)?
        && let Some(&total) = page.get(1)
        && total > 0
    {
        header.frames = u32::try_from(total).ok();
    }
    header.validate()?;

    let tile = (dir.uint(TiffTag::TileWidth)?, dir.uint(TiffTag::TileLength)?);
    let (blocks, offsets, byte_counts) = match tile {
        (Some(tw), Some(th)) => {
            let (tw, th) = geometry(tw, th)?;
            let blocks = Blocks::tiles(width, height, tw, th, planes);
            let offsets = dir
                .uints(TiffTag::TileOffsets)?
                .ok_or_else(|| RasterError::header(at, "missing TileOffsets"))?;
            let counts = dir
                .uints(TiffTag::TileByteCounts)?
                .ok_or_else(|| RasterError::header(at, "missing TileByteCounts"))?;
            (blocks, offsets, counts)
        }
        _ => {
            let rows = dir
                .uint(TiffTag::RowsPerStrip)?
                .map_or(height, |r| r.min(u64::from(height)) as u32);
            properties.push(("tiff:rows-per-strip".to_owned(), rows.to_string()));
            let blocks = Blocks::strips(width, height, rows, planes);
            let offsets = dir
                .uints(TiffTag::StripOffsets)?
                .ok_or_else(|| RasterError::header(at, "missing StripOffsets"))?;
            let counts = match dir.uints(TiffTag::StripByteCounts)? {
                Some(counts) => counts,
                None if compression == Compression::None => {
                    sink.warn(Warning::IgnoredField("StripByteCounts missing; derived".into()));
                    derived_counts(&header, &blocks)?
                }
                None => return Err(RasterError::header(at, "missing StripByteCounts")),
            };
            (blocks, offsets, counts)
        }
    };
    if offsets.len() < blocks.count() || byte_counts.len() < blocks.count() {
        return Err(RasterError::header(
            at,
            format!(
                "{} chunk offsets and {} byte counts for {} chunks",
                offsets.len(),
                byte_counts.len(),
                blocks.count()
            ),
        ));
    }

    let float_scale = match dir.float(TiffTag::SMaxSampleValue)? {
        Some(max) if sample_format == SampleFormat::Float && max > 0.0 => 1.0 / max,
        _ => 1.0,
    };
    let colormap = if photometric == Photometric::Palette {
        read_colormap(dir, depth)?
    } else {
        Vec::new()
    };

    for (tag, key) in TEXT_TAGS {
        if let Some(text) = dir.ascii(tag) {
            properties.push((key.to_owned(), text));
        }
    }
    if let Some(orientation) = dir.uint(TiffTag::Orientation)? {
        properties.push(("tiff:orientation".to_owned(), orientation.to_string()));
    }

    log::debug!(
        "TIFF IFD at {at}: {width}x{height} {tuple:?} {depth}-bit {compression:?}, {} {} chunks",
        blocks.count(),
        if blocks.tiled { "tile" } else { "strip" },
    );
    Ok(TiffFrame {
        header,
        photometric,
        blocks,
        offsets,
        byte_counts,
        predictor,
        reverse_fill,
        float_scale,
        colormap,
        properties,
    })
}

fn geometry(width: u64, height: u64) -> Result<(u32, u32), RasterError> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(RasterError::DimensionInvalid { width, height }),
    }
}

fn resolution(dir: &Directory<'_>) -> Result<Option<Resolution>, RasterError> {
    let (Some(x), Some(y)) = (dir.float(TiffTag::XResolution)?, dir.float(TiffTag::YResolution)?) else {
        return Ok(None);
    };
    let unit = match dir.uint(TiffTag::ResolutionUnit)?.unwrap_or(u64::from(RESUNIT_INCH)) {
        u if u == u64::from(RESUNIT_INCH) => ResolutionUnit::PixelsPerInch,
        u if u == u64::from(RESUNIT_CENTIMETER) => ResolutionUnit::PixelsPerCentimeter,
        _ => ResolutionUnit::Undefined,
    };
    Ok(Some(Resolution { x, y, unit }))
}

/// Colormap of `3 * 2^bits` 16-bit entries. Maps whose entries all fit in
/// 8 bits are scaled as 8-bit.
fn read_colormap(dir: &Directory<'_>, bits: u8) -> Result<Vec<[Quantum; 3]>, RasterError> {
    let at = dir.offset;
    let values = dir
        .uints(TiffTag::ColorMap)?
        .ok_or_else(|| RasterError::header(at, "palette image without ColorMap"))?;
    let entries = values.len() / 3;
    if entries == 0 || (bits <= 16 && entries < 1usize << bits) {
        return Err(RasterError::header(
            at,
            format!("ColorMap of {} values for {bits}-bit indexes", values.len()),
        ));
    }
    let max = if values.iter().all(|&v| v < 256) { 255 } else { 65535 };
    let q = |v: u64| to_quantum(v.min(65535) as u32, max);
    Ok((0..entries)
        .map(|i| [q(values[i]), q(values[entries + i]), q(values[2 * entries + i])])
        .collect())
}

/// Byte counts for uncompressed strips when the tag is absent.
fn derived_counts(header: &FormatHeader, blocks: &Blocks) -> Result<Vec<u64>, RasterError> {
    let probe = Interleaver::new(
        header.tuple,
        SampleSpec::unsigned(header.depth, header.endian).with_format(header.sample_format),
    )?
    .with_pad(header.extra_samples);
    let row_bytes = if blocks.planes > 1 {
        probe.plane_row_bytes(header.width as usize)
    } else {
        probe.row_bytes(header.width as usize)
    } as u64;
    let mut counts = Vec::with_capacity(blocks.count());
    for _ in 0..blocks.planes {
        for band in 0..blocks.down {
            counts.push(row_bytes * u64::from(blocks.stored_rows(band, header.height)));
        }
    }
    Ok(counts)
}

/// Decode every chunk of `frame` into `store`, committing each band of
/// rows once all of its chunks are in.
pub(crate) fn read_pixels(
    data: &[u8],
    frame: &TiffFrame,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
    limits: Option<&Limits>,
) -> Result<(), RasterError> {
    let header = &frame.header;
    check_store(header, store)?;
    monitor.check()?;
    let il = frame.interleaver()?;
    let blocks = frame.blocks;
    let planar = frame.planar();
    let channels = header.tuple.channels();
    let bw = blocks.width as usize;
    let block_stride = bw * channels;
    let row_bytes = if planar { il.plane_row_bytes(bw) } else { il.row_bytes(bw) };

    let mut block: Vec<Quantum> = Vec::new();
    let block_len = block_stride
        .checked_mul(blocks.height as usize)
        .ok_or_else(|| RasterError::ResourceExhausted("tile buffer size overflows".into()))?;
    if let Some(limits) = limits {
        limits.check_memory(block_len.saturating_mul(size_of::<Quantum>()))?;
        limits.check_memory((blocks.height as usize).saturating_mul(row_bytes))?;
    }
    block.try_reserve_exact(block_len)?;
    block.resize(block_len, 0);
    let mut scratch = Vec::new();

    for band in 0..blocks.down {
        let stored = blocks.stored_rows(band, header.height) as usize;
        let visible = blocks.visible_rows(band, header.height) as usize;
        let y0 = band * blocks.height;
        for col in 0..blocks.across {
            for plane in 0..blocks.planes {
                let chunk = frame.chunk(data, blocks.index(plane, band, col), stored * row_bytes, row_bytes)?;
                for (src, dst) in chunk
                    .chunks_exact(row_bytes)
                    .zip(block.chunks_exact_mut(block_stride))
                    .take(visible)
                {
                    if planar {
                        il.deinterleave_plane(src, plane, dst)?;
                    } else {
                        il.deinterleave_with(src, dst, &mut scratch)?;
                    }
                }
            }
            let x0 = col as usize * block_stride;
            let cw = blocks.visible_width(col, header.width) as usize * channels;
            for (r, src) in block.chunks_exact(block_stride).take(visible).enumerate() {
                store.queue_row(y0 + r as u32)?[x0..x0 + cw].copy_from_slice(&src[..cw]);
            }
        }
        for r in 0..visible as u32 {
            commit(store, y0 + r, y0 + r, header.height, monitor)?;
        }
    }
    Ok(())
}
