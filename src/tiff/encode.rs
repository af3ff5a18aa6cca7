//! TIFF writer. Each frame's chunk data is written before its directory;
//! the previous directory's next pointer is patched once the new one lands.

use std::io::SeekFrom;

use super::compress::{can_compress, compress, predictor_encode, predictor_supported};
use super::ifd::{DirectoryBuilder, TiffHeader, patch_pointer};
use super::tags::{
    EXTRA_ASSOCIATED, EXTRA_UNASSOCIATED, PLANAR_CONTIG, PLANAR_SEPARATE, PREDICTOR_HORIZONTAL,
    Photometric, RESUNIT_CENTIMETER, RESUNIT_INCH, RESUNIT_NONE, SAMPLE_FLOAT, SAMPLE_SIGNED,
    TEXT_TAGS, TiffTag, compression_code,
};
use super::{Blocks, TiffOptions};
use crate::error::RasterError;
use crate::header::ResolutionUnit;
use crate::interleave::{Interleaver, SampleSpec};
use crate::pixel::{AlphaMode, TupleType};
use crate::quantum::{Quantum, SampleFormat, from_quantum};
use crate::sequence::RowMonitor;
use crate::store::Image;
use crate::stream::ByteWriter;

/// Target bytes of packed samples per strip when rows per strip is unset.
const STRIP_BYTES: usize = 8192;

/// Encode `images` as one TIFF file, one directory per image.
pub(crate) fn write_frames(
    images: &[Image],
    opts: &TiffOptions,
    monitor: &RowMonitor<'_>,
) -> Result<Vec<u8>, RasterError> {
    if images.is_empty() {
        return Err(RasterError::UnsupportedVariant("no frames to write".into()));
    }
    if !can_compress(opts.compression) {
        return Err(RasterError::UnsupportedCompression(format!(
            "TIFF writer does not produce {:?}",
            opts.compression
        )));
    }
    let mut w = ByteWriter::new();
    let mut pointer = TiffHeader::write(opts.endian, opts.big_tiff, &mut w)?;
    let total = images.len();
    for (scene, image) in images.iter().enumerate() {
        monitor.check()?;
        let layout = Layout::new(image, opts)?;
        let (offsets, counts) = write_chunks(image, &layout, opts, monitor, &mut w)?;
        let dir = directory(image, &layout, opts, &offsets, &counts, (scene, total))?;
        let (ifd, next) = dir.write(&mut w)?;
        patch_pointer(&mut w, pointer, ifd, opts.endian, opts.big_tiff)?;
        pointer = next;
        log::debug!(
            "TIFF frame {scene}: {}x{} {:?} {}-bit {:?} at IFD {ifd}",
            image.width(),
            image.height(),
            layout.photometric,
            layout.bits,
            opts.compression
        );
    }
    Ok(w.into_inner())
}

/// How one image maps onto TIFF samples.
struct Layout {
    photometric: Photometric,
    bits: u8,
    format: SampleFormat,
    interleaver: Interleaver,
    blocks: Blocks,
    row_bytes: usize,
    predictor: bool,
}

impl Layout {
    fn new(image: &Image, opts: &TiffOptions) -> Result<Self, RasterError> {
        let tuple = image.tuple_type();
        let format = image.sample_format;
        let photometric = match tuple {
            TupleType::Gray if image.depth == 1 && image.is_bilevel() => Photometric::MinIsWhite,
            TupleType::Gray | TupleType::GrayAlpha => Photometric::MinIsBlack,
            TupleType::Rgb | TupleType::Rgba => Photometric::Rgb,
            TupleType::Cmyk | TupleType::Cmyka => Photometric::Separated,
            TupleType::Indexed | TupleType::IndexedAlpha => {
                if image.colormap.is_empty() {
                    return Err(RasterError::UnsupportedVariant("indexed frame without a colormap".into()));
                }
                Photometric::Palette
            }
        };
        let bits = match (photometric, format) {
            (Photometric::MinIsWhite, _) => 1,
            (Photometric::Palette, _) => index_bits(image.colormap.len()),
            (_, SampleFormat::Float) if image.depth == 16 => 16,
            (_, SampleFormat::Float) => 32,
            _ => image.depth.clamp(1, 32),
        };
        let spec = SampleSpec::unsigned(bits, opts.endian)
            .with_format(format)
            .with_min_is_white(photometric == Photometric::MinIsWhite);
        let interleaver = Interleaver::new(tuple, spec)?.with_alpha_mode(image.alpha_mode);

        let channels = tuple.channels();
        let planes = if opts.planar && channels > 1 { channels } else { 1 };
        let (width, height) = (image.width(), image.height());
        let blocks = match opts.tile {
            Some((tw, th)) => {
                if tw == 0 || th == 0 || tw % 16 != 0 || th % 16 != 0 {
                    return Err(RasterError::DimensionInvalid {
                        width: u64::from(tw),
                        height: u64::from(th),
                    });
                }
                Blocks::tiles(width, height, tw, th, planes)
            }
            None => {
                let rows = opts.rows_per_strip.unwrap_or_else(|| {
                    let row = interleaver.row_bytes(width as usize).max(1);
                    (STRIP_BYTES / row).clamp(1, u32::MAX as usize) as u32
                });
                Blocks::strips(width, height, rows, planes)
            }
        };
        let bw = blocks.width as usize;
        let row_bytes = if planes > 1 {
            interleaver.plane_row_bytes(bw)
        } else {
            interleaver.row_bytes(bw)
        };
        let predictor = opts.predictor && predictor_supported(bits);
        if opts.predictor && !predictor {
            log::debug!("predictor skipped for {bits}-bit samples");
        }
        Ok(Self {
            photometric,
            bits,
            format,
            interleaver,
            blocks,
            row_bytes,
            predictor,
        })
    }
}

/// Smallest of 1, 2, 4, 8 or 16 bits that addresses `entries` colors.
fn index_bits(entries: usize) -> u8 {
    let mut bits = 1u8;
    while bits < 16 && (1usize << bits) < entries {
        bits *= 2;
    }
    bits
}

/// Write every chunk of `image`, returning offsets and byte counts in
/// chunk order.
fn write_chunks(
    image: &Image,
    layout: &Layout,
    opts: &TiffOptions,
    monitor: &RowMonitor<'_>,
    w: &mut ByteWriter,
) -> Result<(Vec<u64>, Vec<u64>), RasterError> {
    let blocks = layout.blocks;
    let il = &layout.interleaver;
    let channels = image.tuple_type().channels();
    let (width, height) = (image.width(), image.height());
    let bw = blocks.width as usize;
    let mut offsets = vec![0u64; blocks.count()];
    let mut counts = vec![0u64; blocks.count()];
    let stride = if blocks.planes > 1 { 1 } else { channels };
    let mut padded: Vec<Quantum> = vec![0; bw * channels];

    for band in 0..blocks.down {
        let stored = blocks.stored_rows(band, height) as usize;
        let visible = blocks.visible_rows(band, height);
        let y0 = band * blocks.height;
        let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(blocks.across as usize * blocks.planes);
        for _ in 0..blocks.across as usize * blocks.planes {
            let mut buf = Vec::new();
            buf.try_reserve_exact(stored * layout.row_bytes)?;
            chunks.push(buf);
        }
        for y in y0..y0 + visible {
            let row = image.row(y).ok_or(RasterError::DimensionInvalid {
                width: u64::from(width),
                height: u64::from(y) + 1,
            })?;
            for col in 0..blocks.across {
                let x0 = col as usize * bw * channels;
                let cw = blocks.visible_width(col, width) as usize * channels;
                let src = if cw == bw * channels {
                    &row[x0..x0 + cw]
                } else {
                    padded.fill(0);
                    padded[..cw].copy_from_slice(&row[x0..x0 + cw]);
                    &padded[..]
                };
                for plane in 0..blocks.planes {
                    let buf = &mut chunks[plane * blocks.across as usize + col as usize];
                    if blocks.planes > 1 {
                        il.interleave_plane(src, plane, buf)?;
                    } else {
                        il.interleave(src, buf)?;
                    }
                }
            }
            monitor.row_done(y, height)?;
        }
        for (i, mut buf) in chunks.into_iter().enumerate() {
            buf.resize(stored * layout.row_bytes, 0);
            if layout.predictor {
                predictor_encode(&mut buf, layout.row_bytes, stride, layout.bits, opts.endian)?;
            }
            let packed = compress(opts.compression, &buf)?;
            let (plane, col) = (i / blocks.across as usize, i as u32 % blocks.across);
            let index = blocks.index(plane, band, col);
            w.seek(SeekFrom::End(0))?;
            w.align_word()?;
            offsets[index] = w.tell();
            counts[index] = packed.len() as u64;
            w.write_bytes(&packed)?;
        }
    }
    Ok((offsets, counts))
}

fn directory(
    image: &Image,
    layout: &Layout,
    opts: &TiffOptions,
    offsets: &[u64],
    counts: &[u64],
    (scene, total): (usize, usize),
) -> Result<DirectoryBuilder, RasterError> {
    let tuple = image.tuple_type();
    let spp = tuple.channels();
    let blocks = layout.blocks;
    let mut dir = DirectoryBuilder::new(opts.endian, opts.big_tiff);

    dir.long(TiffTag::NewSubfileType, if total > 1 { 2 } else { 0 });
    dir.long(TiffTag::ImageWidth, image.width());
    dir.long(TiffTag::ImageLength, image.height());
    dir.shorts(TiffTag::BitsPerSample, &vec![u16::from(layout.bits); spp]);
    dir.short(TiffTag::Compression, compression_code(opts.compression));
    dir.short(TiffTag::Photometric, layout.photometric as u16);
    dir.short(TiffTag::Orientation, 1);
    dir.short(TiffTag::SamplesPerPixel, spp as u16);
    dir.short(
        TiffTag::PlanarConfig,
        if blocks.planes > 1 { PLANAR_SEPARATE } else { PLANAR_CONTIG },
    );
    if blocks.tiled {
        dir.long(TiffTag::TileWidth, blocks.width);
        dir.long(TiffTag::TileLength, blocks.height);
        dir.offsets(TiffTag::TileOffsets, offsets)?;
        dir.offsets(TiffTag::TileByteCounts, counts)?;
    } else {
        dir.long(TiffTag::RowsPerStrip, blocks.height);
        dir.offsets(TiffTag::StripOffsets, offsets)?;
        dir.offsets(TiffTag::StripByteCounts, counts)?;
    }
    if layout.predictor {
        dir.short(TiffTag::Predictor, PREDICTOR_HORIZONTAL);
    }
    if tuple.has_alpha() {
        let extra = match image.alpha_mode {
            AlphaMode::Associated => EXTRA_ASSOCIATED,
            AlphaMode::Unassociated => EXTRA_UNASSOCIATED,
        };
        dir.short(TiffTag::ExtraSamples, extra);
    }
    match layout.format {
        SampleFormat::Unsigned => {}
        SampleFormat::Signed => dir.shorts(TiffTag::SampleFormat, &vec![SAMPLE_SIGNED; spp]),
        SampleFormat::Float => dir.shorts(TiffTag::SampleFormat, &vec![SAMPLE_FLOAT; spp]),
    }
    if layout.photometric == Photometric::Palette {
        dir.shorts(TiffTag::ColorMap, &colormap(&image.colormap, layout.bits));
    }
    if let Some(res) = image.resolution {
        dir.rational(TiffTag::XResolution, res.x);
        dir.rational(TiffTag::YResolution, res.y);
        let unit = match res.unit {
            ResolutionUnit::PixelsPerInch => RESUNIT_INCH,
            ResolutionUnit::PixelsPerCentimeter => RESUNIT_CENTIMETER,
            ResolutionUnit::Undefined => RESUNIT_NONE,
        };
        dir.short(TiffTag::ResolutionUnit, unit);
    }
    if total > 1 {
        let page = |v: usize| u16::try_from(v).unwrap_or(u16::MAX);
        dir.shorts(TiffTag::PageNumber, &[page(scene), page(total)]);
    }
    for (tag, key) in TEXT_TAGS {
        if let Some(text) = image.property(key) {
            dir.ascii(tag, text);
        }
    }
    if !dir.contains(TiffTag::Software) {
        dir.ascii(TiffTag::Software, "zenraster");
    }
    Ok(dir)
}

/// ColorMap values: all reds, then greens, then blues, `2^bits` each.
fn colormap(map: &[[Quantum; 3]], bits: u8) -> Vec<u16> {
    let entries = 1usize << bits;
    let mut out = vec![0u16; 3 * entries];
    for (i, rgb) in map.iter().take(entries).enumerate() {
        for (c, &q) in rgb.iter().enumerate() {
            out[c * entries + i] = from_quantum(q, 65535) as u16;
        }
    }
    out
}
