//! PNM writer: ASCII P1–P3, binary P4–P6, P7 (PAM) and PFM.

use super::header::{comment_lines, pam_tuple_name};
use super::{PnmEncoding, PnmFormat, PnmVariant};
use crate::error::RasterError;
use crate::interleave::{Interleaver, SampleSpec};
use crate::pack::Endian;
use crate::pixel::TupleType;
use crate::quantum::{QUANTUM_RANGE, Quantum, SampleFormat, from_quantum, max_for_bits};
use crate::sequence::RowMonitor;
use crate::store::Image;

/// ASCII output lines stay below this many columns.
const LINE_LIMIT: usize = 80;

/// Append one frame of `image` to `out`.
pub(crate) fn encode_frame(
    image: &Image,
    format: PnmFormat,
    encoding: PnmEncoding,
    monitor: &RowMonitor<'_>,
    out: &mut Vec<u8>,
) -> Result<(), RasterError> {
    monitor.check()?;
    let format = resolve_format(image, format);
    let encoding = match format {
        PnmFormat::Pam | PnmFormat::Pfm => PnmEncoding::Binary,
        _ => encoding,
    };
    let (target, mut depth) = target_layout(image, format)?;
    if encoding == PnmEncoding::Ascii && matches!(format, PnmFormat::Pgm | PnmFormat::Ppm) {
        // Plain gray and color text always carries a byte or word maxval.
        depth = if depth > 8 { 16 } else { 8 };
    }
    let variant = PnmVariant::new(format, encoding);
    let width = image.width();
    let height = image.height();

    out.extend_from_slice(&[b'P', variant.magic(target.is_gray())]);
    out.push(b'\n');
    if let Some(comment) = image.property("comment") {
        out.extend_from_slice(comment_lines(comment).as_bytes());
    }
    if format == PnmFormat::Pam {
        let maxval = max_for_bits(depth);
        out.extend_from_slice(
            format!(
                "WIDTH {width}\nHEIGHT {height}\nDEPTH {}\nMAXVAL {maxval}\nTUPLTYPE {}\nENDHDR\n",
                target.channels(),
                pam_tuple_name(target, image.depth),
            )
            .as_bytes(),
        );
    } else {
        out.extend_from_slice(format!("{width} {height}\n").as_bytes());
        match format {
            PnmFormat::Pbm => {}
            PnmFormat::Pfm => {
                let scale = match image.endian {
                    Endian::Little => "-1.0\n",
                    Endian::Big => "1.0\n",
                };
                out.extend_from_slice(scale.as_bytes());
            }
            _ => out.extend_from_slice(format!("{}\n", max_for_bits(depth)).as_bytes()),
        }
    }
    log::debug!("writing PNM {variant:?} {width}x{height} {target:?} depth {depth}");

    let mut row = Vec::new();
    match (format, encoding) {
        (PnmFormat::Pbm, PnmEncoding::Ascii) => {
            let mut line = LineWriter::new(out);
            for y in 0..height {
                convert_row(image, y, target, &mut row)?;
                for &q in &row {
                    line.token(if q >= QUANTUM_RANGE / 2 { "0" } else { "1" });
                }
                monitor.row_done(y, height)?;
            }
            line.finish();
        }
        (_, PnmEncoding::Ascii) => {
            let maxval = max_for_bits(depth);
            let mut line = LineWriter::new(out);
            for y in 0..height {
                convert_row(image, y, target, &mut row)?;
                for &q in &row {
                    line.token(&from_quantum(q, maxval).to_string());
                }
                monitor.row_done(y, height)?;
            }
            line.finish();
        }
        (PnmFormat::Pfm, _) => {
            let spec = SampleSpec::unsigned(32, image.endian).with_format(SampleFormat::Float);
            let il = Interleaver::new(target, spec)?;
            for (i, y) in (0..height).rev().enumerate() {
                convert_row(image, y, target, &mut row)?;
                il.interleave(&row, out)?;
                monitor.row_done(i as u32, height)?;
            }
        }
        _ => {
            let spec = if format == PnmFormat::Pbm {
                SampleSpec::unsigned(1, Endian::Big).with_min_is_white(true)
            } else {
                let maxval = max_for_bits(depth);
                let bits = if maxval < 256 { 8 } else { 16 };
                SampleSpec::unsigned(bits, Endian::Big).with_maxval(maxval)
            };
            let il = Interleaver::new(target, spec)?;
            out.try_reserve(il.row_bytes(width as usize).saturating_mul(height as usize))?;
            for y in 0..height {
                convert_row(image, y, target, &mut row)?;
                il.interleave(&row, out)?;
                monitor.row_done(y, height)?;
            }
        }
    }
    Ok(())
}

/// Concrete sub-format for the automatic `Pnm` choice.
fn resolve_format(image: &Image, format: PnmFormat) -> PnmFormat {
    match format {
        PnmFormat::Pnm if image.is_bilevel() => PnmFormat::Pbm,
        PnmFormat::Pnm if image.is_gray() => PnmFormat::Pgm,
        PnmFormat::Pnm => PnmFormat::Ppm,
        other => other,
    }
}

/// Tuple written for `format` and the bit depth behind its maxval.
fn target_layout(image: &Image, format: PnmFormat) -> Result<(TupleType, u8), RasterError> {
    let depth = image.depth.clamp(1, 32);
    Ok(match format {
        PnmFormat::Pbm => (TupleType::Gray, 1),
        PnmFormat::Pgm => (TupleType::Gray, if depth > 8 { 16 } else { depth }),
        PnmFormat::Ppm | PnmFormat::Pnm => (TupleType::Rgb, if depth > 8 { 16 } else { depth }),
        PnmFormat::Pam => {
            let tuple = match image.tuple_type() {
                TupleType::Indexed => TupleType::Rgb,
                TupleType::IndexedAlpha => TupleType::Rgba,
                other => other,
            };
            (tuple, depth.min(16))
        }
        PnmFormat::Pfm => {
            let tuple = if image.is_gray() { TupleType::Gray } else { TupleType::Rgb };
            (tuple, 32)
        }
    })
}

/// Row `y` of `image` converted to `target` channels.
fn convert_row(image: &Image, y: u32, target: TupleType, out: &mut Vec<Quantum>) -> Result<(), RasterError> {
    let row = image.row(y).ok_or(RasterError::DimensionInvalid {
        width: u64::from(image.width()),
        height: u64::from(y) + 1,
    })?;
    out.clear();
    if target == image.tuple_type() && !target.is_indexed() {
        out.extend_from_slice(row);
        return Ok(());
    }
    for px in row.chunks_exact(image.tuple_type().channels()) {
        match target {
            TupleType::Gray => out.push(image.intensity(px)),
            TupleType::GrayAlpha => out.extend_from_slice(&[image.intensity(px), image.alpha(px)]),
            TupleType::Rgba => {
                out.extend_from_slice(&image.rgb(px));
                out.push(image.alpha(px));
            }
            _ => out.extend_from_slice(&image.rgb(px)),
        }
    }
    Ok(())
}

/// Space-separated tokens wrapped before [`LINE_LIMIT`] columns.
struct LineWriter<'a> {
    out: &'a mut Vec<u8>,
    column: usize,
}

impl<'a> LineWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, column: 0 }
    }

    fn token(&mut self, token: &str) {
        if self.column > 0 && self.column + token.len() + 1 >= LINE_LIMIT {
            self.out.push(b'\n');
            self.column = 0;
        }
        self.out.extend_from_slice(token.as_bytes());
        self.out.push(b' ');
        self.column += token.len() + 1;
    }

    fn finish(self) {
        if self.column > 0 {
            self.out.push(b'\n');
        }
    }
}
