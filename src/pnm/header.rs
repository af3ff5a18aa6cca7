//! PNM header grammar: `P` + digit, whitespace/`#`-comment separated
//! integers, and PAM `KEY value` lines up to `ENDHDR`.

use super::{PnmEncoding, PnmFormat, PnmVariant};
use crate::error::{RasterError, Warning, WarningSink};
use crate::header::FormatHeader;
use crate::pack::Endian;
use crate::pixel::TupleType;
use crate::quantum::{SampleFormat, max_for_bits};
use crate::stream::ByteReader;

/// Samples above this are rejected.
pub(crate) const MAX_MAXVAL: u32 = 65535;

/// Parsed PNM header plus what the generic [`FormatHeader`] cannot carry.
#[derive(Clone, Debug)]
pub(crate) struct PnmHeader {
    pub variant: PnmVariant,
    pub header: FormatHeader,
    /// Magnitude of the PFM scale line.
    pub pfm_scale: f64,
    /// `#` comments in header order.
    pub comments: Vec<String>,
}

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Skip whitespace and comments, collecting comment text when `comments` is given.
pub(crate) fn skip_filler(r: &mut ByteReader<'_>, mut comments: Option<&mut Vec<String>>) {
    while let Some(b) = r.peek_u8() {
        if is_space(b) {
            r.read_u8();
        } else if b == b'#' {
            r.read_u8();
            let text = read_line(r);
            if let Some(c) = comments.as_deref_mut() {
                c.push(text);
            }
        } else {
            break;
        }
    }
}

/// Rest of the current line without the terminator.
fn read_line(r: &mut ByteReader<'_>) -> String {
    let mut line = Vec::new();
    while let Some(b) = r.read_u8() {
        if b == b'\n' {
            break;
        }
        if b != b'\r' {
            line.push(b);
        }
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Non-whitespace run.
fn read_token<'a>(r: &mut ByteReader<'a>) -> &'a [u8] {
    let start = r.tell() as usize;
    while r.peek_u8().is_some_and(|b| !is_space(b) && b != b'#') {
        r.read_u8();
    }
    &r.data()[start..r.tell() as usize]
}

/// Decimal integer after optional filler. `None` at end of stream.
pub(crate) fn read_integer(
    r: &mut ByteReader<'_>,
    comments: Option<&mut Vec<String>>,
) -> Result<Option<u32>, RasterError> {
    skip_filler(r, comments);
    let offset = r.tell();
    let Some(first) = r.peek_u8() else {
        return Ok(None);
    };
    if !first.is_ascii_digit() {
        return Err(RasterError::corrupt(
            offset,
            format!("expected decimal integer, found byte 0x{first:02X}"),
        ));
    }
    let mut value = 0u64;
    while let Some(d) = r.peek_u8().filter(u8::is_ascii_digit) {
        r.read_u8();
        value = value * 10 + u64::from(d - b'0');
        if value > u64::from(u32::MAX) {
            return Err(RasterError::header(offset, "integer overflows 32 bits"));
        }
    }
    Ok(Some(value as u32))
}

fn header_integer(r: &mut ByteReader<'_>, comments: &mut Vec<String>, what: &str) -> Result<u32, RasterError> {
    let offset = r.tell();
    match read_integer(r, Some(comments)) {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(RasterError::UnexpectedEndOfStream { offset: r.tell() }),
        Err(_) => Err(RasterError::header(offset, format!("missing {what}"))),
    }
}

/// Parse one frame header starting at the reader's position. On success the
/// reader sits on the first pixel byte.
pub(crate) fn parse_header(r: &mut ByteReader<'_>, sink: &mut dyn WarningSink) -> Result<PnmHeader, RasterError> {
    let start = r.tell();
    let magic = r.read_bytes(2).map_err(|_| RasterError::header(start, "missing magic"))?;
    if magic[0] != b'P' {
        return Err(RasterError::header(start, "magic does not start with 'P'"));
    }
    let variant = PnmVariant::from_magic(magic[1])
        .ok_or_else(|| RasterError::header(start + 1, format!("unknown PNM type '{}'", magic[1] as char)))?;

    let mut comments = Vec::new();
    let mut pfm_scale = 1.0;
    let mut header = match variant.format {
        PnmFormat::Pam => parse_pam(r, &mut comments, sink)?,
        PnmFormat::Pfm => {
            let width = header_integer(r, &mut comments, "width")?;
            let height = header_integer(r, &mut comments, "height")?;
            skip_filler(r, Some(&mut comments));
            let offset = r.tell();
            let token = read_token(r);
            let scale = std::str::from_utf8(token)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|s| s.is_finite() && *s != 0.0)
                .ok_or_else(|| RasterError::header(offset, "invalid PFM scale"))?;
            pfm_scale = scale.abs();
            let tuple = if magic[1] == b'f' {
                TupleType::Gray
            } else {
                TupleType::Rgb
            };
            let mut h = FormatHeader::new(width, height, max_for_bits(32), tuple);
            h.depth = 32;
            h.sample_format = SampleFormat::Float;
            h.endian = if scale < 0.0 { Endian::Little } else { Endian::Big };
            h
        }
        PnmFormat::Pbm => {
            let width = header_integer(r, &mut comments, "width")?;
            let height = header_integer(r, &mut comments, "height")?;
            FormatHeader::new(width, height, 1, TupleType::Gray)
        }
        _ => {
            let width = header_integer(r, &mut comments, "width")?;
            let height = header_integer(r, &mut comments, "height")?;
            let maxval = header_integer(r, &mut comments, "maxval")?;
            let tuple = if variant.format == PnmFormat::Pgm {
                TupleType::Gray
            } else {
                TupleType::Rgb
            };
            FormatHeader::new(width, height, maxval, tuple)
        }
    };
    header.offset = start;

    // One whitespace byte separates the header from binary samples.
    if variant.encoding == PnmEncoding::Binary && variant.format != PnmFormat::Pam {
        match r.peek_u8() {
            Some(b) if is_space(b) => {
                r.read_u8();
            }
            Some(_) => {
                return Err(RasterError::header(r.tell(), "header not terminated by whitespace"));
            }
            None => {}
        }
    }

    header.validate()?;
    if header.sample_format != SampleFormat::Float && header.maxval > MAX_MAXVAL {
        return Err(RasterError::SampleRangeInvalid(format!(
            "maxval {} exceeds {MAX_MAXVAL}",
            header.maxval
        )));
    }
    log::debug!(
        "PNM {:?} frame at {start}: {}x{} maxval {} {:?}",
        variant,
        header.width,
        header.height,
        header.maxval,
        header.tuple
    );
    Ok(PnmHeader {
        variant,
        header,
        pfm_scale,
        comments,
    })
}

fn parse_pam(
    r: &mut ByteReader<'_>,
    comments: &mut Vec<String>,
    sink: &mut dyn WarningSink,
) -> Result<FormatHeader, RasterError> {
    let mut width = None;
    let mut height = None;
    let mut depth = None;
    let mut maxval = None;
    let mut tuple_name = String::new();
    loop {
        skip_filler(r, Some(&mut *comments));
        let offset = r.tell();
        if r.eof() {
            return Err(RasterError::UnexpectedEndOfStream { offset });
        }
        let keyword = String::from_utf8_lossy(read_token(r)).to_ascii_uppercase();
        match keyword.as_str() {
            "ENDHDR" => {
                read_line(r);
                break;
            }
            "WIDTH" => width = Some(header_integer(r, comments, "WIDTH")?),
            "HEIGHT" => height = Some(header_integer(r, comments, "HEIGHT")?),
            "DEPTH" => depth = Some(header_integer(r, comments, "DEPTH")?),
            "MAXVAL" => maxval = Some(header_integer(r, comments, "MAXVAL")?),
            "TUPLTYPE" => {
                let value = read_line(r);
                if !tuple_name.is_empty() {
                    tuple_name.push(' ');
                }
                tuple_name.push_str(value.trim());
            }
            _ => {
                let rest = read_line(r);
                sink.warn(Warning::IgnoredField(format!("PAM {keyword} {}", rest.trim())));
            }
        }
    }
    let offset = r.tell();
    let (Some(width), Some(height), Some(channels), Some(maxval)) = (width, height, depth, maxval) else {
        return Err(RasterError::header(offset, "PAM header lacks WIDTH, HEIGHT, DEPTH or MAXVAL"));
    };
    let channels = channels as usize;
    let tuple = match pam_tuple(&tuple_name) {
        Some(t) => t,
        None => TupleType::from_channel_count(channels.min(4)).ok_or_else(|| {
            RasterError::header(offset, format!("PAM DEPTH {channels}"))
        })?,
    };
    if channels < tuple.channels() {
        return Err(RasterError::header(
            offset,
            format!("PAM DEPTH {channels} too small for TUPLTYPE {tuple_name}"),
        ));
    }
    let mut header = FormatHeader::new(width, height, maxval, tuple);
    header.extra_samples = channels - tuple.channels();
    Ok(header)
}

fn pam_tuple(name: &str) -> Option<TupleType> {
    let upper = name.to_ascii_uppercase();
    let (base, alpha) = match upper.strip_suffix("_ALPHA") {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };
    let tuple = match base {
        "BLACKANDWHITE" | "GRAYSCALE" => TupleType::Gray,
        "RGB" => TupleType::Rgb,
        "CMYK" => TupleType::Cmyk,
        _ => return None,
    };
    Some(tuple.with_alpha(alpha))
}

/// `TUPLTYPE` value for a PAM frame.
pub(crate) fn pam_tuple_name(tuple: TupleType, depth: u8) -> &'static str {
    match tuple {
        TupleType::Gray if depth == 1 => "BLACKANDWHITE",
        TupleType::GrayAlpha if depth == 1 => "BLACKANDWHITE_ALPHA",
        TupleType::Gray => "GRAYSCALE",
        TupleType::GrayAlpha => "GRAYSCALE_ALPHA",
        TupleType::Cmyk => "CMYK",
        TupleType::Cmyka => "CMYK_ALPHA",
        TupleType::Rgba | TupleType::IndexedAlpha => "RGB_ALPHA",
        _ => "RGB",
    }
}

/// `#` lines for a multi-line comment.
pub(crate) fn comment_lines(comment: &str) -> String {
    let mut out = String::with_capacity(comment.len() + 4);
    out.push('#');
    for c in comment.chars() {
        out.push(c);
        if c == '\n' {
            out.push('#');
        }
    }
    out.push('\n');
    out
}
