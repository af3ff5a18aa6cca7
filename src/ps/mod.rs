//! PostScript and EPS writer.
//!
//! Frames are written as Level 1 hex image data driven by a small prolog:
//! bilevel frames as 1-bit bitmaps, gray frames as 8-bit gray, small
//! palettes as colormap indexes and everything else as RGB packets. Index
//! and RGB packets may be run-length encoded.
//!
//! ```
//! use zenraster::{EncodeRequest, Image, PsOptions, TupleType, Unstoppable};
//!
//! let image = Image::new(4, 2, TupleType::Rgb)?;
//! let eps = EncodeRequest::ps(PsOptions::eps()).encode(&image, Unstoppable)?;
//! assert!(eps.starts_with(b"%!PS-Adobe-3.0 EPSF-3.0\n"));
//! # Ok::<(), zenraster::RasterError>(())
//! ```

mod rle;

pub use rle::{MAX_RUN, RunLength};

use crate::error::RasterError;
use crate::header::ResolutionUnit;
use crate::quantum::{QUANTUM_RANGE, Quantum, from_quantum};
use crate::sequence::RowMonitor;
use crate::store::Image;

/// Pixel packet encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PsCompression {
    #[default]
    None,
    /// Each packet is followed by its run length minus one.
    RunLength,
}

/// Writer settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PsOptions {
    pub compression: PsCompression,
    /// Encapsulated output: one page, no `showpage`.
    pub eps: bool,
    /// `%%Title`; defaults to the first frame's `label` property.
    pub title: Option<String>,
}

impl PsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eps() -> Self {
        Self {
            eps: true,
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compression: PsCompression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Hex output lines stay below this many columns.
const LINE_LIMIT: usize = 80;

const PROLOG: &str = "\
%%BeginProlog
/buffer 512 string def
/byte 1 string def
/color_packet 3 string def
/pixels 768 string def
/ReadCount
{
  compression 0 eq
  { 1 }
  { currentfile byte readhexstring pop 0 get 1 add } ifelse
  3 mul /number_pixels exch def
} bind def
/Repeat
{
  ReadCount
  0 3 number_pixels 1 sub { pixels exch color_packet putinterval } for
  pixels 0 number_pixels getinterval
} bind def
/DirectClassPacket
{
  currentfile color_packet readhexstring pop pop
  Repeat
} bind def
/PseudoClassPacket
{
  currentfile byte readhexstring pop 0 get
  3 mul colormap exch 3 getinterval
  color_packet copy pop
  Repeat
} bind def
/DirectClassImage
{
  columns rows 8 [ columns 0 0 rows neg 0 rows ]
  { DirectClassPacket } false 3 colorimage
} bind def
/PseudoClassImage
{
  currentfile buffer readline pop
  token pop /class exch def pop
  class 0 gt
  {
    currentfile buffer readline pop
    token pop /depth exch def pop
    /grays columns 8 add depth sub depth mul 8 idiv string def
    columns rows depth [ columns 0 0 rows neg 0 rows ]
    { currentfile grays readhexstring pop } image
  }
  {
    currentfile buffer readline pop
    token pop /colors exch def pop
    /colormap colors 3 mul string def
    currentfile colormap readhexstring pop pop
    columns rows 8 [ columns 0 0 rows neg 0 rows ]
    { PseudoClassPacket } false 3 colorimage
  } ifelse
} bind def
/DisplayImage
{
  gsave
  currentfile buffer readline pop
  token pop /x exch def
  token pop /y exch def pop
  x y translate
  currentfile buffer readline pop
  token pop /x exch def
  token pop /y exch def pop
  x y scale
  currentfile buffer readline pop
  token pop /columns exch def
  token pop /rows exch def pop
  currentfile buffer readline pop
  token pop /class exch def pop
  currentfile buffer readline pop
  token pop /compression exch def pop
  class 0 gt { PseudoClassImage } { DirectClassImage } ifelse
  grestore
";

/// How a frame's pixels are dumped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dump {
    Bitmap,
    Gray,
    Pseudo,
    Direct,
}

impl Dump {
    fn choose(image: &Image) -> Self {
        let tuple = image.tuple_type();
        if !tuple.has_alpha() && image.is_bilevel() {
            Dump::Bitmap
        } else if !tuple.has_alpha() && image.is_gray() {
            Dump::Gray
        } else if tuple.is_indexed() && !tuple.has_alpha() && (1..=256).contains(&image.colormap.len()) {
            Dump::Pseudo
        } else {
            Dump::Direct
        }
    }
}

/// Write `images` as one PostScript document, one page per image.
pub(crate) fn write_document(
    images: &[Image],
    opts: &PsOptions,
    monitor: &RowMonitor<'_>,
) -> Result<Vec<u8>, RasterError> {
    let Some(first) = images.first() else {
        return Err(RasterError::UnsupportedVariant("no frames to write".into()));
    };
    if opts.eps && images.len() > 1 {
        return Err(RasterError::UnsupportedVariant(format!(
            "EPS holds one page, got {} frames",
            images.len()
        )));
    }
    let pages: Vec<(f64, f64)> = images.iter().map(page_size).collect();
    let (bw, bh) = pages
        .iter()
        .fold((0.0f64, 0.0f64), |(w, h), &(pw, ph)| (w.max(pw), h.max(ph)));
    let title = opts
        .title
        .as_deref()
        .or_else(|| first.property("label"))
        .unwrap_or("Untitled");

    let mut out = Vec::new();
    out.extend_from_slice(if opts.eps {
        b"%!PS-Adobe-3.0 EPSF-3.0\n".as_slice()
    } else {
        b"%!PS-Adobe-3.0\n".as_slice()
    });
    push_str(&mut out, "%%Creator: (zenraster)\n");
    push_str(&mut out, &format!("%%Title: ({})\n", escape(title)));
    push_str(
        &mut out,
        &format!("%%BoundingBox: 0 0 {} {}\n", bw.ceil() as u64, bh.ceil() as u64),
    );
    push_str(&mut out, "%%DocumentData: Clean7Bit\n%%LanguageLevel: 1\n");
    push_str(&mut out, &format!("%%Pages: {}\n%%EndComments\n", images.len()));
    push_str(&mut out, PROLOG);
    if !opts.eps {
        push_str(&mut out, "  showpage\n");
    }
    push_str(&mut out, "} bind def\n%%EndProlog\n");

    for (page, (image, &(pw, ph))) in images.iter().zip(&pages).enumerate() {
        monitor.check()?;
        let dump = Dump::choose(image);
        log::debug!(
            "writing PS page {} {}x{} as {dump:?} {:?}",
            page + 1,
            image.width(),
            image.height(),
            opts.compression
        );
        push_str(&mut out, &format!("%%Page: {0} {0}\n", page + 1));
        push_str(
            &mut out,
            &format!("%%PageBoundingBox: 0 0 {} {}\n", pw.ceil() as u64, ph.ceil() as u64),
        );
        if opts.eps {
            push_str(&mut out, "userdict begin\n");
        }
        push_str(&mut out, "DisplayImage\n0 0\n");
        push_str(&mut out, &format!("{} {}\n", fmt_points(pw), fmt_points(ph)));
        push_str(&mut out, &format!("{} {}\n", image.width(), image.height()));
        write_pixels(image, dump, opts.compression, monitor, &mut out)?;
        if opts.eps {
            push_str(&mut out, "end\n");
        }
        push_str(&mut out, "%%PageTrailer\n");
    }
    push_str(&mut out, "%%Trailer\n%%EOF\n");
    Ok(out)
}

fn write_pixels(
    image: &Image,
    dump: Dump,
    compression: PsCompression,
    monitor: &RowMonitor<'_>,
    out: &mut Vec<u8>,
) -> Result<(), RasterError> {
    let rle = compression == PsCompression::RunLength;
    let height = image.height();
    let ch = image.tuple_type().channels();
    let row = |y: u32| {
        image.row(y).ok_or(RasterError::DimensionInvalid {
            width: u64::from(image.width()),
            height: u64::from(y) + 1,
        })
    };
    match dump {
        Dump::Bitmap | Dump::Gray => {
            let depth = if dump == Dump::Bitmap { 1 } else { 8 };
            push_str(out, &format!("1\n1\n1\n{depth}\n"));
            let mut hex = HexWriter::new(out);
            for y in 0..height {
                let mut acc = 0u8;
                let mut bits = 0;
                for px in row(y)?.chunks_exact(ch) {
                    let q = image.intensity(px);
                    if dump == Dump::Gray {
                        hex.packet(&[to_byte(q)]);
                        continue;
                    }
                    acc = (acc << 1) | u8::from(q >= QUANTUM_RANGE / 2);
                    bits += 1;
                    if bits == 8 {
                        hex.packet(&[acc]);
                        (acc, bits) = (0, 0);
                    }
                }
                if bits != 0 {
                    hex.packet(&[acc << (8 - bits)]);
                }
                monitor.row_done(y, height)?;
            }
            hex.finish();
        }
        Dump::Pseudo => {
            push_str(out, &format!("1\n{}\n0\n", u8::from(rle)));
            push_str(out, &format!("{}\n", image.colormap.len()));
            for &[r, g, b] in &image.colormap {
                push_str(out, &format!("{:02X}{:02X}{:02X}\n", to_byte(r), to_byte(g), to_byte(b)));
            }
            let last = image.colormap.len() - 1;
            let mut hex = HexWriter::new(out);
            let mut runs = RunLength::new();
            for y in 0..height {
                for px in row(y)?.chunks_exact(ch) {
                    let index = (px[0] as usize).min(last) as u8;
                    if !rle {
                        hex.packet(&[index]);
                    } else if let Some((v, n)) = runs.push(index) {
                        hex.packet(&[v, n]);
                    }
                }
                if let Some((v, n)) = runs.flush() {
                    hex.packet(&[v, n]);
                }
                monitor.row_done(y, height)?;
            }
            hex.finish();
        }
        Dump::Direct => {
            push_str(out, &format!("0\n{}\n", u8::from(rle)));
            let mut hex = HexWriter::new(out);
            let mut runs = RunLength::new();
            for y in 0..height {
                for px in row(y)?.chunks_exact(ch) {
                    let color = if image.alpha(px) == 0 {
                        [0xFF; 3]
                    } else {
                        image.rgb(px).map(to_byte)
                    };
                    if !rle {
                        hex.packet(&color);
                    } else if let Some(([r, g, b], n)) = runs.push(color) {
                        hex.packet(&[r, g, b, n]);
                    }
                }
                if let Some(([r, g, b], n)) = runs.flush() {
                    hex.packet(&[r, g, b, n]);
                }
                monitor.row_done(y, height)?;
            }
            hex.finish();
        }
    }
    Ok(())
}

/// Page size in points: 72 dpi unless the frame carries a resolution.
fn page_size(image: &Image) -> (f64, f64) {
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    match image.resolution {
        Some(res) if res.x > 0.0 && res.y > 0.0 => {
            let per_inch = match res.unit {
                ResolutionUnit::PixelsPerInch => 1.0,
                ResolutionUnit::PixelsPerCentimeter => 2.54,
                ResolutionUnit::Undefined => return (w, h),
            };
            (w * 72.0 / (res.x * per_inch), h * 72.0 / (res.y * per_inch))
        }
        _ => (w, h),
    }
}

fn fmt_points(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as u64)
    } else {
        format!("{v:.3}")
    }
}

#[inline]
fn to_byte(q: Quantum) -> u8 {
    from_quantum(q, 255) as u8
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}

/// Escape a string for a PostScript literal.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Appends hex packets, breaking lines before they reach [`LINE_LIMIT`].
/// A packet never straddles two lines.
struct HexWriter<'a> {
    out: &'a mut Vec<u8>,
    column: usize,
}

impl<'a> HexWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, column: 0 }
    }

    fn packet(&mut self, bytes: &[u8]) {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let len = 2 * bytes.len();
        if self.column > 0 && self.column + len >= LINE_LIMIT {
            self.out.push(b'\n');
            self.column = 0;
        }
        for &b in bytes {
            self.out.push(DIGITS[usize::from(b >> 4)]);
            self.out.push(DIGITS[usize::from(b & 0xF)]);
        }
        self.column += len;
    }

    fn finish(self) {
        if self.column > 0 {
            self.out.push(b'\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Resolution;
    use crate::pixel::TupleType;

    fn write(images: &[Image], opts: &PsOptions) -> String {
        let stop = enough::Unstoppable;
        let out = write_document(images, opts, &RowMonitor::new(&stop)).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Lines after the `DisplayImage` parameters.
    fn body(doc: &str) -> Vec<&str> {
        let start = doc.find("DisplayImage\n0 0\n").unwrap();
        doc[start..]
            .lines()
            .skip(3)
            .take_while(|l| !l.starts_with("%%"))
            .collect()
    }

    #[test]
    fn document_framing() {
        let image = Image::new(3, 2, TupleType::Rgb).unwrap();
        let doc = write(&[image.clone(), image], &PsOptions::new().with_title("a (b)"));
        assert!(doc.starts_with("%!PS-Adobe-3.0\n%%Creator: (zenraster)\n"));
        assert!(doc.contains("%%Title: (a \\(b\\))\n"));
        assert!(doc.contains("%%BoundingBox: 0 0 3 2\n"));
        assert!(doc.contains("%%Pages: 2\n"));
        assert!(doc.contains("  showpage\n} bind def\n%%EndProlog\n"));
        assert!(doc.contains("%%Page: 2 2\n"));
        assert!(doc.ends_with("%%PageTrailer\n%%Trailer\n%%EOF\n"));
    }

    #[test]
    fn eps_is_single_page() {
        let image = Image::new(1, 1, TupleType::Gray).unwrap();
        let doc = write(std::slice::from_ref(&image), &PsOptions::eps());
        assert!(doc.starts_with("%!PS-Adobe-3.0 EPSF-3.0\n"));
        assert!(!doc.contains("showpage"));
        assert!(doc.contains("userdict begin\nDisplayImage\n"));

        let stop = enough::Unstoppable;
        let two = [image.clone(), image];
        assert!(write_document(&two, &PsOptions::eps(), &RowMonitor::new(&stop)).is_err());
    }

    #[test]
    fn bitmap_uses_one_for_white() {
        let q = QUANTUM_RANGE;
        let image = Image::from_samples(10, 1, TupleType::Gray, vec![q, 0, q, 0, q, 0, q, 0, q, q]).unwrap();
        let doc = write(&[image], &PsOptions::new());
        assert_eq!(body(&doc), vec!["10 1", "1", "1", "1", "1", "AAC0"]);
    }

    #[test]
    fn gray_dump_wraps_lines() {
        let samples = (0..100u32).map(|i| (i * 600) as Quantum).collect();
        let image = Image::from_samples(100, 1, TupleType::Gray, samples).unwrap();
        let doc = write(&[image], &PsOptions::new());
        let lines = body(&doc);
        assert_eq!(&lines[..5], &["100 1", "1", "1", "1", "8"]);
        assert!(lines[5..].iter().all(|l| l.len() < LINE_LIMIT));
        assert_eq!(lines[5..].iter().map(|l| l.len()).sum::<usize>(), 200);
    }

    #[test]
    fn direct_runs_stay_in_rows() {
        let q = QUANTUM_RANGE;
        let px = [q, 0, 0];
        let samples = px.iter().copied().cycle().take(2 * 2 * 3).collect();
        let image = Image::from_samples(2, 2, TupleType::Rgb, samples).unwrap();
        let opts = PsOptions::new().with_compression(PsCompression::RunLength);
        let doc = write(&[image], &opts);
        assert_eq!(body(&doc), vec!["2 2", "0", "1", "FF000001FF000001"]);
    }

    #[test]
    fn transparent_pixels_are_white() {
        let q = QUANTUM_RANGE;
        let image = Image::from_samples(2, 1, TupleType::Rgba, vec![0, 0, q, q, 0, 0, 0, 0]).unwrap();
        let doc = write(&[image], &PsOptions::new());
        assert_eq!(body(&doc), vec!["2 1", "0", "0", "0000FFFFFFFF"]);
    }

    #[test]
    fn pseudo_class_colormap() {
        let q = QUANTUM_RANGE;
        let mut image = Image::from_samples(3, 1, TupleType::Indexed, vec![1, 1, 0]).unwrap();
        image.colormap = vec![[0, 0, q], [q, 0, 0]];
        let opts = PsOptions::new().with_compression(PsCompression::RunLength);
        let doc = write(&[image], &opts);
        assert_eq!(
            body(&doc),
            vec!["3 1", "1", "1", "0", "2", "0000FF", "FF0000", "01010000"]
        );
    }

    #[test]
    fn pseudo_index_past_colormap_is_clamped() {
        let q = QUANTUM_RANGE;
        let mut image = Image::from_samples(3, 1, TupleType::Indexed, vec![7, 1, 0]).unwrap();
        image.colormap = vec![[0, 0, q], [q, 0, 0]];
        let doc = write(&[image], &PsOptions::new());
        assert_eq!(body(&doc), vec!["3 1", "1", "0", "0", "2", "0000FF", "FF0000", "010100"]);
    }

    #[test]
    fn resolution_sets_page_size() {
        let mut image = Image::new(300, 150, TupleType::Rgb).unwrap();
        image.resolution = Some(Resolution {
            x: 300.0,
            y: 300.0,
            unit: ResolutionUnit::PixelsPerInch,
        });
        let doc = write(&[image], &PsOptions::new());
        assert!(doc.contains("%%BoundingBox: 0 0 72 36\n"));
        assert!(doc.contains("DisplayImage\n0 0\n72 36\n300 150\n"));
    }
}
