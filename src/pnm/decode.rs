//! PNM row codecs: ASCII tokens, fixed-extent binary rows, bottom-up PFM.

use super::header::{PnmHeader, read_integer, skip_filler};
use super::{PnmEncoding, PnmFormat};
use crate::error::RasterError;
use crate::interleave::{Interleaver, SampleSpec};
use crate::pack::Endian;
use crate::quantum::{QUANTUM_RANGE, QuantumScaler, SampleFormat};
use crate::sequence::{RowMonitor, check_store, commit};
use crate::store::PixelStore;
use crate::stream::ByteReader;

/// Decode the pixel data of one frame into `store`.
pub(crate) fn read_pixels(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
    parallel: bool,
) -> Result<(), RasterError> {
    check_store(&h.header, store)?;
    monitor.check()?;
    match (h.variant.format, h.variant.encoding) {
        (PnmFormat::Pbm, PnmEncoding::Ascii) => read_ascii_bits(r, h, store, monitor),
        (_, PnmEncoding::Ascii) => read_ascii(r, h, store, monitor),
        (PnmFormat::Pfm, _) => read_pfm(r, h, store, monitor),
        _ => read_binary(r, h, store, monitor, parallel),
    }
}

/// Consume one frame's pixel data without decoding it.
pub(crate) fn skip_pixels(r: &mut ByteReader<'_>, h: &PnmHeader) -> Result<(), RasterError> {
    let header = &h.header;
    let samples = header.width as usize * header.height as usize * header.samples_per_pixel();
    match (h.variant.format, h.variant.encoding) {
        (PnmFormat::Pbm, PnmEncoding::Ascii) => {
            for _ in 0..samples {
                read_bit(r)?;
            }
        }
        (_, PnmEncoding::Ascii) => {
            for _ in 0..samples {
                read_sample(r)?;
            }
        }
        _ => {
            let row_bytes = interleaver(h)?.row_bytes(header.width as usize);
            let total = row_bytes
                .checked_mul(header.height as usize)
                .ok_or_else(|| RasterError::ResourceExhausted("frame size overflows".into()))?;
            r.read_bytes(total)?;
        }
    }
    Ok(())
}

/// Packed-row codec for binary variants.
fn interleaver(h: &PnmHeader) -> Result<Interleaver, RasterError> {
    let header = &h.header;
    let spec = match h.variant.format {
        PnmFormat::Pbm => SampleSpec::unsigned(1, Endian::Big).with_min_is_white(true),
        PnmFormat::Pfm => SampleSpec::unsigned(32, header.endian)
            .with_format(SampleFormat::Float)
            .with_float_scale(h.pfm_scale),
        _ => {
            let bits = if header.maxval < 256 { 8 } else { 16 };
            SampleSpec::unsigned(bits, Endian::Big).with_maxval(header.maxval)
        }
    };
    Ok(Interleaver::new(header.tuple, spec)?.with_pad(header.extra_samples))
}

// ── ASCII ───────────────────────────────────────────────────────────

/// P1 digit: `1` is black, `0` is white. Digits need no separators.
fn read_bit(r: &mut ByteReader<'_>) -> Result<bool, RasterError> {
    skip_filler(r, None);
    let offset = r.tell();
    match r.read_u8() {
        Some(b'0') => Ok(false),
        Some(b'1') => Ok(true),
        Some(b) => Err(RasterError::corrupt(
            offset,
            format!("expected PBM digit, found byte 0x{b:02X}"),
        )),
        None => Err(RasterError::UnexpectedEndOfStream { offset }),
    }
}

fn read_sample(r: &mut ByteReader<'_>) -> Result<u32, RasterError> {
    read_integer(r, None)?.ok_or(RasterError::UnexpectedEndOfStream { offset: r.tell() })
}

fn read_ascii_bits(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
) -> Result<(), RasterError> {
    let height = h.header.height;
    for y in 0..height {
        let row = store.queue_row(y)?;
        for px in row.iter_mut() {
            *px = if read_bit(r)? { 0 } else { QUANTUM_RANGE };
        }
        commit(store, y, y, height, monitor)?;
    }
    Ok(())
}

fn read_ascii(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
) -> Result<(), RasterError> {
    let scaler = QuantumScaler::new(h.header.maxval)?;
    let height = h.header.height;
    for y in 0..height {
        let row = store.queue_row(y)?;
        for q in row.iter_mut() {
            *q = scaler.to_quantum(read_sample(r)?);
        }
        commit(store, y, y, height, monitor)?;
    }
    Ok(())
}

// ── Binary ──────────────────────────────────────────────────────────

fn read_binary(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
    parallel: bool,
) -> Result<(), RasterError> {
    let il = interleaver(h)?;
    #[cfg(feature = "parallel")]
    if parallel {
        return read_binary_parallel(r, h, &il, store, monitor);
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    let height = h.header.height;
    let row_bytes = il.row_bytes(h.header.width as usize);
    let mut scratch = Vec::new();
    for y in 0..height {
        let bytes = r.read_bytes(row_bytes)?;
        il.deinterleave_with(bytes, store.queue_row(y)?, &mut scratch)?;
        commit(store, y, y, height, monitor)?;
    }
    Ok(())
}

/// Rows are read in order by this thread, then decoded on the rayon pool
/// into disjoint rows of the store.
#[cfg(feature = "parallel")]
fn read_binary_parallel(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    il: &Interleaver,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
) -> Result<(), RasterError> {
    use rayon::prelude::*;

    const BATCH_ROWS: u32 = 64;

    let height = h.header.height;
    let width = h.header.width as usize;
    let stride = width * h.header.tuple.channels();
    let row_bytes = il.row_bytes(width);
    let mut y = 0;
    while y < height {
        let want = BATCH_ROWS.min(height - y);
        let bytes = r.read_available(want as usize * row_bytes);
        let got = (bytes.len() / row_bytes) as u32;
        if got > 0 {
            let rows = store.queue_rows(y, got)?;
            rows.par_chunks_mut(stride)
                .zip(bytes.par_chunks(row_bytes))
                .try_for_each(|(row, src)| il.deinterleave(src, row).map(|_| ()))?;
            for i in y..y + got {
                commit(store, i, i, height, monitor)?;
            }
        }
        if got < want {
            return Err(RasterError::UnexpectedEndOfStream { offset: r.tell() });
        }
        y += got;
    }
    Ok(())
}

/// PFM rows are stored bottom row first.
fn read_pfm(
    r: &mut ByteReader<'_>,
    h: &PnmHeader,
    store: &mut dyn PixelStore,
    monitor: &RowMonitor<'_>,
) -> Result<(), RasterError> {
    let il = interleaver(h)?;
    let height = h.header.height;
    let row_bytes = il.row_bytes(h.header.width as usize);
    let mut scratch = Vec::new();
    for i in 0..height {
        let y = height - 1 - i;
        let bytes = r.read_bytes(row_bytes)?;
        il.deinterleave_with(bytes, store.queue_row(y)?, &mut scratch)?;
        commit(store, y, i, height, monitor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::TupleType;
    use crate::quantum::{Quantum, to_quantum};
    use crate::store::Image;

    fn decode(data: &[u8]) -> Result<Image, RasterError> {
        let mut r = ByteReader::new(data);
        let h = super::super::header::parse_header(&mut r, &mut Vec::new())?;
        let mut image = Image::new(h.header.width, h.header.height, h.header.tuple)?;
        let stop = enough::Unstoppable;
        read_pixels(&mut r, &h, &mut image, &RowMonitor::new(&stop), false)?;
        Ok(image)
    }

    #[test]
    fn ascii_gray_clamps_above_maxval() {
        let image = decode(b"P2\n3 1\n15\n0 15 99\n").unwrap();
        assert_eq!(image.samples(), &[0, QUANTUM_RANGE, QUANTUM_RANGE]);
    }

    #[test]
    fn ascii_bits_without_separators() {
        let image = decode(b"P1\n4 1\n0110").unwrap();
        let q = QUANTUM_RANGE;
        assert_eq!(image.samples(), &[q, 0, 0, q]);
    }

    #[test]
    fn ascii_garbage_is_corrupt() {
        let err = decode(b"P2\n2 1\n255\n1 x\n").unwrap_err();
        assert!(matches!(err, RasterError::CorruptData { offset: 13, .. }));
    }

    #[test]
    fn binary_bitmap_is_min_is_white() {
        // 10 pixels wide: two bytes per row, trailing bits padding.
        let image = decode(b"P4\n10 1\n\x81\x40").unwrap();
        let px: Vec<Quantum> = image.samples().to_vec();
        let q = QUANTUM_RANGE;
        assert_eq!(px, vec![0, q, q, q, q, q, q, 0, q, 0]);
    }

    #[test]
    fn sixteen_bit_big_endian() {
        let image = decode(b"P5\n2 1\n1000\n\x03\xE8\x00\x01").unwrap();
        assert_eq!(image.samples(), &[QUANTUM_RANGE, to_quantum(1, 1000)]);
    }

    #[test]
    fn pfm_rows_bottom_up() {
        let mut data = b"Pf\n1 2\n-1.0\n".to_vec();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&0.0f32.to_le_bytes());
        let image = decode(&data).unwrap();
        assert_eq!(image.tuple_type(), TupleType::Gray);
        assert_eq!(image.samples(), &[0, QUANTUM_RANGE]);
    }

    #[test]
    fn pam_pad_channels_skipped() {
        let data = b"P7\nWIDTH 2\nHEIGHT 1\nDEPTH 2\nMAXVAL 255\nTUPLTYPE GRAYSCALE\nENDHDR\n\xFF\x01\x00\x02";
        let image = decode(data).unwrap();
        assert_eq!(image.samples(), &[QUANTUM_RANGE, 0]);
    }

    #[test]
    fn skip_consumes_frame() {
        let data = b"P2\n2 2\n255\n1 2 3 4\nP5\n1 1\n255\n\x07";
        let mut r = ByteReader::new(data);
        let h = super::super::header::parse_header(&mut r, &mut Vec::new()).unwrap();
        skip_pixels(&mut r, &h).unwrap();
        skip_filler(&mut r, None);
        let next = super::super::header::parse_header(&mut r, &mut Vec::new()).unwrap();
        assert_eq!(next.header.width, 1);
    }
}
