//! Test corpus: roundtrip tests with various patterns, sizes, depths and formats.

use enough::Unstoppable;
use zenraster::pnm::PnmFormat;
use zenraster::quantum::{from_quantum, max_for_bits, to_quantum};
use zenraster::*;

fn from_levels(w: u32, h: u32, tuple: TupleType, depth: u8, levels: Vec<u32>) -> Image {
    let max = max_for_bits(depth);
    let samples = levels.into_iter().map(|v| to_quantum(v, max)).collect();
    let mut image = Image::from_samples(w, h, tuple, samples).unwrap();
    image.depth = depth;
    image
}

fn checkerboard(w: u32, h: u32, tuple: TupleType, depth: u8) -> Image {
    let max = max_for_bits(depth);
    let ch = tuple.channels() as u32;
    let mut levels = Vec::new();
    for y in 0..h {
        for x in 0..w {
            for c in 0..ch {
                let v = if (x + y) % 2 == 0 { max - c.min(max) } else { c.min(max) };
                levels.push(v);
            }
        }
    }
    from_levels(w, h, tuple, depth, levels)
}

fn noise(w: u32, h: u32, tuple: TupleType, depth: u8) -> Image {
    let max = u64::from(max_for_bits(depth));
    let n = w as usize * h as usize * tuple.channels();
    let mut state: u32 = 0xDEAD_BEEF;
    let levels = (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (u64::from(state) % (max + 1)) as u32
        })
        .collect();
    from_levels(w, h, tuple, depth, levels)
}

fn roundtrip(request: &EncodeRequest<'_>, image: &Image) -> Image {
    let encoded = request.encode(image, Unstoppable).unwrap();
    let mut frames = DecodeRequest::new(&encoded).decode_all(Unstoppable).unwrap();
    assert_eq!(frames.len(), 1);
    frames.remove(0)
}

fn assert_same(got: &Image, want: &Image) {
    assert_eq!((got.width(), got.height()), (want.width(), want.height()));
    assert_eq!(got.tuple_type(), want.tuple_type());
    assert_eq!(got.samples(), want.samples());
}

// ── PNM roundtrips ───────────────────────────────────────────────────

#[test]
fn noise_pnm_binary() {
    let cases = [
        (PnmFormat::Pgm, TupleType::Gray, 8),
        (PnmFormat::Pgm, TupleType::Gray, 16),
        (PnmFormat::Ppm, TupleType::Rgb, 8),
        (PnmFormat::Ppm, TupleType::Rgb, 16),
        (PnmFormat::Pam, TupleType::GrayAlpha, 8),
        (PnmFormat::Pam, TupleType::Rgba, 16),
        (PnmFormat::Pam, TupleType::Cmyk, 8),
    ];
    for (format, tuple, depth) in cases {
        let image = noise(13, 7, tuple, depth);
        let back = roundtrip(&EncodeRequest::pnm(format), &image);
        assert_same(&back, &image);
        assert_eq!(back.depth, depth, "{format:?} {tuple:?}");
    }
}

#[test]
fn noise_pnm_ascii() {
    for (format, tuple) in [(PnmFormat::Pgm, TupleType::Gray), (PnmFormat::Ppm, TupleType::Rgb)] {
        for depth in [8, 16] {
            let image = noise(11, 5, tuple, depth);
            assert_same(&roundtrip(&EncodeRequest::pnm_ascii(format), &image), &image);
        }
    }
}

#[test]
fn checkerboard_pbm() {
    let image = checkerboard(17, 9, TupleType::Gray, 1);
    for request in [EncodeRequest::pnm(PnmFormat::Pbm), EncodeRequest::pnm_ascii(PnmFormat::Pbm)] {
        assert_same(&roundtrip(&request, &image), &image);
    }
}

#[test]
fn pam_low_maxval_scales() {
    let data = b"P7\nWIDTH 4\nHEIGHT 1\nDEPTH 1\nMAXVAL 3\nTUPLTYPE grayscale\nENDHDR\n\x00\x01\x02\x03";
    let image = DecodeRequest::new(data).decode_all(Unstoppable).unwrap().remove(0);
    assert_eq!(image.tuple_type(), TupleType::Gray);
    let levels: Vec<u32> = image.samples().iter().map(|&q| from_quantum(q, 3)).collect();
    assert_eq!(levels, [0, 1, 2, 3]);
}

#[test]
fn pam_extra_channels_are_skipped() {
    let data = b"P7\nWIDTH 2\nHEIGHT 1\nDEPTH 3\nMAXVAL 255\nTUPLTYPE GRAYSCALE_ALPHA\nENDHDR\n\x10\xFF\x99\x20\x80\x99";
    let image = DecodeRequest::new(data).decode_all(Unstoppable).unwrap().remove(0);
    assert_eq!(image.tuple_type(), TupleType::GrayAlpha);
    let levels: Vec<u32> = image.samples().iter().map(|&q| from_quantum(q, 255)).collect();
    assert_eq!(levels, [0x10, 0xFF, 0x20, 0x80]);
}

#[test]
fn pfm_little_endian_gray() {
    let mut data = b"Pf\n2 1\n-1.0\n".to_vec();
    for v in [0.25f32, 1.0] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    let image = DecodeRequest::new(&data).decode_all(Unstoppable).unwrap().remove(0);
    assert_eq!(image.sample_format, SampleFormat::Float);
    assert_eq!(image.endian, Endian::Little);
    assert_eq!(image.samples()[1], QUANTUM_RANGE);
    let quarter = f64::from(QUANTUM_RANGE) * 0.25;
    assert!((f64::from(image.samples()[0]) - quarter).abs() <= 1.0);
}

// ── TIFF roundtrips ──────────────────────────────────────────────────

#[test]
fn tiff_gray_bit_depths() {
    for depth in [2, 4, 8, 12, 16, 32] {
        let image = noise(19, 6, TupleType::Gray, depth);
        let back = roundtrip(&EncodeRequest::tiff(TiffOptions::new()), &image);
        assert_same(&back, &image);
        assert_eq!(back.depth, depth);
    }
}

#[test]
fn tiff_bilevel_checkerboard() {
    let image = checkerboard(21, 5, TupleType::Gray, 1);
    for opts in [
        TiffOptions::new(),
        TiffOptions::new().with_compression(Compression::PackBits),
        TiffOptions::new().with_endian(Endian::Big),
    ] {
        let back = roundtrip(&EncodeRequest::tiff(opts), &image);
        assert_same(&back, &image);
        assert_eq!(back.property("tiff:photometric"), Some("min-is-white"));
    }
}

#[test]
fn tiff_compression_and_predictor_grid() {
    let image = noise(40, 33, TupleType::Rgba, 16);
    for compression in [Compression::None, Compression::PackBits, Compression::Lzw, Compression::Deflate] {
        for predictor in [false, true] {
            for planar in [false, true] {
                let opts = TiffOptions::new()
                    .with_compression(compression)
                    .with_predictor(predictor)
                    .with_planar(planar)
                    .with_rows_per_strip(5);
                assert_same(&roundtrip(&EncodeRequest::tiff(opts), &image), &image);
            }
        }
    }
}

#[test]
fn tiff_float_samples() {
    let mut image = noise(8, 4, TupleType::Rgb, 16);
    image.sample_format = SampleFormat::Float;
    image.depth = 32;
    let back = roundtrip(&EncodeRequest::tiff(TiffOptions::new()), &image);
    assert_eq!(back.sample_format, SampleFormat::Float);
    assert_eq!(back.depth, 32);
    for (a, b) in back.samples().iter().zip(image.samples()) {
        assert!((i64::from(*a) - i64::from(*b)).abs() <= 1);
    }
}

#[test]
fn tiff_palette() {
    let q = QUANTUM_RANGE;
    let mut image = Image::from_samples(3, 2, TupleType::Indexed, vec![0, 1, 2, 2, 1, 0]).unwrap();
    image.colormap = vec![[q, 0, 0], [0, q, 0], [0, 0, q]];
    image.depth = 8;
    let back = roundtrip(&EncodeRequest::tiff(TiffOptions::new()), &image);
    assert_same(&back, &image);
    assert_eq!(back.colormap, image.colormap);
    assert_eq!(back.rgb(back.pixel(2, 0).unwrap()), [0, 0, q]);
}

// ── Edge cases ───────────────────────────────────────────────────────

#[test]
fn single_pixel_everywhere() {
    let image = noise(1, 1, TupleType::Rgb, 8);
    for request in [
        EncodeRequest::pnm(PnmFormat::Ppm),
        EncodeRequest::pnm_ascii(PnmFormat::Ppm),
        EncodeRequest::pnm(PnmFormat::Pam),
        EncodeRequest::tiff(TiffOptions::new()),
        EncodeRequest::tiff(TiffOptions::new().with_tiles(16, 16)),
    ] {
        assert_same(&roundtrip(&request, &image), &image);
    }
}

#[test]
fn wide_and_tall() {
    let wide = noise(4000, 1, TupleType::Gray, 8);
    assert_same(&roundtrip(&EncodeRequest::pnm(PnmFormat::Pgm), &wide), &wide);
    assert_same(&roundtrip(&EncodeRequest::tiff(TiffOptions::new()), &wide), &wide);

    let tall = noise(1, 3000, TupleType::Gray, 8);
    assert_same(&roundtrip(&EncodeRequest::pnm(PnmFormat::Pgm), &tall), &tall);
    assert_same(
        &roundtrip(&EncodeRequest::tiff(TiffOptions::new().with_compression(Compression::Deflate)), &tall),
        &tall,
    );
}

#[test]
fn odd_width_bit_packing() {
    for w in [1, 7, 9, 15, 33] {
        let image = checkerboard(w, 3, TupleType::Gray, 1);
        assert_same(&roundtrip(&EncodeRequest::pnm(PnmFormat::Pbm), &image), &image);
        assert_same(&roundtrip(&EncodeRequest::tiff(TiffOptions::new()), &image), &image);
    }
}

// ── Limits ───────────────────────────────────────────────────────────

#[test]
fn limits_max_width() {
    let image = noise(10, 2, TupleType::Gray, 8);
    let data = EncodeRequest::tiff(TiffOptions::new()).encode(&image, Unstoppable).unwrap();
    let limits = Limits {
        max_width: Some(9),
        ..Default::default()
    };
    let err = DecodeRequest::new(&data).with_limits(&limits).decode(Unstoppable).unwrap_err();
    assert!(matches!(err, RasterError::LimitExceeded(_)));
}

#[test]
fn limits_max_height() {
    let image = noise(2, 10, TupleType::Gray, 8);
    let data = EncodeRequest::pnm(PnmFormat::Pgm).encode(&image, Unstoppable).unwrap();
    let limits = Limits {
        max_height: Some(9),
        ..Default::default()
    };
    let err = DecodeRequest::new(&data).with_limits(&limits).decode(Unstoppable).unwrap_err();
    assert!(matches!(err, RasterError::LimitExceeded(_)));

    let limits = Limits {
        max_height: Some(10),
        ..Default::default()
    };
    assert!(DecodeRequest::new(&data).with_limits(&limits).decode(Unstoppable).is_ok());
}
