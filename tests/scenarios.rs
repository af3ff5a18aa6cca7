//! Decoding scenarios: bilevel polarity, scaling, truncated streams,
//! multi-frame sequences and warnings.

use enough::Unstoppable;
use zenraster::pnm::PnmFormat;
use zenraster::quantum::to_quantum;
use zenraster::*;

fn gray_frame(w: u32, h: u32, level: u32) -> Image {
    let mut image = Image::from_samples(w, h, TupleType::Gray, vec![to_quantum(level, 255); (w * h) as usize]).unwrap();
    image.depth = 8;
    image
}

#[test]
fn pbm_ascii_one_is_black() {
    let out = DecodeRequest::new(b"P1\n2 2\n1 0\n0 1\n").decode(Unstoppable).unwrap();
    let image = &out.frames[0];
    assert_eq!(image.tuple_type(), TupleType::Gray);
    assert!(image.is_bilevel());
    assert_eq!(image.pixel(0, 0).unwrap(), &[0]);
    assert_eq!(image.pixel(1, 0).unwrap(), &[QUANTUM_RANGE]);
    assert_eq!(image.pixel(0, 1).unwrap(), &[QUANTUM_RANGE]);
    assert_eq!(image.pixel(1, 1).unwrap(), &[0]);

    // The writer uses the same polarity.
    let written = EncodeRequest::pnm_ascii(PnmFormat::Pbm).encode(image, Unstoppable).unwrap();
    assert_eq!(written, b"P1\n2 2\n1 0 0 1 \n");
}

#[test]
fn pgm_binary_scales_to_quantum() {
    let out = DecodeRequest::new(b"P5\n4 1\n255\n\x00\x55\xAA\xFF").decode(Unstoppable).unwrap();
    let expected = |s: u64| ((s * QUANTUM_RANGE as u64 + 127) / 255) as Quantum;
    assert_eq!(out.frames[0].samples(), &[0, expected(85), expected(170), QUANTUM_RANGE]);
}

#[test]
fn truncated_stream_keeps_committed_rows() {
    let mut data = b"P5\n100 100\n255\n".to_vec();
    data.extend(std::iter::repeat_n(0x80u8, 100 * 10));

    let mut image = Image::new(100, 100, TupleType::Gray).unwrap();
    let err = pnm::decode_into(&data, &mut image, &Unstoppable).unwrap_err();
    assert!(matches!(err, RasterError::UnexpectedEndOfStream { .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfStream);
    assert_eq!(image.committed_rows(), 10);
    assert_eq!(image.row(9).unwrap()[0], to_quantum(0x80, 255));
    assert_eq!(image.row(10).unwrap()[0], 0);

    let mut image = Image::new(100, 100, TupleType::Gray).unwrap();
    let err = DecodeRequest::new(&data).decode_into(&mut image, Unstoppable).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfStream);
    assert_eq!(image.committed_rows(), 10);

    assert!(DecodeRequest::new(&data).decode(Unstoppable).is_err());
}

#[test]
fn header_round_trip() {
    let mut image = Image::new(640, 480, TupleType::Rgb).unwrap();
    image.depth = 8;
    let encoded = EncodeRequest::pnm(PnmFormat::Ppm).encode(&image, Unstoppable).unwrap();
    let header = pnm::parse_header(&encoded).unwrap();
    assert_eq!((header.width, header.height, header.maxval), (640, 480, 255));
    assert_eq!(header.tuple, TupleType::Rgb);
}

#[test]
fn header_errors() {
    let cases: [(&[u8], ErrorKind); 5] = [
        (b"P5\n0 4\n255\n", ErrorKind::DimensionInvalid),
        (b"P5\n4 4\n0\n", ErrorKind::SampleRangeInvalid),
        (b"P5\n4 4\n65536\n", ErrorKind::SampleRangeInvalid),
        (b"P5\n4 ", ErrorKind::UnexpectedEndOfStream),
        (b"P5\nfour 4\n255\n", ErrorKind::HeaderMalformed),
    ];
    for (data, kind) in cases {
        let err = DecodeRequest::new(data).decode(Unstoppable).unwrap_err();
        assert_eq!(err.kind(), kind, "{:?}: {err}", String::from_utf8_lossy(data));
    }
}

#[test]
fn concatenated_pnm_frames() {
    let frames = [gray_frame(2, 2, 10), gray_frame(3, 1, 20), gray_frame(1, 1, 30)];
    let data = EncodeRequest::pnm(PnmFormat::Pgm).encode_all(&frames, Unstoppable).unwrap();

    let all = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(all.frames.len(), 3);
    assert!(all.warnings.is_empty());
    for (i, (got, want)) in all.frames.iter().zip(&frames).enumerate() {
        assert_eq!(got.scene, i as u32);
        assert_eq!(got.samples(), want.samples());
    }

    let middle = DecodeRequest::new(&data)
        .scenes(SceneRange::new(1, 1))
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(middle.frames.len(), 1);
    assert_eq!((middle.frames[0].width(), middle.frames[0].scene), (3, 1));

    let tail = DecodeRequest::new(&data)
        .scenes(SceneRange {
            first: 1,
            count: None,
        })
        .decode_all(Unstoppable)
        .unwrap();
    assert_eq!(tail.len(), 2);

    let missing = DecodeRequest::new(&data).scenes(SceneRange::single(7)).decode(Unstoppable);
    assert!(missing.is_err());
}

#[test]
fn ping_skips_pixels() {
    let frames = [gray_frame(4, 4, 1), gray_frame(8, 2, 2)];
    let data = EncodeRequest::pnm(PnmFormat::Pgm).encode_all(&frames, Unstoppable).unwrap();
    let headers = DecodeRequest::new(&data).headers().unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!((headers[1].width, headers[1].height), (8, 2));
    assert!(headers[1].offset > headers[0].offset);
}

#[test]
fn trailing_data_is_a_warning() {
    let out = DecodeRequest::new(b"P5\n1 1\n255\n\x07garbage!").decode(Unstoppable).unwrap();
    assert_eq!(out.frames.len(), 1);
    assert_eq!(
        out.warnings,
        vec![Warning::TrailingData {
            offset: 12,
            length: 8
        }]
    );
}

#[test]
fn comments_inherit_across_frames() {
    let data = b"P2\n# first\n1 1\n255\n0\nP2\n1 1\n255\n9\n";
    let out = DecodeRequest::new(data).decode(Unstoppable).unwrap();
    assert_eq!(out.frames[0].property("comment"), Some(" first"));
    assert_eq!(out.frames[1].property("comment"), Some(" first"));
}

#[test]
fn tiff_multi_page() {
    let frames = [gray_frame(5, 3, 40), gray_frame(2, 7, 200)];
    let data = EncodeRequest::tiff(TiffOptions::new()).encode_all(&frames, Unstoppable).unwrap();

    let out = DecodeRequest::new(&data).decode(Unstoppable).unwrap();
    assert_eq!(out.codec, Codec::Tiff);
    assert_eq!(out.frames.len(), 2);
    assert_eq!(out.frames[1].samples(), frames[1].samples());

    let second = DecodeRequest::new(&data).scenes(SceneRange::single(1)).ping(true).decode(Unstoppable).unwrap();
    assert!(second.frames.is_empty());
    assert_eq!((second.headers[0].width, second.headers[0].height), (2, 7));
}

#[test]
fn truncated_tiff_fails() {
    let image = gray_frame(64, 64, 99);
    let data = EncodeRequest::tiff(TiffOptions::new()).encode(&image, Unstoppable).unwrap();
    for cut in [3usize, 8, 100, data.len() / 2] {
        assert!(DecodeRequest::new(&data[..cut]).decode(Unstoppable).is_err(), "cut at {cut}");
    }
}

/// Little-endian 1x1 gray TIFF whose single tile claims `tile` x `tile` pixels.
fn oversized_tile_tiff(tile: u32) -> Vec<u8> {
    let entries: [(u16, u16, u32); 10] = [
        (256, 4, 1),
        (257, 4, 1),
        (258, 3, 8),
        (259, 3, 1),
        (262, 3, 1),
        (277, 3, 1),
        (322, 4, tile),
        (323, 4, tile),
        (324, 4, 8 + 2 + 10 * 12 + 4),
        (325, 4, 1),
    ];
    let mut data = b"II*\0\x08\0\0\0".to_vec();
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&kind.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        if kind == 3 {
            data.extend_from_slice(&(value as u16).to_le_bytes());
            data.extend_from_slice(&[0, 0]);
        } else {
            data.extend_from_slice(&value.to_le_bytes());
        }
    }
    data.extend_from_slice(&[0; 4]);
    data.push(0x7F);
    data
}

#[test]
fn oversized_tiff_tile_hits_memory_limit() {
    let data = oversized_tile_tiff(8192);
    assert_eq!(data.len(), 135);
    let limits = Limits {
        max_memory_bytes: Some(1 << 20),
        ..Default::default()
    };
    let err = DecodeRequest::new(&data).with_limits(&limits).decode(Unstoppable).unwrap_err();
    assert!(matches!(err, RasterError::LimitExceeded(_)), "{err:?}");

    let mut image = Image::new(1, 1, TupleType::Gray).unwrap();
    let err = DecodeRequest::new(&data)
        .with_limits(&limits)
        .decode_into(&mut image, Unstoppable)
        .unwrap_err();
    assert!(matches!(err, RasterError::LimitExceeded(_)), "{err:?}");

    // Within the limit, the short tile is reported instead.
    let out = DecodeRequest::new(&oversized_tile_tiff(16)).with_limits(&limits).decode(Unstoppable);
    assert!(matches!(out, Err(RasterError::UnexpectedEndOfStream { .. })), "{out:?}");
}

#[test]
fn postscript_document() {
    let mut image = gray_frame(3, 2, 128);
    image.set_property("label", "proof");
    let ps = EncodeRequest::ps(PsOptions::new()).encode_all(&[image.clone(), image], Unstoppable).unwrap();
    let text = String::from_utf8(ps).unwrap();
    assert!(text.starts_with("%!PS-Adobe-3.0\n"));
    assert!(text.contains("%%Title: (proof)\n"));
    assert!(text.contains("%%Pages: 2\n"));
    assert!(text.contains("%%Page: 2 2\n"));
    assert!(text.trim_end().ends_with("%%EOF"));
    assert!(text.lines().all(|line| line.len() < 80));
}

#[test]
fn eps_is_single_page() {
    let frames = [gray_frame(1, 1, 0), gray_frame(1, 1, 0)];
    let request = EncodeRequest::ps(PsOptions::eps().with_compression(PsCompression::RunLength));
    assert!(request.encode_all(&frames, Unstoppable).is_err());
    let eps = request.encode(&frames[0], Unstoppable).unwrap();
    assert!(eps.starts_with(b"%!PS-Adobe-3.0 EPSF-3.0\n"));
}
