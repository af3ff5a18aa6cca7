#![no_main]
use libfuzzer_sys::fuzz_target;
use zenraster::pnm::PnmFormat;
use zenraster::*;

fuzz_target!(|data: &[u8]| {
    // If we can decode it, re-encoding and decoding again must produce identical samples
    let limits = Limits {
        max_pixels: Some(1 << 20),
        ..Limits::default()
    };
    let Ok(frames) = DecodeRequest::new(data).with_limits(&limits).decode_all(enough::Unstoppable) else {
        return;
    };
    // Float samples and associated alpha do not survive re-encoding bit-exact
    if frames.iter().any(|f| {
        f.sample_format != SampleFormat::Unsigned
            || f.alpha_mode == AlphaMode::Associated
            || f.tuple_type().is_indexed()
    }) {
        return;
    }

    for request in [EncodeRequest::pnm(PnmFormat::Pam), EncodeRequest::tiff(TiffOptions::new())] {
        let Ok(encoded) = request.encode_all(&frames, enough::Unstoppable) else {
            continue;
        };
        let Ok(again) = DecodeRequest::new(&encoded).decode_all(enough::Unstoppable) else {
            panic!("re-encoded data failed to decode");
        };
        assert_eq!(frames.len(), again.len());
        for (a, b) in frames.iter().zip(&again) {
            assert_eq!((a.width(), a.height()), (b.width(), b.height()));
            assert_eq!(a.samples(), b.samples(), "roundtrip sample mismatch");
        }
    }
});
