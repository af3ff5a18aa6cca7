#![no_main]
use libfuzzer_sys::fuzz_target;
use zenraster::{DecodeRequest, ImageInfo, Limits, SceneRange};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(64 << 20),
        ..Limits::default()
    };

    // Auto-detect decode must never panic
    let _ = DecodeRequest::new(data).with_limits(&limits).decode(enough::Unstoppable);

    // Header-only paths
    let _ = ImageInfo::from_bytes(data);
    let _ = DecodeRequest::new(data).ping(true).decode(enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .with_limits(&limits)
        .scenes(SceneRange::single(1))
        .decode(enough::Unstoppable);
});
