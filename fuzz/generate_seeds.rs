#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // PBM ASCII and binary
    fs::write(format!("{dir}/pbm_ascii.pbm"), b"P1\n2 2\n1 0\n0 1\n").unwrap();
    fs::write(format!("{dir}/pbm_3x1.pbm"), b"P4\n3 1\n\xa0").unwrap();

    // PGM ASCII, PGM binary, 16-bit PPM
    fs::write(format!("{dir}/pgm_ascii.pgm"), b"P2\n# seed\n3 1\n15\n0 7 15\n").unwrap();
    fs::write(format!("{dir}/pgm_3x2.pgm"), b"P5\n3 2\n255\n\x00\x40\x80\xc0\xff\x64").unwrap();
    fs::write(format!("{dir}/ppm16_1x1.ppm"), b"P6\n1 1\n65535\n\xff\xff\x00\x00\x12\x34").unwrap();

    // PAM RGBA 1x1, then concatenated frames
    let pam = b"P7\nWIDTH 1\nHEIGHT 1\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n\xff\x00\x00\xff";
    fs::write(format!("{dir}/pam_rgba_1x1.pam"), pam).unwrap();
    fs::write(format!("{dir}/two_frames.pgm"), b"P5\n1 1\n255\n\x10P5\n1 1\n255\n\x20").unwrap();

    // PFM gray 1x1
    let mut pfm = b"Pf\n1 1\n-1.0\n".to_vec();
    pfm.extend_from_slice(&1.0f32.to_le_bytes());
    fs::write(format!("{dir}/pfm_gray_1x1.pfm"), pfm).unwrap();

    // Minimal little-endian TIFF: 2x1 8-bit gray, one strip
    let mut tiff = b"II*\0".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    let entries: [(u16, u16, u32, u32); 8] = [
        (256, 3, 1, 2),   // ImageWidth
        (257, 3, 1, 1),   // ImageLength
        (258, 3, 1, 8),   // BitsPerSample
        (259, 3, 1, 1),   // Compression
        (262, 3, 1, 1),   // Photometric
        (273, 4, 1, 110), // StripOffsets
        (278, 3, 1, 1),   // RowsPerStrip
        (279, 4, 1, 2),   // StripByteCounts
    ];
    tiff.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, count, value) in entries {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&kind.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(&[0x00, 0xff]);
    fs::write(format!("{dir}/tiff_gray_2x1.tif"), tiff).unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/just_p6.bin"), b"P6").unwrap();
    fs::write(format!("{dir}/tiff_short.bin"), b"II*\0\x08\0\0\0").unwrap();
    fs::write(format!("{dir}/p7_no_endhdr.bin"), b"P7\nWIDTH 1\nHEIGHT 1\n").unwrap();

    println!("Generated seed corpus in {dir}/");
}
