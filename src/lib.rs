//! # zenraster
//!
//! Raster pixel codec pipeline: external sample bytes in PNM and TIFF are
//! unpacked, scaled to a fixed-width internal [`Quantum`] and stored row by
//! row in a [`PixelStore`]; writers run the same steps in reverse, and can
//! also emit PostScript/EPS.
//!
//! ## Supported Formats
//!
//! ### PNM family ([`pnm`])
//! - **P1/P4** (PBM) bilevel, **P2/P5** (PGM) gray, **P3/P6** (PPM) RGB,
//!   ASCII and binary, any maxval up to 65535
//! - **P7** (PAM) with named tuple types, alpha and extra samples
//! - **Pf/PF** (PFM) 32-bit float gray and RGB
//! - Concatenated frames
//!
//! ### TIFF ([`tiff`])
//! - Classic and BigTIFF, either byte order, multi-directory
//! - Strips or tiles, contiguous or planar samples
//! - Uncompressed, PackBits, LZW and Deflate, with horizontal predictor
//! - 1–32 bit unsigned, signed and 16/32-bit float samples
//! - Gray, RGB, palette and CMYK, with associated or unassociated alpha
//!
//! ### PostScript ([`ps`], write only)
//! - PS and EPS with bitmap, gray, colormapped and RGB dumps, optionally
//!   run-length encoded
//!
//! ## Non-Goals
//!
//! - Color management
//! - LZW, JPEG and CCITT TIFF compression
//! - Reading PostScript
//!
//! ## Usage
//!
//! ```
//! use zenraster::{DecodeRequest, EncodeRequest, ImageInfo, TiffOptions, Unstoppable};
//!
//! let data: &[u8] = b"P3\n2 1\n255\n255 0 0  0 0 255\n";
//!
//! // Probe without decoding
//! let info = ImageInfo::from_bytes(data)?;
//! assert_eq!((info.width, info.height), (2, 1));
//!
//! // Decode every frame
//! let decoded = DecodeRequest::new(data).decode(Unstoppable)?;
//! let image = &decoded.frames[0];
//!
//! // Re-encode as TIFF
//! let tiff = EncodeRequest::tiff(TiffOptions::new()).encode(image, Unstoppable)?;
//! assert!(tiff.starts_with(b"II*\0"));
//! # Ok::<(), zenraster::RasterError>(())
//! ```

#![forbid(unsafe_code)]

mod decode;
mod encode;
mod error;
mod header;
mod info;
mod limits;
mod pixel;
mod sequence;
mod store;
mod stream;

pub mod interleave;
pub mod pack;
pub mod pnm;
pub mod ps;
pub mod quantum;
pub mod tiff;

// Re-exports
pub use decode::{DecodeOutput, DecodeRequest};
pub use encode::EncodeRequest;
pub use enough::{Stop, Unstoppable};
pub use error::{ErrorKind, LogSink, RasterError, Warning, WarningSink};
pub use header::{Compression, FormatHeader, Resolution, ResolutionUnit};
pub use info::ImageInfo;
pub use interleave::{Interleaver, SampleSpec};
pub use limits::Limits;
pub use pack::{Endian, Packer};
pub use pixel::{AlphaMode, Channel, TupleType};
pub use ps::{PsCompression, PsOptions};
pub use quantum::{QUANTUM_RANGE, Quantum, QuantumScaler, SampleFormat};
pub use sequence::{Codec, ProgressFn, RowMonitor, SceneRange};
pub use store::{Image, PixelStore, Properties};
pub use stream::{ByteReader, ByteWriter};
pub use tiff::TiffOptions;
