use enough::StopReason;

/// Errors from raster decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RasterError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("malformed header at byte {offset}: {reason}")]
    HeaderMalformed { offset: u64, reason: String },

    #[error("invalid image dimensions: {width}x{height}")]
    DimensionInvalid { width: u64, height: u64 },

    #[error("invalid sample range: {0}")]
    SampleRangeInvalid(String),

    #[error("unexpected end of stream at byte {offset}")]
    UnexpectedEndOfStream { offset: u64 },

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("corrupt image data at byte {offset}: {reason}")]
    CorruptData { offset: u64, reason: String },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} samples, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("aborted by progress monitor at row {row}")]
    Aborted { row: u32 },

    #[error("operation cancelled")]
    Cancelled(StopReason),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat classification of a [`RasterError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    HeaderMalformed,
    DimensionInvalid,
    SampleRangeInvalid,
    UnexpectedEndOfStream,
    UnsupportedCompression,
    ResourceExhausted,
    /// Bad magic, unsupported variant, or pixel data that fails to decode.
    CorruptImage,
    /// Cancelled through [`enough::Stop`] or a progress monitor.
    Cancelled,
    WriteFailed,
}

impl RasterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HeaderMalformed { .. } => ErrorKind::HeaderMalformed,
            Self::DimensionInvalid { .. } => ErrorKind::DimensionInvalid,
            Self::SampleRangeInvalid(_) => ErrorKind::SampleRangeInvalid,
            Self::UnexpectedEndOfStream { .. } => ErrorKind::UnexpectedEndOfStream,
            Self::UnsupportedCompression(_) => ErrorKind::UnsupportedCompression,
            Self::ResourceExhausted(_) | Self::LimitExceeded(_) => ErrorKind::ResourceExhausted,
            Self::UnrecognizedFormat
            | Self::UnsupportedVariant(_)
            | Self::CorruptData { .. }
            | Self::BufferTooSmall { .. } => ErrorKind::CorruptImage,
            Self::Aborted { .. } | Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::WriteFailed,
        }
    }

    /// Byte offset in the input stream where the failure was detected, if known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::HeaderMalformed { offset, .. }
            | Self::UnexpectedEndOfStream { offset }
            | Self::CorruptData { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Shift a buffer-relative offset to a stream-relative one.
    pub(crate) fn rebase(self, base: u64) -> Self {
        match self {
            Self::HeaderMalformed { offset, reason } => Self::HeaderMalformed {
                offset: offset + base,
                reason,
            },
            Self::UnexpectedEndOfStream { offset } => Self::UnexpectedEndOfStream {
                offset: offset + base,
            },
            Self::CorruptData { offset, reason } => Self::CorruptData {
                offset: offset + base,
                reason,
            },
            other => other,
        }
    }

    pub(crate) fn header(offset: u64, reason: impl Into<String>) -> Self {
        Self::HeaderMalformed {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<StopReason> for RasterError {
    fn from(r: StopReason) -> Self {
        RasterError::Cancelled(r)
    }
}

impl From<std::collections::TryReserveError> for RasterError {
    fn from(e: std::collections::TryReserveError) -> Self {
        RasterError::ResourceExhausted(e.to_string())
    }
}

// ── Warnings ────────────────────────────────────────────────────────

/// Non-fatal condition noticed while decoding.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Warning {
    #[error("{length} bytes of trailing data at byte {offset}")]
    TrailingData { offset: u64, length: u64 },

    #[error("end of file while looking for frame {frame}")]
    UnexpectedEndOfFile { frame: u32 },

    #[error("unknown TIFF tag {tag} ignored")]
    UnknownTag { tag: u16 },

    #[error("field ignored: {0}")]
    IgnoredField(String),
}

/// Receiver for [`Warning`]s, passed explicitly to every decode entry point.
pub trait WarningSink {
    fn warn(&mut self, warning: Warning);
}

impl WarningSink for Vec<Warning> {
    fn warn(&mut self, warning: Warning) {
        self.push(warning);
    }
}

/// Forwards warnings to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_shifts_offsets() {
        let e = RasterError::UnexpectedEndOfStream { offset: 4 }.rebase(100);
        assert_eq!(e.offset(), Some(104));
        assert_eq!(e.kind(), ErrorKind::UnexpectedEndOfStream);

        let e = RasterError::SampleRangeInvalid("zero".into()).rebase(100);
        assert_eq!(e.offset(), None);
    }

    #[test]
    fn vec_sink_collects() {
        let mut sink: Vec<Warning> = Vec::new();
        sink.warn(Warning::UnknownTag { tag: 999 });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].to_string(), "unknown TIFF tag 999 ignored");
    }
}
