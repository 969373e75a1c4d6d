use crate::fourcc::ChunkId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Bw64Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed container: wrong outer id or form type, truncated header,
    /// illegal field value or a fixed-layout chunk with the wrong size.
    #[error("Format error: {0}")]
    Format(String),

    #[error("missing required chunk '{0}'")]
    MissingRequiredChunk(ChunkId),

    #[error("overflow: {expr} does not fit in {ty}")]
    Overflow { expr: String, ty: &'static str },

    #[error("underflow: {expr} does not fit in {ty}")]
    Underflow { expr: String, ty: &'static str },

    /// The ds64 chunk needed at finalization is larger than the JUNK area
    /// reserved for it when the file was created.
    #[error("ds64 chunk needs {required} bytes but only {reserved} bytes were reserved")]
    Capacity { required: u64, reserved: u64 },

    #[error("unsupported bit depth: {0} (expected 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    /// Lookup of a chunk that is not in the file, or of a ds64 table entry
    /// that does not exist.
    #[error("chunk '{0}' not found")]
    NotFound(ChunkId),

    #[error("buffer too small: need {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl Bw64Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Bw64Error::Format(msg.into())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, Bw64Error>;
