//! Custom error types for the kw6-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum Kw6Error {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file declares a kw6 version the codec does not know how to interpret.
    #[error("Unsupported kw6 version: {0:?}. Only KW6FileClassVer1.0 is supported.")]
    UnsupportedVersion(String),

    /// Fewer bytes were available than a header or payload declares.
    #[error("Truncated file: needed {expected} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: u64,
        expected: u64,
        available: u64,
    },

    /// Header bytes decode to a structurally invalid value.
    #[error("Invalid header at offset {offset}: {reason}")]
    InvalidHeader { offset: u64, reason: String },

    /// A declared size or count disagrees with what was actually found.
    #[error("Size mismatch for {context}: expected {expected}, but found {found}")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// The requested sequence index exceeds the number of positions in the file.
    #[error("Position index {index} out of range: file contains {count} positions")]
    IndexOutOfRange { index: i64, count: usize },

    /// An image payload failed to decode or an image failed to write.
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// No position in the file carries the requested frame index.
    #[error("Frame index {0} not present in file")]
    FrameNotFound(u64),

    /// A slice request used a step of zero.
    #[error("Slice step cannot be zero")]
    InvalidSlice,

    /// A sidecar byte index is unordered or inconsistent with the file layout.
    #[error("Invalid sidecar index: {0}")]
    InvalidSidecar(String),
}

/// A convenience `Result` type alias using the crate's `Kw6Error` type.
pub type Result<T> = std::result::Result<T, Kw6Error>;
