//! # kw6-reader
//!
//! A reader for kw6 rail-inspection camera container files.
//! Supports format version 1.0 with lazy position indexing, sidecar byte
//! indexes, and random, sliced, and sequential access to decoded images.
pub mod kw6;

// Re-export the main types for convenience
pub use kw6::{
    models::{
        Camera, CameraHeader, FileHeader, Image, Kw6Version, PayloadEncoding, Position,
        PositionHeader,
    },
    Kw6Error, Positions, Reader, Result, Slice,
};
