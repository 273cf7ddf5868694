//! Core data structures for kw6 format components.
//!
//! This module defines the fundamental types used throughout the library:
//! - File, position, and camera headers
//! - Decoded positions, cameras, and images
//! - The format version enumeration

use std::path::Path;

use image::ColorType;

use super::error::Result;

/// kw6 format versions.
///
/// The version string at the start of the file selects the field layout for
/// every record that follows. Layout is resolved here exactly once per file;
/// decode functions receive the version and never re-detect it per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw6Version {
    V1,
}

impl Kw6Version {
    /// Byte length of the file header (the padded version string).
    pub fn file_header_len(&self) -> u64 {
        match self {
            Kw6Version::V1 => 19,
        }
    }

    /// Byte length of one position header.
    ///
    /// V1 stores 6 little-endian doubles.
    pub fn position_header_len(&self) -> u64 {
        match self {
            Kw6Version::V1 => 6 * 8,
        }
    }

    /// Byte length of one camera header.
    ///
    /// V1 stores 34 little-endian doubles, of which the first 14 are
    /// meaningful; the rest are reserved and wear-sensor slots.
    pub fn camera_header_len(&self) -> u64 {
        match self {
            Kw6Version::V1 => 34 * 8,
        }
    }

    /// The payload encoding this version declares for camera images.
    ///
    /// V1 ships exactly one encoding: raw 8-bit grayscale.
    pub fn payload_encoding(&self) -> PayloadEncoding {
        match self {
            Kw6Version::V1 => PayloadEncoding::Raw8,
        }
    }
}

/// Global file metadata, decoded once at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: Kw6Version,
    /// The raw version string as stored in the file, padding stripped.
    pub version_string: String,
}

/// Metadata for one temporal sample.
///
/// All fields are stored as little-endian doubles in the file; integer-valued
/// fields are validated and narrowed during decode.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHeader {
    /// Total byte length of the frame as declared by the writer.
    pub n_frame_bytes: u64,
    pub camera_version: f64,
    /// Format-declared identifier; gaps allowed, non-decreasing across the file.
    pub frame_index: u64,
    pub time: f64,
    pub pulses: f64,
    /// Number of camera records that follow this header.
    pub camera_count: u32,
}

/// Metadata for one camera's payload at a position.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraHeader {
    pub camera_version: f64,
    pub camera_index: u32,
    pub scale_height: f64,
    pub scale_length: f64,
    pub x_mm: f64,
    pub y_mm: f64,
    pub x_pixel_center: f64,
    pub y_pixel_center: f64,
    pub sub_sample: f64,
    pub exposure_ms: f64,
    pub x0: f64,
    pub y0: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// How the payload bytes are encoded, fixed by the file version.
    pub encoding: PayloadEncoding,
}

impl CameraHeader {
    /// Byte length of this camera's payload.
    ///
    /// Raw 8-bit grayscale stores one byte per pixel.
    pub fn payload_len(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Encoding of a camera's payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Uncompressed 8-bit grayscale, row-major, one byte per pixel.
    Raw8,
    /// PNG-compressed raster, decoded via the `image` crate.
    Png,
}

/// One temporal sample: its header plus one camera record per active camera,
/// in physical camera slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub header: PositionHeader,
    pub cameras: Vec<Camera>,
}

/// One camera's decoded contribution to a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub header: CameraHeader,
    pub image: Image,
}

/// A decoded raster buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl Image {
    pub(crate) fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len() as u64,
            width as u64 * height as u64 * channels as u64
        );
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of channels per pixel: 1 for grayscale, 3 for RGB.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Row-major pixel bytes, `width * height * channels` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Writes the image to `path` in a format inferred from its extension
    /// (e.g. `.png`).
    ///
    /// # Errors
    /// Returns an error if the format is unrecognized or the file cannot be
    /// written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let color = match self.channels {
            1 => ColorType::L8,
            _ => ColorType::Rgb8,
        };
        image::save_buffer(path, &self.pixels, self.width, self.height, color)?;
        Ok(())
    }
}
