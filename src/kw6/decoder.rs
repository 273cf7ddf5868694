//! Image payload decoding.
//!
//! Converts a camera's raw payload bytes into a structured pixel buffer:
//! - `Raw8` (the only encoding kw6 v1.0 declares): validate and reshape
//! - `Png`: delegate to the `image` crate's in-memory decoder
//!
//! Declared dimensions are authoritative; a payload or decode result that
//! disagrees with them is corruption, never silently truncated or padded.

use log::trace;

use super::error::{Kw6Error, Result};
use super::models::{Image, PayloadEncoding};

/// Decodes `payload` into a `width` x `height` pixel buffer.
///
/// # Errors
/// - [`Kw6Error::SizeMismatch`] if a raw payload's length differs from
///   `width * height`, or a compressed payload decodes to other dimensions
/// - [`Kw6Error::Decode`] if the underlying raster decoder fails; the
///   original cause is preserved
pub fn decode(
    payload: Vec<u8>,
    width: u32,
    height: u32,
    encoding: PayloadEncoding,
) -> Result<Image> {
    let expected = width as u64 * height as u64;
    match encoding {
        PayloadEncoding::Raw8 => {
            trace!("Decoding raw payload: {}x{}, {} bytes", width, height, payload.len());
            if payload.len() as u64 != expected {
                return Err(Kw6Error::SizeMismatch {
                    context: "raw image payload",
                    expected,
                    found: payload.len() as u64,
                });
            }
            Ok(Image::new(width, height, 1, payload))
        }
        PayloadEncoding::Png => {
            trace!("Decoding compressed payload: {} bytes", payload.len());
            let decoded = image::load_from_memory(&payload)?;
            if decoded.width() != width || decoded.height() != height {
                return Err(Kw6Error::SizeMismatch {
                    context: "decoded image dimensions",
                    expected,
                    found: decoded.width() as u64 * decoded.height() as u64,
                });
            }
            match decoded {
                image::DynamicImage::ImageLuma8(buffer) => {
                    Ok(Image::new(width, height, 1, buffer.into_raw()))
                }
                other => Ok(Image::new(width, height, 3, other.to_rgb8().into_raw())),
            }
        }
    }
}
