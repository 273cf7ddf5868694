//! Header decoding for the three fixed-size kw6 record shapes.
//!
//! All numeric header fields are IEEE-754 doubles, little-endian. Integer
//! valued quantities (frame index, camera count, raster dimensions) are
//! stored as integral doubles and narrowed here with validation. The file
//! version selects the field layout once at open; the decode functions
//! receive it and never re-detect the version per record.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use super::error::{Kw6Error, Result};
use super::models::{CameraHeader, FileHeader, Kw6Version, PositionHeader};
use super::source::ByteSource;

/// Magic prefix of the version string stored at offset 0.
pub const VERSION_MAGIC: &str = "KW6FileClassVer";

/// Byte length of the version field at offset 0. The field must be read
/// before the version is known, so its length cannot depend on it.
pub const VERSION_FIELD_LEN: usize = 19;

/// Decodes the file header from the byte window at offset 0.
///
/// # Header Structure
/// ```text
/// [19 bytes] ASCII version string, e.g. "KW6FileClassVer1.0",
///            padded with whitespace/NUL
/// ```
///
/// # Errors
/// - [`Kw6Error::InvalidHeader`] if the magic prefix is missing or the
///   bytes are not ASCII text
/// - [`Kw6Error::UnsupportedVersion`] if the magic is present but the
///   version suffix is unknown
pub fn decode_file_header(bytes: &[u8]) -> Result<FileHeader> {
    let text = std::str::from_utf8(bytes).map_err(|_| Kw6Error::InvalidHeader {
        offset: 0,
        reason: "file header is not ASCII text".to_string(),
    })?;
    let version_string = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    trace!("File version string: {:?}", version_string);

    let Some(version_suffix) = version_string.strip_prefix(VERSION_MAGIC) else {
        return Err(Kw6Error::InvalidHeader {
            offset: 0,
            reason: format!("missing {:?} magic, found {:?}", VERSION_MAGIC, version_string),
        });
    };

    let version = match version_suffix {
        "1.0" => Kw6Version::V1,
        _ => return Err(Kw6Error::UnsupportedVersion(version_string.to_string())),
    };
    debug!("kw6 version: {:?} ({})", version, version_string);

    Ok(FileHeader {
        version,
        version_string: version_string.to_string(),
    })
}

/// Decodes one position header from a fixed-size byte window.
///
/// `offset` is the window's byte offset in the file, used for error context
/// only.
pub fn decode_position_header(
    bytes: &[u8],
    version: Kw6Version,
    offset: u64,
) -> Result<PositionHeader> {
    debug_assert_eq!(bytes.len() as u64, version.position_header_len());
    let fields = read_doubles::<6>(bytes);
    let [n_frame_bytes, camera_version, frame_index, time, pulses, camera_count] = fields;

    Ok(PositionHeader {
        n_frame_bytes: integral_field(n_frame_bytes, "n_frame_bytes", MAX_BYTE_COUNT, offset)?,
        camera_version,
        frame_index: integral_field(frame_index, "frame_index", MAX_FRAME_INDEX, offset)?,
        time,
        pulses,
        camera_count: integral_field(camera_count, "camera_count", MAX_CAMERAS, offset)? as u32,
    })
}

/// Decodes one camera header from a fixed-size byte window.
///
/// V1 windows hold 34 doubles; only the first 14 carry meaning. The
/// remaining 10 reserved and 2x5 wear-sensor slots are not interpreted.
pub fn decode_camera_header(
    bytes: &[u8],
    version: Kw6Version,
    offset: u64,
) -> Result<CameraHeader> {
    debug_assert_eq!(bytes.len() as u64, version.camera_header_len());
    let fields = read_doubles::<14>(bytes);
    let [camera_version, camera_index, scale_height, scale_length, x_mm, y_mm, x_pixel_center, y_pixel_center, sub_sample, exposure_ms, x0, y0, width, height] =
        fields;

    let width = raster_dimension(width, "width", offset)?;
    let height = raster_dimension(height, "height", offset)?;

    Ok(CameraHeader {
        camera_version,
        camera_index: integral_field(camera_index, "camera_index", MAX_CAMERAS, offset)? as u32,
        scale_height,
        scale_length,
        x_mm,
        y_mm,
        x_pixel_center,
        y_pixel_center,
        sub_sample,
        exposure_ms,
        x0,
        y0,
        width,
        height,
        encoding: version.payload_encoding(),
    })
}

/// Largest integral double exactly representable; byte counts and frame
/// indices beyond this cannot have been written faithfully.
const MAX_BYTE_COUNT: u64 = 1 << 53;
const MAX_FRAME_INDEX: u64 = 1 << 53;
const MAX_CAMERAS: u64 = 1024;
const MAX_DIMENSION: u64 = u16::MAX as u64;

fn read_doubles<const N: usize>(bytes: &[u8]) -> [f64; N] {
    let mut fields = [0.0; N];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = LittleEndian::read_f64(&bytes[i * 8..]);
    }
    fields
}

/// Narrows a stored double to an unsigned integer, rejecting NaN, negative,
/// fractional, and implausibly large values as corruption.
fn integral_field(value: f64, name: &'static str, max: u64, offset: u64) -> Result<u64> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > max as f64 {
        return Err(Kw6Error::InvalidHeader {
            offset,
            reason: format!("field {} has implausible value {}", name, value),
        });
    }
    Ok(value as u64)
}

/// Reads and decodes one position header at the source's current offset.
pub(crate) fn read_position_header<S: Read + Seek>(
    source: &mut ByteSource<S>,
    version: Kw6Version,
) -> Result<PositionHeader> {
    let offset = source.tell();
    let mut window = vec![0u8; version.position_header_len() as usize];
    source.read_exact(&mut window)?;
    decode_position_header(&window, version, offset)
}

/// Reads and decodes one camera header at the source's current offset.
pub(crate) fn read_camera_header<S: Read + Seek>(
    source: &mut ByteSource<S>,
    version: Kw6Version,
) -> Result<CameraHeader> {
    let offset = source.tell();
    let mut window = vec![0u8; version.camera_header_len() as usize];
    source.read_exact(&mut window)?;
    decode_camera_header(&window, version, offset)
}

fn raster_dimension(value: f64, name: &'static str, offset: u64) -> Result<u32> {
    let value = integral_field(value, name, MAX_DIMENSION, offset)?;
    if value == 0 {
        return Err(Kw6Error::InvalidHeader {
            offset,
            reason: format!("field {} is zero", name),
        });
    }
    Ok(value as u32)
}
