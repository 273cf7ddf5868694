//! Random and sequential access facade over a kw6 byte stream.

use std::fs::File;
use std::io::{Read, Seek};
use std::ops::Range;
use std::path::Path;

use log::{debug, info};

use super::decoder;
use super::error::{Kw6Error, Result};
use super::header;
use super::index::{IndexEntry, PositionIndex};
use super::iter::Positions;
use super::models::{Camera, FileHeader, Position};
use super::sidecar;
use super::source::ByteSource;

/// A step-aware selection of position indices.
///
/// Bounds follow Python sequence slicing rules: negative values count from
/// the end, out-of-range bounds clamp to the valid range, and an omitted
/// bound defaults to the relevant extreme for the step direction. A plain
/// `Range<i64>` converts to a step-1 slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// First index selected, or the step-direction start when `None`.
    pub start: Option<i64>,
    /// Exclusive upper bound, or the step-direction end when `None`.
    pub stop: Option<i64>,
    /// Distance between selected indices. Must be non-zero; negative steps
    /// select in reverse.
    pub step: i64,
}

impl Default for Slice {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            step: 1,
        }
    }
}

impl From<Range<i64>> for Slice {
    fn from(range: Range<i64>) -> Self {
        Self {
            start: Some(range.start),
            stop: Some(range.end),
            step: 1,
        }
    }
}

/// The main reader for kw6 container files.
///
/// Parses the file header eagerly and everything else lazily: positions are
/// located by walking the container only as far as a request needs, and the
/// offsets found along the way are memoized so that revisiting a position
/// never re-scans. All access methods take `&mut self` since they may
/// advance the scan cursor; results for already-visited positions are
/// identical across repeated calls.
#[derive(Debug)]
pub struct Reader<S> {
    source: ByteSource<S>,
    pub header: FileHeader,
    index: PositionIndex,
}

impl Reader<File> {
    /// Opens the kw6 file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, is shorter than the
    /// version field, or declares an unknown version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening kw6 file: {}", path.display());
        Self::from_stream(File::open(path)?)
    }

    /// Opens the kw6 file at `path`, pre-seeding the offset table from the
    /// sidecar index at `sidecar_path`.
    ///
    /// The sidecar is trusted for the offsets it lists after structural
    /// validation (offsets strictly increasing, frame indices
    /// non-decreasing, first entry directly after the file header); a
    /// sidecar failing those checks yields [`Kw6Error::InvalidSidecar`].
    pub fn open_with_sidecar(
        path: impl AsRef<Path>,
        sidecar_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!(
            "Opening kw6 file: {} with sidecar {}",
            path.display(),
            sidecar_path.as_ref().display()
        );
        let seed = sidecar::load(sidecar_path)?;
        Self::build(File::open(path)?, seed)
    }
}

impl<S: Read + Seek> Reader<S> {
    /// Reads a kw6 container from any seekable byte stream, such as an
    /// in-memory `Cursor`.
    pub fn from_stream(stream: S) -> Result<Self> {
        Self::build(stream, Vec::new())
    }

    fn build(stream: S, seed: Vec<IndexEntry>) -> Result<Self> {
        let mut source = ByteSource::new(stream)?;
        let mut version_field = [0u8; header::VERSION_FIELD_LEN];
        source.read_exact(&mut version_field)?;
        let file_header = header::decode_file_header(&version_field)?;

        let index = if seed.is_empty() {
            PositionIndex::new(file_header.version)
        } else {
            PositionIndex::seeded(file_header.version, seed)?
        };

        Ok(Self {
            source,
            header: file_header,
            index,
        })
    }

    /// Total number of positions in the file.
    ///
    /// The first call scans any not-yet-visited tail of the file to locate
    /// every position; later calls return the memoized count.
    pub fn num_positions(&mut self) -> Result<usize> {
        self.index.count(&mut self.source)
    }

    /// Number of positions whose offsets are already known without further
    /// scanning.
    pub fn positions_discovered(&self) -> usize {
        self.index.discovered()
    }

    /// Decodes the position at `index`.
    ///
    /// Negative indices count from the end, which forces a full scan to
    /// resolve the total count first.
    ///
    /// # Errors
    /// [`Kw6Error::IndexOutOfRange`] if the resolved index does not name a
    /// position.
    pub fn get(&mut self, index: i64) -> Result<Position> {
        let resolved = self.resolve_index(index)?;
        self.read_position_at(resolved)
    }

    /// Decodes every position named in `indices`, in the order given.
    ///
    /// Duplicates and out-of-order indices are served from the offset table
    /// without re-scanning. Fails on the first index that cannot be
    /// resolved or decoded.
    pub fn get_many(&mut self, indices: &[i64]) -> Result<Vec<Position>> {
        indices.iter().map(|&index| self.get(index)).collect()
    }

    /// Decodes the positions selected by `slice`, in selection order.
    ///
    /// A forward slice with non-negative bounds resolves lazily: the scan
    /// stops at the stop bound or end-of-data, whichever comes first,
    /// without counting the rest of the file. Any negative bound or a
    /// negative step resolves the total count first.
    ///
    /// # Errors
    /// [`Kw6Error::InvalidSlice`] if `slice.step` is zero.
    pub fn get_slice(&mut self, slice: impl Into<Slice>) -> Result<Vec<Position>> {
        let slice = slice.into();
        if slice.step == 0 {
            return Err(Kw6Error::InvalidSlice);
        }

        if slice.step > 0
            && slice.start.map_or(true, |s| s >= 0)
            && slice.stop.map_or(true, |s| s >= 0)
        {
            return self.forward_slice(
                slice.start.unwrap_or(0) as usize,
                slice.stop.map(|s| s as usize),
                slice.step as usize,
            );
        }

        let count = self.num_positions()? as i64;
        let (start, stop) = normalize_bounds(&slice, count);
        debug!(
            "Slice {:?} over {} positions resolves to start={}, stop={}",
            slice, count, start, stop
        );
        let mut positions = Vec::new();
        let mut at = start;
        while (slice.step > 0 && at < stop) || (slice.step < 0 && at > stop) {
            positions.push(self.read_position_at(at as usize)?);
            at += slice.step;
        }
        Ok(positions)
    }

    /// Decodes the first position whose header carries `frame_index`.
    ///
    /// Frame indices are non-decreasing across the file, so the lookup
    /// binary-searches already-discovered positions and scans forward only
    /// until a larger frame index proves absence.
    ///
    /// # Errors
    /// [`Kw6Error::FrameNotFound`] if no position carries `frame_index`.
    pub fn get_by_frame(&mut self, frame_index: u64) -> Result<Position> {
        let seq = self.index.find_frame(&mut self.source, frame_index)?;
        self.read_position_at(seq)
    }

    /// Returns an iterator over all positions in storage order.
    ///
    /// The iterator reuses the offset table, so restarting iteration serves
    /// already-visited positions without re-scanning.
    pub fn iter_positions(&mut self) -> Positions<'_, S> {
        Positions::new(self)
    }

    /// Decodes the position at non-negative sequence index `seq`.
    pub(crate) fn read_position_at(&mut self, seq: usize) -> Result<Position> {
        let offset = self.index.offset_of(&mut self.source, seq)?;
        self.decode_position(offset)
    }

    fn resolve_index(&mut self, index: i64) -> Result<usize> {
        if index >= 0 {
            return Ok(index as usize);
        }
        let count = self.num_positions()?;
        let resolved = count as i64 + index;
        if resolved < 0 {
            return Err(Kw6Error::IndexOutOfRange { index, count });
        }
        Ok(resolved as usize)
    }

    /// Lazy path for forward slices with non-negative bounds: walks until
    /// the stop bound or end-of-data without resolving the total count.
    fn forward_slice(
        &mut self,
        start: usize,
        stop: Option<usize>,
        step: usize,
    ) -> Result<Vec<Position>> {
        let mut positions = Vec::new();
        let mut at = start;
        while stop.map_or(true, |s| at < s) {
            match self.read_position_at(at) {
                Ok(position) => positions.push(position),
                Err(Kw6Error::IndexOutOfRange { .. }) => break,
                Err(e) => return Err(e),
            }
            at += step;
        }
        Ok(positions)
    }

    /// Decodes the full position record starting at byte `offset`.
    fn decode_position(&mut self, offset: u64) -> Result<Position> {
        self.source.seek_to(offset)?;
        let position_header =
            header::read_position_header(&mut self.source, self.header.version)?;
        debug!(
            "Decoding position at offset {}: frame {}, {} cameras",
            offset, position_header.frame_index, position_header.camera_count
        );

        let mut cameras = Vec::with_capacity(position_header.camera_count as usize);
        for consumed in 0..position_header.camera_count {
            if self.source.at_end() {
                return Err(Kw6Error::SizeMismatch {
                    context: "camera records",
                    expected: position_header.camera_count as u64,
                    found: consumed as u64,
                });
            }
            let camera_header =
                header::read_camera_header(&mut self.source, self.header.version)?;
            let mut payload = vec![0u8; camera_header.payload_len() as usize];
            self.source.read_exact(&mut payload)?;
            let image = decoder::decode(
                payload,
                camera_header.width,
                camera_header.height,
                camera_header.encoding,
            )?;
            cameras.push(Camera {
                header: camera_header,
                image,
            });
        }

        Ok(Position {
            header: position_header,
            cameras,
        })
    }
}

/// Clamps slice bounds to the valid index range following Python sequence
/// semantics. For a negative step the defaults and clamps shift down by one
/// so the exclusive stop bound can sit below index zero.
fn normalize_bounds(slice: &Slice, count: i64) -> (i64, i64) {
    let (start_default, stop_default, upper, lower) = if slice.step > 0 {
        (0, count, count, 0)
    } else {
        (count - 1, -1, count - 1, -1)
    };
    let clamp = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(v) if v < 0 => (v + count).max(lower),
        Some(v) => v.min(upper),
    };
    (
        clamp(slice.start, start_default),
        clamp(slice.stop, stop_default),
    )
}
