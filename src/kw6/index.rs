//! Lazy, memoized position offset table.
//!
//! The kw6 format carries no trailer or index block: a position's byte
//! extent is only discoverable by walking past its camera records. The
//! [`PositionIndex`] therefore builds its offset table incrementally, as an
//! append-only mapping from sequence index to byte offset plus a
//! forward-only cursor, so that repeated random access over already-visited
//! ranges is O(1) while one-pass streaming stays one-pass.
//!
//! Entries are recorded only after a position's full extent has been
//! validated, and once recorded are never rewritten for the life of the
//! reader.

use std::io::{Read, Seek};

use log::{debug, trace};

use super::error::{Kw6Error, Result};
use super::header;
use super::models::Kw6Version;
use super::source::ByteSource;

/// One discovered position: where it starts and which frame it carries.
///
/// The frame index is decoded during discovery anyway; keeping it allows
/// frame-based lookup to binary-search the table instead of re-reading
/// headers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexEntry {
    pub offset: u64,
    pub frame_index: u64,
}

#[derive(Debug)]
pub(crate) struct PositionIndex {
    version: Kw6Version,
    entries: Vec<IndexEntry>,
    /// Byte offset where position `entries.len()` begins.
    next_offset: u64,
    /// Set once the cursor has reached end-of-data; from then on
    /// `entries.len()` is the total position count.
    complete: bool,
}

impl PositionIndex {
    pub fn new(version: Kw6Version) -> Self {
        Self {
            version,
            entries: Vec::new(),
            next_offset: version.file_header_len(),
            complete: false,
        }
    }

    /// Builds an index pre-seeded from a sidecar byte index.
    ///
    /// The seed must enumerate positions in file order starting at the first
    /// one; all but the last entry become table rows, the last becomes the
    /// scan cursor since its extent is unknown until walked.
    pub fn seeded(version: Kw6Version, mut seed: Vec<IndexEntry>) -> Result<Self> {
        if let Some(first) = seed.first() {
            if first.offset != version.file_header_len() {
                return Err(Kw6Error::InvalidSidecar(format!(
                    "first entry starts at offset {}, expected {}",
                    first.offset,
                    version.file_header_len()
                )));
            }
        }
        for pair in seed.windows(2) {
            if pair[1].offset <= pair[0].offset {
                return Err(Kw6Error::InvalidSidecar(format!(
                    "byte offsets not strictly increasing at {}",
                    pair[1].offset
                )));
            }
            if pair[1].frame_index < pair[0].frame_index {
                return Err(Kw6Error::InvalidSidecar(format!(
                    "frame index {} decreases after {}",
                    pair[1].frame_index, pair[0].frame_index
                )));
            }
        }
        let Some(last) = seed.pop() else {
            return Ok(Self::new(version));
        };
        debug!(
            "Seeded position index with {} entries, cursor at {}",
            seed.len(),
            last.offset
        );
        Ok(Self {
            version,
            entries: seed,
            next_offset: last.offset,
            complete: false,
        })
    }

    /// Number of positions discovered so far.
    pub fn discovered(&self) -> usize {
        self.entries.len()
    }

    /// Byte offset of sequence index `index`, scanning forward from the
    /// cursor only as far as necessary.
    ///
    /// # Errors
    /// [`Kw6Error::IndexOutOfRange`] if end-of-data is reached before slot
    /// `index` exists; at that point the reported count is the file total.
    pub fn offset_of<S: Read + Seek>(
        &mut self,
        source: &mut ByteSource<S>,
        index: usize,
    ) -> Result<u64> {
        while self.entries.len() <= index {
            if !self.discover_next(source)? {
                return Err(Kw6Error::IndexOutOfRange {
                    index: index as i64,
                    count: self.entries.len(),
                });
            }
        }
        Ok(self.entries[index].offset)
    }

    /// Total number of positions, scanning to end-of-data on first call.
    pub fn count<S: Read + Seek>(&mut self, source: &mut ByteSource<S>) -> Result<usize> {
        while self.discover_next(source)? {}
        Ok(self.entries.len())
    }

    /// Sequence index of the first position carrying `frame_index`.
    ///
    /// Frame indices are non-decreasing across the file, so discovered
    /// entries are binary-searched and the forward scan stops as soon as a
    /// larger frame is seen.
    pub fn find_frame<S: Read + Seek>(
        &mut self,
        source: &mut ByteSource<S>,
        frame_index: u64,
    ) -> Result<usize> {
        let at = self.entries.partition_point(|e| e.frame_index < frame_index);
        if at < self.entries.len() {
            return if self.entries[at].frame_index == frame_index {
                Ok(at)
            } else {
                Err(Kw6Error::FrameNotFound(frame_index))
            };
        }
        loop {
            if !self.discover_next(source)? {
                return Err(Kw6Error::FrameNotFound(frame_index));
            }
            let last = self.entries.last().expect("entry just discovered");
            if last.frame_index == frame_index {
                return Ok(self.entries.len() - 1);
            }
            if last.frame_index > frame_index {
                return Err(Kw6Error::FrameNotFound(frame_index));
            }
        }
    }

    /// Walks one position record forward from the cursor, recording its
    /// entry. Returns `false` once end-of-data has been reached.
    ///
    /// The walk decodes the position header and each camera header but skips
    /// payload bytes; payloads are only read when a position is actually
    /// decoded.
    fn discover_next<S: Read + Seek>(&mut self, source: &mut ByteSource<S>) -> Result<bool> {
        if self.complete {
            return Ok(false);
        }
        if self.next_offset >= source.len() {
            self.complete = true;
            debug!("Position index complete: {} positions", self.entries.len());
            return Ok(false);
        }

        let start = self.next_offset;
        source.seek_to(start)?;
        let position = header::read_position_header(source, self.version)?;

        if let Some(last) = self.entries.last() {
            if position.frame_index < last.frame_index {
                return Err(Kw6Error::InvalidHeader {
                    offset: start,
                    reason: format!(
                        "frame index {} decreases after {}",
                        position.frame_index, last.frame_index
                    ),
                });
            }
        }

        for consumed in 0..position.camera_count {
            if source.at_end() {
                return Err(Kw6Error::SizeMismatch {
                    context: "camera records",
                    expected: position.camera_count as u64,
                    found: consumed as u64,
                });
            }
            let camera = header::read_camera_header(source, self.version)?;
            source.skip(camera.payload_len())?;
        }

        trace!(
            "Discovered position {} (frame {}) at offset {}",
            self.entries.len(),
            position.frame_index,
            start
        );
        self.entries.push(IndexEntry {
            offset: start,
            frame_index: position.frame_index,
        });
        self.next_offset = source.tell();
        Ok(true)
    }
}
