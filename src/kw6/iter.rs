//! Sequential iteration over decoded positions.
//!
//! [`Positions`] walks the file in storage order, decoding one position per
//! step and memoizing offsets in the reader's index as it goes. Iteration is
//! restartable: a fresh iterator over the same reader re-serves
//! already-visited positions from the offset table without re-scanning.
//!
//! # Example
//! ```no_run
//! # use kw6_reader::Reader;
//! # let mut reader = Reader::open("rail.kw6").unwrap();
//! for result in reader.iter_positions() {
//!     let position = result.unwrap();
//!     println!("frame {}", position.header.frame_index);
//! }
//! ```

use std::io::{Read, Seek};

use super::error::{Kw6Error, Result};
use super::models::Position;
use super::reader::Reader;

/// Iterator over all positions in storage order.
///
/// Yields `Result<Position>`: end-of-data terminates the iterator cleanly,
/// while a corrupt or truncated record is yielded as `Err` exactly once,
/// after which the iterator is fused. Positions decoded before the corrupt
/// region remain accessible through the reader.
///
/// Created by [`Reader::iter_positions()`](crate::Reader::iter_positions).
pub struct Positions<'a, S: Read + Seek> {
    reader: &'a mut Reader<S>,
    next: usize,
    done: bool,
}

impl<'a, S: Read + Seek> Positions<'a, S> {
    pub(super) fn new(reader: &'a mut Reader<S>) -> Self {
        Self {
            reader,
            next: 0,
            done: false,
        }
    }
}

impl<S: Read + Seek> Iterator for Positions<'_, S> {
    type Item = Result<Position>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_position_at(self.next) {
            Ok(position) => {
                self.next += 1;
                Some(Ok(position))
            }
            Err(Kw6Error::IndexOutOfRange { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
