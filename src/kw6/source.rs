//! Seekable byte origin with truncation-aware reads.
//!
//! Wraps any `Read + Seek` stream and tracks the current offset and total
//! length, so that every short read surfaces as [`Kw6Error::Truncated`] with
//! the offset and byte counts needed to diagnose the corrupt region.

use std::io::{Read, Seek, SeekFrom};

use super::error::{Kw6Error, Result};

#[derive(Debug)]
pub(crate) struct ByteSource<S> {
    inner: S,
    len: u64,
    pos: u64,
}

impl<S: Read + Seek> ByteSource<S> {
    /// Wraps `inner`, sampling its total length once and rewinding to the
    /// start. The length stays fixed for the life of the source.
    pub fn new(mut inner: S) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len, pos: 0 })
    }

    /// Total length of the underlying stream in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Current byte offset.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Bytes available between the current offset and end-of-data.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Whether the current offset has reached end-of-data.
    pub fn at_end(&self) -> bool {
        self.pos >= self.len
    }

    /// Moves the current offset to `offset`.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Fills `buf` exactly, or fails with [`Kw6Error::Truncated`] if fewer
    /// bytes remain before end-of-data.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let expected = buf.len() as u64;
        if self.remaining() < expected {
            return Err(Kw6Error::Truncated {
                offset: self.pos,
                expected,
                available: self.remaining(),
            });
        }
        self.inner.read_exact(buf)?;
        self.pos += expected;
        Ok(())
    }

    /// Advances past `n` bytes without reading them, with the same
    /// truncation check as [`read_exact`](Self::read_exact).
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.remaining() < n {
            return Err(Kw6Error::Truncated {
                offset: self.pos,
                expected: n,
                available: self.remaining(),
            });
        }
        self.seek_to(self.pos + n)
    }
}
