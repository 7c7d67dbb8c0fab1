//! Stream adapter — a thin positional wrapper over the byte source.
//!
//! The player reads recordings from anything implementing `Read + Seek`; this
//! adapter owns no data of its own and only normalizes the surface: every
//! offset is 64-bit regardless of the on-disk format, and a read that returns
//! fewer bytes than requested surfaces as `ShortRead` rather than a silent
//! partial buffer.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Seek origin for stream and player positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Set,
    Cur,
    End,
}

pub struct StreamAdapter<S> {
    inner: Option<S>,
}

impl<S: Read + Seek> StreamAdapter<S> {
    pub fn new(inner: S) -> Self {
        Self { inner: Some(inner) }
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.inner.as_mut().ok_or(Error::InvalidOperation("stream is closed"))
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Fill `buf` completely or fail with `ShortRead`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let stream = self.stream()?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::ShortRead { wanted: buf.len(), got: filled });
            }
            filled += n;
        }
        Ok(())
    }

    pub fn seek(&mut self, origin: SeekOrigin, offset: i64) -> Result<u64> {
        let from = match origin {
            SeekOrigin::Set => SeekFrom::Start(offset as u64),
            SeekOrigin::Cur => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        Ok(self.stream()?.seek(from)?)
    }

    /// Absolute 64-bit position shorthand.
    pub fn seek_to(&mut self, pos: u64) -> Result<u64> {
        Ok(self.stream()?.seek(SeekFrom::Start(pos))?)
    }

    /// Skip forward without reading.
    pub fn skip(&mut self, bytes: u64) -> Result<u64> {
        Ok(self.stream()?.seek(SeekFrom::Current(bytes as i64))?)
    }

    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.stream()?.stream_position()?)
    }

    /// Drop the underlying stream; subsequent calls fail with
    /// `InvalidOperation`.  Idempotent.
    pub fn close(&mut self) {
        self.inner = None;
    }
}
