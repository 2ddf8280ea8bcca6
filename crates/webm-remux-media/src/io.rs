//! Byte access interfaces consumed by the parser and the output builder.
//!
//! The parser only ever needs random-access reads plus the stream length;
//! the output builder needs a sequential writer that can seek back once,
//! at finalize time, to patch sizes it could not know up front.

use crate::Result;

/// Total and currently available length of an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLength {
    /// Total length in bytes.
    pub total: u64,
    /// Bytes available for reading right now (may trail `total`).
    pub available: u64,
}

impl StreamLength {
    /// A fully available stream of `len` bytes.
    pub fn complete(len: u64) -> Self {
        Self {
            total: len,
            available: len,
        }
    }
}

/// Random-access reader over the input stream.
pub trait MkvReader {
    /// Fill `buf` completely with the bytes starting at `position`.
    ///
    /// A negative position or a short read is an error; partial results are
    /// never returned.
    fn read(&mut self, position: i64, buf: &mut [u8]) -> Result<()>;

    /// Report the total and available length of the stream.
    fn length(&mut self) -> Result<StreamLength>;
}

/// Sequential writer over the output stream, with seek support.
pub trait MkvWriter {
    /// Write all of `buf` at the current position.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Current write offset.
    fn position(&mut self) -> Result<u64>;

    /// Move the write offset.
    fn seek(&mut self, position: i64) -> Result<()>;

    /// Whether `seek` may be used.
    fn seekable(&self) -> bool;

    /// Called before each top-level element is written.
    fn element_start_notify(&mut self, element_id: u32, position: u64);
}

impl<T: MkvReader + ?Sized> MkvReader for &mut T {
    fn read(&mut self, position: i64, buf: &mut [u8]) -> Result<()> {
        (**self).read(position, buf)
    }

    fn length(&mut self) -> Result<StreamLength> {
        (**self).length()
    }
}

impl<T: MkvWriter + ?Sized> MkvWriter for &mut T {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn position(&mut self) -> Result<u64> {
        (**self).position()
    }

    fn seek(&mut self, position: i64) -> Result<()> {
        (**self).seek(position)
    }

    fn seekable(&self) -> bool {
        (**self).seekable()
    }

    fn element_start_notify(&mut self, element_id: u32, position: u64) {
        (**self).element_start_notify(element_id, position)
    }
}
