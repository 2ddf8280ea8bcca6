//! Host transport adapter.
//!
//! An embedding environment supplies five byte-level primitives: read at an
//! offset, report the input length, write sequentially, seek, and report the
//! current output position. [`HostSource`] and [`HostSink`] describe those
//! primitives; [`TransportReader`] and [`TransportWriter`] wrap them behind
//! the stricter [`MkvReader`]/[`MkvWriter`] contracts the parser and output
//! builder rely on.
//!
//! A handful of ready-made hosts cover the common cases: in-memory buffers,
//! a counting sink that only measures output size, any `std::io` stream, and
//! plain closures.

use crate::io::{MkvReader, MkvWriter, StreamLength};
use crate::{Error, Result};
use bytes::Bytes;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Input-side host primitives.
pub trait HostSource {
    /// Read up to `buf.len()` bytes at `position`, returning how many were read.
    fn read_at(&mut self, buf: &mut [u8], position: u64) -> io::Result<usize>;

    /// Report the total and available input length.
    fn query_length(&mut self) -> io::Result<StreamLength>;
}

/// Output-side host primitives.
pub trait HostSink {
    /// Write up to `buf.len()` bytes, returning how many were written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Move the write offset to `position`.
    fn seek(&mut self, position: u64) -> io::Result<()>;

    /// Current write offset.
    fn current_position(&mut self) -> u64;
}

/// [`MkvReader`] over a [`HostSource`].
#[derive(Debug)]
pub struct TransportReader<S> {
    source: S,
}

impl<S: HostSource> TransportReader<S> {
    /// Wrap a host source.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Get the wrapped source back.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: HostSource> MkvReader for TransportReader<S> {
    fn read(&mut self, position: i64, buf: &mut [u8]) -> Result<()> {
        if position < 0 {
            return Err(Error::invalid_offset("read position", position));
        }
        let position = position as u64;

        let got = self.source.read_at(buf, position)?;
        if got < buf.len() {
            return Err(Error::short_read(position, buf.len(), got));
        }

        Ok(())
    }

    fn length(&mut self) -> Result<StreamLength> {
        Ok(self.source.query_length()?)
    }
}

/// [`MkvWriter`] over a [`HostSink`].
///
/// Always reports itself seekable: finalizing a file-mode segment rewrites
/// sizes behind the current position.
#[derive(Debug)]
pub struct TransportWriter<K> {
    sink: K,
}

impl<K: HostSink> TransportWriter<K> {
    /// Wrap a host sink.
    pub fn new(sink: K) -> Self {
        Self { sink }
    }

    /// Borrow the wrapped sink.
    pub fn get_ref(&self) -> &K {
        &self.sink
    }

    /// Get the wrapped sink back.
    pub fn into_inner(self) -> K {
        self.sink
    }
}

impl<K: HostSink> MkvWriter for TransportWriter<K> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let wrote = self.sink.write(buf)?;
        if wrote < buf.len() {
            return Err(Error::short_write(buf.len(), wrote));
        }

        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.sink.current_position())
    }

    fn seek(&mut self, position: i64) -> Result<()> {
        if position < 0 {
            return Err(Error::invalid_offset("seek position", position));
        }
        Ok(self.sink.seek(position as u64)?)
    }

    fn seekable(&self) -> bool {
        true
    }

    fn element_start_notify(&mut self, _element_id: u32, _position: u64) {}
}

/// Input held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Create a source over the given bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl HostSource for MemorySource {
    fn read_at(&mut self, buf: &mut [u8], position: u64) -> io::Result<usize> {
        let len = self.data.len() as u64;
        if position >= len {
            return Ok(0);
        }
        let start = position as usize;
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        Ok(count)
    }

    fn query_length(&mut self) -> io::Result<StreamLength> {
        Ok(StreamLength::complete(self.data.len() as u64))
    }
}

/// Growable in-memory output that honours seeks.
///
/// Writes after a backward seek overwrite existing bytes; writes past the
/// end extend the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    data: Vec<u8>,
    position: usize,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sink with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Take the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl HostSink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.position + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(buf);
        self.position = end;
        Ok(buf.len())
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        if position > self.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {position} past end of {} bytes", self.data.len()),
            ));
        }
        self.position = position as usize;
        Ok(())
    }

    fn current_position(&mut self) -> u64 {
        self.position as u64
    }
}

/// Sink that discards bytes and only tracks the resulting output size.
///
/// Used for a measuring pass ahead of the real write.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink {
    position: u64,
    len: u64,
}

impl CountingSink {
    /// Create an empty counting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the output would have.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl HostSink for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.position += buf.len() as u64;
        self.len = self.len.max(self.position);
        Ok(buf.len())
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = position;
        Ok(())
    }

    fn current_position(&mut self) -> u64 {
        self.position
    }
}

/// Source over any seekable `std::io` reader, such as a file.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
    len: Option<u64>,
}

impl<R: Read + Seek> StreamSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner, len: None }
    }
}

impl<R: Read + Seek> HostSource for StreamSource<R> {
    fn read_at(&mut self, buf: &mut [u8], position: u64) -> io::Result<usize> {
        self.inner.seek(SeekFrom::Start(position))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn query_length(&mut self) -> io::Result<StreamLength> {
        let len = match self.len {
            Some(len) => len,
            None => {
                let len = self.inner.seek(SeekFrom::End(0))?;
                self.len = Some(len);
                len
            }
        };
        Ok(StreamLength::complete(len))
    }
}

/// Sink over any seekable `std::io` writer, such as a file.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> StreamSink<W> {
    /// Wrap a writer positioned at offset 0.
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Flush and return the writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> HostSink for StreamSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn current_position(&mut self) -> u64 {
        self.position
    }
}

/// Source built from a read closure and a length closure.
pub struct FnSource<F, L> {
    read: F,
    length: L,
}

impl<F, L> FnSource<F, L>
where
    F: FnMut(&mut [u8], u64) -> io::Result<usize>,
    L: FnMut() -> io::Result<StreamLength>,
{
    /// Create a source from the host's read and length primitives.
    pub fn new(read: F, length: L) -> Self {
        Self { read, length }
    }
}

impl<F, L> HostSource for FnSource<F, L>
where
    F: FnMut(&mut [u8], u64) -> io::Result<usize>,
    L: FnMut() -> io::Result<StreamLength>,
{
    fn read_at(&mut self, buf: &mut [u8], position: u64) -> io::Result<usize> {
        (self.read)(buf, position)
    }

    fn query_length(&mut self) -> io::Result<StreamLength> {
        (self.length)()
    }
}

/// Sink built from write, seek, and position closures.
pub struct FnSink<W, S, P> {
    write: W,
    seek: S,
    position: P,
}

impl<W, S, P> FnSink<W, S, P>
where
    W: FnMut(&[u8]) -> io::Result<usize>,
    S: FnMut(u64) -> io::Result<()>,
    P: FnMut() -> u64,
{
    /// Create a sink from the host's write, seek, and position primitives.
    pub fn new(write: W, seek: S, position: P) -> Self {
        Self {
            write,
            seek,
            position,
        }
    }
}

impl<W, S, P> HostSink for FnSink<W, S, P>
where
    W: FnMut(&[u8]) -> io::Result<usize>,
    S: FnMut(u64) -> io::Result<()>,
    P: FnMut() -> u64,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.write)(buf)
    }

    fn seek(&mut self, position: u64) -> io::Result<()> {
        (self.seek)(position)
    }

    fn current_position(&mut self) -> u64 {
        (self.position)()
    }
}
