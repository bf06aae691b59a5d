use std::fs::{File, OpenOptions};
use std::io::{self, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::{Codec, Compressor, Decompressor};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Default compression level, matching the most-compression end of the 1–9
/// range every bundled codec accepts.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

const MIN_LEVEL: u32 = 1;
const MAX_LEVEL: u32 = 9;

/// How a [`CompressedFile`] is opened. Fixed for the handle's lifetime;
/// read/write is never toggled mid-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read and decompress. The source may be a concatenation of multiple
    /// independently terminated compressed streams.
    Read,
    /// Create or truncate, then compress everything written.
    Write,
    /// Like `Write`, but appends to an existing file. The result is a
    /// concatenated stream that `Read` mode stitches back together.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Reading,
    ReadingAtEof,
    Writing,
    Closed,
}

/// A file-like handle providing transparent sequential (de)compression with
/// emulated seeking.
///
/// The underlying codec only supports strictly sequential push/pull
/// sessions, so backward seeks are realized by rewinding the endpoint and
/// re-reading from the start, and end-relative seeks may require draining
/// the whole stream once to discover its decompressed size. Both are
/// correct but cost time proportional to the data skipped.
///
/// All public operations serialize through one internal lock, so a shared
/// `&CompressedFile` is safe to use from multiple threads (operations are
/// atomic with respect to each other, never interleaved).
pub struct CompressedFile {
    inner: Mutex<Inner>,
}

pub(crate) struct Inner {
    pub(crate) endpoint: Option<Box<dyn Endpoint>>,
    pub(crate) owns_endpoint: bool,
    pub(crate) mode: Mode,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) decompressor: Option<Box<dyn Decompressor>>,
    pub(crate) compressor: Option<Box<dyn Compressor>>,
    /// Decompressed-but-unread bytes; empty means nothing pending.
    pub(crate) pending: Vec<u8>,
    /// Logical (uncompressed) byte offset.
    pub(crate) position: u64,
    /// Decompressed total, known only after one full forward drain.
    pub(crate) total_size: Option<u64>,
}

fn validate_level(level: u32) -> Result<()> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "compression level must be between {MIN_LEVEL} and {MAX_LEVEL}, got {level}"
        )))
    }
}

impl CompressedFile {
    /// Open a compressed file on disk.
    ///
    /// The file is opened, owned, and closed by the handle. `level` is
    /// validated for every mode (1–9) even though only write modes use it.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        codec: Arc<dyn Codec>,
        level: u32,
    ) -> Result<Self> {
        validate_level(level)?;
        let file = match mode {
            OpenMode::Read => File::open(path)?,
            OpenMode::Write => File::create(path)?,
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
        };
        Self::build(Box::new(file), true, mode, codec, level)
    }

    /// Wrap an already-open endpoint.
    ///
    /// The endpoint is borrowed: `close()` finalizes the codec session and
    /// drops buffers but leaves the endpoint open, and [`into_endpoint`]
    /// hands it back to the caller.
    ///
    /// [`into_endpoint`]: CompressedFile::into_endpoint
    pub fn from_endpoint(
        endpoint: Box<dyn Endpoint>,
        mode: OpenMode,
        codec: Arc<dyn Codec>,
        level: u32,
    ) -> Result<Self> {
        validate_level(level)?;
        Self::build(endpoint, false, mode, codec, level)
    }

    fn build(
        endpoint: Box<dyn Endpoint>,
        owns_endpoint: bool,
        mode: OpenMode,
        codec: Arc<dyn Codec>,
        level: u32,
    ) -> Result<Self> {
        let (mode, decompressor, compressor) = match mode {
            OpenMode::Read => (Mode::Reading, Some(codec.decompressor()?), None),
            OpenMode::Write | OpenMode::Append => {
                (Mode::Writing, None, Some(codec.compressor(level)?))
            }
        };
        Ok(Self {
            inner: Mutex::new(Inner {
                endpoint: Some(endpoint),
                owns_endpoint,
                mode,
                codec,
                decompressor,
                compressor,
                pending: Vec::new(),
                position: 0,
                total_size: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-operation; the state is still
        // structurally valid, so keep serving rather than propagate the panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read up to `size` decompressed bytes, or everything remaining when
    /// `size` is `None`. Returns an empty vector at EOF.
    pub fn read(&self, size: Option<usize>) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        if inner.mode == Mode::ReadingAtEof || size == Some(0) {
            return Ok(Vec::new());
        }
        match size {
            Some(n) => inner.read_block(n as u64, true),
            None => inner.read_all(true),
        }
    }

    /// Read up to `size` bytes while making at most one pull from the
    /// endpoint where possible.
    ///
    /// A single pull does not always give the codec enough to produce
    /// output, in which case this keeps pulling rather than return an empty
    /// result mid-stream. Returns an empty vector only at EOF.
    pub fn read1(&self, size: Option<usize>) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        if size == Some(0) || inner.mode == Mode::ReadingAtEof || !inner.fill_buffer()? {
            return Ok(Vec::new());
        }
        let data = match size {
            Some(n) if n < inner.pending.len() => {
                let head = inner.pending[..n].to_vec();
                inner.pending.drain(..n);
                head
            }
            _ => std::mem::take(&mut inner.pending),
        };
        inner.position += data.len() as u64;
        Ok(data)
    }

    /// Fill `buf` with decompressed bytes, returning how many were written.
    /// Short counts only happen at EOF.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        let mut filled = 0;
        while filled < buf.len() && inner.fill_buffer()? {
            let take = (buf.len() - filled).min(inner.pending.len());
            buf[filled..filled + take].copy_from_slice(&inner.pending[..take]);
            inner.pending.drain(..take);
            inner.position += take as u64;
            filled += take;
        }
        Ok(filled)
    }

    /// Read one line of decompressed bytes, terminator retained.
    ///
    /// With a `limit`, at most that many bytes are returned and the line may
    /// be incomplete. Returns an empty vector at EOF.
    pub fn read_line(&self, limit: Option<usize>) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        inner.read_line_buffered(limit)
    }

    /// Read all remaining lines. With a `hint`, stop once the accumulated
    /// byte total of whole lines reaches it.
    pub fn read_lines(&self, hint: Option<usize>) -> Result<Vec<Vec<u8>>> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        let mut lines = Vec::new();
        let mut total = 0usize;
        loop {
            let line = inner.read_line_buffered(None)?;
            if line.is_empty() {
                break;
            }
            total += line.len();
            lines.push(line);
            if let Some(h) = hint {
                if h > 0 && total >= h {
                    break;
                }
            }
        }
        Ok(lines)
    }

    /// Return buffered decompressed bytes without advancing the position.
    ///
    /// The amount returned is unspecified but never empty except at EOF.
    pub fn peek(&self) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        inner.check_can_read()?;
        if inner.mode == Mode::ReadingAtEof || !inner.fill_buffer()? {
            return Ok(Vec::new());
        }
        Ok(inner.pending.clone())
    }

    /// Compress and write `data`, returning the number of uncompressed bytes
    /// accepted, which is always `data.len()`.
    ///
    /// The compressed stream is only complete once `close()` has flushed the
    /// codec's trailer.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut inner = self.lock();
        inner.check_can_write()?;
        inner.write_block(data)
    }

    /// Write a sequence of byte strings back to back (no separators added),
    /// returning the total number of uncompressed bytes written.
    pub fn write_lines<I, B>(&self, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut inner = self.lock();
        inner.check_can_write()?;
        let mut total = 0;
        for line in lines {
            total += inner.write_block(line.as_ref())?;
        }
        Ok(total)
    }

    /// Change the logical position, returning the new position.
    ///
    /// Seeking is emulated: a backward seek rewinds the endpoint and
    /// re-reads from the start, and `SeekFrom::End` drains the remainder of
    /// the stream once to learn the decompressed size. Depending on the
    /// parameters this can be extremely slow.
    ///
    /// `SeekFrom::End` with a positive offset is rejected as an invalid
    /// argument before any state changes. Resolved targets before the start
    /// of the stream clamp to 0; targets past the end clamp to the end.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut inner = self.lock();
        inner.check_can_seek()?;
        inner.seek_to(pos)
    }

    /// Current logical (uncompressed) position.
    pub fn tell(&self) -> Result<u64> {
        let inner = self.lock();
        inner.check_not_closed()?;
        Ok(inner.position)
    }

    /// Flush and close the handle. Safe to call more than once; every other
    /// operation fails once closed.
    ///
    /// In write mode the codec trailer is written out before resources are
    /// released; a failure doing so is surfaced here, but the handle still
    /// ends up closed.
    pub fn close(&self) -> Result<()> {
        self.lock().close()
    }

    /// True once the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().mode == Mode::Closed
    }

    /// Whether the handle was opened for reading.
    pub fn readable(&self) -> Result<bool> {
        let inner = self.lock();
        inner.check_not_closed()?;
        Ok(matches!(inner.mode, Mode::Reading | Mode::ReadingAtEof))
    }

    /// Whether the handle was opened for writing.
    pub fn writable(&self) -> Result<bool> {
        let inner = self.lock();
        inner.check_not_closed()?;
        Ok(inner.mode == Mode::Writing)
    }

    /// Whether `seek` can work: requires read mode and a seekable endpoint.
    pub fn seekable(&self) -> Result<bool> {
        let inner = self.lock();
        inner.check_not_closed()?;
        Ok(matches!(inner.mode, Mode::Reading | Mode::ReadingAtEof)
            && inner.endpoint.as_ref().is_some_and(|e| e.seekable()))
    }

    /// File descriptor of the underlying endpoint, when it has one.
    pub fn fileno(&self) -> Result<i32> {
        let inner = self.lock();
        inner.check_not_closed()?;
        inner
            .endpoint
            .as_ref()
            .and_then(|e| e.raw_fd())
            .ok_or(Error::Unsupported(
                "underlying endpoint has no file descriptor",
            ))
    }

    /// Close the handle and hand back a borrowed endpoint.
    ///
    /// Returns `None` for handles that own their endpoint (opened by path);
    /// those are closed and dropped here.
    pub fn into_endpoint(self) -> Result<Option<Box<dyn Endpoint>>> {
        let mut inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        let closed = inner.close();
        let endpoint = inner.endpoint.take();
        closed?;
        Ok(endpoint)
    }
}

impl Inner {
    pub(crate) fn check_not_closed(&self) -> Result<()> {
        if self.mode == Mode::Closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_can_read(&self) -> Result<()> {
        self.check_not_closed()?;
        match self.mode {
            Mode::Reading | Mode::ReadingAtEof => Ok(()),
            _ => Err(Error::Unsupported("file not open for reading")),
        }
    }

    pub(crate) fn check_can_write(&self) -> Result<()> {
        self.check_not_closed()?;
        if self.mode == Mode::Writing {
            Ok(())
        } else {
            Err(Error::Unsupported("file not open for writing"))
        }
    }

    pub(crate) fn check_can_seek(&self) -> Result<()> {
        self.check_not_closed()?;
        if !matches!(self.mode, Mode::Reading | Mode::ReadingAtEof) {
            return Err(Error::Unsupported(
                "seeking is only supported on files open for reading",
            ));
        }
        if !self.endpoint.as_ref().is_some_and(|e| e.seekable()) {
            return Err(Error::Unsupported(
                "underlying endpoint does not support seeking",
            ));
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        if self.mode == Mode::Closed {
            return Ok(());
        }
        let result = if self.mode == Mode::Writing {
            self.finish_write()
        } else {
            Ok(())
        };
        self.decompressor = None;
        self.compressor = None;
        self.pending = Vec::new();
        if self.owns_endpoint {
            // Dropping the File closes the descriptor.
            self.endpoint = None;
        }
        self.mode = Mode::Closed;
        result
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Best effort; close() is the path that reports errors.
        let _ = self.close();
    }
}

impl io::Read for CompressedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl io::Write for CompressedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        CompressedFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Compressed output is only finalized by close(); nothing to do here.
        Ok(())
    }
}

impl io::Seek for CompressedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        CompressedFile::seek(self, pos).map_err(io::Error::from)
    }
}
