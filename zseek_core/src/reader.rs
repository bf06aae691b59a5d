//! Read-side engine for [`CompressedFile`](crate::CompressedFile): the
//! readahead buffer, multi-stream stitching, and seek emulation.
//!
//! All of this operates on the unlocked [`Inner`] so that composite
//! operations (line reads, seek drains) run under the single lock their
//! public entry point acquired.

use std::io::SeekFrom;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::handle::{Inner, Mode};

/// Raw bytes pulled from the endpoint per fill attempt.
pub(crate) const READ_CHUNK: usize = 8192;

impl Inner {
    /// Ensure `pending` holds at least one decompressed byte, or confirm the
    /// stream is exhausted. Returns false on exhaustion.
    ///
    /// One raw chunk does not always yield decompressed output, so this
    /// loops until data appears, the source ends cleanly, or the source ends
    /// mid-stream (a truncation error).
    pub(crate) fn fill_buffer(&mut self) -> Result<bool> {
        loop {
            if !self.pending.is_empty() {
                return Ok(true);
            }
            if self.mode == Mode::ReadingAtEof {
                return Ok(false);
            }

            let session_done = match self.decompressor.as_ref() {
                Some(d) => d.eof(),
                None => return Err(Error::Closed),
            };

            let raw = if session_done {
                // The previous logical stream terminated. Bytes past its end
                // marker belong to the next concatenated stream; if there
                // were none, the boundary fell exactly on a chunk boundary
                // and the next pull decides between EOF and another stream.
                let trailing = match self.decompressor.as_mut() {
                    Some(d) => d.take_unused(),
                    None => return Err(Error::Closed),
                };
                if trailing.is_empty() {
                    let chunk = self.pull_chunk()?;
                    if chunk.is_empty() {
                        trace!("source drained at position {}", self.position);
                        self.mode = Mode::ReadingAtEof;
                        self.total_size = Some(self.position);
                        return Ok(false);
                    }
                    chunk
                } else {
                    trace!(
                        "stitching next compressed stream from {} trailing bytes",
                        trailing.len()
                    );
                    trailing
                }
            } else {
                let chunk = self.pull_chunk()?;
                if chunk.is_empty() {
                    // The codec still expected input for the current stream.
                    return Err(Error::Truncated);
                }
                chunk
            };

            if session_done {
                self.decompressor = Some(self.codec.decompressor()?);
            }
            let decomp = match self.decompressor.as_mut() {
                Some(d) => d,
                None => return Err(Error::Closed),
            };
            let out = decomp.decompress(&raw)?;
            if !out.is_empty() {
                self.pending = out;
            }
            // An empty result is not EOF; feed more input.
        }
    }

    fn pull_chunk(&mut self) -> Result<Vec<u8>> {
        let endpoint = match self.endpoint.as_mut() {
            Some(e) => e,
            None => return Err(Error::Closed),
        };
        let mut chunk = vec![0u8; READ_CHUNK];
        let n = endpoint.read(&mut chunk)?;
        chunk.truncate(n);
        Ok(chunk)
    }

    /// Read up to `n` decompressed bytes, advancing the position. When
    /// `collect` is false the bytes are consumed and discarded, which is how
    /// forward seeks skip data without materializing it.
    pub(crate) fn read_block(&mut self, n: u64, collect: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut remaining = n;
        while remaining > 0 && self.fill_buffer()? {
            let len = self.pending.len() as u64;
            if remaining >= len {
                let buf = std::mem::take(&mut self.pending);
                self.position += len;
                remaining -= len;
                if collect {
                    if out.is_empty() {
                        out = buf;
                    } else {
                        out.extend_from_slice(&buf);
                    }
                }
            } else {
                let take = remaining as usize;
                if collect {
                    out.extend_from_slice(&self.pending[..take]);
                }
                self.pending.drain(..take);
                self.position += remaining;
                remaining = 0;
            }
        }
        Ok(out)
    }

    /// Read to confirmed end of stream. `collect == false` is the drain used
    /// for size discovery and end-relative seeks.
    pub(crate) fn read_all(&mut self, collect: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while self.fill_buffer()? {
            let buf = std::mem::take(&mut self.pending);
            self.position += buf.len() as u64;
            if collect {
                out.extend_from_slice(&buf);
            }
        }
        Ok(out)
    }

    /// Read one line (terminator retained), honoring an optional byte limit.
    pub(crate) fn read_line_buffered(&mut self, limit: Option<usize>) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            if let Some(l) = limit {
                if line.len() >= l {
                    break;
                }
            }
            if !self.fill_buffer()? {
                break;
            }
            let room = match limit {
                Some(l) => (l - line.len()).min(self.pending.len()),
                None => self.pending.len(),
            };
            match self.pending[..room].iter().position(|&b| b == b'\n') {
                Some(i) => {
                    line.extend_from_slice(&self.pending[..=i]);
                    self.pending.drain(..=i);
                    self.position += (i + 1) as u64;
                    break;
                }
                None => {
                    line.extend_from_slice(&self.pending[..room]);
                    self.pending.drain(..room);
                    self.position += room as u64;
                }
            }
        }
        Ok(line)
    }

    /// Reset endpoint, codec session, and bookkeeping to the start of the
    /// stream. Clears a confirmed-EOF state; `total_size` stays memoized.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        let endpoint = match self.endpoint.as_mut() {
            Some(e) => e,
            None => return Err(Error::Closed),
        };
        endpoint.rewind()?;
        self.mode = Mode::Reading;
        self.position = 0;
        self.pending = Vec::new();
        self.decompressor = Some(self.codec.decompressor()?);
        Ok(())
    }

    /// Resolve `pos` to an absolute target and emulate the seek by rewind
    /// and/or discard-read. Targets before the start clamp to 0 and targets
    /// past the end clamp to wherever the data runs out.
    pub(crate) fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => {
                (self.position as i128 + delta as i128).max(0) as u64
            }
            SeekFrom::End(delta) => {
                if delta > 0 {
                    return Err(Error::InvalidArgument(
                        "end-relative seek offset must not be positive".into(),
                    ));
                }
                let size = match self.total_size {
                    Some(s) => s,
                    None => {
                        debug!("draining stream to discover decompressed size");
                        self.read_all(false)?;
                        self.total_size.unwrap_or(self.position)
                    }
                };
                (size as i128 + delta as i128).max(0) as u64
            }
        };

        if target < self.position {
            debug!(
                "rewinding from {} to satisfy backward seek to {}",
                self.position, target
            );
            self.rewind()?;
        }
        if self.mode != Mode::ReadingAtEof {
            let skip = target - self.position;
            if skip > 0 {
                self.read_block(skip, false)?;
            }
        }
        Ok(self.position)
    }
}
