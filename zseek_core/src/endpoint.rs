use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// The raw byte source or sink beneath a [`CompressedFile`](crate::CompressedFile).
///
/// Every method has a default that reports the capability as unsupported, so
/// an implementation only provides the directions it actually has. The handle
/// never retries endpoint failures; errors pass through verbatim.
pub trait Endpoint: Send {
    /// Read up to `buf.len()` compressed bytes. Returning 0 means the source
    /// is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = buf;
        Err(unsupported("endpoint is not readable"))
    }

    /// Write all of `data` to the sink.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let _ = data;
        Err(unsupported("endpoint is not writable"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Reposition to the start of the source. Only ever called by the seek
    /// emulation layer, and only when `seekable()` returned true.
    fn rewind(&mut self) -> io::Result<()> {
        Err(unsupported("endpoint is not seekable"))
    }

    fn seekable(&self) -> bool {
        false
    }

    /// OS-level file descriptor, if the endpoint has one.
    fn raw_fd(&self) -> Option<i32> {
        None
    }
}

fn unsupported(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, msg)
}

impl Endpoint for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn seekable(&self) -> bool {
        true
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<i32> {
        use std::os::unix::io::AsRawFd;
        Some(self.as_raw_fd())
    }
}

/// In-memory endpoint, mostly useful for tests and for consuming compressed
/// bytes that already live in a buffer.
impl Endpoint for Cursor<Vec<u8>> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }

    fn seekable(&self) -> bool {
        true
    }
}

/// Adapts any reader into a read-only, non-seekable endpoint (pipes,
/// sockets, process output). Seek attempts on a handle built over this fail
/// with an unsupported-operation error.
pub struct StreamEndpoint<R>(pub R);

impl<R: Read + Send> Endpoint for StreamEndpoint<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Adapts any writer into a write-only endpoint.
pub struct SinkEndpoint<W>(pub W);

impl<W: Write + Send> Endpoint for SinkEndpoint<W> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.0.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
