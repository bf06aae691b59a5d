use std::io;

use thiserror::Error;

/// Errors produced by [`CompressedFile`](crate::CompressedFile) and the codec
/// sessions beneath it.
///
/// Argument and mode problems are detected before any state is touched, so a
/// rejected operation leaves the handle exactly where it was. `Truncated` and
/// `Io` can surface mid-operation; the handle stays internally consistent
/// (position reflects bytes actually consumed) but the caller is expected to
/// close it.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument was out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any operation other than `close`/`is_closed` on a closed handle.
    #[error("I/O operation on closed file")]
    Closed,

    /// The operation is not legal for the handle's mode or its endpoint.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The byte source ended while the codec still expected input for the
    /// current logical stream.
    #[error("compressed stream ended before the end-of-stream marker was reached")]
    Truncated,

    /// The codec rejected its input or could not make progress.
    #[error("codec failure: {0}")]
    Codec(String),

    /// Propagated verbatim from the underlying endpoint; never retried here.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match &err {
            Error::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            Error::Closed => io::ErrorKind::Other,
            Error::Unsupported(_) => io::ErrorKind::Unsupported,
            Error::Truncated => io::ErrorKind::UnexpectedEof,
            Error::Codec(_) => io::ErrorKind::InvalidData,
            Error::Io(e) => e.kind(),
        };
        match err {
            Error::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}
