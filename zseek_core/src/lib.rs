//! Seekable, file-like access over sequentially compressed byte streams.
//!
//! Compression formats like bzip2 expose strictly sequential sessions: feed
//! compressed bytes in, get plaintext out, with no random access. This crate
//! bridges that to [`CompressedFile`], a file-like handle supporting `read`,
//! `write`, `tell`, and emulated `seek`, including transparent reading of
//! several independently terminated streams concatenated in one source.
//!
//! Codec implementations live in `zseek_codecs`; this crate only defines the
//! session contract ([`Codec`], [`Compressor`], [`Decompressor`]) and the
//! byte source/sink contract ([`Endpoint`]).

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod handle;
mod reader;
mod writer;

pub use codec::{Codec, Compressor, Decompressor};
pub use endpoint::{Endpoint, SinkEndpoint, StreamEndpoint};
pub use error::{Error, Result};
pub use handle::{CompressedFile, OpenMode, DEFAULT_COMPRESSION_LEVEL};
