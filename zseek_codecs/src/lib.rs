//! Bundled codec session implementations for `zseek_core`.
//!
//! Each codec drives its library's low-level streaming state machine rather
//! than the `Read`/`Write` adapter types, because the handle above needs
//! per-feed consumption accounting: when a logical stream ends mid-slice,
//! the leftover bytes must be reported so the next concatenated stream can
//! be decoded by a fresh session.

mod bzip2_codec;
mod zlib_codec;
mod zstd_codec;

pub use bzip2_codec::Bzip2Codec;
pub use zlib_codec::ZlibCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use zseek_core::error::{Error, Result};
use zseek_core::Codec;

/// Resolve a codec from a user-facing name.
///
/// Called by the CLI when the codec is given (or inferred from a file
/// extension) as a string.
pub fn codec_by_name(name: &str) -> Result<Arc<dyn Codec>> {
    match name {
        "bzip2" | "bz2" => Ok(Arc::new(Bzip2Codec)),
        "zlib" | "deflate" => Ok(Arc::new(ZlibCodec)),
        "zstd" | "zst" => Ok(Arc::new(ZstdCodec)),
        other => Err(Error::InvalidArgument(format!(
            "unknown codec '{other}'; valid options: bzip2, zlib, zstd"
        ))),
    }
}
