//! Write-side path for [`CompressedFile`](crate::CompressedFile).
//!
//! Compressed output goes to the endpoint as soon as the codec emits it; no
//! second buffering layer sits in between. The stream is only complete once
//! `finish_write` has flushed the codec trailer at close.

use log::trace;

use crate::error::{Error, Result};
use crate::handle::Inner;

impl Inner {
    /// Compress `data` and write whatever the codec produced, advancing the
    /// logical position by the uncompressed length. Always reports
    /// `data.len()` bytes accepted.
    pub(crate) fn write_block(&mut self, data: &[u8]) -> Result<usize> {
        let compressor = match self.compressor.as_mut() {
            Some(c) => c,
            None => return Err(Error::Closed),
        };
        let compressed = compressor.compress(data)?;
        if !compressed.is_empty() {
            let endpoint = match self.endpoint.as_mut() {
                Some(e) => e,
                None => return Err(Error::Closed),
            };
            endpoint.write_all(&compressed)?;
        }
        self.position += data.len() as u64;
        Ok(data.len())
    }

    /// Terminate the compressed stream: write the codec trailer and flush
    /// the endpoint. Called exactly once, from close.
    pub(crate) fn finish_write(&mut self) -> Result<()> {
        let Some(mut compressor) = self.compressor.take() else {
            return Ok(());
        };
        let trailer = compressor.finish()?;
        trace!("flushing {} trailer bytes on close", trailer.len());
        let endpoint = match self.endpoint.as_mut() {
            Some(e) => e,
            None => return Err(Error::Closed),
        };
        endpoint.write_all(&trailer)?;
        endpoint.flush()?;
        Ok(())
    }
}
