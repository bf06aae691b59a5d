use zstd::stream::raw::{Decoder, Encoder, InBuffer, Operation, OutBuffer};

use zseek_core::error::{Error, Result};
use zseek_core::{Codec, Compressor, Decompressor};

/// Scratch buffer size for each decode/encode step. Smaller than zstd's
/// recommended output size is fine; the streaming API flushes across calls.
const SCRATCH: usize = 64 * 1024;

/// Zstandard sessions over the raw streaming contexts.
///
/// `ZSTD_decompressStream` returns 0 exactly when a frame is complete, at
/// which point any input bytes not yet consumed belong to the next
/// concatenated frame and are reported as unused data.
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn decompressor(&self) -> Result<Box<dyn Decompressor>> {
        let inner = Decoder::new().map_err(|e| Error::Codec(format!("zstd: {e}")))?;
        Ok(Box::new(ZstdDecompressor {
            inner,
            scratch: vec![0u8; SCRATCH],
            eof: false,
            unused: Vec::new(),
        }))
    }

    fn compressor(&self, level: u32) -> Result<Box<dyn Compressor>> {
        let inner = Encoder::new(level as i32).map_err(|e| Error::Codec(format!("zstd: {e}")))?;
        Ok(Box::new(ZstdCompressor {
            inner,
            scratch: vec![0u8; SCRATCH],
        }))
    }
}

struct ZstdDecompressor {
    inner: Decoder<'static>,
    scratch: Vec<u8>,
    eof: bool,
    unused: Vec<u8>,
}

impl Decompressor for ZstdDecompressor {
    fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if self.eof {
            self.unused.extend_from_slice(input);
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut inb = InBuffer::around(input);
        loop {
            let hint;
            let filled_scratch;
            {
                let mut outb = OutBuffer::around(&mut self.scratch[..]);
                hint = self
                    .inner
                    .run(&mut inb, &mut outb)
                    .map_err(|e| Error::Codec(format!("zstd: {e}")))?;
                out.extend_from_slice(outb.as_slice());
                filled_scratch = outb.pos() == SCRATCH;
            }
            if hint == 0 {
                self.eof = true;
                self.unused.extend_from_slice(&input[inb.pos..]);
                break;
            }
            // Loop again while there is input left or the output buffer was
            // filled to the brim (internally buffered output may remain).
            if inb.pos == input.len() && !filled_scratch {
                break;
            }
        }
        Ok(out)
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn take_unused(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.unused)
    }
}

struct ZstdCompressor {
    inner: Encoder<'static>,
    scratch: Vec<u8>,
}

impl Compressor for ZstdCompressor {
    fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut inb = InBuffer::around(input);
        while inb.pos < input.len() {
            let mut outb = OutBuffer::around(&mut self.scratch[..]);
            self.inner
                .run(&mut inb, &mut outb)
                .map_err(|e| Error::Codec(format!("zstd: {e}")))?;
            out.extend_from_slice(outb.as_slice());
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let remaining;
            {
                let mut outb = OutBuffer::around(&mut self.scratch[..]);
                remaining = self
                    .inner
                    .finish(&mut outb, true)
                    .map_err(|e| Error::Codec(format!("zstd: {e}")))?;
                out.extend_from_slice(outb.as_slice());
            }
            if remaining == 0 {
                break;
            }
        }
        Ok(out)
    }
}
