use bzip2::{Action, Compress, Compression, Decompress, Status};

use zseek_core::error::{Error, Result};
use zseek_core::{Codec, Compressor, Decompressor};

/// Output capacity added per (de)compression step.
const STEP: usize = 16 * 1024;

/// Bzip2 sessions over the low-level `bzip2` stream API.
///
/// The high-level `BzDecoder`/`BzEncoder` wrappers hide consumption
/// accounting, but the handle above needs to know exactly which input bytes
/// belong to the stream that just ended and which are trailing data for the
/// next one, so the raw `Compress`/`Decompress` state machines are driven
/// directly and leftovers are tracked via `total_in`.
pub struct Bzip2Codec;

impl Codec for Bzip2Codec {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn decompressor(&self) -> Result<Box<dyn Decompressor>> {
        Ok(Box::new(Bzip2Decompressor {
            inner: Decompress::new(false),
            eof: false,
            unused: Vec::new(),
        }))
    }

    fn compressor(&self, level: u32) -> Result<Box<dyn Compressor>> {
        Ok(Box::new(Bzip2Compressor {
            inner: Compress::new(Compression::new(level), 30),
        }))
    }
}

struct Bzip2Decompressor {
    inner: Decompress,
    eof: bool,
    unused: Vec<u8>,
}

impl Decompressor for Bzip2Decompressor {
    fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if self.eof {
            self.unused.extend_from_slice(input);
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < input.len() {
            if out.len() == out.capacity() {
                out.reserve(STEP);
            }
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .decompress_vec(&input[offset..], &mut out)
                .map_err(|e| Error::Codec(format!("bzip2: {e}")))?;
            offset += (self.inner.total_in() - before_in) as usize;
            let produced = self.inner.total_out() - before_out;
            match status {
                Status::StreamEnd => {
                    self.eof = true;
                    self.unused.extend_from_slice(&input[offset..]);
                    break;
                }
                _ => {
                    if produced == 0
                        && self.inner.total_in() == before_in
                        && out.len() < out.capacity()
                    {
                        return Err(Error::Codec(
                            "bzip2 decoder made no progress on non-empty input".into(),
                        ));
                    }
                }
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

struct Bzip2Compressor {
    inner: Compress,
}

impl Compressor for Bzip2Compressor {
    fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < input.len() {
            if out.len() == out.capacity() {
                out.reserve(STEP);
            }
            let before_in = self.inner.total_in();
            self.inner
                .compress_vec(&input[offset..], &mut out, Action::Run)
                .map_err(|e| Error::Codec(format!("bzip2: {e}")))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            if consumed == 0 && out.len() < out.capacity() {
                return Err(Error::Codec(
                    "bzip2 encoder made no progress on non-empty input".into(),
                ));
            }
            offset += consumed;
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            if out.len() == out.capacity() {
                out.reserve(STEP);
            }
            let status = self
                .inner
                .compress_vec(&[], &mut out, Action::Finish)
                .map_err(|e| Error::Codec(format!("bzip2: {e}")))?;
            if status == Status::StreamEnd {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_whole(data: &[u8], level: u32) -> Vec<u8> {
        let mut c = Bzip2Codec.compressor(level).unwrap();
        let mut bytes = c.compress(data).unwrap();
        bytes.extend(c.finish().unwrap());
        bytes
    }

    #[test]
    fn session_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog. ".repeat(200);
        let compressed = compress_whole(&data, 9);

        let mut d = Bzip2Codec.decompressor().unwrap();
        let out = d.decompress(&compressed).unwrap();
        assert_eq!(out, data);
        assert!(d.eof());
        assert!(d.take_unused().is_empty());
    }

    #[test]
    fn trailing_bytes_reported_as_unused() {
        let compressed = compress_whole(b"first stream", 1);
        let mut concatenated = compressed.clone();
        concatenated.extend_from_slice(b"TRAILING");

        let mut d = Bzip2Codec.decompressor().unwrap();
        let out = d.decompress(&concatenated).unwrap();
        assert_eq!(out, b"first stream");
        assert!(d.eof());
        assert_eq!(d.take_unused(), b"TRAILING");
        assert!(d.take_unused().is_empty(), "take_unused drains");
    }

    #[test]
    fn incremental_feed_produces_same_output() {
        let data = b"incremental bzip2 feeding".repeat(50);
        let compressed = compress_whole(&data, 5);

        let mut d = Bzip2Codec.decompressor().unwrap();
        let mut out = Vec::new();
        for chunk in compressed.chunks(7) {
            out.extend(d.decompress(chunk).unwrap());
        }
        assert_eq!(out, data);
        assert!(d.eof());
    }
}
