use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use zseek_core::error::{Error, Result};
use zseek_core::{Codec, Compressor, Decompressor};

const STEP: usize = 16 * 1024;

/// Zlib sessions over flate2's low-level `Compress`/`Decompress` state
/// machines (zlib wrapper enabled, so streams carry their own terminator and
/// checksum). `total_in` deltas track exactly how much of each fed slice the
/// inflater consumed, which is what lets a finished stream report the bytes
/// belonging to the next concatenated one.
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompressor(&self) -> Result<Box<dyn Decompressor>> {
        Ok(Box::new(ZlibDecompressor {
            inner: Decompress::new(true),
            eof: false,
            unused: Vec::new(),
        }))
    }

    fn compressor(&self, level: u32) -> Result<Box<dyn Compressor>> {
        Ok(Box::new(ZlibCompressor {
            inner: Compress::new(Compression::new(level), true),
        }))
    }
}

struct ZlibDecompressor {
    inner: Decompress,
    eof: bool,
    unused: Vec<u8>,
}

impl Decompressor for ZlibDecompressor {
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
            let status = self
                .inner
                .decompress_vec(&input[offset..], &mut out, FlushDecompress::None)
                .map_err(|e| Error::Codec(format!("zlib: {e}")))?;
            offset += (self.inner.total_in() - before_in) as usize;
            match status {
                Status::StreamEnd => {
                    self.eof = true;
                    self.unused.extend_from_slice(&input[offset..]);
                    break;
                }
                Status::Ok => {}
                Status::BufError => {
                    // Spare output capacity plus BufError means the inflater
                    // wants more input than this slice holds.
                    if out.len() < out.capacity() {
                        break;
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

struct ZlibCompressor {
    inner: Compress,
}

impl Compressor for ZlibCompressor {
    fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < input.len() {
            if out.len() == out.capacity() {
                out.reserve(STEP);
            }
            let before_in = self.inner.total_in();
            let status = self
                .inner
                .compress_vec(&input[offset..], &mut out, FlushCompress::None)
                .map_err(|e| Error::Codec(format!("zlib: {e}")))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            if consumed == 0 && status == Status::BufError && out.len() < out.capacity() {
                return Err(Error::Codec(
                    "deflate made no progress on non-empty input".into(),
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
                .compress_vec(&[], &mut out, FlushCompress::Finish)
                .map_err(|e| Error::Codec(format!("zlib: {e}")))?;
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
        let mut c = ZlibCodec.compressor(level).unwrap();
        let mut bytes = c.compress(data).unwrap();
        bytes.extend(c.finish().unwrap());
        bytes
    }

    #[test]
    fn session_round_trip() {
        let data = b"zlib round trip payload ".repeat(400);
        let compressed = compress_whole(&data, 6);

        let mut d = ZlibCodec.decompressor().unwrap();
        let out = d.decompress(&compressed).unwrap();
        assert_eq!(out, data);
        assert!(d.eof());
    }

    #[test]
    fn concatenated_streams_leave_unused_data() {
        let mut joined = compress_whole(b"AAA", 9);
        let second = compress_whole(b"BBB", 9);
        joined.extend_from_slice(&second);

        let mut d = ZlibCodec.decompressor().unwrap();
        let out = d.decompress(&joined).unwrap();
        assert_eq!(out, b"AAA");
        assert!(d.eof());
        assert_eq!(d.take_unused(), second);
    }

    #[test]
    fn empty_input_round_trip() {
        let compressed = compress_whole(b"", 1);
        let mut d = ZlibCodec.decompressor().unwrap();
        let out = d.decompress(&compressed).unwrap();
        assert!(out.is_empty());
        assert!(d.eof());
    }
}
