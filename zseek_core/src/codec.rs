use crate::error::Result;

/// Core compression abstraction.
///
/// A `Codec` is a factory for stateful push/pull sessions. The handle owns at
/// most one live session at a time: on the read side a fresh [`Decompressor`]
/// is started for every logical stream encountered in the source (including
/// after a rewind), on the write side exactly one [`Compressor`] lives for the
/// handle's whole lifetime and is finalized once at close.
///
/// Sessions are strictly sequential; no random access is expected of them.
/// Random access is emulated above this trait by rewind-and-discard.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Start a decompression session for one logical stream.
    fn decompressor(&self) -> Result<Box<dyn Decompressor>>;

    /// Start a compression session at the given level (1–9; the handle
    /// validates the range before calling this).
    fn compressor(&self, level: u32) -> Result<Box<dyn Compressor>>;
}

/// One live decompression session.
///
/// The end-of-stream condition and leftover input are modeled as queryable
/// state rather than an error side-channel: after the session's own stream
/// terminator has been decoded, `eof()` turns true and any input bytes past
/// the terminator accumulate as unused data. The read engine seeds the next
/// session with exactly those bytes, which is how back-to-back concatenated
/// streams in one source are stitched together.
pub trait Decompressor: Send {
    /// Feed compressed bytes, returning whatever plaintext became available.
    ///
    /// May legitimately return an empty vector even though `input` was
    /// non-empty (the codec buffered it internally); callers must keep
    /// feeding rather than treat that as end of data. Input arriving after
    /// `eof()` is retained as unused data.
    fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// True once the session has decoded its stream's own end marker.
    fn eof(&self) -> bool;

    /// Take the input bytes that arrived after the end marker, leaving the
    /// session's unused buffer empty.
    fn take_unused(&mut self) -> Vec<u8>;
}

/// One live compression session.
pub trait Compressor: Send {
    /// Feed plaintext, returning whatever compressed output became available.
    /// The codec may buffer arbitrarily; output only becomes complete after
    /// [`finish`](Compressor::finish).
    fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Terminate the stream, returning the final compressed bytes (end
    /// marker included). The session must not be fed afterwards.
    fn finish(&mut self) -> Result<Vec<u8>>;
}
