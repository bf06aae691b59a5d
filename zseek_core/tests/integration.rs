//! End-to-end tests for the seekable compressed-file handle, driven through
//! the bundled codecs.

use std::io::{Cursor, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use zseek_codecs::{Bzip2Codec, ZlibCodec, ZstdCodec};
use zseek_core::{
    Codec, CompressedFile, Endpoint, Error, OpenMode, StreamEndpoint, DEFAULT_COMPRESSION_LEVEL,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("zseek_test_{}_{}.z", name, std::process::id()))
}

/// Compress `data` into one complete stream using a bare codec session.
fn one_stream(codec: &dyn Codec, data: &[u8], level: u32) -> Vec<u8> {
    let mut c = codec.compressor(level).unwrap();
    let mut bytes = c.compress(data).unwrap();
    bytes.extend(c.finish().unwrap());
    bytes
}

/// Open an in-memory read handle over pre-built compressed bytes.
fn read_handle(codec: Arc<dyn Codec>, compressed: Vec<u8>) -> CompressedFile {
    CompressedFile::from_endpoint(
        Box::new(Cursor::new(compressed)),
        OpenMode::Read,
        codec,
        DEFAULT_COMPRESSION_LEVEL,
    )
    .unwrap()
}

/// Endpoint wrapper that counts underlying read calls, for asserting how
/// often the handle actually touches the source.
struct CountingEndpoint {
    inner: Cursor<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl Endpoint for CountingEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::io::Read::read(&mut self.inner, buf)
    }

    fn rewind(&mut self) -> std::io::Result<()> {
        self.inner.set_position(0);
        Ok(())
    }

    fn seekable(&self) -> bool {
        true
    }
}

// ── round trips ────────────────────────────────────────────────────────────

#[test]
fn round_trip_all_levels_bzip2() {
    let data = compressible_bytes(20_000);
    for level in 1..=9 {
        let path = temp_path(&format!("rt_bz2_l{level}"));
        let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), level).unwrap();
        f.write(&data).unwrap();
        f.close().unwrap();

        let f = CompressedFile::open(&path, OpenMode::Read, Arc::new(Bzip2Codec), level).unwrap();
        assert_eq!(f.read(None).unwrap(), data, "level {level} round trip");
        f.close().unwrap();
        std::fs::remove_file(&path).unwrap();
    }
}

#[test]
fn round_trip_zlib_and_zstd() {
    let data = pseudo_random_bytes(50_000, 0xDEAD_BEEF);
    for codec in [Arc::new(ZlibCodec) as Arc<dyn Codec>, Arc::new(ZstdCodec)] {
        let compressed = one_stream(codec.as_ref(), &data, 6);
        let f = read_handle(codec.clone(), compressed);
        assert_eq!(f.read(None).unwrap(), data, "{} round trip", codec.name());
    }
}

#[test]
fn round_trip_incompressible_data_in_small_reads() {
    let data = pseudo_random_bytes(30_000, 42);
    let compressed = one_stream(&Bzip2Codec, &data, 9);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);

    let mut reassembled = Vec::new();
    loop {
        let chunk = f.read(Some(777)).unwrap();
        if chunk.is_empty() {
            break;
        }
        reassembled.extend(chunk);
    }
    assert_eq!(reassembled, data);
}

// ── close semantics ────────────────────────────────────────────────────────

#[test]
fn close_is_idempotent() {
    let compressed = one_stream(&ZlibCodec, b"payload", 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);
    f.close().unwrap();
    f.close().unwrap();
    assert!(f.is_closed());
}

#[test]
fn operations_fail_once_closed() {
    let compressed = one_stream(&ZlibCodec, b"payload", 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);
    f.close().unwrap();

    assert!(matches!(f.read(None), Err(Error::Closed)));
    assert!(matches!(f.tell(), Err(Error::Closed)));
    assert!(matches!(f.seek(SeekFrom::Start(0)), Err(Error::Closed)));
    assert!(matches!(f.peek(), Err(Error::Closed)));
    assert!(matches!(f.readable(), Err(Error::Closed)));
    assert!(matches!(f.fileno(), Err(Error::Closed)));
    // close and is_closed stay legal
    assert!(f.is_closed());
    f.close().unwrap();
}

// ── seeking ────────────────────────────────────────────────────────────────

#[test]
fn seek_consistency_absolute_targets() {
    let data = compressible_bytes(10_000);
    let compressed = one_stream(&Bzip2Codec, &data, 9);

    for target in [0u64, 1, 4_999, 9_999] {
        let f = read_handle(Arc::new(Bzip2Codec), compressed.clone());
        assert_eq!(f.seek(SeekFrom::Start(target)).unwrap(), target);
        assert_eq!(f.tell().unwrap(), target);
        assert_eq!(f.read(None).unwrap(), &data[target as usize..]);
    }
}

#[test]
fn seek_forward_then_backward() {
    let data = compressible_bytes(8_000);
    let compressed = one_stream(&ZlibCodec, &data, 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);

    let head = f.read(Some(3_000)).unwrap();
    assert_eq!(head, &data[..3_000]);

    // Backward seek forces a rewind and replay.
    assert_eq!(f.seek(SeekFrom::Start(0)).unwrap(), 0);
    assert_eq!(f.read(Some(3_000)).unwrap(), head);

    // Relative seek from the middle.
    assert_eq!(f.seek(SeekFrom::Current(-1_000)).unwrap(), 2_000);
    assert_eq!(f.read(Some(10)).unwrap(), &data[2_000..2_010]);
}

#[test]
fn seek_past_end_clamps_to_size() {
    let data = compressible_bytes(500);
    let compressed = one_stream(&Bzip2Codec, &data, 1);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);

    assert_eq!(f.seek(SeekFrom::Start(1_000_000)).unwrap(), 500);
    assert!(f.read(None).unwrap().is_empty());
    assert_eq!(f.tell().unwrap(), 500);
}

#[test]
fn end_relative_seek_drains_once() {
    let data = compressible_bytes(40_000);
    let compressed = one_stream(&Bzip2Codec, &data, 9);
    let reads = Arc::new(AtomicUsize::new(0));
    let endpoint = CountingEndpoint {
        inner: Cursor::new(compressed),
        reads: reads.clone(),
    };
    let f = CompressedFile::from_endpoint(
        Box::new(endpoint),
        OpenMode::Read,
        Arc::new(Bzip2Codec),
        DEFAULT_COMPRESSION_LEVEL,
    )
    .unwrap();

    assert_eq!(f.seek(SeekFrom::End(0)).unwrap(), 40_000);
    assert_eq!(f.tell().unwrap(), 40_000);
    let after_first = reads.load(Ordering::SeqCst);
    assert!(after_first > 0);

    // Size is memoized; a second end-relative no-op seek touches nothing.
    assert_eq!(f.seek(SeekFrom::End(0)).unwrap(), 40_000);
    assert_eq!(reads.load(Ordering::SeqCst), after_first);

    // And a tail read still works via rewind + replay.
    assert_eq!(f.seek(SeekFrom::End(-5)).unwrap(), 39_995);
    assert_eq!(f.read(None).unwrap(), &data[39_995..]);
}

#[test]
fn positive_end_relative_seek_rejected_without_state_change() {
    let data = compressible_bytes(100);
    let compressed = one_stream(&ZlibCodec, &data, 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);
    f.read(Some(10)).unwrap();

    assert!(matches!(
        f.seek(SeekFrom::End(1)),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(f.tell().unwrap(), 10);
    assert_eq!(f.read(Some(5)).unwrap(), &data[10..15]);
}

#[test]
fn seek_before_start_clamps_to_zero() {
    let data = compressible_bytes(100);
    let compressed = one_stream(&ZlibCodec, &data, 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);
    f.read(Some(10)).unwrap();

    // An end-relative target far before the start clamps to 0; the handle
    // must not be left stranded at EOF by the size-discovery drain.
    assert_eq!(f.seek(SeekFrom::End(-1_000)).unwrap(), 0);
    assert_eq!(f.tell().unwrap(), 0);
    assert_eq!(f.read(None).unwrap(), data);

    f.seek(SeekFrom::Start(10)).unwrap();
    assert_eq!(f.seek(SeekFrom::Current(-100)).unwrap(), 0);
    assert_eq!(f.read(Some(5)).unwrap(), &data[..5]);
}

#[test]
fn seek_on_non_seekable_endpoint_is_unsupported() {
    let compressed = one_stream(&Bzip2Codec, b"pipe data", 9);
    let f = CompressedFile::from_endpoint(
        Box::new(StreamEndpoint(Cursor::new(compressed))),
        OpenMode::Read,
        Arc::new(Bzip2Codec),
        DEFAULT_COMPRESSION_LEVEL,
    )
    .unwrap();

    assert!(!f.seekable().unwrap());
    assert!(matches!(
        f.seek(SeekFrom::Start(0)),
        Err(Error::Unsupported(_))
    ));
    // Plain reading still works over the non-seekable endpoint.
    assert_eq!(f.read(None).unwrap(), b"pipe data");
}

// ── multi-stream sources ───────────────────────────────────────────────────

#[test]
fn concatenated_streams_read_as_one() {
    let mut joined = one_stream(&Bzip2Codec, b"AAA", 9);
    joined.extend(one_stream(&Bzip2Codec, b"BBB", 9));
    let f = read_handle(Arc::new(Bzip2Codec), joined);
    assert_eq!(f.read(None).unwrap(), b"AAABBB");
}

#[test]
fn reads_and_peek_do_not_see_stream_boundaries() {
    let mut joined = one_stream(&ZlibCodec, b"AAA", 9);
    joined.extend(one_stream(&ZlibCodec, b"BBB", 9));
    let f = read_handle(Arc::new(ZlibCodec), joined);

    assert_eq!(f.read(Some(4)).unwrap(), b"AAAB");
    let peeked = f.peek().unwrap();
    assert!(!peeked.is_empty());
    assert!(peeked.starts_with(b"B"));
    assert_eq!(f.tell().unwrap(), 4, "peek must not advance the position");
    assert_eq!(f.read(None).unwrap(), b"BB");
}

#[test]
fn backward_seek_across_stream_boundary() {
    let mut joined = one_stream(&Bzip2Codec, b"first-half|", 9);
    joined.extend(one_stream(&Bzip2Codec, b"second-half", 9));
    let f = read_handle(Arc::new(Bzip2Codec), joined);

    assert_eq!(f.read(None).unwrap(), b"first-half|second-half");
    assert_eq!(f.seek(SeekFrom::Start(6)).unwrap(), 6);
    assert_eq!(f.read(Some(10)).unwrap(), b"half|secon");
}

#[test]
fn append_mode_produces_readable_concatenation() {
    let path = temp_path("append");
    let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), 9).unwrap();
    f.write(b"written first|").unwrap();
    f.close().unwrap();

    let f = CompressedFile::open(&path, OpenMode::Append, Arc::new(Bzip2Codec), 9).unwrap();
    f.write(b"then appended").unwrap();
    f.close().unwrap();

    let f = CompressedFile::open(&path, OpenMode::Read, Arc::new(Bzip2Codec), 9).unwrap();
    assert_eq!(f.read(None).unwrap(), b"written first|then appended");
    f.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

// ── truncation ─────────────────────────────────────────────────────────────

#[test]
fn truncated_source_fails_with_truncated_error() {
    let data = compressible_bytes(20_000);
    let mut compressed = one_stream(&Bzip2Codec, &data, 9);
    compressed.truncate(compressed.len() - 8);

    let f = read_handle(Arc::new(Bzip2Codec), compressed);
    assert!(matches!(f.read(None), Err(Error::Truncated)));
}

#[test]
fn empty_source_fails_with_truncated_error() {
    let f = read_handle(Arc::new(ZlibCodec), Vec::new());
    assert!(matches!(f.read(None), Err(Error::Truncated)));
}

// ── mode enforcement ───────────────────────────────────────────────────────

#[test]
fn write_handle_rejects_read_operations() {
    let path = temp_path("mode_w");
    let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), 9).unwrap();

    assert!(matches!(f.read(None), Err(Error::Unsupported(_))));
    assert!(matches!(f.peek(), Err(Error::Unsupported(_))));
    assert!(matches!(
        f.seek(SeekFrom::Start(0)),
        Err(Error::Unsupported(_))
    ));
    assert!(!f.readable().unwrap());
    assert!(f.writable().unwrap());
    assert!(!f.seekable().unwrap());

    f.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn read_handle_rejects_write_operations() {
    let compressed = one_stream(&ZlibCodec, b"read only", 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);

    assert!(matches!(f.write(b"nope"), Err(Error::Unsupported(_))));
    assert!(matches!(
        f.write_lines([b"nope".as_slice()]),
        Err(Error::Unsupported(_))
    ));
    assert!(f.readable().unwrap());
    assert!(!f.writable().unwrap());
}

#[test]
fn compression_level_validated_at_construction() {
    for level in [0u32, 10, 99] {
        let err = CompressedFile::from_endpoint(
            Box::new(Cursor::new(Vec::new())),
            OpenMode::Write,
            Arc::new(Bzip2Codec),
            level,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)), "level {level}");
    }
}

// ── smaller reads: read1, readinto, peek ───────────────────────────────────

#[test]
fn read1_returns_buffered_data_without_extra_pulls() {
    let data = compressible_bytes(5_000);
    let compressed = one_stream(&Bzip2Codec, &data, 9);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);

    let first = f.read1(Some(100)).unwrap();
    assert_eq!(first, &data[..100]);
    // Unbounded read1 returns whatever is pending, not the whole stream.
    let second = f.read1(None).unwrap();
    assert!(!second.is_empty());
    assert_eq!(second, &data[100..100 + second.len()]);
    assert!(f.read1(Some(0)).unwrap().is_empty());
}

#[test]
fn read_into_fills_caller_buffer() {
    let data = compressible_bytes(3_000);
    let compressed = one_stream(&ZlibCodec, &data, 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);

    let mut buf = [0u8; 1_024];
    assert_eq!(f.read_into(&mut buf).unwrap(), 1_024);
    assert_eq!(&buf[..], &data[..1_024]);

    // Drain the rest, then readinto reports 0 at EOF.
    f.read(None).unwrap();
    assert_eq!(f.read_into(&mut buf).unwrap(), 0);
}

#[test]
fn peek_at_eof_returns_empty() {
    let compressed = one_stream(&Bzip2Codec, b"xy", 9);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);
    assert_eq!(f.read(None).unwrap(), b"xy");
    assert!(f.peek().unwrap().is_empty());
}

// ── line operations ────────────────────────────────────────────────────────

#[test]
fn read_line_splits_on_newline() {
    let text = b"alpha\nbeta\ngamma";
    let compressed = one_stream(&Bzip2Codec, text, 9);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);

    assert_eq!(f.read_line(None).unwrap(), b"alpha\n");
    assert_eq!(f.read_line(None).unwrap(), b"beta\n");
    assert_eq!(f.read_line(None).unwrap(), b"gamma");
    assert!(f.read_line(None).unwrap().is_empty());
}

#[test]
fn read_line_honors_size_limit() {
    let compressed = one_stream(&ZlibCodec, b"a very long line\n", 9);
    let f = read_handle(Arc::new(ZlibCodec), compressed);

    assert_eq!(f.read_line(Some(6)).unwrap(), b"a very");
    assert_eq!(f.read_line(None).unwrap(), b" long line\n");
}

#[test]
fn read_lines_with_and_without_hint() {
    let text = b"one\ntwo\nthree\n";
    let compressed = one_stream(&Bzip2Codec, text, 9);

    let f = read_handle(Arc::new(Bzip2Codec), compressed.clone());
    let all = f.read_lines(None).unwrap();
    assert_eq!(all, vec![b"one\n".to_vec(), b"two\n".to_vec(), b"three\n".to_vec()]);

    // Hint stops after the line that crosses it.
    let f = read_handle(Arc::new(Bzip2Codec), compressed);
    let some = f.read_lines(Some(5)).unwrap();
    assert_eq!(some, vec![b"one\n".to_vec(), b"two\n".to_vec()]);
}

#[test]
fn write_lines_round_trip() {
    let path = temp_path("writelines");
    let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), 9).unwrap();
    let written = f
        .write_lines([b"no\n".as_slice(), b"separators\n", b"added"])
        .unwrap();
    assert_eq!(written, "no\nseparators\nadded".len());
    f.close().unwrap();

    let f = CompressedFile::open(&path, OpenMode::Read, Arc::new(Bzip2Codec), 9).unwrap();
    assert_eq!(f.read(None).unwrap(), b"no\nseparators\nadded");
    f.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

// ── endpoint ownership ─────────────────────────────────────────────────────

#[test]
fn borrowed_endpoint_survives_close() {
    let compressed = one_stream(&Bzip2Codec, b"borrowed", 9);
    let f = read_handle(Arc::new(Bzip2Codec), compressed);
    f.read(Some(4)).unwrap();
    let endpoint = f.into_endpoint().unwrap();
    assert!(endpoint.is_some(), "borrowed endpoint is handed back");
}

#[test]
fn position_tracking_through_mixed_operations() {
    let data = compressible_bytes(2_000);
    let compressed = one_stream(&ZstdCodec, &data, 3);
    let f = read_handle(Arc::new(ZstdCodec), compressed);

    assert_eq!(f.tell().unwrap(), 0);
    f.read(Some(100)).unwrap();
    assert_eq!(f.tell().unwrap(), 100);
    f.peek().unwrap();
    assert_eq!(f.tell().unwrap(), 100);
    f.read_line(None).unwrap();
    assert!(f.tell().unwrap() > 100);
    f.seek(SeekFrom::Start(50)).unwrap();
    assert_eq!(f.tell().unwrap(), 50);
}

#[test]
fn write_position_counts_uncompressed_bytes() {
    let path = temp_path("write_pos");
    let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), 9).unwrap();
    assert_eq!(f.write(&[0u8; 1_234]).unwrap(), 1_234);
    assert_eq!(f.tell().unwrap(), 1_234);
    assert_eq!(f.write(b"more").unwrap(), 4);
    assert_eq!(f.tell().unwrap(), 1_238);
    f.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn fileno_reflects_endpoint_capability() {
    let path = temp_path("fileno");
    let f = CompressedFile::open(&path, OpenMode::Write, Arc::new(Bzip2Codec), 9).unwrap();
    #[cfg(unix)]
    assert!(f.fileno().unwrap() >= 0);
    f.close().unwrap();
    std::fs::remove_file(&path).unwrap();

    let f = read_handle(Arc::new(Bzip2Codec), one_stream(&Bzip2Codec, b"x", 9));
    assert!(matches!(f.fileno(), Err(Error::Unsupported(_))));
}

#[test]
fn std_io_trait_impls_delegate() {
    use std::io::{Read, Seek};

    let data = compressible_bytes(1_000);
    let compressed = one_stream(&Bzip2Codec, &data, 9);
    let mut f = read_handle(Arc::new(Bzip2Codec), compressed);

    let mut buf = [0u8; 256];
    f.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..], &data[..256]);
    assert_eq!(Seek::seek(&mut f, SeekFrom::Start(0)).unwrap(), 0);
    let mut all = Vec::new();
    f.read_to_end(&mut all).unwrap();
    assert_eq!(all, data);
}
