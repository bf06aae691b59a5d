use std::fs::File;
use std::io::{self, BufReader, Read, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use zseek_codecs::codec_by_name;
use zseek_core::{Codec, CompressedFile, OpenMode, DEFAULT_COMPRESSION_LEVEL};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "zseek",
    about = "Seekable access to sequentially compressed files (bzip2, zlib, zstd)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a single sequential stream
    Compress {
        /// Source file to compress ("-" reads stdin)
        input: PathBuf,
        /// Destination compressed file
        output: PathBuf,
        /// Codec to use: bzip2 | zlib | zstd (default: inferred from output extension)
        #[arg(short, long)]
        codec: Option<String>,
        /// Compression level (1–9)
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: u32,
        /// Append to the output instead of truncating it, producing a
        /// concatenated multi-stream file
        #[arg(long)]
        append: bool,
    },
    /// Fully decompress a file back to raw bytes
    Decompress {
        /// Source compressed file
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        /// Codec to use (default: inferred from input extension)
        #[arg(short, long)]
        codec: Option<String>,
    },
    /// Seek into a compressed file and print a slice of its decompressed bytes
    ///
    /// The demonstration here is emulated random access: the handle rewinds
    /// and discards up to the requested offset, then decodes only the slice.
    Range {
        /// Compressed file
        file: PathBuf,
        /// Decompressed byte offset to seek to (negative counts from the end)
        #[arg(short, long, allow_hyphen_values = true)]
        start: i64,
        /// Number of bytes to read
        #[arg(short, long, default_value_t = 256)]
        len: usize,
        /// Codec to use (default: inferred from extension)
        #[arg(short, long)]
        codec: Option<String>,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report the decompressed size of a file by draining it once
    Size {
        /// Compressed file
        file: PathBuf,
        /// Codec to use (default: inferred from extension)
        #[arg(short, long)]
        codec: Option<String>,
    },
    /// Print the first N decompressed lines
    Lines {
        /// Compressed file
        file: PathBuf,
        /// Number of lines to print
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// Codec to use (default: inferred from extension)
        #[arg(short, long)]
        codec: Option<String>,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Pick a codec from the explicit flag or, failing that, the file extension.
fn resolve_codec(flag: Option<&str>, path: &Path) -> anyhow::Result<Arc<dyn Codec>> {
    if let Some(name) = flag {
        return codec_by_name(name).map_err(anyhow::Error::from);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "bz2" => codec_by_name("bzip2").map_err(anyhow::Error::from),
        "zz" | "zlib" => codec_by_name("zlib").map_err(anyhow::Error::from),
        "zst" => codec_by_name("zstd").map_err(anyhow::Error::from),
        _ => anyhow::bail!(
            "cannot infer codec from {:?}; pass --codec bzip2|zlib|zstd",
            path
        ),
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn hexdump(data: &[u8], base_offset: u64) {
    for (i, chunk) in data.chunks(16).enumerate() {
        print!("  {:08x}  ", base_offset + (i * 16) as u64);
        for b in chunk {
            print!("{:02x} ", b);
        }
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec_flag: Option<&str>,
    level: u32,
    append: bool,
) -> anyhow::Result<()> {
    let codec = resolve_codec(codec_flag, &output)?;
    let codec_display = codec.name();
    let mode = if append {
        OpenMode::Append
    } else {
        OpenMode::Write
    };
    let writer = CompressedFile::open(&output, mode, codec, level)
        .with_context(|| format!("creating output file {:?}", output))?;

    let t0 = Instant::now();
    let mut total = 0u64;
    let mut buf = vec![0u8; 64 * 1024];

    if input.to_str() == Some("-") {
        let stdin = io::stdin();
        let mut src = stdin.lock();
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write(&buf[..n])?;
            total += n as u64;
        }
    } else {
        let file =
            File::open(&input).with_context(|| format!("opening input file {:?}", input))?;
        let mut src = BufReader::new(file);
        loop {
            let n = src.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write(&buf[..n])?;
            total += n as u64;
        }
    }

    writer.close()?;
    let elapsed = t0.elapsed();

    let compressed_size = std::fs::metadata(&output)?.len();
    let ratio = total as f64 / compressed_size.max(1) as f64;

    eprintln!("  codec       : {}", codec_display);
    eprintln!("  level       : {}", level);
    eprintln!("  raw size    : {}", human_bytes(total));
    eprintln!("  compressed  : {}", human_bytes(compressed_size));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((total as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    codec_flag: Option<&str>,
) -> anyhow::Result<()> {
    let codec = resolve_codec(codec_flag, &input)?;
    let reader = CompressedFile::open(&input, OpenMode::Read, codec, DEFAULT_COMPRESSION_LEVEL)
        .with_context(|| format!("opening input file {:?}", input))?;

    let is_stdout = output.to_str() == Some("-");
    let mut dst: Box<dyn Write> = if is_stdout {
        Box::new(io::stdout())
    } else {
        Box::new(
            File::create(&output).with_context(|| format!("creating output file {:?}", output))?,
        )
    };

    let t0 = Instant::now();
    let mut total = 0u64;
    loop {
        // read1 bounds memory to roughly one decode step.
        let chunk = reader.read1(None)?;
        if chunk.is_empty() {
            break;
        }
        total += chunk.len() as u64;
        dst.write_all(&chunk)?;
    }
    dst.flush()?;
    reader.close()?;

    let elapsed = t0.elapsed();
    eprintln!("  raw size    : {}", human_bytes(total));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((total as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_range(
    file: PathBuf,
    start: i64,
    len: usize,
    codec_flag: Option<&str>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let codec = resolve_codec(codec_flag, &file)?;
    let reader = CompressedFile::open(&file, OpenMode::Read, codec, DEFAULT_COMPRESSION_LEVEL)
        .with_context(|| format!("opening {:?}", file))?;

    let target = if start < 0 {
        SeekFrom::End(start)
    } else {
        SeekFrom::Start(start as u64)
    };

    let t0 = Instant::now();
    let pos = reader.seek(target)?;
    let data = reader.read(Some(len))?;
    let elapsed = t0.elapsed();
    reader.close()?;

    eprintln!(
        "  decoded {} at offset {} in {:.3}ms",
        human_bytes(data.len() as u64),
        pos,
        elapsed.as_secs_f64() * 1000.0
    );

    match output {
        Some(path) => {
            std::fs::write(&path, &data)?;
            eprintln!("  written to {:?}", path);
        }
        None => {
            println!("--- {} bytes at offset {} ---", data.len(), pos);
            hexdump(&data, pos);
        }
    }
    Ok(())
}

fn run_size(file: PathBuf, codec_flag: Option<&str>) -> anyhow::Result<()> {
    let codec = resolve_codec(codec_flag, &file)?;
    let reader = CompressedFile::open(&file, OpenMode::Read, codec, DEFAULT_COMPRESSION_LEVEL)
        .with_context(|| format!("opening {:?}", file))?;
    let compressed_size = std::fs::metadata(&file)?.len();

    let t0 = Instant::now();
    let size = reader.seek(SeekFrom::End(0))?;
    let elapsed = t0.elapsed();
    reader.close()?;

    println!("  compressed  : {}", human_bytes(compressed_size));
    println!("  raw size    : {}", human_bytes(size));
    println!(
        "  ratio       : {:.2}x",
        size as f64 / compressed_size.max(1) as f64
    );
    println!("  drained in  : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_lines(file: PathBuf, count: usize, codec_flag: Option<&str>) -> anyhow::Result<()> {
    let codec = resolve_codec(codec_flag, &file)?;
    let reader = CompressedFile::open(&file, OpenMode::Read, codec, DEFAULT_COMPRESSION_LEVEL)
        .with_context(|| format!("opening {:?}", file))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for _ in 0..count {
        let line = reader.read_line(None)?;
        if line.is_empty() {
            break;
        }
        out.write_all(&line)?;
        if !line.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
    }
    reader.close()?;
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            level,
            append,
        } => run_compress(input, output, codec.as_deref(), level, append),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, codec.as_deref()),
        Commands::Range {
            file,
            start,
            len,
            codec,
            output,
        } => run_range(file, start, len, codec.as_deref(), output),
        Commands::Size { file, codec } => run_size(file, codec.as_deref()),
        Commands::Lines { file, count, codec } => run_lines(file, count, codec.as_deref()),
    }
}
