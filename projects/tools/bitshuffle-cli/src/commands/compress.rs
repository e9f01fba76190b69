use crate::error::CliError;
use crate::util::{
    element_count, print_report, read_file, write_file, ChunkHeader, CHUNK_HEADER_SIZE,
};
use argh::FromArgs;
use bitshuffle_core::{compress_bound, resolve_block_size, BitshuffleError, BlockCompressor};
#[cfg(feature = "multithreaded")]
use bitshuffle_core::{compress_parallel, decompress_parallel};
#[cfg(not(feature = "multithreaded"))]
use bitshuffle_core::{compress as compress_parallel, decompress as decompress_parallel};
use bitshuffle_lz4::Lz4BlockCompressor;
use bitshuffle_zstd::ZstdBlockCompressor;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

/// General purpose compressor applied to each shuffled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Lz4,
    Zstd,
}

impl std::str::FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            _ => Err(format!("Unknown codec: {s}. Valid options: lz4, zstd")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Bit shuffle and compress a raw file of fixed width elements
#[argh(subcommand, name = "compress")]
pub struct CompressCmd {
    /// input file path
    #[argh(option)]
    pub input: PathBuf,

    /// output file path
    #[argh(option)]
    pub output: PathBuf,

    /// width of one element in bytes
    #[argh(option)]
    pub elem_size: usize,

    /// elements per block, a multiple of 8 [default: 0, picks the default block size]
    #[argh(option, default = "0")]
    pub block_size: usize,

    /// block compressor: lz4, zstd [default: lz4]
    #[argh(option, default = "Codec::Lz4")]
    pub codec: Codec,

    /// zstd compression level [default: 3]
    #[argh(option)]
    pub level: Option<i32>,

    /// worker threads, 0 for one per core, 1 for the sequential driver [default: 0]
    #[argh(option, default = "0")]
    pub threads: usize,
}

#[derive(FromArgs, Debug)]
/// Decompress a file written by `compress`
#[argh(subcommand, name = "decompress")]
pub struct DecompressCmd {
    /// input file path
    #[argh(option)]
    pub input: PathBuf,

    /// output file path
    #[argh(option)]
    pub output: PathBuf,

    /// width of one element in bytes, as used to compress
    #[argh(option)]
    pub elem_size: usize,

    /// block compressor used to compress: lz4, zstd [default: lz4]
    #[argh(option, default = "Codec::Lz4")]
    pub codec: Codec,

    /// worker threads, 0 for one per core, 1 for the sequential driver [default: 0]
    #[argh(option, default = "0")]
    pub threads: usize,
}

/// Element count, element size and block size of one run.
#[derive(Debug, Clone, Copy)]
struct Layout {
    size: usize,
    elem_size: usize,
    block_size: usize,
}

pub fn handle_compress_command(cmd: CompressCmd) -> Result<(), CliError> {
    let data = read_file(&cmd.input)?;
    let size = element_count(data.len(), cmd.elem_size)?;
    let block_size = resolve_block_size(cmd.block_size, cmd.elem_size)?;
    let layout = Layout {
        size,
        elem_size: cmd.elem_size,
        block_size,
    };
    info!(
        "compress: {} ({size} elements of {} bytes, blocks of {block_size}, {:?})",
        cmd.input.display(),
        cmd.elem_size,
        cmd.codec
    );

    let start = Instant::now();
    let compressed = match cmd.codec {
        Codec::Lz4 => {
            if cmd.level.is_some() {
                warn!("--level has no effect with lz4");
            }
            compress_chunk(&Lz4BlockCompressor, &data, layout, cmd.threads)?
        }
        Codec::Zstd => {
            let compressor = match cmd.level {
                Some(level) => ZstdBlockCompressor::new(level)?,
                None => ZstdBlockCompressor::default(),
            };
            compress_chunk(&compressor, &data, layout, cmd.threads)?
        }
    };
    let elapsed = start.elapsed();

    write_file(&cmd.output, &compressed)?;
    print_report("Compress", data.len(), compressed.len(), elapsed);
    Ok(())
}

pub fn handle_decompress_command(cmd: DecompressCmd) -> Result<(), CliError> {
    let data = read_file(&cmd.input)?;
    if cmd.elem_size == 0 {
        return Err(CliError::InvalidInput(
            "Element size must be at least 1 byte".into(),
        ));
    }
    let (header, frames) = ChunkHeader::parse(&data)?;
    let (size, block_size) = header.layout(cmd.elem_size, frames.len())?;
    let layout = Layout {
        size,
        elem_size: cmd.elem_size,
        block_size,
    };
    info!(
        "decompress: {} ({size} elements of {} bytes, blocks of {block_size}, {:?})",
        cmd.input.display(),
        cmd.elem_size,
        cmd.codec
    );

    let start = Instant::now();
    let decompressed = match cmd.codec {
        Codec::Lz4 => decompress_chunk(&Lz4BlockCompressor, frames, layout, cmd.threads)?,
        Codec::Zstd => {
            decompress_chunk(&ZstdBlockCompressor::default(), frames, layout, cmd.threads)?
        }
    };
    let elapsed = start.elapsed();

    write_file(&cmd.output, &decompressed)?;
    print_report("Decompress", data.len(), decompressed.len(), elapsed);
    Ok(())
}

/// Compresses `data` into a chunk: [`ChunkHeader`] followed by the frame stream.
fn compress_chunk<C: BlockCompressor>(
    compressor: &C,
    data: &[u8],
    layout: Layout,
    threads: usize,
) -> Result<Vec<u8>, CliError> {
    let Layout {
        size,
        elem_size,
        block_size,
    } = layout;
    let header = ChunkHeader::new(size, elem_size, block_size)?;
    let bound = compress_bound(compressor, size, elem_size, block_size)?;

    let mut chunk = vec![0u8; CHUNK_HEADER_SIZE + bound];
    chunk[..CHUNK_HEADER_SIZE].copy_from_slice(&header.to_bytes());
    let written = run_with_threads(threads, || {
        let output = &mut chunk[CHUNK_HEADER_SIZE..];
        if threads == 1 {
            bitshuffle_core::compress(compressor, data, output, size, elem_size, block_size)
        } else {
            compress_parallel(compressor, data, output, size, elem_size, block_size)
        }
    })?;

    chunk.truncate(CHUNK_HEADER_SIZE + written);
    Ok(chunk)
}

fn decompress_chunk<C: BlockCompressor>(
    compressor: &C,
    frames: &[u8],
    layout: Layout,
    threads: usize,
) -> Result<Vec<u8>, CliError> {
    let Layout {
        size,
        elem_size,
        block_size,
    } = layout;

    let total = size * elem_size;
    let mut output = Vec::new();
    output.try_reserve_exact(total).map_err(|_| {
        CliError::InvalidInput(format!(
            "Cannot allocate {total} bytes for the decompressed output"
        ))
    })?;
    output.resize(total, 0);
    let read = run_with_threads(threads, || {
        if threads == 1 {
            bitshuffle_core::decompress(compressor, frames, &mut output, size, elem_size, block_size)
        } else {
            decompress_parallel(compressor, frames, &mut output, size, elem_size, block_size)
        }
    })?;

    if read != frames.len() {
        warn!("{} trailing bytes after the last frame", frames.len() - read);
    }
    Ok(output)
}

/// Runs `job` on a rayon pool of `threads` workers (0 = rayon's default).
#[cfg(feature = "multithreaded")]
fn run_with_threads<F>(threads: usize, job: F) -> Result<usize, CliError>
where
    F: FnOnce() -> Result<usize, BitshuffleError> + Send,
{
    if threads == 1 {
        return Ok(job()?);
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    Ok(pool.install(job)?)
}

#[cfg(not(feature = "multithreaded"))]
fn run_with_threads<F>(threads: usize, job: F) -> Result<usize, CliError>
where
    F: FnOnce() -> Result<usize, BitshuffleError> + Send,
{
    if threads > 1 {
        warn!("built without multithreading, running on one thread");
    }
    Ok(job()?)
}
