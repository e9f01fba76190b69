//! Compression framing on top of the blocked driver.
//!
//! Every block is bit shuffled, compressed with a [`BlockCompressor`] and written as a frame:
//! a 4-byte big-endian payload length followed by the compressor's output. The partial block
//! is framed like the full ones. The final `size % 8` elements follow the last frame raw, with
//! no header.
//!
//! The block size is not stored in the stream; decoders must be given the same value the
//! encoder used.

#[cfg(feature = "multithreaded")]
mod parallel;

#[cfg(feature = "multithreaded")]
pub use parallel::{compress_parallel, decompress_parallel, StagedBlockWorker};

use crate::allocate::ScratchBuffer;
use crate::blocked::{run_plan, BlockPlan, BlockWorker, ReadCursor, WriteCursor};
use crate::cpu_detect::Capability;
use crate::error::{BitshuffleError, CompressorError};
use crate::transpose::{total_bytes, trans_bit_elem_with, untrans_bit_elem_with};
use log::{debug, warn};

/// Size of the big-endian length prefix in front of every frame.
pub const FRAME_HEADER_SIZE: usize = 4;

/// A general purpose compressor for individual blocks.
///
/// Implementations must be shareable across threads; the parallel drivers call them
/// concurrently.
pub trait BlockCompressor: Sync {
    /// Short name of the compressor, used in error reports.
    fn name(&self) -> &'static str;

    /// Upper bound of the compressed size of `len` input bytes.
    fn max_compressed_size(&self, len: usize) -> usize;

    /// Compresses `input` into `output`, which holds at least
    /// [`BlockCompressor::max_compressed_size`] bytes.
    ///
    /// # Returns
    ///
    /// The number of bytes written to `output`.
    fn compress_block(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressorError>;

    /// Decompresses `input` into `output`.
    ///
    /// # Returns
    ///
    /// The number of bytes written to `output`.
    fn decompress_block(&self, input: &[u8], output: &mut [u8])
        -> Result<usize, CompressorError>;
}

/// Upper bound of one frame holding `block_bytes` uncompressed bytes.
#[inline]
fn frame_bound<C: BlockCompressor + ?Sized>(compressor: &C, block_bytes: usize) -> usize {
    compressor.max_compressed_size(block_bytes) + FRAME_HEADER_SIZE
}

fn bound_for_plan<C: BlockCompressor + ?Sized>(compressor: &C, plan: &BlockPlan) -> usize {
    let full = frame_bound(compressor, total_bytes(plan.block_size, plan.elem_size));
    let mut bound = full.saturating_mul(plan.full_blocks);
    if plan.last_block > 0 {
        bound += frame_bound(compressor, total_bytes(plan.last_block, plan.elem_size));
    }
    bound + plan.leftover_bytes()
}

/// Returns the largest output [`compress`] can produce for these parameters.
///
/// # Errors
///
/// - [`BitshuffleError::InvalidElementSize`] if `elem_size` is zero
/// - [`BitshuffleError::InvalidBlockSize`] if `block_size` is not a multiple of 8
pub fn compress_bound<C: BlockCompressor + ?Sized>(
    compressor: &C,
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = BlockPlan::new(size, elem_size, block_size)?;
    Ok(bound_for_plan(compressor, &plan))
}

/// Shuffle and compress state shared by the encoding and decoding workers.
///
/// Holds the two block sized scratch regions a worker reuses for every block.
pub(crate) struct FrameCodec<'c, C: BlockCompressor + ?Sized> {
    compressor: &'c C,
    capability: Capability,
    block: ScratchBuffer,
    transpose: ScratchBuffer,
}

impl<'c, C: BlockCompressor + ?Sized> FrameCodec<'c, C> {
    fn new(
        compressor: &'c C,
        capability: Capability,
        max_block_bytes: usize,
    ) -> Result<Self, BitshuffleError> {
        if !capability.is_available() {
            return Err(BitshuffleError::UnsupportedCapability(capability));
        }
        Ok(Self {
            compressor,
            capability,
            block: ScratchBuffer::new(max_block_bytes)?,
            transpose: ScratchBuffer::new(max_block_bytes)?,
        })
    }

    #[cfg(feature = "multithreaded")]
    pub(crate) fn compressor(&self) -> &'c C {
        self.compressor
    }

    /// Shuffles `src` and writes one frame to the start of `dst`.
    ///
    /// Returns the frame length, header included.
    pub(crate) fn encode(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let shuffled = &mut self.block.as_mut_slice()[..src.len()];
        trans_bit_elem_with(
            self.capability,
            src,
            shuffled,
            self.transpose.as_mut_slice(),
            block_elems,
            elem_size,
        )?;

        if dst.len() < FRAME_HEADER_SIZE {
            return Err(BitshuffleError::OutputTooSmall {
                needed: FRAME_HEADER_SIZE,
                actual: dst.len(),
            });
        }
        let (header, payload) = dst.split_at_mut(FRAME_HEADER_SIZE);
        let compressed = self.compressor.compress_block(shuffled, payload)?;
        let length = u32::try_from(compressed)
            .map_err(|_| BitshuffleError::FrameTooLarge { length: compressed })?;
        header.copy_from_slice(&length.to_be_bytes());
        Ok(FRAME_HEADER_SIZE + compressed)
    }

    /// Decompresses and unshuffles one frame payload into `dst`.
    ///
    /// `claimed` is the payload length stated by the frame header.
    pub(crate) fn decode(
        &mut self,
        payload: &[u8],
        claimed: usize,
        dst: &mut [u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<(), BitshuffleError> {
        let nbyte = dst.len();
        let decompressed = &mut self.block.as_mut_slice()[..nbyte];
        let produced = self.compressor.decompress_block(payload, decompressed)?;
        if produced != nbyte {
            return Err(BitshuffleError::DecodeLengthMismatch {
                expected: nbyte,
                actual: produced,
            });
        }
        // A truncated payload must never decode successfully.
        if payload.len() != claimed {
            return Err(BitshuffleError::DecodeLengthMismatch {
                expected: claimed,
                actual: payload.len(),
            });
        }

        untrans_bit_elem_with(
            self.capability,
            decompressed,
            dst,
            self.transpose.as_mut_slice(),
            block_elems,
            elem_size,
        )?;
        Ok(())
    }
}

/// Splits the frame at the start of `input` into its payload, truncated to what is available.
///
/// Returns the payload and the payload length the header claims.
pub(crate) fn split_frame(
    input: &[u8],
    block_bytes: usize,
) -> Result<(&[u8], usize), BitshuffleError> {
    let Some((header, rest)) = input.split_first_chunk::<FRAME_HEADER_SIZE>() else {
        return Err(BitshuffleError::DecodeLengthMismatch {
            expected: block_bytes,
            actual: 0,
        });
    };
    let claimed = u32::from_be_bytes(*header) as usize;
    Ok((&rest[..claimed.min(rest.len())], claimed))
}

/// Worker that shuffles each block and writes it as a compressed frame.
pub struct FrameEncoder<'c, C: BlockCompressor + ?Sized> {
    pub(crate) codec: FrameCodec<'c, C>,
    #[cfg(feature = "multithreaded")]
    pub(crate) staged: parallel::Staging,
}

impl<'c, C: BlockCompressor + ?Sized> FrameEncoder<'c, C> {
    /// Creates an encoder for blocks of up to `max_block_bytes` bytes.
    ///
    /// # Errors
    ///
    /// - [`BitshuffleError::UnsupportedCapability`] if `capability` cannot run here
    /// - [`BitshuffleError::Allocation`] if the scratch buffers cannot be allocated
    pub fn new(
        compressor: &'c C,
        capability: Capability,
        max_block_bytes: usize,
    ) -> Result<Self, BitshuffleError> {
        Ok(Self {
            codec: FrameCodec::new(compressor, capability, max_block_bytes)?,
            #[cfg(feature = "multithreaded")]
            staged: parallel::Staging::default(),
        })
    }
}

impl<C: BlockCompressor + ?Sized> BlockWorker for FrameEncoder<'_, C> {
    fn process_block(
        &mut self,
        input: &mut ReadCursor<'_>,
        output: &mut WriteCursor<'_>,
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let src = input.read(total_bytes(block_elems, elem_size))?;
        let written = self
            .codec
            .encode(src, output.remaining_mut(), block_elems, elem_size)?;
        output.advance(written)?;
        Ok(written)
    }
}

/// Worker that reads each compressed frame and writes the unshuffled block.
pub struct FrameDecoder<'c, C: BlockCompressor + ?Sized> {
    pub(crate) codec: FrameCodec<'c, C>,
    #[cfg(feature = "multithreaded")]
    pub(crate) staged: parallel::Staging,
}

impl<'c, C: BlockCompressor + ?Sized> FrameDecoder<'c, C> {
    /// Creates a decoder for blocks of up to `max_block_bytes` bytes.
    ///
    /// # Errors
    ///
    /// - [`BitshuffleError::UnsupportedCapability`] if `capability` cannot run here
    /// - [`BitshuffleError::Allocation`] if the scratch buffers cannot be allocated
    pub fn new(
        compressor: &'c C,
        capability: Capability,
        max_block_bytes: usize,
    ) -> Result<Self, BitshuffleError> {
        Ok(Self {
            codec: FrameCodec::new(compressor, capability, max_block_bytes)?,
            #[cfg(feature = "multithreaded")]
            staged: parallel::Staging::default(),
        })
    }
}

impl<C: BlockCompressor + ?Sized> BlockWorker for FrameDecoder<'_, C> {
    fn process_block(
        &mut self,
        input: &mut ReadCursor<'_>,
        output: &mut WriteCursor<'_>,
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let nbyte = total_bytes(block_elems, elem_size);
        let (payload, claimed) = split_frame(input.remaining(), nbyte)?;
        let dst = output.reserve(nbyte)?;
        self.codec
            .decode(payload, claimed, dst, block_elems, elem_size)?;

        let consumed = FRAME_HEADER_SIZE + claimed;
        input.read(consumed)?;
        Ok(consumed)
    }
}

/// Bit shuffles and compresses `size` elements of `elem_size` bytes.
///
/// # Parameters
///
/// - `compressor`: The block compressor to apply to each shuffled block
/// - `input`: At least `size * elem_size` bytes to compress
/// - `output`: At least [`compress_bound`] bytes
/// - `size`: Number of elements
/// - `elem_size`: Width of one element in bytes
/// - `block_size`: Elements per block, a multiple of 8, or 0 for [`crate::default_block_size`]
///
/// # Returns
///
/// The number of bytes written to `output`.
///
/// # Errors
///
/// - [`BitshuffleError::OutputTooSmall`] if `output` is shorter than [`compress_bound`]
/// - [`BitshuffleError::Compressor`] if the compressor fails on any block
pub fn compress<C: BlockCompressor + ?Sized>(
    compressor: &C,
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = prepare_compress(compressor, input, output, size, elem_size, block_size)?;
    let capability = Capability::best();
    debug!(
        "compress ({}): {size} elements of {elem_size} bytes, block size {}, {capability:?}",
        compressor.name(),
        plan.block_size
    );

    let mut encoder = FrameEncoder::new(compressor, capability, plan.max_block_bytes())?;
    run_plan(&mut encoder, &plan, input, output)
}

/// Decompresses and unshuffles data written by [`compress`].
///
/// `size`, `elem_size` and `block_size` must match the values used to compress.
///
/// # Returns
///
/// The number of compressed bytes read from `input`.
///
/// # Errors
///
/// - [`BitshuffleError::OutputTooSmall`] if `output` is shorter than `size * elem_size`
/// - [`BitshuffleError::DecodeLengthMismatch`] or [`BitshuffleError::Compressor`] if the
///   stream is truncated or corrupted
pub fn decompress<C: BlockCompressor + ?Sized>(
    compressor: &C,
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = prepare_decompress(output, size, elem_size, block_size)?;
    let capability = Capability::best();
    debug!(
        "decompress ({}): {size} elements of {elem_size} bytes, block size {}, {capability:?}",
        compressor.name(),
        plan.block_size
    );

    let mut decoder = FrameDecoder::new(compressor, capability, plan.max_block_bytes())?;
    run_plan(&mut decoder, &plan, input, output).inspect_err(|err| {
        warn!("decompress ({}) failed: {err}", compressor.name());
    })
}

pub(crate) fn prepare_compress<C: BlockCompressor + ?Sized>(
    compressor: &C,
    input: &[u8],
    output: &[u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<BlockPlan, BitshuffleError> {
    let plan = BlockPlan::new(size, elem_size, block_size)?;
    let nbyte = plan.total_bytes();
    if input.len() < nbyte {
        return Err(BitshuffleError::InputTooSmall {
            needed: nbyte,
            actual: input.len(),
        });
    }
    let bound = bound_for_plan(compressor, &plan);
    if output.len() < bound {
        return Err(BitshuffleError::OutputTooSmall {
            needed: bound,
            actual: output.len(),
        });
    }
    Ok(plan)
}

pub(crate) fn prepare_decompress(
    output: &[u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<BlockPlan, BitshuffleError> {
    let plan = BlockPlan::new(size, elem_size, block_size)?;
    let nbyte = plan.total_bytes();
    if output.len() < nbyte {
        return Err(BitshuffleError::OutputTooSmall {
            needed: nbyte,
            actual: output.len(),
        });
    }
    Ok(plan)
}
