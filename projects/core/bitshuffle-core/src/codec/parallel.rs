//! Multithreaded compression framing.
//!
//! One [`IoChain`] iteration runs per block on the rayon pool. Iteration `i` learns where its
//! input starts from iteration `i - 1` (cheap: a frame header or a fixed block length), does
//! the expensive shuffle and (de)compression into its worker's private staging buffer, then
//! waits for its output offset and copies the staged bytes into place. The resulting stream is
//! byte-identical to the sequential [`super::compress`].

use super::{
    frame_bound, prepare_compress, prepare_decompress, split_frame, BlockCompressor,
    FrameDecoder, FrameEncoder, FRAME_HEADER_SIZE,
};
use crate::allocate::ScratchBuffer;
use crate::blocked::BlockPlan;
use crate::cpu_detect::Capability;
use crate::error::BitshuffleError;
use crate::iochain::IoChain;
use crate::transpose::total_bytes;
use core::marker::PhantomData;
use log::{debug, trace, warn};
use rayon::prelude::*;
use std::vec::Vec;

/// A block worker that can size its input before doing any work.
///
/// The parallel drivers call [`StagedBlockWorker::frame_len`] while holding up the next
/// iteration, so it must be cheap; [`StagedBlockWorker::stage`] runs concurrently with other
/// iterations.
pub trait StagedBlockWorker {
    /// Number of input bytes the block at the start of `input` occupies.
    fn frame_len(
        &self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError>;

    /// Processes the block at the start of `input` into the worker's staging buffer.
    ///
    /// # Returns
    ///
    /// The same count [`crate::blocked::BlockWorker::process_block`] would return.
    fn stage(
        &mut self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError>;

    /// Output of the last successful [`StagedBlockWorker::stage`] call.
    fn staged(&self) -> &[u8];
}

/// Staging buffer of a worker, allocated on first use and reused afterwards.
#[derive(Default)]
pub(crate) struct Staging {
    buffer: Option<ScratchBuffer>,
    len: usize,
}

impl Staging {
    fn prepare(&mut self, capacity: usize) -> Result<&mut [u8], BitshuffleError> {
        self.len = 0;
        let buffer = match self.buffer.take() {
            Some(buffer) if buffer.len() >= capacity => buffer,
            _ => ScratchBuffer::new(capacity)?,
        };
        let buffer = self.buffer.insert(buffer);
        Ok(&mut buffer.as_mut_slice()[..capacity])
    }

    fn bytes(&self) -> &[u8] {
        match &self.buffer {
            Some(buffer) => &buffer.as_slice()[..self.len],
            None => &[],
        }
    }
}

fn block_input(input: &[u8], nbyte: usize) -> Result<&[u8], BitshuffleError> {
    input
        .get(..nbyte)
        .ok_or(BitshuffleError::InputTooSmall {
            needed: nbyte,
            actual: input.len(),
        })
}

impl<C: BlockCompressor + ?Sized> StagedBlockWorker for FrameEncoder<'_, C> {
    fn frame_len(
        &self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let nbyte = total_bytes(block_elems, elem_size);
        block_input(input, nbyte).map(<[u8]>::len)
    }

    fn stage(
        &mut self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let src = block_input(input, total_bytes(block_elems, elem_size))?;
        let dst = self
            .staged
            .prepare(frame_bound(self.codec.compressor(), src.len()))?;
        let written = self.codec.encode(src, dst, block_elems, elem_size)?;
        self.staged.len = written;
        Ok(written)
    }

    fn staged(&self) -> &[u8] {
        self.staged.bytes()
    }
}

impl<C: BlockCompressor + ?Sized> StagedBlockWorker for FrameDecoder<'_, C> {
    fn frame_len(
        &self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let (_, claimed) = split_frame(input, total_bytes(block_elems, elem_size))?;
        Ok(FRAME_HEADER_SIZE + claimed)
    }

    fn stage(
        &mut self,
        input: &[u8],
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let nbyte = total_bytes(block_elems, elem_size);
        let (payload, claimed) = split_frame(input, nbyte)?;
        let dst = self.staged.prepare(nbyte)?;
        self.codec
            .decode(payload, claimed, dst, block_elems, elem_size)?;
        self.staged.len = nbyte;
        Ok(FRAME_HEADER_SIZE + claimed)
    }

    fn staged(&self) -> &[u8] {
        self.staged.bytes()
    }
}

/// An output buffer that several threads write to at disjoint offsets.
pub(crate) struct SharedOutput<'a> {
    ptr: *mut u8,
    len: usize,
    _buffer: PhantomData<&'a mut [u8]>,
}

// SAFETY: writes go through `write`, whose callers guarantee disjoint ranges.
unsafe impl Send for SharedOutput<'_> {}
unsafe impl Sync for SharedOutput<'_> {}

impl<'a> SharedOutput<'a> {
    pub(crate) fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            ptr: buffer.as_mut_ptr(),
            len: buffer.len(),
            _buffer: PhantomData,
        }
    }

    /// Copies `bytes` to `offset`.
    ///
    /// # Safety
    ///
    /// No other thread may write to `offset..offset + bytes.len()` at the same time.
    pub(crate) unsafe fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), BitshuffleError> {
        match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.len => {
                core::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(offset), bytes.len());
                Ok(())
            }
            _ => Err(BitshuffleError::OutputTooSmall {
                needed: offset.saturating_add(bytes.len()),
                actual: self.len,
            }),
        }
    }
}

/// Result of one chain iteration: its index and the worker's count.
type IterationResult = (usize, Result<usize, BitshuffleError>);

/// Runs one chain iteration. Always completes every chain step, even on failure.
fn run_iteration<W: StagedBlockWorker>(
    chain: &IoChain,
    worker: &mut Result<W, BitshuffleError>,
    plan: &BlockPlan,
    input: &[u8],
    output: &SharedOutput<'_>,
) -> IterationResult {
    let claim = chain.get_in();
    let iteration = claim.iteration();
    let in_offset = claim.input();
    let block_elems = plan.block_elems(iteration);
    let frame = input.get(in_offset..).unwrap_or_default();

    let worker = match worker {
        Ok(worker) => worker,
        Err(err) => {
            let out = claim.set_next_in(in_offset).get_out();
            let out_offset = out.output();
            out.set_next_out(out_offset);
            return (iteration, Err(err.clone()));
        }
    };

    let frame_len = worker.frame_len(frame, block_elems, plan.elem_size);
    let consumed = frame_len.as_ref().map_or(0, |len| *len);
    let pending = claim.set_next_in(in_offset.saturating_add(consumed));

    let staged = frame_len.and_then(|_| worker.stage(frame, block_elems, plan.elem_size));

    let out = pending.get_out();
    let out_offset = out.output();
    let placed = staged.and_then(|count| {
        let bytes = worker.staged();
        // SAFETY: the chain places every iteration after the bytes of the previous one.
        unsafe { output.write(out_offset, bytes)? };
        Ok((count, bytes.len()))
    });
    let produced = placed.as_ref().map_or(0, |(_, len)| *len);
    out.set_next_out(out_offset + produced);

    trace!("block {iteration}: input {in_offset}+{consumed}, output {out_offset}+{produced}");
    (iteration, placed.map(|(count, _)| count))
}

/// Runs every block of `plan` through the chain, then copies the leftover elements.
fn run_parallel<W, F>(
    make_worker: F,
    plan: &BlockPlan,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BitshuffleError>
where
    W: StagedBlockWorker,
    F: Fn() -> Result<W, BitshuffleError> + Sync + Send,
{
    let chain = IoChain::new(0, 0);
    let output = SharedOutput::new(output);

    let results: Vec<IterationResult> = (0..plan.block_count())
        .into_par_iter()
        .map_init(&make_worker, |worker, _| {
            run_iteration(&chain, worker, plan, input, &output)
        })
        .collect();

    // The leftover is one more iteration, so it lands after the last block.
    let claim = chain.get_in();
    let in_offset = claim.input();
    let leftover = plan.leftover_bytes();
    let out = claim.set_next_in(in_offset.saturating_add(leftover)).get_out();
    let out_offset = out.output();
    let tail = input
        .get(in_offset..in_offset.saturating_add(leftover))
        .ok_or(BitshuffleError::InputTooSmall {
            needed: in_offset.saturating_add(leftover),
            actual: input.len(),
        })
        .and_then(|tail| {
            // SAFETY: every block iteration has finished.
            unsafe { output.write(out_offset, tail) }
        });
    out.set_next_out(out_offset + leftover);

    let mut total = 0;
    let mut first_error: Option<(usize, BitshuffleError)> = None;
    for (iteration, result) in results {
        match result {
            Ok(count) => total += count,
            Err(err) => {
                if first_error.as_ref().is_none_or(|(first, _)| iteration < *first) {
                    first_error = Some((iteration, err));
                }
            }
        }
    }
    if let Some((iteration, err)) = first_error {
        warn!("block {iteration} failed: {err}");
        return Err(err);
    }

    tail?;
    Ok(total + leftover)
}

/// Multithreaded [`super::compress`]. Produces byte-identical output.
///
/// Runs on the current rayon thread pool.
pub fn compress_parallel<C: BlockCompressor + ?Sized>(
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
        "compress_parallel ({}): {size} elements of {elem_size} bytes, block size {}, {} blocks, {capability:?}",
        compressor.name(),
        plan.block_size,
        plan.block_count()
    );

    let max_block_bytes = plan.max_block_bytes();
    run_parallel(
        || FrameEncoder::new(compressor, capability, max_block_bytes),
        &plan,
        input,
        output,
    )
}

/// Multithreaded [`super::decompress`].
///
/// Returns the number of compressed bytes read, like the sequential version.
pub fn decompress_parallel<C: BlockCompressor + ?Sized>(
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
        "decompress_parallel ({}): {size} elements of {elem_size} bytes, block size {}, {} blocks, {capability:?}",
        compressor.name(),
        plan.block_size,
        plan.block_count()
    );

    let max_block_bytes = plan.max_block_bytes();
    run_parallel(
        || FrameDecoder::new(compressor, capability, max_block_bytes),
        &plan,
        input,
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::StoreCompressor;
    use crate::codec::{compress, compress_bound, decompress};
    use crate::test_prelude::*;

    #[rstest]
    #[case(0, 4, 0)]
    #[case(7, 4, 0)]
    #[case(1024, 8, 0)]
    #[case(1003, 3, 64)]
    #[case(4099, 2, 8)]
    fn parallel_matches_sequential(
        #[case] size: usize,
        #[case] elem_size: usize,
        #[case] block_size: usize,
    ) {
        let input = smooth_elements(size, elem_size);
        let bound = compress_bound(&StoreCompressor, size, elem_size, block_size).unwrap();

        let mut sequential = vec![0u8; bound];
        let seq_len = compress(
            &StoreCompressor,
            &input,
            &mut sequential,
            size,
            elem_size,
            block_size,
        )
        .unwrap();

        let mut parallel = vec![0u8; bound];
        let par_len = compress_parallel(
            &StoreCompressor,
            &input,
            &mut parallel,
            size,
            elem_size,
            block_size,
        )
        .unwrap();
        assert_eq!(par_len, seq_len);
        assert_eq!(parallel[..par_len], sequential[..seq_len]);

        let mut restored = vec![0u8; input.len()];
        let read = decompress_parallel(
            &StoreCompressor,
            &parallel[..par_len],
            &mut restored,
            size,
            elem_size,
            block_size,
        )
        .unwrap();
        assert_eq!(read, par_len);
        assert_eq!(restored, input);

        let mut restored_seq = vec![0u8; input.len()];
        decompress(
            &StoreCompressor,
            &parallel[..par_len],
            &mut restored_seq,
            size,
            elem_size,
            block_size,
        )
        .unwrap();
        assert_eq!(restored_seq, input);
    }

    #[test]
    fn reports_first_corrupt_block() {
        let (size, elem_size, block_size) = (64, 4, 8);
        let input = pseudo_random_bytes(size * elem_size, 31);
        let mut compressed =
            vec![0u8; compress_bound(&StoreCompressor, size, elem_size, block_size).unwrap()];
        let len = compress(
            &StoreCompressor,
            &input,
            &mut compressed,
            size,
            elem_size,
            block_size,
        )
        .unwrap();

        // Every frame is 4 + 33 bytes. Break the marker of block 3 and block 5.
        compressed[3 * 37 + 4] = 0;
        compressed[5 * 37 + 4] = 0;

        let mut restored = vec![0u8; input.len()];
        let result = decompress_parallel(
            &StoreCompressor,
            &compressed[..len],
            &mut restored,
            size,
            elem_size,
            block_size,
        );
        assert_eq!(
            result,
            Err(BitshuffleError::Compressor(
                crate::error::CompressorError::new("store", -2)
            ))
        );
    }

    #[test]
    fn truncated_stream_fails() {
        let (size, elem_size, block_size) = (64, 2, 16);
        let input = pseudo_random_bytes(size * elem_size, 12);
        let mut compressed =
            vec![0u8; compress_bound(&StoreCompressor, size, elem_size, block_size).unwrap()];
        let len = compress(
            &StoreCompressor,
            &input,
            &mut compressed,
            size,
            elem_size,
            block_size,
        )
        .unwrap();

        let mut restored = vec![0u8; input.len()];
        let result = decompress_parallel(
            &StoreCompressor,
            &compressed[..len - 5],
            &mut restored,
            size,
            elem_size,
            block_size,
        );
        assert!(matches!(
            result,
            Err(BitshuffleError::DecodeLengthMismatch { .. } | BitshuffleError::Compressor(_))
        ));
    }
}
