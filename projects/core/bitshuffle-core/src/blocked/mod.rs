//! The blocked transform driver.
//!
//! A buffer of `size` elements is processed as `size / block_size` full blocks, then one
//! partial block holding the remaining elements rounded down to a multiple of 8, then the final
//! `size % 8` elements which are copied verbatim. Every block is handed to a [`BlockWorker`];
//! only the worker differs between shuffle, unshuffle, compress and decompress.

mod cursor;

pub use cursor::{ReadCursor, WriteCursor};

use crate::allocate::ScratchBuffer;
use crate::block_size::{resolve_block_size, BLOCKED_MULT};
use crate::cpu_detect::Capability;
use crate::error::BitshuffleError;
use crate::transpose::{check_buffers, total_bytes, trans_bit_elem_with, untrans_bit_elem_with};
use log::{debug, trace};

/// Processes one block of elements for the blocked driver.
pub trait BlockWorker {
    /// Processes `block_elems` elements of `elem_size` bytes.
    ///
    /// The worker reads its input from `input` and writes its output to `output`, advancing
    /// both by however many bytes it actually consumed and produced.
    ///
    /// # Returns
    ///
    /// A byte count that the driver sums over all blocks. Transform workers return the block's
    /// byte length, compressing workers the bytes written and decompressing workers the bytes
    /// read.
    fn process_block(
        &mut self,
        input: &mut ReadCursor<'_>,
        output: &mut WriteCursor<'_>,
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError>;
}

/// How a buffer splits into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    /// Total number of elements.
    pub size: usize,
    /// Width of one element in bytes.
    pub elem_size: usize,
    /// Resolved block size in elements, never zero.
    pub block_size: usize,
    /// Number of blocks holding exactly `block_size` elements.
    pub full_blocks: usize,
    /// Elements in the trailing partial block, a multiple of 8. Zero if there is none.
    pub last_block: usize,
    /// Elements after the last block, copied verbatim. Always below 8.
    pub leftover: usize,
}

impl BlockPlan {
    /// Plans `size` elements of `elem_size` bytes. A `block_size` of 0 selects the default.
    ///
    /// # Errors
    ///
    /// - [`BitshuffleError::InvalidElementSize`] if `elem_size` is zero
    /// - [`BitshuffleError::InvalidBlockSize`] if `block_size` is not a multiple of 8
    pub fn new(size: usize, elem_size: usize, block_size: usize) -> Result<Self, BitshuffleError> {
        let block_size = resolve_block_size(block_size, elem_size)?;
        let partial = size % block_size;
        Ok(Self {
            size,
            elem_size,
            block_size,
            full_blocks: size / block_size,
            last_block: partial - partial % BLOCKED_MULT,
            leftover: size % BLOCKED_MULT,
        })
    }

    /// Number of blocks handed to a worker.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.full_blocks + usize::from(self.last_block > 0)
    }

    /// Number of elements in block `index`.
    #[inline]
    pub fn block_elems(&self, index: usize) -> usize {
        if index < self.full_blocks {
            self.block_size
        } else {
            self.last_block
        }
    }

    /// Element counts of every block, in order.
    pub fn blocks(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.block_count()).map(|index| self.block_elems(index))
    }

    /// Largest block in bytes. Workers size their scratch buffers from this.
    #[inline]
    pub fn max_block_bytes(&self) -> usize {
        let elems = if self.full_blocks > 0 {
            self.block_size
        } else {
            self.last_block
        };
        total_bytes(elems, self.elem_size)
    }

    /// Bytes copied verbatim after the last block.
    #[inline]
    pub fn leftover_bytes(&self) -> usize {
        self.leftover * self.elem_size
    }

    /// Byte length of the uncompressed buffer.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        total_bytes(self.size, self.elem_size)
    }
}

/// Runs `worker` over every block of `input`, then copies the leftover elements.
///
/// # Returns
///
/// The sum of the worker's per block counts plus the leftover bytes.
///
/// # Errors
///
/// Fails on an invalid block or element size, and aborts on the first block the worker fails.
pub fn blocked_wrap<W: BlockWorker + ?Sized>(
    worker: &mut W,
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = BlockPlan::new(size, elem_size, block_size)?;
    run_plan(worker, &plan, input, output)
}

pub(crate) fn run_plan<W: BlockWorker + ?Sized>(
    worker: &mut W,
    plan: &BlockPlan,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BitshuffleError> {
    let mut in_cursor = ReadCursor::new(input);
    let mut out_cursor = WriteCursor::new(output);

    let mut total = 0;
    for (index, block_elems) in plan.blocks().enumerate() {
        trace!(
            "block {index}: {block_elems} elements at input offset {}, output offset {}",
            in_cursor.position(),
            out_cursor.position()
        );
        total += worker.process_block(&mut in_cursor, &mut out_cursor, block_elems, plan.elem_size)?;
    }

    let leftover = plan.leftover_bytes();
    out_cursor.write(in_cursor.read(leftover)?)?;
    Ok(total + leftover)
}

/// Worker applying the forward bit transpose to each block.
pub struct ShuffleWorker {
    capability: Capability,
    scratch: ScratchBuffer,
}

impl ShuffleWorker {
    /// Creates a worker for blocks of up to `max_block_bytes` bytes.
    pub fn new(capability: Capability, max_block_bytes: usize) -> Result<Self, BitshuffleError> {
        Ok(Self {
            capability,
            scratch: ScratchBuffer::new(max_block_bytes)?,
        })
    }
}

impl BlockWorker for ShuffleWorker {
    fn process_block(
        &mut self,
        input: &mut ReadCursor<'_>,
        output: &mut WriteCursor<'_>,
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let nbyte = total_bytes(block_elems, elem_size);
        let src = input.read(nbyte)?;
        let dst = output.reserve(nbyte)?;
        trans_bit_elem_with(
            self.capability,
            src,
            dst,
            self.scratch.as_mut_slice(),
            block_elems,
            elem_size,
        )
    }
}

/// Worker applying the inverse bit transpose to each block.
pub struct UnshuffleWorker {
    capability: Capability,
    scratch: ScratchBuffer,
}

impl UnshuffleWorker {
    /// Creates a worker for blocks of up to `max_block_bytes` bytes.
    pub fn new(capability: Capability, max_block_bytes: usize) -> Result<Self, BitshuffleError> {
        Ok(Self {
            capability,
            scratch: ScratchBuffer::new(max_block_bytes)?,
        })
    }
}

impl BlockWorker for UnshuffleWorker {
    fn process_block(
        &mut self,
        input: &mut ReadCursor<'_>,
        output: &mut WriteCursor<'_>,
        block_elems: usize,
        elem_size: usize,
    ) -> Result<usize, BitshuffleError> {
        let nbyte = total_bytes(block_elems, elem_size);
        let src = input.read(nbyte)?;
        let dst = output.reserve(nbyte)?;
        untrans_bit_elem_with(
            self.capability,
            src,
            dst,
            self.scratch.as_mut_slice(),
            block_elems,
            elem_size,
        )
    }
}

fn prepare(
    capability: Capability,
    input: &[u8],
    output: &[u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<BlockPlan, BitshuffleError> {
    let plan = BlockPlan::new(size, elem_size, block_size)?;
    if !capability.is_available() {
        return Err(BitshuffleError::UnsupportedCapability(capability));
    }
    check_buffers(input, output, plan.total_bytes())?;
    Ok(plan)
}

/// Bit shuffles `size` elements of `elem_size` bytes from `input` into `output`.
///
/// Uses the fastest transpose variant this machine supports.
///
/// # Parameters
///
/// - `input`: At least `size * elem_size` bytes to shuffle
/// - `output`: Receives `size * elem_size` shuffled bytes
/// - `size`: Number of elements
/// - `elem_size`: Width of one element in bytes
/// - `block_size`: Elements per block, a multiple of 8, or 0 for [`crate::default_block_size`]
///
/// # Returns
///
/// The number of bytes processed, `size * elem_size`.
///
/// # Examples
///
/// ```
/// use bitshuffle_core::{bitshuffle, bitunshuffle};
///
/// let data: Vec<u8> = (0..64u32).flat_map(|x| x.to_le_bytes()).collect();
/// let mut shuffled = vec![0u8; data.len()];
/// let mut restored = vec![0u8; data.len()];
///
/// bitshuffle(&data, &mut shuffled, 64, 4, 0).unwrap();
/// bitunshuffle(&shuffled, &mut restored, 64, 4, 0).unwrap();
/// assert_eq!(restored, data);
/// ```
pub fn bitshuffle(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_with(Capability::best(), input, output, size, elem_size, block_size)
}

/// Same as [`bitshuffle`], with an explicitly chosen transpose variant.
///
/// # Errors
///
/// [`BitshuffleError::UnsupportedCapability`] if `capability` cannot run on this machine.
pub fn bitshuffle_with(
    capability: Capability,
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = prepare(capability, input, output, size, elem_size, block_size)?;
    debug!(
        "bitshuffle: {size} elements of {elem_size} bytes, block size {}, {capability:?}",
        plan.block_size
    );

    let mut worker = ShuffleWorker::new(capability, plan.max_block_bytes())?;
    run_plan(&mut worker, &plan, input, output)
}

/// Reverses [`bitshuffle`].
///
/// `block_size` must match the value used when shuffling.
pub fn bitunshuffle(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitunshuffle_with(Capability::best(), input, output, size, elem_size, block_size)
}

/// Same as [`bitunshuffle`], with an explicitly chosen transpose variant.
pub fn bitunshuffle_with(
    capability: Capability,
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    let plan = prepare(capability, input, output, size, elem_size, block_size)?;
    debug!(
        "bitunshuffle: {size} elements of {elem_size} bytes, block size {}, {capability:?}",
        plan.block_size
    );

    let mut worker = UnshuffleWorker::new(capability, plan.max_block_bytes())?;
    run_plan(&mut worker, &plan, input, output)
}
