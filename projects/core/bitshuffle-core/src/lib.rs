#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![no_std]
#![warn(missing_docs)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[cfg(test)]
pub(crate) mod test_prelude;

pub mod allocate;
pub mod blocked;
pub mod codec;
pub mod cpu_detect;
pub mod error;
pub mod transpose;

mod block_size;

#[cfg(feature = "std")]
pub mod iochain;

#[cfg(feature = "bench")]
pub mod bench;

pub use block_size::{
    default_block_size, resolve_block_size, BLOCKED_MULT, MIN_RECOMMENDED_BLOCK,
    TARGET_BLOCK_SIZE_BYTES,
};
pub use blocked::{
    bitshuffle, bitshuffle_with, bitunshuffle, bitunshuffle_with, blocked_wrap, BlockPlan,
    BlockWorker,
};
pub use codec::{
    compress, compress_bound, decompress, BlockCompressor, FrameDecoder, FrameEncoder,
    FRAME_HEADER_SIZE,
};
#[cfg(feature = "multithreaded")]
pub use codec::{compress_parallel, decompress_parallel};
pub use cpu_detect::{has_wide128, has_wide256, Capability};
pub use error::{BitshuffleError, CompressorError};
