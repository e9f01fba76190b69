#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

use bitshuffle_core::{BitshuffleError, BlockCompressor, CompressorError};
use lz4_flex::block::{CompressError, DecompressError};
use thiserror::Error;

/// Name reported in [`CompressorError`]s raised by this crate.
pub const COMPRESSOR_NAME: &str = "lz4";

/// Errors raised by the LZ4 block codec.
#[derive(Debug, Error)]
pub enum Lz4Error {
    /// The destination was smaller than the compression bound.
    #[error("LZ4 compression failed: {0}")]
    CompressionFailed(CompressError),

    /// The input was not a valid LZ4 block, or decodes to more bytes than expected.
    #[error("LZ4 decompression failed: {0}")]
    DecompressionFailed(DecompressError),
}

impl Lz4Error {
    /// Negative error code in the style of the C LZ4 API.
    pub fn code(&self) -> i64 {
        match self {
            Lz4Error::CompressionFailed(_) => -1,
            Lz4Error::DecompressionFailed(_) => -2,
        }
    }
}

impl From<Lz4Error> for CompressorError {
    fn from(err: Lz4Error) -> Self {
        CompressorError::new(COMPRESSOR_NAME, err.code())
    }
}

/// [`BlockCompressor`] producing raw LZ4 blocks (no LZ4 frame header).
///
/// Decompression is always bounds checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4BlockCompressor;

impl BlockCompressor for Lz4BlockCompressor {
    fn name(&self) -> &'static str {
        COMPRESSOR_NAME
    }

    #[inline]
    fn max_compressed_size(&self, len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(len)
    }

    fn compress_block(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressorError> {
        lz4_flex::block::compress_into(input, output)
            .map_err(|err| Lz4Error::CompressionFailed(err).into())
    }

    fn decompress_block(
        &self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CompressorError> {
        lz4_flex::block::decompress_into(input, output)
            .map_err(|err| Lz4Error::DecompressionFailed(err).into())
    }
}

/// Largest output [`compress_lz4`] can produce.
///
/// # Errors
///
/// Fails on a zero `elem_size` or a `block_size` that is not a multiple of 8.
pub fn compress_lz4_bound(
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_core::compress_bound(&Lz4BlockCompressor, size, elem_size, block_size)
}

/// Bit shuffles and LZ4 compresses `size` elements of `elem_size` bytes.
///
/// `output` must hold at least [`compress_lz4_bound`] bytes. A `block_size` of 0 selects
/// [`bitshuffle_core::default_block_size`].
///
/// # Returns
///
/// The number of bytes written to `output`.
pub fn compress_lz4(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_core::compress(
        &Lz4BlockCompressor,
        input,
        output,
        size,
        elem_size,
        block_size,
    )
}

/// Inverse of [`compress_lz4`]. The parameters must match the ones used to compress.
///
/// # Returns
///
/// The number of compressed bytes read from `input`.
pub fn decompress_lz4(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_core::decompress(
        &Lz4BlockCompressor,
        input,
        output,
        size,
        elem_size,
        block_size,
    )
}
