#![doc = include_str!(concat!("../", core::env!("CARGO_PKG_README")))]
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

use bitshuffle_core::{BitshuffleError, BlockCompressor, CompressorError};
use core::ffi::c_void;
use thiserror::Error;
use zstd_sys::*;

/// Name reported in [`CompressorError`]s raised by this crate.
pub const COMPRESSOR_NAME: &str = "zstd";

/// Compression level zstd picks when asked for level 0.
pub const DEFAULT_LEVEL: i32 = 3;

/// Errors that can occur while compressing blocks with ZStandard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZStandardError {
    /// Invalid compression level
    #[error("Invalid compression level: {0}")]
    InvalidLevel(i32),

    /// ZStandard internal error
    #[error("ZStandard internal error: {0:?}")]
    ZStandardInternal(ZSTD_ErrorCode),
}

impl ZStandardError {
    /// Negative error code: `-1` for an invalid level, otherwise the negated zstd error code.
    pub fn code(&self) -> i64 {
        match self {
            ZStandardError::InvalidLevel(_) => -1,
            ZStandardError::ZStandardInternal(code) => -(*code as i64),
        }
    }
}

impl From<ZStandardError> for CompressorError {
    fn from(err: ZStandardError) -> Self {
        CompressorError::new(COMPRESSOR_NAME, err.code())
    }
}

/// Lowest (fastest, negative) compression level of the linked zstd.
pub fn min_level() -> i32 {
    unsafe { ZSTD_minCLevel() }
}

/// Highest compression level of the linked zstd.
pub fn max_level() -> i32 {
    unsafe { ZSTD_maxCLevel() }
}

/// [`BlockCompressor`] writing one standard zstd frame per block.
///
/// The compression level is fixed when the compressor is created. Level 0 selects zstd's
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdBlockCompressor {
    level: i32,
}

impl ZstdBlockCompressor {
    /// Creates a compressor using `level`.
    ///
    /// # Errors
    ///
    /// [`ZStandardError::InvalidLevel`] unless `level` lies within [`min_level`]..=[`max_level`].
    pub fn new(level: i32) -> Result<Self, ZStandardError> {
        if !(min_level()..=max_level()).contains(&level) {
            return Err(ZStandardError::InvalidLevel(level));
        }

        Ok(Self { level })
    }

    /// Creates a compressor with compression level 1 (fastest positive level).
    pub fn new_fast() -> Self {
        Self { level: 1 }
    }

    /// Creates a compressor with the highest compression level.
    pub fn new_best() -> Self {
        Self { level: max_level() }
    }

    /// The configured compression level.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdBlockCompressor {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

/// Turns a zstd `size_t` result into a byte count or an error.
#[inline]
fn check(result: usize) -> Result<usize, ZStandardError> {
    if unsafe { ZSTD_isError(result) } == 0 {
        return Ok(result);
    }

    Err(ZStandardError::ZStandardInternal(unsafe {
        ZSTD_getErrorCode(result)
    }))
}

impl BlockCompressor for ZstdBlockCompressor {
    fn name(&self) -> &'static str {
        COMPRESSOR_NAME
    }

    #[inline]
    fn max_compressed_size(&self, len: usize) -> usize {
        unsafe { ZSTD_compressBound(len) }
    }

    fn compress_block(&self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressorError> {
        let result = unsafe {
            ZSTD_compress(
                output.as_mut_ptr() as *mut c_void,
                output.len(),
                input.as_ptr() as *const c_void,
                input.len(),
                self.level,
            )
        };
        check(result).map_err(Into::into)
    }

    fn decompress_block(
        &self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CompressorError> {
        let result = unsafe {
            ZSTD_decompress(
                output.as_mut_ptr() as *mut c_void,
                output.len(),
                input.as_ptr() as *const c_void,
                input.len(),
            )
        };
        check(result).map_err(Into::into)
    }
}

/// Largest output [`compress_zstd`] can produce.
///
/// # Errors
///
/// Fails on a zero `elem_size` or a `block_size` that is not a multiple of 8.
pub fn compress_zstd_bound(
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_core::compress_bound(
        &ZstdBlockCompressor::default(),
        size,
        elem_size,
        block_size,
    )
}

/// Bit shuffles and ZStandard compresses `size` elements of `elem_size` bytes at `level`.
///
/// `output` must hold at least [`compress_zstd_bound`] bytes. A `block_size` of 0 selects
/// [`bitshuffle_core::default_block_size`].
///
/// # Errors
///
/// [`BitshuffleError::Compressor`] carrying [`ZStandardError::InvalidLevel`]'s code if `level`
/// is out of range, plus every error of [`bitshuffle_core::compress`].
pub fn compress_zstd(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
    level: i32,
) -> Result<usize, BitshuffleError> {
    let compressor = ZstdBlockCompressor::new(level).map_err(CompressorError::from)?;
    bitshuffle_core::compress(&compressor, input, output, size, elem_size, block_size)
}

/// Inverse of [`compress_zstd`]. The parameters must match the ones used to compress.
///
/// # Returns
///
/// The number of compressed bytes read from `input`.
pub fn decompress_zstd(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    block_size: usize,
) -> Result<usize, BitshuffleError> {
    bitshuffle_core::decompress(
        &ZstdBlockCompressor::default(),
        input,
        output,
        size,
        elem_size,
        block_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample(size: usize, elem_size: usize) -> Vec<u8> {
        (0..size * elem_size)
            .map(|index| ((index / elem_size) / 11) as u8 ^ (index % elem_size) as u8)
            .collect()
    }

    #[test]
    fn rejects_levels_out_of_range() {
        let too_high = max_level() + 1;
        assert_eq!(
            ZstdBlockCompressor::new(too_high),
            Err(ZStandardError::InvalidLevel(too_high))
        );
        assert!(ZstdBlockCompressor::new(0).is_ok());
        assert!(ZstdBlockCompressor::new(-1).is_ok());
        assert_eq!(ZstdBlockCompressor::new_best().level(), max_level());
    }

    #[test]
    fn invalid_level_surfaces_as_compressor_error() {
        let input = sample(64, 4);
        let mut output = vec![0u8; compress_zstd_bound(64, 4, 0).unwrap()];
        let result = compress_zstd(&input, &mut output, 64, 4, 0, max_level() + 1);
        assert_eq!(
            result,
            Err(BitshuffleError::Compressor(CompressorError::new(
                COMPRESSOR_NAME,
                -1
            )))
        );
    }

    #[test]
    fn garbage_reports_zstd_error() {
        let mut output = [0u8; 64];
        let result = ZstdBlockCompressor::default().decompress_block(&[1, 2, 3, 4, 5], &mut output);
        let err = result.unwrap_err();
        assert_eq!(err.compressor, COMPRESSOR_NAME);
        assert!(err.code < 0);
    }

    #[rstest]
    #[case(0, 4, 0, 3)]
    #[case(7, 2, 0, 3)]
    #[case(1024, 8, 0, 1)]
    #[case(1001, 3, 128, 19)]
    #[case(5000, 4, 0, -5)]
    fn framed_round_trip(
        #[case] size: usize,
        #[case] elem_size: usize,
        #[case] block_size: usize,
        #[case] level: i32,
    ) {
        let input = sample(size, elem_size);
        let mut compressed = vec![0u8; compress_zstd_bound(size, elem_size, block_size).unwrap()];
        let written =
            compress_zstd(&input, &mut compressed, size, elem_size, block_size, level).unwrap();

        let mut restored = vec![0u8; input.len()];
        let read = decompress_zstd(
            &compressed[..written],
            &mut restored,
            size,
            elem_size,
            block_size,
        )
        .unwrap();
        assert_eq!(read, written);
        assert_eq!(restored, input);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let input = sample(2048, 4);
        let mut compressed = vec![0u8; compress_zstd_bound(2048, 4, 0).unwrap()];
        let written = compress_zstd(&input, &mut compressed, 2048, 4, 0, 3).unwrap();

        let mut restored = vec![0u8; input.len()];
        let result = decompress_zstd(&compressed[..written - 2], &mut restored, 2048, 4, 0);
        assert!(result.is_err());
    }
}
