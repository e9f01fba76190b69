//! Error types shared by the transpose engine, the blocked driver and the compression codec.
//!
//! Every fallible operation in this crate returns [`BitshuffleError`]. Host adapters that need
//! the signed-integer error convention of the C library can map any error through
//! [`BitshuffleError::code`].

use crate::allocate::AllocateError;
use crate::cpu_detect::Capability;
use thiserror::Error;

/// Error reported by an external block compressor (LZ4, ZStandard, ...).
///
/// The compressor's own error code is carried verbatim rather than being folded into this
/// crate's error space by numeric offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{compressor} block compressor failed with error code {code}")]
pub struct CompressorError {
    /// Name of the compressor which reported the failure.
    pub compressor: &'static str,
    /// The compressor's native error code.
    pub code: i64,
}

impl CompressorError {
    /// Creates a new [`CompressorError`] for the named compressor.
    pub const fn new(compressor: &'static str, code: i64) -> Self {
        Self { compressor, code }
    }
}

/// Errors that can occur while shuffling, unshuffling, compressing or decompressing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitshuffleError {
    /// A scratch buffer could not be allocated.
    #[error("Memory allocation failed: {0}")]
    Allocation(#[from] AllocateError),

    /// A SIMD variant was requested that this build or this CPU cannot run.
    #[error("The {0:?} transpose variant is not available on this machine")]
    UnsupportedCapability(Capability),

    /// The number of elements is not a multiple of 8 where the operation requires it.
    #[error("Invalid element count: {size} (must be divisible by 8)")]
    MisalignedSize {
        /// The offending element count.
        size: usize,
    },

    /// The block size is not a positive multiple of 8.
    #[error("Invalid block size: {0} (must be a positive multiple of 8)")]
    InvalidBlockSize(usize),

    /// The element size is zero.
    #[error("Invalid element size: elements must be at least 1 byte wide")]
    InvalidElementSize,

    /// A block decompressed into a different number of bytes than the block holds.
    #[error("Decompressed block has {actual} bytes, expected {expected}")]
    DecodeLengthMismatch {
        /// Number of bytes the block should hold.
        expected: usize,
        /// Number of bytes the decompressor produced.
        actual: usize,
    },

    /// A compressed block is longer than the 4-byte frame header can state.
    #[error("Compressed block of {length} bytes does not fit a 32-bit frame header")]
    FrameTooLarge {
        /// Length the compressor reported.
        length: usize,
    },

    /// The external compressor failed.
    #[error(transparent)]
    Compressor(#[from] CompressorError),

    /// The input buffer is too small for the requested operation.
    #[error("Input buffer too small: need {needed} bytes, but only {actual} bytes available.")]
    InputTooSmall {
        /// The required size in bytes
        needed: usize,
        /// The actual size in bytes
        actual: usize,
    },

    /// The output buffer is too small for the requested operation.
    #[error("Output buffer too small: need {needed} bytes, but only {actual} bytes available.")]
    OutputTooSmall {
        /// The required size in bytes
        needed: usize,
        /// The actual size in bytes
        actual: usize,
    },
}

/// Offset applied to compressor errors in [`BitshuffleError::code`].
const COMPRESSOR_CODE_OFFSET: i64 = 1000;

impl BitshuffleError {
    /// Returns the signed error code of the C library for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | `-1` | Failed to allocate memory |
    /// | `-2` | Input buffer too small |
    /// | `-3` | Output buffer too small |
    /// | `-11` | Missing SSE2 |
    /// | `-12` | Missing AVX2 |
    /// | `-80` | Input size not a multiple of 8 |
    /// | `-81` | Block size not a multiple of 8 |
    /// | `-82` | Element size is zero |
    /// | `-83` | Compressed block too long for its frame header |
    /// | `-91` | Decompression produced the wrong number of bytes |
    /// | `-1YYY` | Error internal to the compressor with code `-YYY` |
    pub fn code(&self) -> i64 {
        match self {
            Self::Allocation(_) => -1,
            Self::InputTooSmall { .. } => -2,
            Self::OutputTooSmall { .. } => -3,
            Self::UnsupportedCapability(Capability::Scalar) => -10,
            Self::UnsupportedCapability(Capability::Sse2) => -11,
            Self::UnsupportedCapability(Capability::Avx2) => -12,
            Self::MisalignedSize { .. } => -80,
            Self::InvalidBlockSize(_) => -81,
            Self::InvalidElementSize => -82,
            Self::FrameTooLarge { .. } => -83,
            Self::DecodeLengthMismatch { .. } => -91,
            Self::Compressor(err) => {
                let magnitude = i64::try_from(err.code.unsigned_abs()).unwrap_or(i64::MAX);
                -COMPRESSOR_CODE_OFFSET.saturating_add(magnitude)
            }
        }
    }
}

/// Fails with [`BitshuffleError::MisalignedSize`] unless `size` is a multiple of 8.
#[inline]
pub(crate) fn check_mult_eight(size: usize) -> Result<(), BitshuffleError> {
    if size % 8 == 0 {
        Ok(())
    } else {
        Err(BitshuffleError::MisalignedSize { size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BitshuffleError::MisalignedSize { size: 3 }, -80)]
    #[case(BitshuffleError::InvalidBlockSize(12), -81)]
    #[case(BitshuffleError::UnsupportedCapability(Capability::Sse2), -11)]
    #[case(BitshuffleError::UnsupportedCapability(Capability::Avx2), -12)]
    #[case(BitshuffleError::DecodeLengthMismatch { expected: 8, actual: 4 }, -91)]
    #[case(BitshuffleError::Compressor(CompressorError::new("lz4", -17)), -1017)]
    #[case(BitshuffleError::Compressor(CompressorError::new("zstd", 64)), -1064)]
    #[case(BitshuffleError::Compressor(CompressorError::new("zstd", i64::MIN)), -i64::MAX)]
    #[case(BitshuffleError::Compressor(CompressorError::new("zstd", i64::MAX - 10)), -i64::MAX)]
    #[case(BitshuffleError::FrameTooLarge { length: usize::MAX }, -83)]
    fn maps_to_c_error_codes(#[case] error: BitshuffleError, #[case] code: i64) {
        assert_eq!(error.code(), code);
    }

    #[test]
    fn check_mult_eight_rejects_remainders() {
        assert!(check_mult_eight(0).is_ok());
        assert!(check_mult_eight(64).is_ok());
        assert_eq!(
            check_mult_eight(65),
            Err(BitshuffleError::MisalignedSize { size: 65 })
        );
    }
}
