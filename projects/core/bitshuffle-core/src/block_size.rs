//! Block size policy.
//!
//! Compressed streams do not record their block size. A decoder asked for the "default" block
//! size recomputes it with [`default_block_size`], so the constants below are part of the
//! encoded format and must never change.

use crate::error::BitshuffleError;

/// Number of bytes a default block aims to span.
pub const TARGET_BLOCK_SIZE_BYTES: usize = 8192;

/// Smallest default block, in elements.
pub const MIN_RECOMMENDED_BLOCK: usize = 128;

/// Every block size, and every transformable run of elements, is a multiple of this.
pub const BLOCKED_MULT: usize = 8;

/// Returns the default block size, in elements, for elements of `elem_size` bytes.
///
/// `max(128, round_down_to_multiple_of_8(8192 / elem_size))`. A zero `elem_size` is treated as
/// 1 byte so the function stays total.
///
/// # Examples
///
/// ```
/// use bitshuffle_core::default_block_size;
///
/// assert_eq!(default_block_size(1), 8192);
/// assert_eq!(default_block_size(4), 2048);
/// assert_eq!(default_block_size(8192), 128);
/// ```
#[inline]
pub const fn default_block_size(elem_size: usize) -> usize {
    let elem_size = if elem_size == 0 { 1 } else { elem_size };
    let block_size = (TARGET_BLOCK_SIZE_BYTES / elem_size) / BLOCKED_MULT * BLOCKED_MULT;
    if block_size > MIN_RECOMMENDED_BLOCK {
        block_size
    } else {
        MIN_RECOMMENDED_BLOCK
    }
}

/// Substitutes the default for a zero `block_size` and validates the result.
///
/// # Errors
///
/// - [`BitshuffleError::InvalidElementSize`] if `elem_size` is zero
/// - [`BitshuffleError::InvalidBlockSize`] if `block_size` is not a multiple of 8
pub fn resolve_block_size(block_size: usize, elem_size: usize) -> Result<usize, BitshuffleError> {
    if elem_size == 0 {
        return Err(BitshuffleError::InvalidElementSize);
    }

    let block_size = if block_size == 0 {
        default_block_size(elem_size)
    } else {
        block_size
    };

    if block_size % BLOCKED_MULT != 0 {
        return Err(BitshuffleError::InvalidBlockSize(block_size));
    }

    Ok(block_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 8192)]
    #[case(2, 4096)]
    #[case(3, 2728)]
    #[case(4, 2048)]
    #[case(8, 1024)]
    #[case(16, 512)]
    #[case(64, 128)]
    #[case(100, 128)]
    #[case(8192, 128)]
    fn default_block_size_is_stable(#[case] elem_size: usize, #[case] expected: usize) {
        assert_eq!(default_block_size(elem_size), expected);
    }

    #[rstest]
    #[case(0, 4, Ok(2048))]
    #[case(8, 4, Ok(8))]
    #[case(128, 3, Ok(128))]
    #[case(12, 4, Err(BitshuffleError::InvalidBlockSize(12)))]
    #[case(8, 0, Err(BitshuffleError::InvalidElementSize))]
    fn resolves_block_size(
        #[case] block_size: usize,
        #[case] elem_size: usize,
        #[case] expected: Result<usize, BitshuffleError>,
    ) {
        assert_eq!(resolve_block_size(block_size, elem_size), expected);
    }
}
