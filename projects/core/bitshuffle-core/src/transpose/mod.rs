//! The bit transpose engine.
//!
//! [`portable`] holds the scalar implementation of every stage, which doubles as the reference
//! for the SIMD variants. [`trans_bit_elem_with`] and [`untrans_bit_elem_with`] run one chosen
//! [`Capability`]; [`trans_bit_elem`] and [`untrans_bit_elem`] pick the best one available.
//!
//! All variants produce byte-identical output.

pub mod portable;

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub(crate) mod avx2;
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub(crate) mod sse2;

use crate::cpu_detect::Capability;
use crate::error::{check_mult_eight, BitshuffleError};

/// Byte length of `size` elements of `elem_size` bytes.
///
/// Saturates on overflow so the subsequent buffer checks fail instead of wrapping.
#[inline]
pub(crate) fn total_bytes(size: usize, elem_size: usize) -> usize {
    size.saturating_mul(elem_size)
}

/// Ensures `input` and `output` each hold at least `nbyte` bytes.
#[inline]
pub(crate) fn check_buffers(
    input: &[u8],
    output: &[u8],
    nbyte: usize,
) -> Result<(), BitshuffleError> {
    if input.len() < nbyte {
        return Err(BitshuffleError::InputTooSmall {
            needed: nbyte,
            actual: input.len(),
        });
    }
    if output.len() < nbyte {
        return Err(BitshuffleError::OutputTooSmall {
            needed: nbyte,
            actual: output.len(),
        });
    }
    Ok(())
}

/// Ensures the caller supplied scratch region holds at least `nbyte` bytes.
#[inline]
pub(crate) fn check_scratch(scratch: &[u8], nbyte: usize) -> Result<(), BitshuffleError> {
    if scratch.len() < nbyte {
        return Err(BitshuffleError::OutputTooSmall {
            needed: nbyte,
            actual: scratch.len(),
        });
    }
    Ok(())
}

fn validate(
    capability: Capability,
    input: &[u8],
    output: &[u8],
    scratch: &[u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    if !capability.is_available() {
        return Err(BitshuffleError::UnsupportedCapability(capability));
    }
    check_mult_eight(size)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    check_scratch(scratch, nbyte)?;
    Ok(nbyte)
}

/// Bit transposes `size` elements using the given implementation variant.
///
/// # Parameters
///
/// - `capability`: The implementation variant to run
/// - `input`: At least `size * elem_size` bytes of element-major data
/// - `output`: Receives `size * elem_size` bytes of bit-plane-major data
/// - `scratch`: Working space of at least `size * elem_size` bytes
/// - `size`: Number of elements, a multiple of 8
/// - `elem_size`: Width of one element in bytes
///
/// # Returns
///
/// The number of bytes written to `output`.
///
/// # Errors
///
/// - [`BitshuffleError::UnsupportedCapability`] if `capability` cannot run on this machine
/// - [`BitshuffleError::MisalignedSize`] if `size` is not a multiple of 8
/// - [`BitshuffleError::InputTooSmall`] / [`BitshuffleError::OutputTooSmall`] on short buffers
pub fn trans_bit_elem_with(
    capability: Capability,
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    let nbyte = validate(capability, input, output, scratch, size, elem_size)?;

    match capability {
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        Capability::Avx2 => unsafe { avx2::trans_bit_elem(input, output, scratch, size, elem_size) },
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        Capability::Sse2 => unsafe { sse2::trans_bit_elem(input, output, scratch, size, elem_size) },
        _ => {
            portable::trans_bit_elem(input, output, scratch, size, elem_size)?;
        }
    }

    Ok(nbyte)
}

/// Inverse of [`trans_bit_elem_with`].
///
/// Takes the same parameters and fails under the same conditions.
pub fn untrans_bit_elem_with(
    capability: Capability,
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    let nbyte = validate(capability, input, output, scratch, size, elem_size)?;

    match capability {
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        Capability::Avx2 => unsafe {
            avx2::untrans_bit_elem(input, output, scratch, size, elem_size)
        },
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        Capability::Sse2 => unsafe {
            sse2::untrans_bit_elem(input, output, scratch, size, elem_size)
        },
        _ => {
            portable::untrans_bit_elem(input, output, scratch, size, elem_size)?;
        }
    }

    Ok(nbyte)
}

/// Bit transposes `size` elements with the fastest variant this machine supports.
///
/// See [`trans_bit_elem_with`] for the parameters.
#[inline]
pub fn trans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    trans_bit_elem_with(Capability::best(), input, output, scratch, size, elem_size)
}

/// Inverse of [`trans_bit_elem`].
#[inline]
pub fn untrans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    untrans_bit_elem_with(Capability::best(), input, output, scratch, size, elem_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(8, 1)]
    #[case(128, 1)]
    #[case(136, 2)]
    #[case(64, 3)]
    #[case(256, 4)]
    #[case(48, 8)]
    #[case(40, 12)]
    #[case(32, 16)]
    #[case(24, 24)]
    fn all_variants_agree(#[case] size: usize, #[case] elem_size: usize) {
        let input = pseudo_random_bytes(size * elem_size, 42);
        let mut scratch = vec![0u8; input.len()];

        let mut reference = vec![0u8; input.len()];
        trans_bit_elem_with(
            Capability::Scalar,
            &input,
            &mut reference,
            &mut scratch,
            size,
            elem_size,
        )
        .unwrap();

        for capability in available_capabilities() {
            let mut shuffled = vec![0u8; input.len()];
            trans_bit_elem_with(capability, &input, &mut shuffled, &mut scratch, size, elem_size)
                .unwrap();
            assert_eq!(shuffled, reference, "{capability:?} forward differs");

            let mut restored = vec![0u8; input.len()];
            untrans_bit_elem_with(
                capability,
                &shuffled,
                &mut restored,
                &mut scratch,
                size,
                elem_size,
            )
            .unwrap();
            assert_eq!(restored, input, "{capability:?} inverse differs");
        }
    }

    #[test]
    fn unavailable_capability_is_reported() {
        for capability in Capability::ALL {
            if capability.is_available() {
                continue;
            }
            let result = trans_bit_elem_with(capability, &[0; 8], &mut [0; 8], &mut [0; 8], 8, 1);
            assert_eq!(
                result,
                Err(BitshuffleError::UnsupportedCapability(capability))
            );
        }
    }

    #[test]
    fn scratch_must_cover_the_block() {
        let result = trans_bit_elem(&[0; 16], &mut [0; 16], &mut [0; 8], 8, 2);
        assert_eq!(
            result,
            Err(BitshuffleError::OutputTooSmall {
                needed: 16,
                actual: 8
            })
        );
    }
}
