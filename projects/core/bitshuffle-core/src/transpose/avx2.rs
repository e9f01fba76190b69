//! 256-bit (AVX2) transpose stages.
//!
//! Only the `movemask` based bit stages gain from the wider registers; the byte transposes are
//! shared with [`super::sse2`].

use super::portable::{bit_byte_kernel, elem_kernel};
use super::sse2;

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

/// Bit transpose within bytes, 32 bytes per iteration.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * elem_size` bytes, a multiple of 8
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn trans_bit_byte(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    let nbyte = size * elem_size;
    debug_assert!(nbyte % 8 == 0);
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut ii = 0;
    while ii + 31 < nbyte {
        let mut ymm = _mm256_loadu_si256(in_ptr.add(ii) as *const __m256i);
        for kk in 0..8 {
            let bt = _mm256_movemask_epi8(ymm) as u32;
            ymm = _mm256_slli_epi16(ymm, 1);
            let dst = out_ptr.add(((7 - kk) * nbyte + ii) / 8) as *mut u32;
            dst.write_unaligned(bt.to_le());
        }
        ii += 32;
    }

    bit_byte_kernel(input, output, size, elem_size, nbyte - nbyte % 32);
}

/// Bit shuffle within groups of eight elements, 32 bytes per iteration.
///
/// Element sizes that are not a multiple of 4 use the SSE2 path.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn shuffle_bit_eightelem(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    debug_assert!(size % 8 == 0);
    if elem_size % 4 != 0 {
        sse2::shuffle_bit_eightelem(input, output, size, elem_size);
        return;
    }

    let nbyte = size * elem_size;
    let group = 8 * elem_size;
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut jj = 0;
    while jj + 31 < group {
        let mut ii = 0;
        while ii + group <= nbyte {
            let mut ymm = _mm256_loadu_si256(in_ptr.add(ii + jj) as *const __m256i);
            for kk in 0..8 {
                let bt = _mm256_movemask_epi8(ymm) as u32;
                ymm = _mm256_slli_epi16(ymm, 1);
                let ind = ii + jj / 8 + (7 - kk) * elem_size;
                (out_ptr.add(ind) as *mut u32).write_unaligned(bt.to_le());
            }
            ii += group;
        }
        jj += 32;
    }
}

/// Full forward bit transpose.
///
/// # Safety
///
/// - `input`, `output` and `scratch` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn trans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    sse2::trans_byte_elem(input, output, scratch, size, elem_size);
    trans_bit_byte(output, scratch, size, elem_size);
    elem_kernel(scratch, output, 8, elem_size, size / 8);
}

/// Inverse of [`trans_bit_elem`].
///
/// # Safety
///
/// - `input`, `output` and `scratch` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "avx2")]
pub(crate) unsafe fn untrans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    sse2::trans_byte_bitrow(input, scratch, size, elem_size);
    shuffle_bit_eightelem(scratch, output, size, elem_size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_detect::has_avx2;
    use crate::test_prelude::*;
    use crate::transpose::portable;

    #[rstest]
    #[case(32, 1)]
    #[case(40, 1)]
    #[case(64, 3)]
    #[case(256, 4)]
    fn bit_byte_matches_portable(#[case] size: usize, #[case] elem_size: usize) {
        if !has_avx2() {
            return;
        }

        let input = pseudo_random_bytes(size * elem_size, 13);
        let mut expected = vec![0u8; input.len()];
        let mut actual = vec![0u8; input.len()];
        portable::trans_bit_byte(&input, &mut expected, size, elem_size).unwrap();
        unsafe { trans_bit_byte(&input, &mut actual, size, elem_size) };
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case(64, 4)]
    #[case(16, 8)]
    #[case(32, 12)]
    #[case(24, 2)]
    #[case(8, 5)]
    fn shuffle_bit_eightelem_matches_portable(#[case] size: usize, #[case] elem_size: usize) {
        if !has_avx2() {
            return;
        }

        let input = pseudo_random_bytes(size * elem_size, 17);
        let mut expected = vec![0u8; input.len()];
        let mut actual = vec![0u8; input.len()];
        portable::shuffle_bit_eightelem(&input, &mut expected, size, elem_size).unwrap();
        unsafe { shuffle_bit_eightelem(&input, &mut actual, size, elem_size) };
        assert_eq!(actual, expected);
    }
}
