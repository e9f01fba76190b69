//! SIMD transpose stages re-exported for the criterion benches.
//!
//! The scalar stages are public already in [`crate::transpose::portable`].
#![allow(clippy::missing_safety_doc)]
#![cfg(not(tarpaulin_include))]

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub mod sse2 {
    //! 128-bit stages. Callers must check [`crate::cpu_detect::has_sse2`] first.

    use crate::transpose::sse2;

    pub unsafe fn trans_byte_elem(
        input: &[u8],
        output: &mut [u8],
        scratch: &mut [u8],
        size: usize,
        elem_size: usize,
    ) {
        sse2::trans_byte_elem(input, output, scratch, size, elem_size)
    }

    pub unsafe fn trans_bit_byte(input: &[u8], output: &mut [u8], size: usize, elem_size: usize) {
        sse2::trans_bit_byte(input, output, size, elem_size)
    }

    pub unsafe fn trans_byte_bitrow(
        input: &[u8],
        output: &mut [u8],
        size: usize,
        elem_size: usize,
    ) {
        sse2::trans_byte_bitrow(input, output, size, elem_size)
    }

    pub unsafe fn shuffle_bit_eightelem(
        input: &[u8],
        output: &mut [u8],
        size: usize,
        elem_size: usize,
    ) {
        sse2::shuffle_bit_eightelem(input, output, size, elem_size)
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub mod avx2 {
    //! 256-bit stages. Callers must check [`crate::cpu_detect::has_avx2`] first.

    use crate::transpose::avx2;

    pub unsafe fn trans_bit_byte(input: &[u8], output: &mut [u8], size: usize, elem_size: usize) {
        avx2::trans_bit_byte(input, output, size, elem_size)
    }

    pub unsafe fn shuffle_bit_eightelem(
        input: &[u8],
        output: &mut [u8],
        size: usize,
        elem_size: usize,
    ) {
        avx2::shuffle_bit_eightelem(input, output, size, elem_size)
    }
}
