//! 128-bit (SSE2) transpose stages.
//!
//! Every function here finishes whatever the vector loop leaves over with the portable kernels,
//! so results are bit-identical to [`super::portable`].

use super::portable::{
    bit_byte_kernel, bit_eightelem_kernel, byte_bitrow_kernel, byte_elem_kernel, elem_kernel,
};

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

/// Byte transpose of 2-byte elements, 16 elements per iteration.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * 2` bytes
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_byte_elem_16(input: &[u8], output: &mut [u8], size: usize) {
    debug_assert!(input.len() >= size * 2 && output.len() >= size * 2);
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut ii = 0;
    while ii + 15 < size {
        let mut a0 = _mm_loadu_si128(in_ptr.add(2 * ii) as *const __m128i);
        let mut b0 = _mm_loadu_si128(in_ptr.add(2 * ii + 16) as *const __m128i);

        // Four interleave rounds rotate the 5-bit byte index right by one.
        for _ in 0..2 {
            let a1 = _mm_unpacklo_epi8(a0, b0);
            let b1 = _mm_unpackhi_epi8(a0, b0);
            a0 = _mm_unpacklo_epi8(a1, b1);
            b0 = _mm_unpackhi_epi8(a1, b1);
        }

        _mm_storeu_si128(out_ptr.add(ii) as *mut __m128i, a0);
        _mm_storeu_si128(out_ptr.add(size + ii) as *mut __m128i, b0);
        ii += 16;
    }

    byte_elem_kernel(input, output, size, 2, size - size % 16);
}

/// Byte transpose of 4-byte elements, 16 elements per iteration.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * 4` bytes
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_byte_elem_32(input: &[u8], output: &mut [u8], size: usize) {
    debug_assert!(input.len() >= size * 4 && output.len() >= size * 4);
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut ii = 0;
    while ii + 15 < size {
        let mut a0 = _mm_loadu_si128(in_ptr.add(4 * ii) as *const __m128i);
        let mut b0 = _mm_loadu_si128(in_ptr.add(4 * ii + 16) as *const __m128i);
        let mut c0 = _mm_loadu_si128(in_ptr.add(4 * ii + 32) as *const __m128i);
        let mut d0 = _mm_loadu_si128(in_ptr.add(4 * ii + 48) as *const __m128i);

        let mut a1 = _mm_unpacklo_epi8(a0, b0);
        let mut b1 = _mm_unpackhi_epi8(a0, b0);
        let mut c1 = _mm_unpacklo_epi8(c0, d0);
        let mut d1 = _mm_unpackhi_epi8(c0, d0);

        a0 = _mm_unpacklo_epi8(a1, b1);
        b0 = _mm_unpackhi_epi8(a1, b1);
        c0 = _mm_unpacklo_epi8(c1, d1);
        d0 = _mm_unpackhi_epi8(c1, d1);

        a1 = _mm_unpacklo_epi8(a0, b0);
        b1 = _mm_unpackhi_epi8(a0, b0);
        c1 = _mm_unpacklo_epi8(c0, d0);
        d1 = _mm_unpackhi_epi8(c0, d0);

        a0 = _mm_unpacklo_epi64(a1, c1);
        b0 = _mm_unpackhi_epi64(a1, c1);
        c0 = _mm_unpacklo_epi64(b1, d1);
        d0 = _mm_unpackhi_epi64(b1, d1);

        _mm_storeu_si128(out_ptr.add(ii) as *mut __m128i, a0);
        _mm_storeu_si128(out_ptr.add(size + ii) as *mut __m128i, b0);
        _mm_storeu_si128(out_ptr.add(2 * size + ii) as *mut __m128i, c0);
        _mm_storeu_si128(out_ptr.add(3 * size + ii) as *mut __m128i, d0);
        ii += 16;
    }

    byte_elem_kernel(input, output, size, 4, size - size % 16);
}

/// Byte transpose of 8-byte elements, 16 elements per iteration.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * 8` bytes
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_byte_elem_64(input: &[u8], output: &mut [u8], size: usize) {
    debug_assert!(input.len() >= size * 8 && output.len() >= size * 8);
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut ii = 0;
    while ii + 15 < size {
        let mut a0 = _mm_loadu_si128(in_ptr.add(8 * ii) as *const __m128i);
        let mut b0 = _mm_loadu_si128(in_ptr.add(8 * ii + 16) as *const __m128i);
        let mut c0 = _mm_loadu_si128(in_ptr.add(8 * ii + 32) as *const __m128i);
        let mut d0 = _mm_loadu_si128(in_ptr.add(8 * ii + 48) as *const __m128i);
        let mut e0 = _mm_loadu_si128(in_ptr.add(8 * ii + 64) as *const __m128i);
        let mut f0 = _mm_loadu_si128(in_ptr.add(8 * ii + 80) as *const __m128i);
        let mut g0 = _mm_loadu_si128(in_ptr.add(8 * ii + 96) as *const __m128i);
        let mut h0 = _mm_loadu_si128(in_ptr.add(8 * ii + 112) as *const __m128i);

        let mut a1 = _mm_unpacklo_epi8(a0, b0);
        let mut b1 = _mm_unpackhi_epi8(a0, b0);
        let mut c1 = _mm_unpacklo_epi8(c0, d0);
        let mut d1 = _mm_unpackhi_epi8(c0, d0);
        let mut e1 = _mm_unpacklo_epi8(e0, f0);
        let mut f1 = _mm_unpackhi_epi8(e0, f0);
        let mut g1 = _mm_unpacklo_epi8(g0, h0);
        let mut h1 = _mm_unpackhi_epi8(g0, h0);

        a0 = _mm_unpacklo_epi8(a1, b1);
        b0 = _mm_unpackhi_epi8(a1, b1);
        c0 = _mm_unpacklo_epi8(c1, d1);
        d0 = _mm_unpackhi_epi8(c1, d1);
        e0 = _mm_unpacklo_epi8(e1, f1);
        f0 = _mm_unpackhi_epi8(e1, f1);
        g0 = _mm_unpacklo_epi8(g1, h1);
        h0 = _mm_unpackhi_epi8(g1, h1);

        a1 = _mm_unpacklo_epi32(a0, c0);
        b1 = _mm_unpackhi_epi32(a0, c0);
        c1 = _mm_unpacklo_epi32(b0, d0);
        d1 = _mm_unpackhi_epi32(b0, d0);
        e1 = _mm_unpacklo_epi32(e0, g0);
        f1 = _mm_unpackhi_epi32(e0, g0);
        g1 = _mm_unpacklo_epi32(f0, h0);
        h1 = _mm_unpackhi_epi32(f0, h0);

        a0 = _mm_unpacklo_epi64(a1, e1);
        b0 = _mm_unpackhi_epi64(a1, e1);
        c0 = _mm_unpacklo_epi64(b1, f1);
        d0 = _mm_unpackhi_epi64(b1, f1);
        e0 = _mm_unpacklo_epi64(c1, g1);
        f0 = _mm_unpackhi_epi64(c1, g1);
        g0 = _mm_unpacklo_epi64(d1, h1);
        h0 = _mm_unpackhi_epi64(d1, h1);

        _mm_storeu_si128(out_ptr.add(ii) as *mut __m128i, a0);
        _mm_storeu_si128(out_ptr.add(size + ii) as *mut __m128i, b0);
        _mm_storeu_si128(out_ptr.add(2 * size + ii) as *mut __m128i, c0);
        _mm_storeu_si128(out_ptr.add(3 * size + ii) as *mut __m128i, d0);
        _mm_storeu_si128(out_ptr.add(4 * size + ii) as *mut __m128i, e0);
        _mm_storeu_si128(out_ptr.add(5 * size + ii) as *mut __m128i, f0);
        _mm_storeu_si128(out_ptr.add(6 * size + ii) as *mut __m128i, g0);
        _mm_storeu_si128(out_ptr.add(7 * size + ii) as *mut __m128i, h0);
        ii += 16;
    }

    byte_elem_kernel(input, output, size, 8, size - size % 16);
}

/// Byte transpose of arbitrary element widths.
///
/// Widths 1, 2, 4 and 8 take a direct path. Multiples of 8 or 4 bytes are split into 8 or 4
/// byte chunks, transposed as if each chunk were an element, then regrouped. Anything else is
/// handled by the scalar kernel.
///
/// # Safety
///
/// - `input`, `output` and `scratch` must hold at least `size * elem_size` bytes
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_byte_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    let nbyte = size * elem_size;
    match elem_size {
        1 => output[..nbyte].copy_from_slice(&input[..nbyte]),
        2 => trans_byte_elem_16(input, output, size),
        4 => trans_byte_elem_32(input, output, size),
        8 => trans_byte_elem_64(input, output, size),
        _ if elem_size % 8 == 0 => {
            let nchunk = elem_size / 8;
            elem_kernel(input, output, size, nchunk, 8);
            trans_byte_elem_64(output, scratch, size * nchunk);
            elem_kernel(scratch, output, 8, nchunk, size);
        }
        _ if elem_size % 4 == 0 => {
            let nchunk = elem_size / 4;
            elem_kernel(input, output, size, nchunk, 4);
            trans_byte_elem_32(output, scratch, size * nchunk);
            elem_kernel(scratch, output, 4, nchunk, size);
        }
        _ => byte_elem_kernel(input, output, size, elem_size, 0),
    }
}

/// Bit transpose within bytes, 16 bytes per iteration via `movemask`.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * elem_size` bytes, a multiple of 8
#[target_feature(enable = "sse2")]
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
    while ii + 15 < nbyte {
        let mut xmm = _mm_loadu_si128(in_ptr.add(ii) as *const __m128i);
        for kk in 0..8 {
            let bt = _mm_movemask_epi8(xmm) as u16;
            xmm = _mm_slli_epi16(xmm, 1);
            let dst = out_ptr.add(((7 - kk) * nbyte + ii) / 8) as *mut u16;
            dst.write_unaligned(bt.to_le());
        }
        ii += 16;
    }

    bit_byte_kernel(input, output, size, elem_size, nbyte - nbyte % 16);
}

/// Byte transpose of bit-row data, 8 rows by 16 columns per iteration.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_byte_bitrow(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    debug_assert!(size % 8 == 0);
    let nrows = 8 * elem_size;
    let nbyte_row = size / 8;
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let load = |row: usize, col: usize| -> __m128i {
        _mm_loadu_si128(in_ptr.add(row * nbyte_row + col) as *const __m128i)
    };
    let store_lo = |col: usize, row: usize, v: __m128i| {
        _mm_storel_epi64(out_ptr.add(col * nrows + row) as *mut __m128i, v)
    };
    let store_hi = |col: usize, row: usize, v: __m128i| {
        _mm_storel_epi64(
            out_ptr.add(col * nrows + row) as *mut __m128i,
            _mm_unpackhi_epi64(v, v),
        )
    };

    let mut ii = 0;
    while ii + 7 < nrows {
        let mut jj = 0;
        while jj + 15 < nbyte_row {
            let a0 = load(ii, jj);
            let b0 = load(ii + 1, jj);
            let c0 = load(ii + 2, jj);
            let d0 = load(ii + 3, jj);
            let e0 = load(ii + 4, jj);
            let f0 = load(ii + 5, jj);
            let g0 = load(ii + 6, jj);
            let h0 = load(ii + 7, jj);

            let a1 = _mm_unpacklo_epi8(a0, b0);
            let b1 = _mm_unpacklo_epi8(c0, d0);
            let c1 = _mm_unpacklo_epi8(e0, f0);
            let d1 = _mm_unpacklo_epi8(g0, h0);
            let e1 = _mm_unpackhi_epi8(a0, b0);
            let f1 = _mm_unpackhi_epi8(c0, d0);
            let g1 = _mm_unpackhi_epi8(e0, f0);
            let h1 = _mm_unpackhi_epi8(g0, h0);

            let a0 = _mm_unpacklo_epi16(a1, b1);
            let b0 = _mm_unpacklo_epi16(c1, d1);
            let c0 = _mm_unpackhi_epi16(a1, b1);
            let d0 = _mm_unpackhi_epi16(c1, d1);
            let e0 = _mm_unpacklo_epi16(e1, f1);
            let f0 = _mm_unpacklo_epi16(g1, h1);
            let g0 = _mm_unpackhi_epi16(e1, f1);
            let h0 = _mm_unpackhi_epi16(g1, h1);

            let a1 = _mm_unpacklo_epi32(a0, b0);
            let b1 = _mm_unpackhi_epi32(a0, b0);
            let c1 = _mm_unpacklo_epi32(c0, d0);
            let d1 = _mm_unpackhi_epi32(c0, d0);
            let e1 = _mm_unpacklo_epi32(e0, f0);
            let f1 = _mm_unpackhi_epi32(e0, f0);
            let g1 = _mm_unpacklo_epi32(g0, h0);
            let h1 = _mm_unpackhi_epi32(g0, h0);

            // Each register now holds two output columns of 8 rows.
            for (pair, v) in [a1, b1, c1, d1, e1, f1, g1, h1].into_iter().enumerate() {
                store_lo(jj + 2 * pair, ii, v);
                store_hi(jj + 2 * pair + 1, ii, v);
            }
            jj += 16;
        }
        ii += 8;
    }

    byte_bitrow_kernel(input, output, size, elem_size, nbyte_row - nbyte_row % 16);
}

/// Bit shuffle within groups of eight elements via `movemask`.
///
/// Odd element sizes fall back to the scalar kernel.
///
/// # Safety
///
/// - `input` and `output` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn shuffle_bit_eightelem(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    debug_assert!(size % 8 == 0);
    if elem_size % 2 != 0 {
        bit_eightelem_kernel(input, output, size, elem_size);
        return;
    }

    let nbyte = size * elem_size;
    let group = 8 * elem_size;
    let in_ptr = input.as_ptr();
    let out_ptr = output.as_mut_ptr();

    let mut ii = 0;
    while ii + group <= nbyte {
        let mut jj = 0;
        while jj + 15 < group {
            let mut xmm = _mm_loadu_si128(in_ptr.add(ii + jj) as *const __m128i);
            for kk in 0..8 {
                let bt = _mm_movemask_epi8(xmm) as u16;
                xmm = _mm_slli_epi16(xmm, 1);
                let ind = ii + jj / 8 + (7 - kk) * elem_size;
                (out_ptr.add(ind) as *mut u16).write_unaligned(bt.to_le());
            }
            jj += 16;
        }
        ii += group;
    }
}

/// Full forward bit transpose.
///
/// # Safety
///
/// - `input`, `output` and `scratch` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn trans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    trans_byte_elem(input, output, scratch, size, elem_size);
    trans_bit_byte(output, scratch, size, elem_size);
    elem_kernel(scratch, output, 8, elem_size, size / 8);
}

/// Inverse of [`trans_bit_elem`].
///
/// # Safety
///
/// - `input`, `output` and `scratch` must hold at least `size * elem_size` bytes
/// - `size` must be a multiple of 8
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn untrans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) {
    trans_byte_bitrow(input, scratch, size, elem_size);
    shuffle_bit_eightelem(scratch, output, size, elem_size);
}
