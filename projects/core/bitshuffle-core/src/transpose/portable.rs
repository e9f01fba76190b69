//! Portable scalar implementation of every transpose stage.
//!
//! This is the reference the SIMD variants are tested against. The public functions validate
//! their arguments; the `pub(crate)` kernels assume validated arguments and are shared with the
//! SIMD variants to finish off tails the vector loops leave behind.
//!
//! All words are read and written little-endian, so the output does not depend on the host's
//! byte order.

use super::{check_buffers, check_scratch, total_bytes};
use crate::error::{check_mult_eight, BitshuffleError};
use multiversion::multiversion;

/// Transposes an 8x8 bit matrix packed into a single little-endian quadword.
///
/// Bit `j` of input byte `k` ends up as bit `k` of output byte `j`.
#[inline(always)]
pub(crate) const fn trans_bit_8x8(mut x: u64) -> u64 {
    let mut t = (x ^ (x >> 7)) & 0x00AA_00AA_00AA_00AA;
    x = x ^ t ^ (t << 7);
    t = (x ^ (x >> 14)) & 0x0000_CCCC_0000_CCCC;
    x = x ^ t ^ (t << 14);
    t = (x ^ (x >> 28)) & 0x0000_0000_F0F0_F0F0;
    x ^ t ^ (t << 28)
}

#[inline(always)]
fn read_u64(input: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&input[offset..offset + 8]);
    u64::from_le_bytes(word)
}

/// Byte transpose kernel starting at element `start`.
///
/// Groups of 8 elements are handled together; trailing `size % 8` elements one at a time.
pub(crate) fn byte_elem_kernel(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    start: usize,
) {
    if size <= start {
        return;
    }

    let mut ii = start;
    while ii + 7 < size {
        for jj in 0..elem_size {
            for kk in 0..8 {
                output[jj * size + ii + kk] = input[(ii + kk) * elem_size + jj];
            }
        }
        ii += 8;
    }

    for ii in (size - size % 8).max(start)..size {
        for jj in 0..elem_size {
            output[jj * size + ii] = input[ii * elem_size + jj];
        }
    }
}

/// Bit transpose kernel for every 8-byte word from `start_byte` onwards.
#[multiversion(targets(
    // x86-64-v3 without lahfsahf
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    // x86-64-v2 without lahfsahf
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
pub(crate) fn bit_byte_kernel(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    start_byte: usize,
) {
    let nbyte_bitrow = size * elem_size / 8;
    for ii in (start_byte / 8)..nbyte_bitrow {
        let x = trans_bit_8x8(read_u64(input, ii * 8)).to_le_bytes();
        for (kk, byte) in x.iter().enumerate() {
            output[kk * nbyte_bitrow + ii] = *byte;
        }
    }
}

/// Generic stride transpose kernel: `lda` rows of `ldb` items, each `elem_size` bytes.
pub(crate) fn elem_kernel(
    input: &[u8],
    output: &mut [u8],
    lda: usize,
    ldb: usize,
    elem_size: usize,
) {
    for ii in 0..lda {
        for jj in 0..ldb {
            let src = (ii * ldb + jj) * elem_size;
            let dst = (jj * lda + ii) * elem_size;
            output[dst..dst + elem_size].copy_from_slice(&input[src..src + elem_size]);
        }
    }
}

/// Byte transpose kernel for bit-row data, columns `start_col..` of every row group.
#[multiversion(targets(
    // x86-64-v3 without lahfsahf
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    // x86-64-v2 without lahfsahf
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
pub(crate) fn byte_bitrow_kernel(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    start_col: usize,
) {
    let nrows = 8 * elem_size;
    let nbyte_row = size / 8;
    for row in 0..nrows {
        for col in start_col..nbyte_row {
            output[col * nrows + row] = input[row * nbyte_row + col];
        }
    }
}

/// Bit shuffle kernel over groups of eight elements.
pub(crate) fn bit_eightelem_kernel(input: &[u8], output: &mut [u8], size: usize, elem_size: usize) {
    let nbyte = size * elem_size;
    let group = 8 * elem_size;

    let mut jj = 0;
    while jj < group {
        let mut ii = 0;
        while ii + group <= nbyte {
            let x = trans_bit_8x8(read_u64(input, ii + jj)).to_le_bytes();
            for (kk, byte) in x.iter().enumerate() {
                output[ii + jj / 8 + kk * elem_size] = *byte;
            }
            ii += group;
        }
        jj += 8;
    }
}

/// Memory copy with the same call shape as the transpose stages.
///
/// Useful as a baseline when profiling.
pub fn copy(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    output[..nbyte].copy_from_slice(&input[..nbyte]);
    Ok(nbyte)
}

/// Transposes bytes within elements, starting at element `start`.
///
/// `start` must be a multiple of 8 but `size` may be anything; elements past the last full
/// group of 8 are transposed one at a time.
pub fn trans_byte_elem_remainder(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    start: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(start)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    byte_elem_kernel(input, output, size, elem_size, start);
    Ok(nbyte)
}

/// Transposes bytes within elements.
///
/// Byte `j` of element `i` is written to `output[j * size + i]`.
pub fn trans_byte_elem(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    trans_byte_elem_remainder(input, output, size, elem_size, 0)
}

/// Transposes bits within bytes, starting at byte `start_byte`.
pub fn trans_bit_byte_remainder(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
    start_byte: usize,
) -> Result<usize, BitshuffleError> {
    let nbyte = total_bytes(size, elem_size);
    check_mult_eight(nbyte)?;
    check_mult_eight(start_byte)?;
    check_buffers(input, output, nbyte)?;
    bit_byte_kernel(input, output, size, elem_size, start_byte);
    Ok(nbyte)
}

/// Transposes bits within bytes.
///
/// Each 8-byte word of the input becomes one byte in each of 8 bit rows of `nbyte / 8` bytes.
pub fn trans_bit_byte(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    trans_bit_byte_remainder(input, output, size, elem_size, 0)
}

/// General transpose of an `lda` x `ldb` matrix of `elem_size`-byte items.
pub fn trans_elem(
    input: &[u8],
    output: &mut [u8],
    lda: usize,
    ldb: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    let nbyte = total_bytes(total_bytes(lda, ldb), elem_size);
    check_buffers(input, output, nbyte)?;
    elem_kernel(input, output, lda, ldb, elem_size);
    Ok(nbyte)
}

/// Regroups bit rows (`size / 8` bytes each) so the rows of each bit position sit together.
pub fn trans_bitrow_eight(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(size)?;
    trans_elem(input, output, 8, elem_size, size / 8)
}

/// Full forward bit transpose of `size` elements. `size` must be a multiple of 8.
///
/// `scratch` must hold at least `size * elem_size` bytes.
pub fn trans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(size)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    check_scratch(scratch, nbyte)?;

    byte_elem_kernel(input, output, size, elem_size, 0);
    bit_byte_kernel(output, scratch, size, elem_size, 0);
    elem_kernel(scratch, output, 8, elem_size, size / 8);
    Ok(nbyte)
}

/// Transposes the bytes of data organised as `8 * elem_size` bit rows.
pub fn trans_byte_bitrow(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(size)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    byte_bitrow_kernel(input, output, size, elem_size, 0);
    Ok(nbyte)
}

/// Shuffles bits within the bytes of each group of eight elements.
pub fn shuffle_bit_eightelem(
    input: &[u8],
    output: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(size)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    bit_eightelem_kernel(input, output, size, elem_size);
    Ok(nbyte)
}

/// Inverse of [`trans_bit_elem`]. `size` must be a multiple of 8.
///
/// `scratch` must hold at least `size * elem_size` bytes.
pub fn untrans_bit_elem(
    input: &[u8],
    output: &mut [u8],
    scratch: &mut [u8],
    size: usize,
    elem_size: usize,
) -> Result<usize, BitshuffleError> {
    check_mult_eight(size)?;
    let nbyte = total_bytes(size, elem_size);
    check_buffers(input, output, nbyte)?;
    check_scratch(scratch, nbyte)?;

    byte_bitrow_kernel(input, scratch, size, elem_size, 0);
    bit_eightelem_kernel(scratch, output, size, elem_size);
    Ok(nbyte)
}
