//! Memory allocation utilities for the blocked transform drivers.
//!
//! ## Useful APIs
//!
//! [`allocate_align_64`]: Allocates uninitialized memory aligned to 64-bytes.
//! [`ScratchBuffer::new`]: Allocates a zeroed, reusable scratch region for a block worker.
//!
//! Every worker in this crate owns exactly one scratch region, sized for the largest block it
//! will see, and reuses it for every block it processes.

use core::alloc::{Layout, LayoutError};
use safe_allocator_api::AllocError;
use safe_allocator_api::RawAlloc;
use thiserror::Error;

/// Allocates data with an alignment of 64 bytes.
///
/// # Parameters
///
/// - `num_bytes`: The number of bytes to allocate
///
/// # Returns
///
/// A [`RawAlloc`] containing the allocated data
pub fn allocate_align_64(num_bytes: usize) -> Result<RawAlloc, AllocateError> {
    let layout = Layout::from_size_align(num_bytes, 64)?;
    Ok(RawAlloc::new(layout)?)
}

/// An error that happened in memory allocation within the library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocateError {
    /// An error that occurred while creating a layout for allocation.
    #[error("Invalid layout provided. Likely due to `num_bytes` in `allocate_align_64` being larger than isize::MAX. {0}")]
    LayoutError(#[from] LayoutError),

    /// An error that occurred while allocating memory.
    #[error(transparent)]
    AllocationFailed(#[from] AllocError),
}

/// A 64-byte aligned, zero-initialized byte buffer owned by a single worker.
pub struct ScratchBuffer {
    alloc: RawAlloc,
    len: usize,
}

impl ScratchBuffer {
    /// Allocates a zeroed scratch buffer of `len` bytes.
    pub fn new(len: usize) -> Result<Self, AllocateError> {
        // Zero sized layouts are not handed to the allocator.
        let mut alloc = allocate_align_64(len.max(1))?;
        unsafe { core::ptr::write_bytes(alloc.as_mut_ptr(), 0, len.max(1)) };
        Ok(Self { alloc, len })
    }

    /// Length of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Views the buffer as a byte slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the allocation holds at least `len` bytes, all initialized in `new`.
        unsafe { core::slice::from_raw_parts(self.alloc.as_ptr(), self.len) }
    }

    /// Views the buffer as a mutable byte slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the allocation holds at least `len` bytes, all initialized in `new`.
        unsafe { core::slice::from_raw_parts_mut(self.alloc.as_mut_ptr(), self.len) }
    }
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl Send for ScratchBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_with_64_byte_alignment() {
        let mut alloc = allocate_align_64(100).unwrap();
        assert_eq!(alloc.as_mut_ptr() as usize % 64, 0);
    }

    #[test]
    fn scratch_starts_zeroed_and_is_writable() {
        let mut scratch = ScratchBuffer::new(129).unwrap();
        assert_eq!(scratch.len(), 129);
        assert!(scratch.as_slice().iter().all(|&b| b == 0));

        scratch.as_mut_slice()[128] = 0xAB;
        assert_eq!(scratch.as_slice()[128], 0xAB);
    }

    #[test]
    fn empty_scratch_is_allowed() {
        let mut scratch = ScratchBuffer::new(0).unwrap();
        assert!(scratch.is_empty());
        assert!(scratch.as_mut_slice().is_empty());
    }

    #[test]
    fn oversized_request_fails_on_layout() {
        let result = allocate_align_64(usize::MAX);
        assert!(matches!(result, Err(AllocateError::LayoutError(_))));
    }
}
