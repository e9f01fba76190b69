//! Common test imports and utilities
//!
//! This module provides a common prelude for test modules to avoid
//! duplicate imports across the codebase.
#![allow(unused_imports)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub use alloc::{boxed::Box, format, string::String, vec, vec::Vec};

pub use rstest::rstest;

use crate::cpu_detect::Capability;

/// Deterministic pseudo random bytes (xorshift64*), so failures are reproducible.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            (state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 56) as u8
        })
        .collect()
}

/// Bytes where each element is a small, slowly rising integer. Compresses well once shuffled.
pub fn smooth_elements(size: usize, elem_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size * elem_size];
    for (index, elem) in data.chunks_exact_mut(elem_size.max(1)).enumerate() {
        let value = (index as u64 / 3).to_le_bytes();
        let width = elem.len().min(value.len());
        elem[..width].copy_from_slice(&value[..width]);
    }
    data
}

/// Every transpose variant that can run on this machine.
pub fn available_capabilities() -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|capability| capability.is_available())
        .collect()
}
