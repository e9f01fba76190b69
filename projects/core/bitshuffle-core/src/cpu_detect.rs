//! Helpers for CPU feature detection without using std.
//!
//! With the `no-runtime-cpu-detection` feature, availability is decided purely by the
//! `target_feature` flags the crate was compiled with.

/// A transpose implementation variant.
///
/// All variants produce bit-identical results; they differ only in speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Portable scalar code, available everywhere.
    Scalar,
    /// 128-bit SIMD (SSE2).
    Sse2,
    /// 256-bit SIMD (AVX2).
    Avx2,
}

impl Capability {
    /// All variants, from slowest to fastest.
    pub const ALL: [Capability; 3] = [Capability::Scalar, Capability::Sse2, Capability::Avx2];

    /// Returns the fastest variant this machine can run.
    #[inline]
    pub fn best() -> Self {
        if has_wide256() {
            Capability::Avx2
        } else if has_wide128() {
            Capability::Sse2
        } else {
            Capability::Scalar
        }
    }

    /// Returns `true` if this variant can run on this machine.
    #[inline]
    pub fn is_available(self) -> bool {
        match self {
            Capability::Scalar => true,
            Capability::Sse2 => has_wide128(),
            Capability::Avx2 => has_wide256(),
        }
    }
}

/// Returns `true` if the CPU supports AVX2.
#[inline]
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn has_avx2() -> bool {
    #[cfg(not(feature = "no-runtime-cpu-detection"))]
    {
        cpufeatures::new!(cpuid_avx2, "avx2");
        cpuid_avx2::get()
    }

    #[cfg(feature = "no-runtime-cpu-detection")]
    {
        cfg!(target_feature = "avx2")
    }
}

/// Returns `true` if the CPU supports SSE2.
#[inline]
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn has_sse2() -> bool {
    #[cfg(not(feature = "no-runtime-cpu-detection"))]
    {
        cpufeatures::new!(cpuid_sse2, "sse2");
        cpuid_sse2::get()
    }

    #[cfg(feature = "no-runtime-cpu-detection")]
    {
        cfg!(target_feature = "sse2")
    }
}

/// Returns `true` if the 128-bit transpose variant can run here.
#[inline]
pub fn has_wide128() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        has_sse2()
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Returns `true` if the 256-bit transpose variant can run here.
#[inline]
pub fn has_wide256() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        has_avx2() && has_sse2()
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}
