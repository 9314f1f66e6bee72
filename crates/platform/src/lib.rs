//! CPU feature detection for the atomic backends.
//!
//! This crate is the single source of truth for "which atomic instructions
//! can run here". Backends never query the CPU themselves; they declare the
//! [`Caps`] they require and the registry checks them against [`caps()`].
//!
//! # Main Entry Point
//!
//! ```ignore
//! use platform::caps::x86;
//!
//! if platform::caps().has(x86::CMPXCHG16B) {
//!     // 16-byte compare-exchange backend is usable
//! }
//! ```
//!
//! # Design
//!
//! 1. **One API**: callers query [`get()`] instead of doing ad-hoc detection.
//! 2. **Zero-cost when possible**: compile-time features are detected via `cfg!`.
//! 3. **Cached otherwise**: runtime detection is cached in a `OnceLock` (std).
//! 4. **Miri-safe**: under Miri no optional features are reported.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod caps;
mod detect;

pub use caps::{Arch, Caps};
pub use detect::{Detected, OverrideError, clear_override, has_override, set_override, try_set_override};

/// Upper bound on the cache-line size of any supported target, in bytes.
///
/// A power of two. Padding shared atomics to this size avoids false sharing
/// everywhere, at the cost of some space on targets with 64-byte lines.
pub const MAX_CACHE_LINE_SIZE: usize = 128;

/// Get detected capabilities and architecture.
///
/// With `std` the result is detected once and cached; without it only
/// compile-time features are reported.
#[inline]
#[must_use]
pub fn get() -> Detected {
  detect::get()
}

/// Get just the detected capabilities.
#[inline]
#[must_use]
pub fn caps() -> Caps {
  detect::get().caps
}

/// Get the architecture of the current target.
#[inline]
#[must_use]
pub fn arch() -> Arch {
  detect::get().arch
}

/// Capabilities guaranteed by the compilation target alone.
#[inline]
#[must_use]
pub const fn compile_time_caps() -> Caps {
  detect::compile_time().caps
}

/// Static upper bound on the cache-line size, see [`MAX_CACHE_LINE_SIZE`].
#[inline]
#[must_use]
pub const fn cache_line_size() -> usize {
  MAX_CACHE_LINE_SIZE
}
