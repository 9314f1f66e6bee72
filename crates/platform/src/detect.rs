//! Runtime CPU detection.
//!
//! - Compile-time detection (via `cfg!(target_feature = "...")`) on every build
//! - Runtime detection (via the `std::arch` detection macros) with `std`
//! - Caching in a `OnceLock` with `std`
//! - Pre-init overrides for testing and known-hardware deployments
//! - Miri fallback (no features)

use crate::caps::{Arch, Caps};

/// Detection result: capabilities plus the architecture they belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detected {
  pub caps: Caps,
  pub arch: Arch,
}

impl Detected {
  /// A result with no optional features for the current architecture.
  #[inline]
  #[must_use]
  pub const fn baseline() -> Self {
    Self {
      caps: Caps::NONE,
      arch: Arch::current(),
    }
  }
}

/// Why an override could not be installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum OverrideError {
  /// Detection already ran and its result is cached.
  #[error("detection already initialized; overrides must be set before the first query")]
  AlreadyInitialized,
  /// The build has no storage for overrides (`std` disabled).
  #[error("detection overrides are not supported in this build")]
  Unsupported,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache + Override
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "std")]
use std::sync::{OnceLock, RwLock};

#[cfg(feature = "std")]
static CACHE: OnceLock<Detected> = OnceLock::new();

#[cfg(feature = "std")]
static OVERRIDE: RwLock<Option<Detected>> = RwLock::new(None);

/// Detected capabilities, cached after the first call.
#[inline]
#[must_use]
pub fn get() -> Detected {
  #[cfg(miri)]
  {
    Detected::baseline()
  }

  #[cfg(all(not(miri), feature = "std"))]
  {
    *CACHE.get_or_init(detect_with_override)
  }

  #[cfg(all(not(miri), not(feature = "std")))]
  {
    compile_time()
  }
}

/// Set detection override.
///
/// # Panics
///
/// Panics if [`try_set_override`] fails.
#[cold]
pub fn set_override(value: Option<Detected>) {
  if let Err(err) = try_set_override(value) {
    panic!("platform::set_override failed: {err}");
  }
}

/// Try to set detection override.
///
/// Contract: pre-init only. Once [`get()`] has cached a result this returns
/// [`OverrideError::AlreadyInitialized`].
#[cold]
pub fn try_set_override(value: Option<Detected>) -> Result<(), OverrideError> {
  #[cfg(feature = "std")]
  {
    if CACHE.get().is_some() {
      return Err(OverrideError::AlreadyInitialized);
    }
    match OVERRIDE.write() {
      Ok(mut guard) => {
        *guard = value;
        Ok(())
      }
      Err(_) => Err(OverrideError::Unsupported),
    }
  }

  #[cfg(not(feature = "std"))]
  {
    let _ = value;
    Err(OverrideError::Unsupported)
  }
}

/// Clear detection override.
#[cold]
pub fn clear_override() {
  set_override(None);
}

/// Check if an override is set.
#[inline]
#[must_use]
pub fn has_override() -> bool {
  #[cfg(feature = "std")]
  {
    OVERRIDE.read().map(|g| g.is_some()).unwrap_or(false)
  }

  #[cfg(not(feature = "std"))]
  {
    false
  }
}

#[cfg(all(not(miri), feature = "std"))]
#[cold]
fn detect_with_override() -> Detected {
  if let Ok(guard) = OVERRIDE.read() {
    if let Some(ov) = *guard {
      tracing::debug!(arch = %ov.arch, caps = %ov.caps, "using detection override");
      return ov;
    }
  }

  let detected = Detected {
    caps: compile_time().caps | runtime(),
    arch: Arch::current(),
  };
  tracing::debug!(arch = %detected.arch, features = detected.caps.count(), "detected atomic capabilities");
  detected
}

// ─────────────────────────────────────────────────────────────────────────────
// Compile-time Detection
// ─────────────────────────────────────────────────────────────────────────────

/// Features guaranteed by the compilation target.
#[must_use]
#[allow(unused_mut)]
pub const fn compile_time() -> Detected {
  let mut caps = Caps::NONE;

  #[cfg(target_arch = "x86_64")]
  {
    if cfg!(target_feature = "cmpxchg16b") {
      caps = caps.union(crate::caps::x86::CMPXCHG16B);
    }
  }

  #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
  {
    if cfg!(target_feature = "rtm") {
      caps = caps.union(crate::caps::x86::RTM);
    }
  }

  Detected {
    caps,
    arch: Arch::current(),
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime Detection
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(all(not(miri), feature = "std", any(target_arch = "x86", target_arch = "x86_64")))]
fn runtime() -> Caps {
  use crate::caps::x86;

  let mut caps = Caps::NONE;
  #[cfg(target_arch = "x86_64")]
  if std::arch::is_x86_feature_detected!("cmpxchg16b") {
    caps |= x86::CMPXCHG16B;
  }
  if std::arch::is_x86_feature_detected!("rtm") {
    caps |= x86::RTM;
  }
  caps
}

#[cfg(all(
  not(miri),
  feature = "std",
  not(any(target_arch = "x86", target_arch = "x86_64"))
))]
fn runtime() -> Caps {
  Caps::NONE
}
