//! CPU capability representation.
//!
//! This module answers one question for the atomic backends: "which atomic
//! instructions can this machine legally execute?"
//!
//! # Design
//!
//! [`Caps`] is a 256-bit bitset. Each bit names one ISA extension that a
//! registered backend requires: double-width compare-exchange and hardware
//! transactional memory today. Bits are architecture-specific but the API is
//! uniform across all targets.
//!
//! # Bit Layout
//!
//! - Bits 0-63: x86/x86_64 features
//! - Bits 64-255: reserved for other architectures
//!
//! # Usage
//!
//! ```ignore
//! use platform::caps::x86;
//!
//! if platform::caps().has(x86::CMPXCHG16B) {
//!     // 16-byte compare-exchange is available
//! }
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// Core Capability Type
// ─────────────────────────────────────────────────────────────────────────────

/// CPU capabilities: a 256-bit feature bitset.
///
/// Use [`has()`](Caps::has) to check that every required feature is present.
/// `Caps` is `Copy` and can be freely shared across threads.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Caps(pub(crate) [u64; 4]);

impl Caps {
  /// Empty capability set (no features).
  pub const NONE: Self = Self([0; 4]);

  /// Create a capability set from raw words.
  ///
  /// Only available with the `testing` feature or in test builds.
  #[cfg(any(test, feature = "testing"))]
  #[inline]
  #[must_use]
  pub const fn from_raw(words: [u64; 4]) -> Self {
    Self(words)
  }

  /// Access the raw underlying words.
  ///
  /// Only available with the `testing` feature or in test builds.
  #[cfg(any(test, feature = "testing"))]
  #[inline]
  #[must_use]
  pub const fn as_raw(&self) -> &[u64; 4] {
    &self.0
  }

  /// Check if all features in `required` are present.
  #[inline(always)]
  #[must_use]
  pub const fn has(self, required: Self) -> bool {
    (self.0[0] & required.0[0]) == required.0[0]
      && (self.0[1] & required.0[1]) == required.0[1]
      && (self.0[2] & required.0[2]) == required.0[2]
      && (self.0[3] & required.0[3]) == required.0[3]
  }

  /// Union of two capability sets.
  #[inline]
  #[must_use]
  pub const fn union(self, other: Self) -> Self {
    Self([
      self.0[0] | other.0[0],
      self.0[1] | other.0[1],
      self.0[2] | other.0[2],
      self.0[3] | other.0[3],
    ])
  }

  /// Count the number of features present.
  #[inline]
  #[must_use]
  pub const fn count(self) -> u32 {
    self.0[0].count_ones() + self.0[1].count_ones() + self.0[2].count_ones() + self.0[3].count_ones()
  }

  /// Create a capability set with a single bit set.
  #[inline]
  #[must_use]
  pub const fn bit(bit: u8) -> Self {
    let mut words = [0u64; 4];
    let mask = 1u64 << (bit % 64);
    match bit / 64 {
      0 => words[0] = mask,
      1 => words[1] = mask,
      2 => words[2] = mask,
      _ => words[3] = mask,
    }
    Self(words)
  }

  /// Check if a specific bit is set.
  #[inline]
  #[must_use]
  pub const fn has_bit(self, bit: u8) -> bool {
    let word = match bit / 64 {
      0 => self.0[0],
      1 => self.0[1],
      2 => self.0[2],
      _ => self.0[3],
    };
    (word & (1u64 << (bit % 64))) != 0
  }
}

impl core::ops::BitOr for Caps {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Self) -> Self::Output {
    self.union(rhs)
  }
}

impl core::ops::BitOrAssign for Caps {
  #[inline]
  fn bitor_assign(&mut self, rhs: Self) {
    *self = self.union(rhs);
  }
}

impl core::fmt::Debug for Caps {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "Caps({}", Arch::current())?;
    let mut names = FEATURE_NAMES
      .iter()
      .filter(|&&(bit, _)| self.has_bit(bit))
      .map(|&(_, name)| name)
      .peekable();
    if names.peek().is_none() {
      return f.write_str(", none)");
    }
    f.write_str(", [")?;
    for (i, name) in names.enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      f.write_str(name)?;
    }
    f.write_str("])")
  }
}

impl core::fmt::Display for Caps {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    core::fmt::Debug::fmt(self, f)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Architecture Identification
// ─────────────────────────────────────────────────────────────────────────────

/// Target architecture enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum Arch {
  X86_64,
  X86,
  Aarch64,
  Arm,
  Riscv64,
  Riscv32,
  #[default]
  Other,
}

impl Arch {
  /// Get the architecture for the current compilation target.
  #[inline]
  #[must_use]
  pub const fn current() -> Self {
    if cfg!(target_arch = "x86_64") {
      Self::X86_64
    } else if cfg!(target_arch = "x86") {
      Self::X86
    } else if cfg!(target_arch = "aarch64") {
      Self::Aarch64
    } else if cfg!(target_arch = "arm") {
      Self::Arm
    } else if cfg!(target_arch = "riscv64") {
      Self::Riscv64
    } else if cfg!(target_arch = "riscv32") {
      Self::Riscv32
    } else {
      Self::Other
    }
  }

  /// Returns the human-readable name for this architecture.
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::X86 => "x86",
      Self::Aarch64 => "aarch64",
      Self::Arm => "arm",
      Self::Riscv64 => "riscv64",
      Self::Riscv32 => "riscv32",
      Self::Other => "other",
    }
  }
}

impl core::fmt::Display for Arch {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.name())
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature Bits
// ─────────────────────────────────────────────────────────────────────────────

/// x86/x86_64 features relevant to atomic backends (bits 0-63).
pub mod x86 {
  use super::Caps;

  /// `cmpxchg16b`: 16-byte compare-exchange (x86_64 only).
  pub const CMPXCHG16B: Caps = Caps::bit(1);
  /// Restricted Transactional Memory (`xbegin`/`xend`/`xabort`/`xtest`).
  pub const RTM: Caps = Caps::bit(2);
}

const FEATURE_NAMES: &[(u8, &str)] = &[(1, "cmpxchg16b"), (2, "rtm")];
