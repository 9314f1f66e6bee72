//! Implementation kinds.
//!
//! A kind classifies how an implementation reaches the hardware, which
//! determines its per-call overhead. Kinds are ordered from least to most
//! overhead when the merge engine has to decide which implementation donates
//! a slot first.
//!
//! # Kind Overview
//!
//! | Kind | Bit | Rank | Description |
//! |------|-----|------|-------------|
//! | Asm | `0x10` | 0 | Hand-written inline assembly |
//! | Bltn | `0x08` | 1 | Compiler builtins (`core::sync::atomic`) |
//! | Lib | `0x04` | 2 | A statically linked library |
//! | Os | `0x02` | 3 | Operating-system provided primitives |
//! | Dyn | `0x01` | 4 | Resolved from a dynamic library at runtime |
//! | Unknown | `0x00` | 5 | Null or unregistered id |

use core::fmt;

bitflags::bitflags! {
  /// A set of [`ImplKind`]s, used to filter the registry.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct KindSet: u32 {
    const DYN = 1 << 0;
    const OS = 1 << 1;
    const LIB = 1 << 2;
    const BLTN = 1 << 3;
    const ASM = 1 << 4;
    const ALL = Self::DYN.bits() | Self::OS.bits() | Self::LIB.bits() | Self::BLTN.bits() | Self::ASM.bits();
  }
}

/// How an implementation reaches the hardware.
///
/// The discriminants are the [`KindSet`] bits so a kind converts to a
/// single-member set without a lookup table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ImplKind {
  /// Null or unregistered id.
  #[default]
  Unknown = 0,
  /// Resolved from a dynamic library at runtime.
  Dyn = 1 << 0,
  /// Operating-system provided primitives.
  Os = 1 << 1,
  /// Statically linked library.
  Lib = 1 << 2,
  /// Compiler builtins.
  Bltn = 1 << 3,
  /// Inline assembly.
  Asm = 1 << 4,
}

impl ImplKind {
  /// All kinds in ascending overhead order. `Unknown` sorts last.
  pub const BY_OVERHEAD: [Self; 6] = [Self::Asm, Self::Bltn, Self::Lib, Self::Os, Self::Dyn, Self::Unknown];

  /// Raw bit value (0 for `Unknown`).
  #[inline]
  #[must_use]
  pub const fn bits(self) -> u32 {
    self as u32
  }

  /// This kind as a [`KindSet`]; empty for `Unknown`.
  #[inline]
  #[must_use]
  pub const fn as_set(self) -> KindSet {
    KindSet::from_bits_retain(self.bits())
  }

  /// Position in [`BY_OVERHEAD`](Self::BY_OVERHEAD); lower calls are cheaper.
  #[inline]
  #[must_use]
  pub const fn overhead_rank(self) -> u8 {
    match self {
      Self::Asm => 0,
      Self::Bltn => 1,
      Self::Lib => 2,
      Self::Os => 3,
      Self::Dyn => 4,
      Self::Unknown => 5,
    }
  }

  /// Human-readable kind name.
  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Unknown => "unknown",
      Self::Dyn => "dyn",
      Self::Os => "os",
      Self::Lib => "lib",
      Self::Bltn => "bltn",
      Self::Asm => "asm",
    }
  }

  /// Parse a kind name (case-insensitive, surrounding whitespace ignored).
  ///
  /// Accepts the short names from [`name`](Self::name) plus `builtin` and
  /// `dynamic` as long forms.
  #[must_use]
  pub fn parse(s: &str) -> Option<Self> {
    let s = s.trim();
    [
      ("asm", Self::Asm),
      ("bltn", Self::Bltn),
      ("builtin", Self::Bltn),
      ("lib", Self::Lib),
      ("os", Self::Os),
      ("dyn", Self::Dyn),
      ("dynamic", Self::Dyn),
      ("unknown", Self::Unknown),
    ]
    .into_iter()
    .find_map(|(name, kind)| s.eq_ignore_ascii_case(name).then_some(kind))
  }
}

impl fmt::Display for ImplKind {
  #[inline]
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_values() {
    assert_eq!(ImplKind::Unknown.bits(), 0);
    assert_eq!(ImplKind::Dyn.bits(), 0x01);
    assert_eq!(ImplKind::Os.bits(), 0x02);
    assert_eq!(ImplKind::Lib.bits(), 0x04);
    assert_eq!(ImplKind::Bltn.bits(), 0x08);
    assert_eq!(ImplKind::Asm.bits(), 0x10);
    assert_eq!(KindSet::ALL.bits(), 0x1F);
  }

  #[test]
  fn overhead_order() {
    for pair in ImplKind::BY_OVERHEAD.windows(2) {
      assert!(pair[0].overhead_rank() < pair[1].overhead_rank());
    }
    assert_eq!(ImplKind::BY_OVERHEAD[0], ImplKind::Asm);
    assert_eq!(ImplKind::BY_OVERHEAD[5], ImplKind::Unknown);
  }

  #[test]
  fn as_set_is_single_bit() {
    for kind in ImplKind::BY_OVERHEAD {
      let set = kind.as_set();
      if kind == ImplKind::Unknown {
        assert!(set.is_empty());
      } else {
        assert_eq!(set.bits().count_ones(), 1);
        assert!(KindSet::ALL.contains(set));
      }
    }
  }

  #[test]
  fn parse_names() {
    for kind in ImplKind::BY_OVERHEAD {
      assert_eq!(ImplKind::parse(kind.name()), Some(kind));
    }
    assert_eq!(ImplKind::parse("  ASM "), Some(ImplKind::Asm));
    assert_eq!(ImplKind::parse("Builtin"), Some(ImplKind::Bltn));
    assert_eq!(ImplKind::parse("simd"), None);
    assert_eq!(ImplKind::parse(""), None);
  }

  #[test]
  fn default_is_unknown() {
    assert_eq!(ImplKind::default(), ImplKind::Unknown);
  }
}
