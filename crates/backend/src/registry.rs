//! Implementation registry.
//!
//! Every backend implementation has a process-wide identifier: one bit of a
//! 32-bit mask. The value of the bit carries no ranking; ordering is derived
//! from the implementation's [`ImplKind`].
//!
//! The table itself is a `const` slice. What varies at runtime is only
//! whether an entry is *enabled*: compiled for this target and every
//! required CPU capability detected. That answer is computed once and cached.
//!
//! # Registered Implementations
//!
//! | Id | Name | Kind | Requires |
//! |----|------|------|----------|
//! | `0x1` | `std` | Bltn | target atomics |
//! | `0x2` | `x86_64/cmpxchg16b` | Asm | x86_64 + `cmpxchg16b` |
//! | `0x4` | `x86_64/rtm` | Asm | x86_64 + `rtm` |

use core::fmt;

use platform::{
  Caps,
  caps::x86,
};

use crate::{
  cache::OnceCache,
  kind::{ImplKind, KindSet},
};

// ─────────────────────────────────────────────────────────────────────────────
// Ids
// ─────────────────────────────────────────────────────────────────────────────

/// A single implementation id (exactly one bit set, or the null id).
///
/// Conversions from raw integers are checked; see [`TryFrom<u64>`](#impl-TryFrom<u64>-for-ImplId).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ImplId(u32);

impl ImplId {
  /// The null id. Never registered, never available.
  pub const NULL: Self = Self(0);
  /// `core::sync::atomic` builtins.
  pub const STD: Self = Self(1 << 0);
  /// x86_64 `lock cmpxchg16b` for 16-byte objects.
  pub const CX16: Self = Self(1 << 1);
  /// x86_64 Restricted Transactional Memory.
  pub const TSX: Self = Self(1 << 2);

  /// Raw bit value.
  #[inline]
  #[must_use]
  pub const fn bits(self) -> u32 {
    self.0
  }

  #[inline]
  #[must_use]
  pub const fn is_null(self) -> bool {
    self.0 == 0
  }

  /// This id as a single-member [`ImplSet`].
  #[inline]
  #[must_use]
  pub const fn as_set(self) -> ImplSet {
    ImplSet::from_bits_retain(self.0)
  }

  /// Registered name, or `"null"` / `"unregistered"`.
  #[must_use]
  pub fn name(self) -> &'static str {
    match entry(self) {
      Some(entry) => entry.name,
      None if self.is_null() => "null",
      None => "unregistered",
    }
  }

  /// Parse a registered name or a short alias (`cx16`, `tsx`, `rtm`).
  #[must_use]
  pub fn parse(s: &str) -> Option<Self> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("null") {
      return Some(Self::NULL);
    }
    if s.eq_ignore_ascii_case("cx16") || s.eq_ignore_ascii_case("cmpxchg16b") {
      return Some(Self::CX16);
    }
    if s.eq_ignore_ascii_case("tsx") || s.eq_ignore_ascii_case("rtm") {
      return Some(Self::TSX);
    }
    REGISTRY.iter().find(|e| e.name.eq_ignore_ascii_case(s)).map(|e| e.id)
  }
}

impl fmt::Debug for ImplId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ImplId({:#x}, {})", self.0, self.name())
  }
}

impl fmt::Display for ImplId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Raw integer did not name a single implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ImplIdError {
  /// More than one bit was set.
  #[error("implementation id {0:#x} must have at most one bit set")]
  NotSingleBit(u64),
  /// The bit lies outside the 32-bit id space.
  #[error("implementation id {0:#x} is outside the 32-bit id space")]
  OutOfRange(u64),
}

impl TryFrom<u64> for ImplId {
  type Error = ImplIdError;

  fn try_from(raw: u64) -> Result<Self, Self::Error> {
    if raw.count_ones() > 1 {
      return Err(ImplIdError::NotSingleBit(raw));
    }
    u32::try_from(raw).map(Self).map_err(|_| ImplIdError::OutOfRange(raw))
  }
}

impl TryFrom<u32> for ImplId {
  type Error = ImplIdError;

  #[inline]
  fn try_from(raw: u32) -> Result<Self, Self::Error> {
    Self::try_from(u64::from(raw))
  }
}

impl TryFrom<ImplSet> for ImplId {
  type Error = ImplIdError;

  #[inline]
  fn try_from(set: ImplSet) -> Result<Self, Self::Error> {
    Self::try_from(set.bits())
  }
}

impl From<ImplId> for ImplSet {
  #[inline]
  fn from(id: ImplId) -> Self {
    id.as_set()
  }
}

bitflags::bitflags! {
  /// A set of implementation ids.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct ImplSet: u32 {
    const STD = ImplId::STD.bits();
    const CX16 = ImplId::CX16.bits();
    const TSX = ImplId::TSX.bits();
    const ALL = Self::STD.bits() | Self::CX16.bits() | Self::TSX.bits();
  }
}

impl ImplSet {
  /// Every id in the set, lowest bit first (unknown bits included).
  pub fn ids(self) -> impl Iterator<Item = ImplId> {
    let bits = self.bits();
    (0..u32::BITS).map(|b| 1u32 << b).filter(move |m| bits & m != 0).map(ImplId)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry Table
// ─────────────────────────────────────────────────────────────────────────────

/// One registered implementation.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
  pub id: ImplId,
  /// Diagnostic name, `{arch}/{instruction}` for architecture-specific entries.
  pub name: &'static str,
  pub kind: ImplKind,
  /// Capabilities that must be detected for the entry to be enabled.
  pub requires: Caps,
  /// Whether the implementation is compiled for this target.
  pub compiled: bool,
}

impl Entry {
  /// Enabled given a set of detected capabilities.
  #[inline]
  #[must_use]
  pub const fn is_enabled(&self, caps: Caps) -> bool {
    self.compiled && caps.has(self.requires)
  }
}

/// The registry, in id order.
pub const REGISTRY: &[Entry] = &[
  Entry {
    id: ImplId::STD,
    name: "std",
    kind: ImplKind::Bltn,
    requires: Caps::NONE,
    compiled: cfg!(target_has_atomic = "8"),
  },
  Entry {
    id: ImplId::CX16,
    name: "x86_64/cmpxchg16b",
    kind: ImplKind::Asm,
    requires: x86::CMPXCHG16B,
    compiled: cfg!(target_arch = "x86_64"),
  },
  Entry {
    id: ImplId::TSX,
    name: "x86_64/rtm",
    kind: ImplKind::Asm,
    requires: x86::RTM,
    compiled: cfg!(target_arch = "x86_64"),
  },
];

/// Registry entry for `id`, if registered.
#[must_use]
pub fn entry(id: ImplId) -> Option<&'static Entry> {
  if id.is_null() {
    return None;
  }
  REGISTRY.iter().find(|e| e.id == id)
}

/// Kind of a single id. `Unknown` for the null id and unregistered ids.
#[must_use]
pub fn get_kind(id: ImplId) -> ImplKind {
  entry(id).map_or(ImplKind::Unknown, |e| e.kind)
}

/// Kind of a raw integer id.
///
/// # Panics
///
/// Always panics (in every build profile) if more than one bit is set.
/// Use [`ImplId::try_from`] for a recoverable check.
#[must_use]
pub fn get_kind_raw(raw: u64) -> ImplKind {
  assert!(
    raw.count_ones() <= 1,
    "get_kind_raw: implementation id {raw:#x} must have exactly one bit set"
  );
  ImplId::try_from(raw).map_or(ImplKind::Unknown, get_kind)
}

// ─────────────────────────────────────────────────────────────────────────────
// Availability
// ─────────────────────────────────────────────────────────────────────────────

static AVAILABLE: OnceCache<ImplSet> = OnceCache::new();

/// Ids enabled for `caps`.
#[must_use]
pub fn available_with(caps: Caps) -> ImplSet {
  REGISTRY
    .iter()
    .filter(|e| e.is_enabled(caps))
    .fold(ImplSet::empty(), |acc, e| acc | e.id.as_set())
}

/// Ids enabled on this machine. Computed once from [`platform::caps()`].
#[must_use]
pub fn available() -> ImplSet {
  AVAILABLE.get_or_init(|| {
    let ids = available_with(platform::caps());
    tracing::debug!(ids = ?ids, "resolved available implementations");
    ids
  })
}

/// Whether `id` is registered and enabled on this machine.
#[inline]
#[must_use]
pub fn is_available(id: ImplId) -> bool {
  !id.is_null() && available().contains(id.as_set())
}

/// Enabled ids whose kind is in `kinds`, given an availability set.
#[must_use]
pub fn get_ids_with(kinds: KindSet, available: ImplSet) -> ImplSet {
  REGISTRY
    .iter()
    .filter(|e| available.contains(e.id.as_set()) && kinds.intersects(e.kind.as_set()))
    .fold(ImplSet::empty(), |acc, e| acc | e.id.as_set())
}

/// Enabled ids whose kind is in `kinds`.
#[must_use]
pub fn get_ids(kinds: KindSet) -> ImplSet {
  get_ids_with(kinds, available())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_ids_are_distinct_single_bits() {
    let mut seen = 0u32;
    for e in REGISTRY {
      assert_eq!(e.id.bits().count_ones(), 1, "{}", e.name);
      assert_eq!(seen & e.id.bits(), 0, "duplicate id for {}", e.name);
      seen |= e.id.bits();
    }
    assert_eq!(seen, ImplSet::ALL.bits());
  }

  #[test]
  fn null_id_is_unknown() {
    assert_eq!(get_kind(ImplId::NULL), ImplKind::Unknown);
    assert_eq!(get_kind_raw(0), ImplKind::Unknown);
    assert!(!is_available(ImplId::NULL));
  }

  #[test]
  fn registered_kinds_are_known() {
    for e in REGISTRY {
      let kind = get_kind(e.id);
      assert_ne!(kind, ImplKind::Unknown);
      assert!(KindSet::ALL.contains(kind.as_set()));
      assert_eq!(get_kind_raw(u64::from(e.id.bits())), kind);
    }
  }

  #[test]
  fn unregistered_single_bit_is_unknown() {
    assert_eq!(get_kind_raw(1 << 20), ImplKind::Unknown);
    assert_eq!(get_kind_raw(1 << 40), ImplKind::Unknown);
  }

  #[test]
  #[should_panic(expected = "exactly one bit")]
  fn multi_bit_raw_id_panics() {
    let _ = get_kind_raw(0b11);
  }

  #[test]
  fn checked_conversion() {
    assert_eq!(ImplId::try_from(0u64), Ok(ImplId::NULL));
    assert_eq!(ImplId::try_from(2u64), Ok(ImplId::CX16));
    assert_eq!(ImplId::try_from(0b101u64), Err(ImplIdError::NotSingleBit(0b101)));
    assert_eq!(ImplId::try_from(1u64 << 33), Err(ImplIdError::OutOfRange(1 << 33)));
    assert_eq!(ImplId::try_from(ImplSet::TSX), Ok(ImplId::TSX));
    assert!(ImplId::try_from(ImplSet::ALL).is_err());
  }

  #[test]
  fn get_ids_by_kind_partitions_all() {
    let caps = Caps::from_raw([u64::MAX; 4]);
    let available = available_with(caps);
    let mut union = ImplSet::empty();
    for kind in ImplKind::BY_OVERHEAD {
      let ids = get_ids_with(kind.as_set(), available);
      assert!((union & ids).is_empty(), "kinds must not share ids");
      union |= ids;
    }
    assert_eq!(union, get_ids_with(KindSet::ALL, available));
  }

  #[test]
  fn disabled_ids_are_excluded() {
    let none = available_with(Caps::NONE);
    assert!(!none.contains(ImplSet::CX16));
    assert!(!none.contains(ImplSet::TSX));
    assert_eq!(get_ids_with(KindSet::ASM, none), ImplSet::empty());
    #[cfg(target_has_atomic = "8")]
    assert_eq!(get_ids_with(KindSet::BLTN, none), ImplSet::STD);
  }

  #[cfg(target_arch = "x86_64")]
  #[test]
  fn x86_64_entries_follow_caps() {
    let only_cx16 = available_with(x86::CMPXCHG16B);
    assert!(only_cx16.contains(ImplSet::CX16));
    assert!(!only_cx16.contains(ImplSet::TSX));
    assert_eq!(get_ids_with(KindSet::ASM, only_cx16), ImplSet::CX16);
  }

  #[test]
  fn available_is_cached_and_consistent() {
    assert_eq!(available(), available());
    assert_eq!(available(), available_with(platform::caps()));
    for id in available().ids() {
      assert!(is_available(id));
    }
  }

  #[test]
  fn names_and_parse() {
    for e in REGISTRY {
      assert_eq!(ImplId::parse(e.name), Some(e.id));
      assert_eq!(e.id.name(), e.name);
    }
    assert_eq!(ImplId::parse("RTM"), Some(ImplId::TSX));
    assert_eq!(ImplId::parse("cx16"), Some(ImplId::CX16));
    assert_eq!(ImplId::parse("nope"), None);
    assert_eq!(ImplId::NULL.name(), "null");
    assert_eq!(ImplId(1 << 9).name(), "unregistered");
  }

  #[test]
  fn set_ids_iterates_bits() {
    let ids: [ImplId; 2] = {
      let mut it = (ImplSet::STD | ImplSet::TSX).ids();
      [it.next().unwrap_or_default(), it.next().unwrap_or_default()]
    };
    assert_eq!(ids, [ImplId::STD, ImplId::TSX]);
    assert_eq!(ImplSet::empty().ids().count(), 0);
  }
}
