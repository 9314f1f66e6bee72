//! Candidate resolution.
//!
//! Turns a caller's [`Selection`] and [`Options`] into the ordered list of
//! implementations the merge engine consults. Earlier candidates donate
//! operation slots first.
//!
//! # Ordering
//!
//! By default candidates are ordered by [`ImplKind::overhead_rank`]
//! (inline assembly first, dynamically loaded libraries last), keeping the
//! caller's order among ids of the same kind. With
//! [`Options::PRIORITISE_ARG_IDS`] an explicit id list is used exactly in the
//! order given.
//!
//! Ids that are null, unregistered, or not enabled on this machine are
//! dropped silently; so are duplicates.

use core::fmt;

use crate::{
  kind::ImplKind,
  registry::{self, ImplId, ImplSet, REGISTRY},
};

bitflags::bitflags! {
  /// Hints that change which implementations are preferred.
  ///
  /// Options never affect correctness. Unknown bits are reserved and ignored.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct Options: u32 {
    /// Consult an explicit id list in the caller's order instead of by kind.
    const PRIORITISE_ARG_IDS = 1 << 0;
  }
}

impl Options {
  /// No options.
  pub const NONE: Self = Self::empty();

  /// Options from a raw bitmask, dropping reserved bits.
  #[inline]
  #[must_use]
  pub const fn from_raw(raw: u32) -> Self {
    Self::from_bits_truncate(raw)
  }
}

/// Which implementations to consult.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selection<'a> {
  /// Every implementation enabled on this machine.
  #[default]
  All,
  /// Exactly these ids (after dropping disabled ones).
  Ids(&'a [ImplId]),
}

impl<'a> From<&'a [ImplId]> for Selection<'a> {
  #[inline]
  fn from(ids: &'a [ImplId]) -> Self {
    Self::Ids(ids)
  }
}

impl<'a, const N: usize> From<&'a [ImplId; N]> for Selection<'a> {
  #[inline]
  fn from(ids: &'a [ImplId; N]) -> Self {
    Self::Ids(ids)
  }
}

/// Maximum number of candidates (one per id bit).
pub const MAX_CANDIDATES: usize = u32::BITS as usize;

/// An ordered, duplicate-free list of candidate ids.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Candidates {
  ids: [ImplId; MAX_CANDIDATES],
  len: usize,
  seen: ImplSet,
}

impl Candidates {
  /// An empty list.
  #[must_use]
  pub const fn new() -> Self {
    Self {
      ids: [ImplId::NULL; MAX_CANDIDATES],
      len: 0,
      seen: ImplSet::empty(),
    }
  }

  /// Append `id` unless it is null or already present.
  pub fn push(&mut self, id: ImplId) {
    if id.is_null() || self.seen.contains(id.as_set()) {
      return;
    }
    if let Some(slot) = self.ids.get_mut(self.len) {
      *slot = id;
      self.len += 1;
      self.seen |= id.as_set();
    }
  }

  #[inline]
  #[must_use]
  pub fn as_slice(&self) -> &[ImplId] {
    self.ids.get(..self.len).unwrap_or(&[])
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = ImplId> + '_ {
    self.as_slice().iter().copied()
  }

  #[inline]
  #[must_use]
  pub const fn len(&self) -> usize {
    self.len
  }

  #[inline]
  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// The candidates as a set (order discarded).
  #[inline]
  #[must_use]
  pub const fn as_set(&self) -> ImplSet {
    self.seen
  }
}

impl Default for Candidates {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Candidates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.iter().map(ImplId::name)).finish()
  }
}

/// Resolve candidates against the implementations enabled on this machine.
#[must_use]
pub fn resolve(selection: Selection<'_>, options: Options) -> Candidates {
  resolve_with(selection, options, registry::available())
}

/// Resolve candidates against an explicit availability set.
#[must_use]
pub fn resolve_with(selection: Selection<'_>, options: Options, available: ImplSet) -> Candidates {
  let enabled = |id: ImplId| !id.is_null() && available.contains(id.as_set());
  let mut out = Candidates::new();

  match selection {
    Selection::Ids(ids) if options.contains(Options::PRIORITISE_ARG_IDS) => {
      ids.iter().copied().filter(|&id| enabled(id)).for_each(|id| out.push(id));
    }
    Selection::Ids(ids) => {
      for kind in ImplKind::BY_OVERHEAD {
        ids
          .iter()
          .copied()
          .filter(|&id| enabled(id) && registry::get_kind(id) == kind)
          .for_each(|id| out.push(id));
      }
    }
    Selection::All => {
      for kind in ImplKind::BY_OVERHEAD {
        REGISTRY
          .iter()
          .filter(|e| e.kind == kind && enabled(e.id))
          .for_each(|e| out.push(e.id));
      }
    }
  }

  tracing::trace!(?selection, ?options, candidates = ?out, "resolved candidates");
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  const EVERYTHING: ImplSet = ImplSet::ALL;

  #[test]
  fn all_orders_by_kind() {
    let c = resolve_with(Selection::All, Options::NONE, EVERYTHING);
    assert_eq!(c.as_slice(), &[ImplId::CX16, ImplId::TSX, ImplId::STD]);
  }

  #[test]
  fn explicit_ids_order_by_kind_without_option() {
    let ids = [ImplId::STD, ImplId::TSX];
    let c = resolve_with(Selection::from(&ids), Options::NONE, EVERYTHING);
    assert_eq!(c.as_slice(), &[ImplId::TSX, ImplId::STD]);
  }

  #[test]
  fn explicit_ids_keep_caller_order_with_option() {
    let ids = [ImplId::STD, ImplId::TSX, ImplId::CX16];
    let c = resolve_with(Selection::from(&ids), Options::PRIORITISE_ARG_IDS, EVERYTHING);
    assert_eq!(c.as_slice(), &ids);
  }

  #[test]
  fn option_is_ignored_for_all() {
    let a = resolve_with(Selection::All, Options::PRIORITISE_ARG_IDS, EVERYTHING);
    let b = resolve_with(Selection::All, Options::NONE, EVERYTHING);
    assert_eq!(a, b);
  }

  #[test]
  fn disabled_null_and_duplicate_ids_are_dropped() {
    let ids = [ImplId::NULL, ImplId::CX16, ImplId::STD, ImplId::STD];
    let c = resolve_with(Selection::from(&ids), Options::PRIORITISE_ARG_IDS, ImplSet::STD);
    assert_eq!(c.as_slice(), &[ImplId::STD]);
    assert_eq!(c.as_set(), ImplSet::STD);
  }

  #[test]
  fn unregistered_ids_are_dropped() {
    let stray = match ImplId::try_from(1u64 << 12) {
      Ok(id) => id,
      Err(e) => panic!("{e}"),
    };
    let c = resolve_with(Selection::from(&[stray]), Options::NONE, EVERYTHING);
    assert!(c.is_empty());
  }

  #[test]
  fn empty_list_resolves_to_nothing() {
    let c = resolve_with(Selection::Ids(&[]), Options::NONE, EVERYTHING);
    assert!(c.is_empty());
    assert_eq!(c.len(), 0);
  }

  #[test]
  fn reserved_option_bits_are_ignored() {
    assert_eq!(Options::from_raw(0xFFFF_FFFE), Options::NONE);
    assert_eq!(Options::from_raw(1), Options::PRIORITISE_ARG_IDS);
  }

  #[test]
  fn resolve_uses_machine_availability() {
    let c = resolve(Selection::All, Options::NONE);
    assert_eq!(c.as_set(), registry::available());
  }

  mod proptests {
    use std::vec::Vec;

    use proptest::prelude::*;

    use super::*;

    fn id_strategy() -> impl Strategy<Value = ImplId> {
      prop_oneof![
        Just(ImplId::NULL),
        Just(ImplId::STD),
        Just(ImplId::CX16),
        Just(ImplId::TSX),
        (3u32..32).prop_map(|b| ImplId::try_from(1u32 << b).unwrap_or_default()),
      ]
    }

    proptest! {
      #![proptest_config(ProptestConfig::with_cases(256))]

      #[test]
      fn resolved_is_subset_without_duplicates(
        ids in proptest::collection::vec(id_strategy(), 0..12),
        avail in 0u32..8,
        prioritise in any::<bool>(),
      ) {
        let available = ImplSet::from_bits_truncate(avail);
        let options = if prioritise { Options::PRIORITISE_ARG_IDS } else { Options::NONE };
        let c = resolve_with(Selection::Ids(&ids), options, available);

        let mut seen = ImplSet::empty();
        for id in c.iter() {
          prop_assert!(!id.is_null());
          prop_assert!(available.contains(id.as_set()));
          prop_assert!(ids.contains(&id));
          prop_assert!(!seen.contains(id.as_set()));
          seen |= id.as_set();
        }
        let expected = ids.iter().fold(ImplSet::empty(), |acc, id| acc | id.as_set()) & available;
        prop_assert_eq!(seen, expected);
      }

      #[test]
      fn default_order_is_by_overhead(ids in proptest::collection::vec(id_strategy(), 0..12)) {
        let c = resolve_with(Selection::Ids(&ids), Options::NONE, ImplSet::ALL);
        let ranks: Vec<u8> = c.iter().map(|id| registry::get_kind(id).overhead_rank()).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
      }
    }
  }
}
