//! Priority merge of per-implementation results.
//!
//! Candidates are folded highest priority first. For every operation slot
//! the first non-null pointer wins. Every consulted candidate constrains the
//! result's alignment, whether or not it donated a slot:
//!
//! | Field | Rule |
//! |-------|------|
//! | operation slots | first non-null |
//! | [`Alignment`] | stricter by [`Alignment::compare`] |
//! | [`RecommendedRetryConfig`] | elementwise maximum |
//! | [`SafeStringInfo`] | smallest `magic_size` among candidates with any raw slot, 0 if none |
//!
//! Merging nothing yields every slot null and [`Alignment::PERMISSIVE`].

use crate::{
  align::Alignment,
  ops::{OpsExplicit, OpsImplicit, OpsTransaction},
  transaction::{RecommendedRetryConfig, SafeStringInfo},
};

/// A value that can be combined with a lower-priority value of its type.
pub trait Merge: Sized {
  /// The identity: merging it in either position changes nothing.
  fn empty() -> Self;

  /// Combine with `lower`, preferring `self`.
  #[must_use]
  fn merge(self, lower: Self) -> Self;
}

/// Fold `items`, highest priority first.
pub fn merge_all<T: Merge>(items: impl IntoIterator<Item = T>) -> T {
  items.into_iter().fold(T::empty(), T::merge)
}

impl Merge for Alignment {
  #[inline]
  fn empty() -> Self {
    Self::PERMISSIVE
  }

  #[inline]
  fn merge(self, lower: Self) -> Self {
    self.stricter(lower)
  }
}

impl Merge for RecommendedRetryConfig {
  #[inline]
  fn empty() -> Self {
    Self::default()
  }

  #[inline]
  fn merge(self, lower: Self) -> Self {
    self.max(lower)
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composed Results
// ─────────────────────────────────────────────────────────────────────────────

/// Implicit-domain table and the alignment its objects need.
#[derive(Clone, Copy, Debug)]
pub struct Atomic {
  pub ops: OpsImplicit,
  pub align: Alignment,
}

/// Explicit-domain table and the alignment its objects need.
#[derive(Clone, Copy, Debug)]
pub struct AtomicExplicit {
  pub ops: OpsExplicit,
  pub align: Alignment,
}

/// Transactional table with its alignment and tuning hints.
#[derive(Clone, Copy, Debug)]
pub struct AtomicTransaction {
  pub ops: OpsTransaction,
  pub align: Alignment,
  pub recommended: RecommendedRetryConfig,
  pub sstring: SafeStringInfo,
}

impl Default for Atomic {
  /// Same as [`Merge::empty`]: every slot null, permissive alignment.
  fn default() -> Self {
    Self::empty()
  }
}

impl Merge for Atomic {
  #[inline]
  fn empty() -> Self {
    Self {
      ops: OpsImplicit::EMPTY,
      align: Alignment::PERMISSIVE,
    }
  }

  #[inline]
  fn merge(self, lower: Self) -> Self {
    Self {
      ops: self.ops.merge(lower.ops),
      align: self.align.merge(lower.align),
    }
  }
}

impl Default for AtomicExplicit {
  /// Same as [`Merge::empty`]: every slot null, permissive alignment.
  fn default() -> Self {
    Self::empty()
  }
}

impl Merge for AtomicExplicit {
  #[inline]
  fn empty() -> Self {
    Self {
      ops: OpsExplicit::EMPTY,
      align: Alignment::PERMISSIVE,
    }
  }

  #[inline]
  fn merge(self, lower: Self) -> Self {
    Self {
      ops: self.ops.merge(lower.ops),
      align: self.align.merge(lower.align),
    }
  }
}

impl Default for AtomicTransaction {
  /// Same as [`Merge::empty`]: every slot null, permissive alignment.
  fn default() -> Self {
    Self::empty()
  }
}

impl Merge for AtomicTransaction {
  fn empty() -> Self {
    Self {
      ops: OpsTransaction::EMPTY,
      align: Alignment::PERMISSIVE,
      recommended: RecommendedRetryConfig::default(),
      sstring: SafeStringInfo::default(),
    }
  }

  fn merge(self, lower: Self) -> Self {
    let magic_size = match (self.ops.raw_ops.is_empty(), lower.ops.raw_ops.is_empty()) {
      (true, true) => 0,
      (false, true) => self.sstring.magic_size,
      (true, false) => lower.sstring.magic_size,
      (false, false) => self.sstring.magic_size.min(lower.sstring.magic_size),
    };
    Self {
      ops: self.ops.merge(lower.ops),
      align: self.align.merge(lower.align),
      recommended: self.recommended.merge(lower.recommended),
      sstring: SafeStringInfo { magic_size },
    }
  }
}

#[cfg(test)]
mod tests {
  use backend::{ImplId, ImplSet, Options, Selection};
  use proptest::prelude::*;

  use super::*;
  use crate::transaction::TransactionStatus;

  unsafe fn store(_: *mut u8, _: *const u8) {}
  unsafe fn load(_: *const u8, _: *mut u8) {}
  unsafe fn add(_: *mut u8, _: *const u8) {}
  unsafe fn other_add(_: *mut u8, _: *const u8) {}
  unsafe fn tbegin() -> TransactionStatus {
    TransactionStatus::SUCCESS
  }

  fn store_only(align: Alignment) -> Atomic {
    let mut a = Atomic::empty();
    a.ops.store = Some(store);
    a.align = align;
    a
  }

  fn load_only(align: Alignment) -> Atomic {
    let mut a = Atomic::empty();
    a.ops.load = Some(load);
    a.align = align;
    a
  }

  #[test]
  fn store_only_and_load_only_yield_exactly_both() {
    let merged = merge_all([store_only(Alignment::natural(4)), load_only(Alignment::natural(4))]);
    assert!(merged.ops.store.is_some());
    assert!(merged.ops.load.is_some());

    let mut rest = merged.ops;
    rest.store = None;
    rest.load = None;
    assert!(rest.is_empty());
  }

  #[test]
  fn nothing_merges_to_permissive_and_null() {
    let a: Atomic = merge_all([]);
    assert!(a.ops.is_empty());
    assert_eq!(a.align, Alignment::new(1, 1, 0));

    let x: AtomicExplicit = merge_all([]);
    assert!(x.ops.is_empty());
    assert_eq!(x.align, Alignment::PERMISSIVE);

    let t: AtomicTransaction = merge_all([]);
    assert!(t.ops.is_empty());
    assert_eq!(t.align, Alignment::PERMISSIVE);
    assert_eq!(t.recommended, RecommendedRetryConfig::default());
    assert_eq!(t.sstring.magic_size, 0);
  }

  #[test]
  fn first_non_null_slot_wins() {
    let mut high = Atomic::empty();
    high.ops.arithmetic_ops.add = Some(add);
    let mut low = Atomic::empty();
    low.ops.arithmetic_ops.add = Some(other_add);
    low.ops.store = Some(store);

    let merged = merge_all([high, low]);
    let winner = merged.ops.arithmetic_ops.add.map(|f| f as usize);
    assert_eq!(winner, Some(add as usize));
    assert!(merged.ops.store.is_some());
  }

  #[test]
  fn default_is_empty_and_permissive() {
    let a = Atomic::default();
    assert!(a.ops.is_empty());
    assert_eq!(a.align, Alignment::PERMISSIVE);

    assert!(AtomicExplicit::default().ops.is_empty());

    let t = AtomicTransaction::default();
    assert!(t.ops.is_empty());
    assert_eq!(t.align, Alignment::PERMISSIVE);
    assert_eq!(t.sstring.magic_size, 0);
  }

  /// Writes a marker so the winning slot is observable by calling it.
  unsafe fn store_from_std(obj: *mut u8, _: *const u8) {
    // SAFETY: callers pass a valid, writable byte.
    unsafe { obj.write(1) };
  }

  unsafe fn store_from_cx16(obj: *mut u8, _: *const u8) {
    // SAFETY: callers pass a valid, writable byte.
    unsafe { obj.write(2) };
  }

  fn stub_table(id: ImplId) -> Atomic {
    let mut a = Atomic::empty();
    let store: unsafe fn(*mut u8, *const u8) = if id == ImplId::STD { store_from_std } else { store_from_cx16 };
    a.ops.store = Some(store);
    a
  }

  fn winning_store(ids: &[ImplId], options: Options) -> u8 {
    let candidates = backend::resolve_with(Selection::Ids(ids), options, ImplSet::ALL);
    let merged = merge_all(candidates.iter().map(stub_table));
    let mut obj = 0u8;
    if let Some(store) = merged.ops.store {
      // SAFETY: `obj` is a live local byte.
      unsafe { store(&raw mut obj, (&raw const obj).cast()) };
    }
    obj
  }

  #[test]
  fn argument_priority_flips_the_winning_slot() {
    let forward = [ImplId::STD, ImplId::CX16];
    let reverse = [ImplId::CX16, ImplId::STD];

    assert_eq!(winning_store(&forward, Options::PRIORITISE_ARG_IDS), 1);
    assert_eq!(winning_store(&reverse, Options::PRIORITISE_ARG_IDS), 2);

    // Without the option both orders resolve by kind: assembly before builtins.
    assert_eq!(winning_store(&forward, Options::NONE), 2);
    assert_eq!(winning_store(&reverse, Options::NONE), 2);
  }

  #[test]
  fn slotless_candidate_still_constrains_alignment() {
    let mut strict = Atomic::empty();
    strict.align = Alignment::natural(16);
    let merged = merge_all([store_only(Alignment::natural(4)), strict]);
    assert_eq!(merged.align, Alignment::natural(16));
  }

  #[test]
  fn alignment_merges_by_comparator_not_fieldwise() {
    let merged = merge_all([store_only(Alignment::new(8, 8, 64)), load_only(Alignment::new(8, 8, 0))]);
    // {8,8,64} is stricter than {8,8,0}; a fieldwise max would also give 64,
    // so check a case where it would not.
    assert_eq!(merged.align, Alignment::new(8, 8, 64));

    let merged = merge_all([store_only(Alignment::new(16, 1, 0)), load_only(Alignment::new(8, 8, 64))]);
    assert_eq!(merged.align, Alignment::new(16, 1, 0));
  }

  fn tx(raw: bool, magic_size: usize, min_rmw: usize, min_load: usize) -> AtomicTransaction {
    let mut t = AtomicTransaction::empty();
    if raw {
      t.ops.raw_ops.tbegin = Some(tbegin);
    }
    t.sstring.magic_size = magic_size;
    t.recommended = RecommendedRetryConfig { min_rmw, min_load };
    t
  }

  #[test]
  fn transaction_hints_merge() {
    let merged = merge_all([tx(true, 4096, 20, 2), tx(false, 16, 4, 10), tx(true, 1024, 1, 1)]);
    // Candidate without raw slots does not shrink the safe size.
    assert_eq!(merged.sstring.magic_size, 1024);
    assert_eq!(merged.recommended, RecommendedRetryConfig { min_rmw: 20, min_load: 10 });
    assert!(merged.ops.raw_ops.tbegin.is_some());
  }

  #[test]
  fn safe_string_is_zero_without_raw_slots() {
    let merged = merge_all([tx(false, 4096, 0, 0), tx(false, 64, 0, 0)]);
    assert_eq!(merged.sstring.magic_size, 0);
  }

  fn arb_alignment() -> impl Strategy<Value = Alignment> {
    (0u32..6, 0u32..6, prop_oneof![Just(0usize), 1usize..128])
      .prop_map(|(r, m, s)| Alignment::new(1 << r.max(m), 1 << r.min(m), s))
  }

  fn arb_tx() -> impl Strategy<Value = AtomicTransaction> {
    (any::<bool>(), 0usize..8192, 0usize..64, 0usize..64, arb_alignment()).prop_map(|(raw, magic, rmw, ld, align)| {
      let mut t = tx(raw, magic, rmw, ld);
      t.align = align;
      t
    })
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn merged_alignment_dominates_inputs(aligns in proptest::collection::vec(arb_alignment(), 0..6)) {
      let merged = merge_all(aligns.iter().copied());
      for a in &aligns {
        prop_assert!(merged >= *a);
      }
      prop_assert!(aligns.is_empty() || aligns.contains(&merged));
    }

    #[test]
    fn transaction_merge_laws(items in proptest::collection::vec(arb_tx(), 0..6)) {
      let merged = merge_all(items.iter().copied());

      let with_raw: std::vec::Vec<usize> =
        items.iter().filter(|t| !t.ops.raw_ops.is_empty()).map(|t| t.sstring.magic_size).collect();
      prop_assert_eq!(merged.sstring.magic_size, with_raw.iter().copied().min().unwrap_or(0));

      let rmw = items.iter().map(|t| t.recommended.min_rmw).max().unwrap_or(0);
      let ld = items.iter().map(|t| t.recommended.min_load).max().unwrap_or(0);
      prop_assert_eq!(merged.recommended, RecommendedRetryConfig { min_rmw: rmw, min_load: ld });
    }

    #[test]
    fn empty_is_identity(a in arb_alignment()) {
      let one = store_only(a);
      let left = Atomic::empty().merge(one);
      let right = one.merge(Atomic::empty());
      prop_assert_eq!(left.align, a);
      prop_assert_eq!(right.align, a);
      prop_assert!(left.ops.store.is_some() && right.ops.store.is_some());
    }
  }
}
