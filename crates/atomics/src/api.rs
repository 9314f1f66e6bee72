//! Construction API.
//!
//! Each function resolves the candidate list, asks every candidate's adapter
//! for its table and folds the tables with [`merge_all`]. Nothing is cached:
//! the registry is immutable after detection, so repeated calls with the
//! same arguments return the same table.
//!
//! ```
//! use atomics::{MemoryOrder, Options, Selection, create};
//!
//! let a = create(4, MemoryOrder::SeqCst, Options::NONE, Selection::All);
//! if let Some(store) = a.ops.store {
//!   let obj = core::sync::atomic::AtomicU32::new(0);
//!   let v = 7u32;
//!   assert!(a.align.meets_minimum(obj.as_ptr().cast(), 4));
//!   // SAFETY: `obj` is 4 bytes, aligned, and only accessed atomically.
//!   unsafe { store(obj.as_ptr().cast(), (&raw const v).cast()) };
//!   assert_eq!(obj.into_inner(), 7);
//! }
//! ```

use backend::{Options, Selection};

use crate::{
  impls::adapter,
  merge::{Atomic, AtomicExplicit, AtomicTransaction, merge_all},
  order::MemoryOrder,
};

/// Compose the implicit-order table for objects of `width` bytes.
///
/// Slots an order cannot express (a `Release` load, an `Acquire` store)
/// stay null. An empty selection yields an all-null table with
/// [`Alignment::PERMISSIVE`](crate::align::Alignment::PERMISSIVE).
#[must_use]
pub fn create(width: usize, order: MemoryOrder, options: Options, selection: Selection<'_>) -> Atomic {
  let candidates = backend::resolve(selection, options);
  let atomic: Atomic = merge_all(candidates.iter().filter_map(adapter).map(|a| (a.implicit)(width, order)));
  tracing::debug!(
    width,
    order = order.name(),
    candidates = candidates.len(),
    align = ?atomic.align,
    "composed implicit atomic"
  );
  atomic
}

/// Compose the explicit-order table for objects of `width` bytes.
#[must_use]
pub fn create_explicit(width: usize, options: Options, selection: Selection<'_>) -> AtomicExplicit {
  let candidates = backend::resolve(selection, options);
  let atomic: AtomicExplicit = merge_all(candidates.iter().filter_map(adapter).map(|a| (a.explicit)(width)));
  tracing::debug!(
    width,
    candidates = candidates.len(),
    align = ?atomic.align,
    "composed explicit atomic"
  );
  atomic
}

/// Compose the transactional table. Widths are chosen per call through
/// [`TransactionConfig`](crate::transaction::TransactionConfig).
#[must_use]
pub fn create_transaction(options: Options, selection: Selection<'_>) -> AtomicTransaction {
  let candidates = backend::resolve(selection, options);
  let atomic: AtomicTransaction = merge_all(candidates.iter().filter_map(adapter).map(|a| (a.transaction)()));
  tracing::debug!(
    candidates = candidates.len(),
    align = ?atomic.align,
    recommended = ?atomic.recommended,
    magic_size = atomic.sstring.magic_size,
    "composed transactional atomic"
  );
  atomic
}

#[cfg(test)]
mod tests {
  use backend::ImplId;

  use super::*;
  use crate::{align::Alignment, merge::Merge};

  #[test]
  fn empty_selection_is_null_and_permissive() {
    let a = create(8, MemoryOrder::SeqCst, Options::NONE, Selection::Ids(&[]));
    assert!(a.ops.is_empty());
    assert_eq!(a.align, Alignment::new(1, 1, 0));

    let x = create_explicit(8, Options::NONE, Selection::Ids(&[]));
    assert!(x.ops.is_empty());

    let t = create_transaction(Options::NONE, Selection::Ids(&[]));
    assert!(t.ops.is_empty());
    assert_eq!(t.sstring.magic_size, 0);
  }

  #[test]
  fn null_ids_contribute_nothing() {
    let a = create(4, MemoryOrder::SeqCst, Options::PRIORITISE_ARG_IDS, Selection::Ids(&[ImplId::NULL]));
    assert!(a.ops.is_empty());
  }

  #[cfg(target_has_atomic = "32")]
  #[test]
  fn builtin_width_four() {
    let a = create(4, MemoryOrder::SeqCst, Options::NONE, Selection::Ids(&[ImplId::STD]));
    assert!(a.ops.store.is_some() && a.ops.load.is_some());
    assert_eq!(a.align, Alignment::natural(4));

    let acq = create(4, MemoryOrder::Acquire, Options::NONE, Selection::Ids(&[ImplId::STD]));
    assert!(acq.ops.store.is_none());
    assert!(acq.ops.load.is_some());
  }

  #[test]
  fn construction_is_idempotent() {
    let a = create(8, MemoryOrder::AcqRel, Options::NONE, Selection::All);
    let b = create(8, MemoryOrder::AcqRel, Options::NONE, Selection::All);
    assert_eq!(a.align, b.align);
    assert_eq!(a.ops.is_empty(), b.ops.is_empty());
    assert_eq!(a.ops.load.map(|f| f as usize), b.ops.load.map(|f| f as usize));
  }

  #[test]
  fn all_matches_merge_of_singles() {
    let all = create_explicit(8, Options::NONE, Selection::All);
    let mut by_hand = AtomicExplicit::empty();
    for id in backend::resolve(Selection::All, Options::NONE).iter() {
      by_hand = by_hand.merge(create_explicit(8, Options::PRIORITISE_ARG_IDS, Selection::Ids(&[id])));
    }
    assert_eq!(all.align, by_hand.align);
    assert_eq!(all.ops.store.map(|f| f as usize), by_hand.ops.store.map(|f| f as usize));
  }
}
