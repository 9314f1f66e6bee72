//! Feature checks over composed operation tables.
//!
//! A composed table is sparse. These queries tell a caller which categories,
//! or which individual operations within a category, it can rely on before
//! calling anything.
//!
//! ```ignore
//! let ops = atomics::create(8, MemoryOrder::SeqCst, Options::NONE, Selection::All).ops;
//! let missing = OpCategory::IMPLICIT - feature_check_any(&ops, OpCategory::IMPLICIT);
//! ```

bitflags::bitflags! {
  /// Operation categories.
  ///
  /// Void and fetch variants of the binary and arithmetic operations are
  /// separate categories; [`BIN`](Self::BIN) and [`ARI`](Self::ARI) cover
  /// both.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct OpCategory: u32 {
    /// Store and load.
    const LDST = 1 << 0;
    /// Exchange and compare-exchange.
    const XCHG = 1 << 1;
    /// Single-bit test and modify.
    const BIT = 1 << 2;
    /// Bitwise operations without a result.
    const BIN_V = 1 << 3;
    /// Bitwise operations returning the old value.
    const BIN_F = 1 << 4;
    /// Arithmetic without a result.
    const ARI_V = 1 << 5;
    /// Arithmetic returning the old value.
    const ARI_F = 1 << 6;
    /// Multi-object and user-defined transactions.
    const TSPEC = 1 << 7;
    /// Transaction flag operations.
    const TFLAG = 1 << 8;
    /// Raw transaction primitives.
    const TRAW = 1 << 9;

    const BIN = Self::BIN_V.bits() | Self::BIN_F.bits();
    const ARI = Self::ARI_V.bits() | Self::ARI_F.bits();
    /// Every category of the implicit domain.
    const IMPLICIT = Self::LDST.bits() | Self::XCHG.bits() | Self::BIT.bits() | Self::BIN.bits() | Self::ARI.bits();
    /// Every category of the explicit domain.
    const EXPLICIT = Self::IMPLICIT.bits();
    /// Every category of the transactional domain.
    const TRANSACTION = Self::IMPLICIT.bits() | Self::TSPEC.bits() | Self::TFLAG.bits() | Self::TRAW.bits();
  }
}

impl OpCategory {
  /// Every single-bit category, in bit order.
  pub const SINGLES: [Self; 10] = [
    Self::LDST,
    Self::XCHG,
    Self::BIT,
    Self::BIN_V,
    Self::BIN_F,
    Self::ARI_V,
    Self::ARI_F,
    Self::TSPEC,
    Self::TFLAG,
    Self::TRAW,
  ];

  /// Single-bit categories contained in `self`.
  pub fn singles(self) -> impl Iterator<Item = Self> {
    Self::SINGLES.into_iter().filter(move |&c| self.contains(c))
  }
}

bitflags::bitflags! {
  /// Operation kinds within a category.
  ///
  /// A kind names an operation independent of its category, so `OR` is both
  /// `or` (in [`OpCategory::BIN_V`]) and `fetch_or` (in [`OpCategory::BIN_F`]).
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct OpKind: u32 {
    const LOAD = 1 << 0;
    const STORE = 1 << 1;
    const EXCHANGE = 1 << 2;
    const CMPXCHG_WEAK = 1 << 3;
    const CMPXCHG_STRONG = 1 << 4;
    const TEST = 1 << 5;
    const TEST_COMPL = 1 << 6;
    const TEST_SET = 1 << 7;
    const TEST_RESET = 1 << 8;
    const OR = 1 << 9;
    const XOR = 1 << 10;
    const AND = 1 << 11;
    const NOT = 1 << 12;
    const ADD = 1 << 13;
    const SUB = 1 << 14;
    const INC = 1 << 15;
    const DEC = 1 << 16;
    const NEG = 1 << 17;
    const DOUBLE_CMPXCHG = 1 << 18;
    const MULTI_CMPXCHG = 1 << 19;
    const GENERIC = 1 << 20;
    const GENERIC_WFB = 1 << 21;
    const CLEAR = 1 << 22;
    const TBEGIN = 1 << 23;
    const TABORT_ALL = 1 << 24;
    const TABORT_SINGLE = 1 << 25;
    const TCOMMIT = 1 << 26;
    const TTEST = 1 << 27;
    const TDEPTH = 1 << 28;
  }
}

/// A table that can report which of its slots are populated.
pub trait FeatureCheck {
  /// Kinds the table's type has slots for in any category of `cats`.
  fn defined_kinds(cats: OpCategory) -> OpKind;

  /// Kinds with a non-null slot in any category of `cats`.
  fn supported_kinds(&self, cats: OpCategory) -> OpKind;
}

/// Categories of `opcats` with at least one non-null slot.
///
/// The result holds single-bit categories only: asking for
/// [`OpCategory::BIN`] reports `BIN_V` and `BIN_F` separately.
#[must_use]
pub fn feature_check_any<T: FeatureCheck>(ops: &T, opcats: OpCategory) -> OpCategory {
  opcats
    .singles()
    .filter(|&cat| !ops.supported_kinds(cat).is_empty())
    .fold(OpCategory::empty(), |acc, cat| acc | cat)
}

/// Categories of `opcats` whose every slot is non-null.
///
/// Categories the table's type has no slots for are never reported.
#[must_use]
pub fn feature_check_all<T: FeatureCheck>(ops: &T, opcats: OpCategory) -> OpCategory {
  opcats
    .singles()
    .filter(|&cat| {
      let defined = T::defined_kinds(cat);
      !defined.is_empty() && ops.supported_kinds(cat) == defined
    })
    .fold(OpCategory::empty(), |acc, cat| acc | cat)
}

/// Kinds of `opkinds` with a non-null slot in the single category `opcat`.
///
/// Kinds that `opcat` has no slot for are never reported.
///
/// # Panics
///
/// Debug builds assert that `opcat` has exactly one bit set.
#[must_use]
pub fn feature_check_leaf<T: FeatureCheck>(ops: &T, opcat: OpCategory, opkinds: OpKind) -> OpKind {
  debug_assert_eq!(opcat.bits().count_ones(), 1, "feature_check_leaf: {opcat:?} is not a single category");
  ops.supported_kinds(opcat) & opkinds
}

/// [`feature_check_leaf`] for the transactional domain, typically on
/// [`OpCategory::TRAW`] where callers need specific primitives.
#[must_use]
pub fn feature_check_leaf_transaction(
  ops: &crate::ops::OpsTransaction,
  opcat: OpCategory,
  opkinds: OpKind,
) -> OpKind {
  feature_check_leaf(ops, opcat, opkinds)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    ops::{OpsExplicit, OpsImplicit, OpsTransaction},
    order::MemoryOrder,
  };

  unsafe fn store(_: *mut u8, _: *const u8) {}
  unsafe fn fetch_or(_: *mut u8, _: *const u8, _: *mut u8) {}
  unsafe fn xstore(_: *mut u8, _: *const u8, _: MemoryOrder) {}
  unsafe fn xload(_: *const u8, _: *mut u8, _: MemoryOrder) {}
  unsafe fn tbegin() -> crate::transaction::TransactionStatus {
    crate::transaction::TransactionStatus::SUCCESS
  }
  unsafe fn tcommit() {}
  fn ttest() -> bool {
    false
  }

  #[test]
  fn composites_cover_singles() {
    assert_eq!(OpCategory::SINGLES.iter().fold(OpCategory::empty(), |a, &c| a | c), OpCategory::TRANSACTION);
    assert_eq!(OpCategory::BIN.singles().count(), 2);
    assert_eq!(OpCategory::IMPLICIT.singles().count(), 7);
    assert_eq!(OpCategory::EXPLICIT, OpCategory::IMPLICIT);
  }

  #[test]
  fn empty_table_reports_nothing() {
    assert_eq!(feature_check_any(&OpsImplicit::EMPTY, OpCategory::all()), OpCategory::empty());
    assert_eq!(feature_check_all(&OpsImplicit::EMPTY, OpCategory::all()), OpCategory::empty());
    assert_eq!(
      feature_check_leaf_transaction(&OpsTransaction::EMPTY, OpCategory::TRAW, OpKind::all()),
      OpKind::empty()
    );
  }

  #[test]
  fn any_reports_partially_populated_categories() {
    let mut ops = OpsImplicit::EMPTY;
    ops.store = Some(store);
    ops.binary_ops.fetch_or = Some(fetch_or);

    let got = feature_check_any(&ops, OpCategory::IMPLICIT);
    assert_eq!(got, OpCategory::LDST | OpCategory::BIN_F);
    // Only requested bits are reported.
    assert_eq!(feature_check_any(&ops, OpCategory::BIN), OpCategory::BIN_F);
    assert_eq!(feature_check_any(&ops, OpCategory::XCHG), OpCategory::empty());
  }

  #[test]
  fn all_needs_every_slot() {
    let mut ops = OpsExplicit::EMPTY;
    ops.store = Some(xstore);
    assert_eq!(feature_check_all(&ops, OpCategory::LDST), OpCategory::empty());
    ops.load = Some(xload);
    assert_eq!(feature_check_all(&ops, OpCategory::LDST), OpCategory::LDST);
    // No transactional slots exist in this domain.
    assert_eq!(feature_check_all(&ops, OpCategory::TRAW), OpCategory::empty());
  }

  #[test]
  fn leaf_reports_requested_raw_primitives() {
    let mut ops = OpsTransaction::EMPTY;
    ops.raw_ops.tbegin = Some(tbegin);
    ops.raw_ops.tcommit = Some(tcommit);
    ops.raw_ops.ttest = Some(ttest);

    let want = OpKind::TBEGIN | OpKind::TCOMMIT;
    assert_eq!(feature_check_leaf_transaction(&ops, OpCategory::TRAW, want), want);
    assert_eq!(
      feature_check_leaf_transaction(&ops, OpCategory::TRAW, OpKind::TDEPTH | OpKind::TTEST),
      OpKind::TTEST
    );
    // Kinds outside the category are never reported.
    assert_eq!(feature_check_leaf_transaction(&ops, OpCategory::TRAW, OpKind::ADD), OpKind::empty());
  }

  #[test]
  fn leaf_distinguishes_categories_sharing_kinds() {
    let mut ops = OpsTransaction::EMPTY;
    ops.flag_ops.test = Some(crate::transaction::TransactionFlag::is_set);
    assert_eq!(feature_check_leaf(&ops, OpCategory::TFLAG, OpKind::TEST), OpKind::TEST);
    assert_eq!(feature_check_leaf(&ops, OpCategory::BIT, OpKind::TEST), OpKind::empty());
  }
}
