//! Operation tables.
//!
//! A table is a record of optional function pointers grouped by category.
//! A `None` slot means no consulted implementation supports that operation
//! for the requested width and order. Callers must check before calling.
//!
//! Three domains share the category layout:
//!
//! | Domain | Order | Extra categories |
//! |--------|-------|------------------|
//! | [`OpsImplicit`] | fixed when the table is built | none |
//! | [`OpsExplicit`] | passed on every call | none |
//! | [`OpsTransaction`] | none (hardware transaction) | special, flag, raw |
//!
//! # Calling Convention
//!
//! Operations take untyped pointers to objects of the table's width.
//! Arguments (`desired`, `arg`) are read from, and results (`ret`) written
//! to, buffers of the same width. Argument and result buffers have no
//! alignment requirement; the object itself must satisfy the alignment
//! returned alongside the table.
//!
//! Every operation is `unsafe`: the caller guarantees that all pointers are
//! valid for the table's width, that the object meets the returned alignment,
//! and that bit offsets are below `8 * width`.

use core::fmt::Debug;

use crate::{
  feature::{FeatureCheck, OpCategory, OpKind},
  merge::Merge,
  order::MemoryOrder,
  transaction::{CmpxchgDesc, TransactionConfig, TransactionFlag, TransactionResult, TransactionStatus},
};

// ─────────────────────────────────────────────────────────────────────────────
// Signature Families
// ─────────────────────────────────────────────────────────────────────────────

mod sealed {
  pub trait Sealed {}
}

/// Function-pointer signatures of one domain.
pub trait Signatures: sealed::Sealed + Copy + Debug + Default {
  /// `(obj, desired)`
  type Store: Copy + Debug;
  /// `(obj, ret)`
  type Load: Copy + Debug;
  /// `(obj, desired, ret)`
  type Exchange: Copy + Debug;
  /// `(obj, expected, desired)`; on failure `expected` receives the current value.
  type Cmpxchg: Copy + Debug;
  /// `(obj, offset)`
  type Test: Copy + Debug;
  /// `(obj, offset)`, returning the bit's old value.
  type TestModify: Copy + Debug;
  /// `(obj)`
  type Unary: Copy + Debug;
  /// `(obj, arg)`
  type Binary: Copy + Debug;
  /// `(obj, ret)`, writing the old value.
  type FetchUnary: Copy + Debug;
  /// `(obj, arg, ret)`, writing the old value.
  type FetchBinary: Copy + Debug;
}

/// Memory order fixed at construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct Implicit;

/// Memory order passed per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Explicit;

/// Executed inside a hardware transaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transaction;

impl sealed::Sealed for Implicit {}
impl sealed::Sealed for Explicit {}
impl sealed::Sealed for Transaction {}

impl Signatures for Implicit {
  type Store = unsafe fn(*mut u8, *const u8);
  type Load = unsafe fn(*const u8, *mut u8);
  type Exchange = unsafe fn(*mut u8, *const u8, *mut u8);
  type Cmpxchg = unsafe fn(*mut u8, *mut u8, *const u8) -> bool;
  type Test = unsafe fn(*const u8, usize) -> bool;
  type TestModify = unsafe fn(*mut u8, usize) -> bool;
  type Unary = unsafe fn(*mut u8);
  type Binary = unsafe fn(*mut u8, *const u8);
  type FetchUnary = unsafe fn(*mut u8, *mut u8);
  type FetchBinary = unsafe fn(*mut u8, *const u8, *mut u8);
}

/// Same as [`Implicit`] with trailing order arguments. Compare-exchange takes
/// a success and a failure order; the pair must satisfy
/// [`MemoryOrder::is_valid_fail`].
impl Signatures for Explicit {
  type Store = unsafe fn(*mut u8, *const u8, MemoryOrder);
  type Load = unsafe fn(*const u8, *mut u8, MemoryOrder);
  type Exchange = unsafe fn(*mut u8, *const u8, *mut u8, MemoryOrder);
  type Cmpxchg = unsafe fn(*mut u8, *mut u8, *const u8, MemoryOrder, MemoryOrder) -> bool;
  type Test = unsafe fn(*const u8, usize, MemoryOrder) -> bool;
  type TestModify = unsafe fn(*mut u8, usize, MemoryOrder) -> bool;
  type Unary = unsafe fn(*mut u8, MemoryOrder);
  type Binary = unsafe fn(*mut u8, *const u8, MemoryOrder);
  type FetchUnary = unsafe fn(*mut u8, *mut u8, MemoryOrder);
  type FetchBinary = unsafe fn(*mut u8, *const u8, *mut u8, MemoryOrder);
}

/// Same as [`Implicit`] with a trailing [`TransactionConfig`] (which carries
/// the width). Operations report a [`TransactionResult`]; those with a
/// boolean answer return it alongside, meaningful only on success.
impl Signatures for Transaction {
  type Store = unsafe fn(*mut u8, *const u8, TransactionConfig) -> TransactionResult;
  type Load = unsafe fn(*const u8, *mut u8, TransactionConfig) -> TransactionResult;
  type Exchange = unsafe fn(*mut u8, *const u8, *mut u8, TransactionConfig) -> TransactionResult;
  type Cmpxchg = unsafe fn(*mut u8, *mut u8, *const u8, TransactionConfig) -> (bool, TransactionResult);
  type Test = unsafe fn(*const u8, usize, TransactionConfig) -> (bool, TransactionResult);
  type TestModify = unsafe fn(*mut u8, usize, TransactionConfig) -> (bool, TransactionResult);
  type Unary = unsafe fn(*mut u8, TransactionConfig) -> TransactionResult;
  type Binary = unsafe fn(*mut u8, *const u8, TransactionConfig) -> TransactionResult;
  type FetchUnary = unsafe fn(*mut u8, *mut u8, TransactionConfig) -> TransactionResult;
  type FetchBinary = unsafe fn(*mut u8, *const u8, *mut u8, TransactionConfig) -> TransactionResult;
}

// ─────────────────────────────────────────────────────────────────────────────
// Category Records
// ─────────────────────────────────────────────────────────────────────────────

/// Declares a category record. Each field is tagged with the category bit
/// and operation kind it reports to feature checks.
macro_rules! op_category {
  (
    $(#[$meta:meta])*
    $name:ident $(<$S:ident>)? {
      $( $(#[$fmeta:meta])* $field:ident: [$ty:ty] => $cat:ident $kind:ident, )*
    }
  ) => {
    $(#[$meta])*
    #[derive(Clone, Copy, Debug)]
    pub struct $name $(<$S: Signatures>)? {
      $( $(#[$fmeta])* pub $field: Option<$ty>, )*
    }

    impl $(<$S: Signatures>)? $name $(<$S>)? {
      /// Every slot null.
      pub const EMPTY: Self = Self { $( $field: None, )* };

      /// Whether every slot is null.
      #[must_use]
      pub fn is_empty(&self) -> bool {
        true $( && self.$field.is_none() )*
      }

      /// Kinds this record has a slot for in any category of `cats`.
      pub(crate) fn defined_kinds(cats: OpCategory) -> OpKind {
        let mut kinds = OpKind::empty();
        $( if cats.contains(OpCategory::$cat) { kinds |= OpKind::$kind; } )*
        kinds
      }

      /// Kinds with a non-null slot in any category of `cats`.
      pub(crate) fn supported_kinds(&self, cats: OpCategory) -> OpKind {
        let mut kinds = OpKind::empty();
        $( if cats.contains(OpCategory::$cat) && self.$field.is_some() { kinds |= OpKind::$kind; } )*
        kinds
      }
    }

    impl $(<$S: Signatures>)? Default for $name $(<$S>)? {
      #[inline]
      fn default() -> Self {
        Self::EMPTY
      }
    }

    impl $(<$S: Signatures>)? Merge for $name $(<$S>)? {
      #[inline]
      fn empty() -> Self {
        Self::EMPTY
      }

      #[inline]
      fn merge(self, lower: Self) -> Self {
        Self { $( $field: self.$field.or(lower.$field), )* }
      }
    }
  };
}

op_category! {
  /// Exchange and compare-exchange.
  XchgOps<S> {
    exchange: [S::Exchange] => XCHG EXCHANGE,
    /// May fail spuriously.
    cmpxchg_weak: [S::Cmpxchg] => XCHG CMPXCHG_WEAK,
    cmpxchg_strong: [S::Cmpxchg] => XCHG CMPXCHG_STRONG,
  }
}

op_category! {
  /// Single-bit test and modify.
  BitwiseOps<S> {
    test: [S::Test] => BIT TEST,
    /// Complement the bit.
    test_compl: [S::TestModify] => BIT TEST_COMPL,
    test_set: [S::TestModify] => BIT TEST_SET,
    test_reset: [S::TestModify] => BIT TEST_RESET,
  }
}

op_category! {
  /// Bitwise operations on the whole object.
  BinaryOps<S> {
    or: [S::Binary] => BIN_V OR,
    xor: [S::Binary] => BIN_V XOR,
    and: [S::Binary] => BIN_V AND,
    not: [S::Unary] => BIN_V NOT,
    fetch_or: [S::FetchBinary] => BIN_F OR,
    fetch_xor: [S::FetchBinary] => BIN_F XOR,
    fetch_and: [S::FetchBinary] => BIN_F AND,
    fetch_not: [S::FetchUnary] => BIN_F NOT,
  }
}

op_category! {
  /// Wrapping two's-complement arithmetic on the object as an unsigned
  /// native-endian integer.
  ArithmeticOps<S> {
    add: [S::Binary] => ARI_V ADD,
    sub: [S::Binary] => ARI_V SUB,
    inc: [S::Unary] => ARI_V INC,
    dec: [S::Unary] => ARI_V DEC,
    neg: [S::Unary] => ARI_V NEG,
    fetch_add: [S::FetchBinary] => ARI_F ADD,
    fetch_sub: [S::FetchBinary] => ARI_F SUB,
    fetch_inc: [S::FetchUnary] => ARI_F INC,
    fetch_dec: [S::FetchUnary] => ARI_F DEC,
    fetch_neg: [S::FetchUnary] => ARI_F NEG,
  }
}

/// Body of a [`SpecialOps::generic`] transaction.
pub type GenericFn = unsafe fn(&mut dyn FnMut(), TransactionConfig) -> TransactionResult;

/// Transaction with a non-transactional fallback. Returns `true` if the
/// primary closure committed, `false` if the fallback ran instead.
pub type GenericWfbFn =
  unsafe fn(&mut dyn FnMut(), &mut dyn FnMut(), TransactionConfig) -> (bool, TransactionResult);

op_category! {
  /// Multi-object and user-defined transactions.
  SpecialOps {
    /// Two independent compare-exchanges that succeed or fail together.
    double_cmpxchg: [unsafe fn(CmpxchgDesc, CmpxchgDesc, TransactionConfig) -> (bool, TransactionResult)]
      => TSPEC DOUBLE_CMPXCHG,
    /// `len` compare-exchanges starting at the given pointer.
    multi_cmpxchg: [unsafe fn(*const CmpxchgDesc, usize, TransactionConfig) -> (bool, TransactionResult)]
      => TSPEC MULTI_CMPXCHG,
    generic: [GenericFn] => TSPEC GENERIC,
    generic_wfb: [GenericWfbFn] => TSPEC GENERIC_WFB,
  }
}

op_category! {
  /// Operations on a [`TransactionFlag`].
  FlagOps {
    test: [fn(&TransactionFlag) -> bool] => TFLAG TEST,
    test_set: [fn(&TransactionFlag) -> bool] => TFLAG TEST_SET,
    clear: [fn(&TransactionFlag)] => TFLAG CLEAR,
  }
}

op_category! {
  /// Raw transaction primitives.
  ///
  /// Code between `tbegin` and `tcommit` runs transactionally. A failed
  /// `tbegin` returns a non-success status; control resumes there after an
  /// abort.
  RawOps {
    tbegin: [unsafe fn() -> TransactionStatus] => TRAW TBEGIN,
    /// Abort every nesting level with an 8-bit reason.
    tabort_all: [unsafe fn(u8)] => TRAW TABORT_ALL,
    /// Abort only the innermost nesting level.
    tabort_single: [unsafe fn(u8)] => TRAW TABORT_SINGLE,
    tcommit: [unsafe fn()] => TRAW TCOMMIT,
    /// Whether execution is currently transactional.
    ttest: [fn() -> bool] => TRAW TTEST,
    /// Current nesting depth; 0 outside a transaction.
    tdepth: [fn() -> usize] => TRAW TDEPTH,
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

/// Operation table of the implicit or explicit domain.
#[derive(Clone, Copy, Debug)]
pub struct Ops<S: Signatures> {
  pub store: Option<S::Store>,
  pub load: Option<S::Load>,
  pub xchg_ops: XchgOps<S>,
  pub bitwise_ops: BitwiseOps<S>,
  pub binary_ops: BinaryOps<S>,
  pub arithmetic_ops: ArithmeticOps<S>,
}

pub type OpsImplicit = Ops<Implicit>;
pub type OpsExplicit = Ops<Explicit>;

fn ldst_kinds(cats: OpCategory, store: bool, load: bool) -> OpKind {
  let mut kinds = OpKind::empty();
  if cats.contains(OpCategory::LDST) {
    kinds.set(OpKind::STORE, store);
    kinds.set(OpKind::LOAD, load);
  }
  kinds
}

impl<S: Signatures> Ops<S> {
  pub const EMPTY: Self = Self {
    store: None,
    load: None,
    xchg_ops: XchgOps::EMPTY,
    bitwise_ops: BitwiseOps::EMPTY,
    binary_ops: BinaryOps::EMPTY,
    arithmetic_ops: ArithmeticOps::EMPTY,
  };

  /// Whether every slot is null.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.store.is_none()
      && self.load.is_none()
      && self.xchg_ops.is_empty()
      && self.bitwise_ops.is_empty()
      && self.binary_ops.is_empty()
      && self.arithmetic_ops.is_empty()
  }
}

impl<S: Signatures> Default for Ops<S> {
  #[inline]
  fn default() -> Self {
    Self::EMPTY
  }
}

impl<S: Signatures> Merge for Ops<S> {
  #[inline]
  fn empty() -> Self {
    Self::EMPTY
  }

  fn merge(self, lower: Self) -> Self {
    Self {
      store: self.store.or(lower.store),
      load: self.load.or(lower.load),
      xchg_ops: self.xchg_ops.merge(lower.xchg_ops),
      bitwise_ops: self.bitwise_ops.merge(lower.bitwise_ops),
      binary_ops: self.binary_ops.merge(lower.binary_ops),
      arithmetic_ops: self.arithmetic_ops.merge(lower.arithmetic_ops),
    }
  }
}

impl<S: Signatures> FeatureCheck for Ops<S> {
  fn defined_kinds(cats: OpCategory) -> OpKind {
    ldst_kinds(cats, true, true)
      | XchgOps::<S>::defined_kinds(cats)
      | BitwiseOps::<S>::defined_kinds(cats)
      | BinaryOps::<S>::defined_kinds(cats)
      | ArithmeticOps::<S>::defined_kinds(cats)
  }

  fn supported_kinds(&self, cats: OpCategory) -> OpKind {
    ldst_kinds(cats, self.store.is_some(), self.load.is_some())
      | self.xchg_ops.supported_kinds(cats)
      | self.bitwise_ops.supported_kinds(cats)
      | self.binary_ops.supported_kinds(cats)
      | self.arithmetic_ops.supported_kinds(cats)
  }
}

/// Operation table of the transactional domain.
#[derive(Clone, Copy, Debug)]
pub struct OpsTransaction {
  pub store: Option<<Transaction as Signatures>::Store>,
  pub load: Option<<Transaction as Signatures>::Load>,
  pub xchg_ops: XchgOps<Transaction>,
  pub bitwise_ops: BitwiseOps<Transaction>,
  pub binary_ops: BinaryOps<Transaction>,
  pub arithmetic_ops: ArithmeticOps<Transaction>,
  pub special_ops: SpecialOps,
  pub flag_ops: FlagOps,
  pub raw_ops: RawOps,
}

impl OpsTransaction {
  pub const EMPTY: Self = Self {
    store: None,
    load: None,
    xchg_ops: XchgOps::EMPTY,
    bitwise_ops: BitwiseOps::EMPTY,
    binary_ops: BinaryOps::EMPTY,
    arithmetic_ops: ArithmeticOps::EMPTY,
    special_ops: SpecialOps::EMPTY,
    flag_ops: FlagOps::EMPTY,
    raw_ops: RawOps::EMPTY,
  };

  /// Whether every slot is null.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.store.is_none()
      && self.load.is_none()
      && self.xchg_ops.is_empty()
      && self.bitwise_ops.is_empty()
      && self.binary_ops.is_empty()
      && self.arithmetic_ops.is_empty()
      && self.special_ops.is_empty()
      && self.flag_ops.is_empty()
      && self.raw_ops.is_empty()
  }
}

impl Default for OpsTransaction {
  #[inline]
  fn default() -> Self {
    Self::EMPTY
  }
}

impl Merge for OpsTransaction {
  #[inline]
  fn empty() -> Self {
    Self::EMPTY
  }

  fn merge(self, lower: Self) -> Self {
    Self {
      store: self.store.or(lower.store),
      load: self.load.or(lower.load),
      xchg_ops: self.xchg_ops.merge(lower.xchg_ops),
      bitwise_ops: self.bitwise_ops.merge(lower.bitwise_ops),
      binary_ops: self.binary_ops.merge(lower.binary_ops),
      arithmetic_ops: self.arithmetic_ops.merge(lower.arithmetic_ops),
      special_ops: self.special_ops.merge(lower.special_ops),
      flag_ops: self.flag_ops.merge(lower.flag_ops),
      raw_ops: self.raw_ops.merge(lower.raw_ops),
    }
  }
}

impl FeatureCheck for OpsTransaction {
  fn defined_kinds(cats: OpCategory) -> OpKind {
    Ops::<Transaction>::defined_kinds(cats)
      | SpecialOps::defined_kinds(cats)
      | FlagOps::defined_kinds(cats)
      | RawOps::defined_kinds(cats)
  }

  fn supported_kinds(&self, cats: OpCategory) -> OpKind {
    ldst_kinds(cats, self.store.is_some(), self.load.is_some())
      | self.xchg_ops.supported_kinds(cats)
      | self.bitwise_ops.supported_kinds(cats)
      | self.binary_ops.supported_kinds(cats)
      | self.arithmetic_ops.supported_kinds(cats)
      | self.special_ops.supported_kinds(cats)
      | self.flag_ops.supported_kinds(cats)
      | self.raw_ops.supported_kinds(cats)
  }
}
