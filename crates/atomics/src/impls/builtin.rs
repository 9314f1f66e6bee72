//! `core::sync::atomic` builtins.
//!
//! Covers the widths for which the target has native atomics (1, 2, 4 and
//! 8 bytes on most targets). Objects must be naturally aligned; argument and
//! result buffers may be unaligned.
//!
//! Implicit-domain functions bake the order in as a const parameter, one
//! instantiation per (width, order). Store, load and bit-test slots stay null
//! for orders those operations do not accept.

use core::sync::atomic::Ordering;

use crate::{
  align::Alignment,
  merge::{Atomic, AtomicExplicit, AtomicTransaction, Merge},
  ops::{ArithmeticOps, BinaryOps, BitwiseOps, OpsExplicit, OpsImplicit, XchgOps},
  order::MemoryOrder,
};

/// An unsigned integer with a native atomic counterpart.
trait Word: Copy + Eq {
  type Atomic;

  const ALIGN: usize = core::mem::align_of::<Self::Atomic>();

  /// # Safety
  ///
  /// `p` must be valid, aligned to `ALIGN`, and only accessed atomically
  /// for `'a`.
  unsafe fn atomic<'a>(p: *mut u8) -> &'a Self::Atomic;

  /// # Safety
  ///
  /// `p` must be valid for `size_of::<Self>()` bytes.
  unsafe fn read(p: *const u8) -> Self;

  /// # Safety
  ///
  /// `p` must be valid for `size_of::<Self>()` bytes.
  unsafe fn write(p: *mut u8, v: Self);

  fn bit(offset: usize) -> Self;
  fn clear_mask(offset: usize) -> Self;
  fn has_bit(v: Self, offset: usize) -> bool;
  fn load(a: &Self::Atomic, o: Ordering) -> Self;
  fn store(a: &Self::Atomic, v: Self, o: Ordering);
  fn swap(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn cas(a: &Self::Atomic, cur: Self, new: Self, weak: bool, succ: Ordering, fail: Ordering) -> Result<Self, Self>;
  fn fetch_or(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn fetch_xor(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn fetch_and(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn fetch_not(a: &Self::Atomic, o: Ordering) -> Self;
  fn fetch_add(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn fetch_sub(a: &Self::Atomic, v: Self, o: Ordering) -> Self;
  fn fetch_inc(a: &Self::Atomic, o: Ordering) -> Self;
  fn fetch_dec(a: &Self::Atomic, o: Ordering) -> Self;
  fn fetch_neg(a: &Self::Atomic, o: Ordering, fail: Ordering) -> Self;
}

macro_rules! word {
  ($($w:ident $atomic:ident $bits:tt;)*) => {$(
    #[cfg(target_has_atomic = $bits)]
    impl Word for $w {
      type Atomic = core::sync::atomic::$atomic;

      #[inline(always)]
      unsafe fn atomic<'a>(p: *mut u8) -> &'a Self::Atomic {
        // SAFETY: forwarded to the caller.
        unsafe { core::sync::atomic::$atomic::from_ptr(p.cast()) }
      }

      #[inline(always)]
      unsafe fn read(p: *const u8) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { p.cast::<Self>().read_unaligned() }
      }

      #[inline(always)]
      unsafe fn write(p: *mut u8, v: Self) {
        // SAFETY: forwarded to the caller.
        unsafe { p.cast::<Self>().write_unaligned(v) }
      }

      #[inline(always)]
      fn bit(offset: usize) -> Self {
        debug_assert!(offset < Self::BITS as usize, "bit offset {offset} out of range");
        1 << (offset % Self::BITS as usize)
      }

      #[inline(always)]
      fn clear_mask(offset: usize) -> Self {
        !Self::bit(offset)
      }

      #[inline(always)]
      fn has_bit(v: Self, offset: usize) -> bool {
        v & Self::bit(offset) != 0
      }

      #[inline(always)]
      fn load(a: &Self::Atomic, o: Ordering) -> Self { a.load(o) }
      #[inline(always)]
      fn store(a: &Self::Atomic, v: Self, o: Ordering) { a.store(v, o) }
      #[inline(always)]
      fn swap(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.swap(v, o) }

      #[inline(always)]
      fn cas(a: &Self::Atomic, cur: Self, new: Self, weak: bool, succ: Ordering, fail: Ordering) -> Result<Self, Self> {
        if weak {
          a.compare_exchange_weak(cur, new, succ, fail)
        } else {
          a.compare_exchange(cur, new, succ, fail)
        }
      }

      #[inline(always)]
      fn fetch_or(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.fetch_or(v, o) }
      #[inline(always)]
      fn fetch_xor(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.fetch_xor(v, o) }
      #[inline(always)]
      fn fetch_and(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.fetch_and(v, o) }
      #[inline(always)]
      fn fetch_not(a: &Self::Atomic, o: Ordering) -> Self { a.fetch_xor(Self::MAX, o) }
      #[inline(always)]
      fn fetch_add(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.fetch_add(v, o) }
      #[inline(always)]
      fn fetch_sub(a: &Self::Atomic, v: Self, o: Ordering) -> Self { a.fetch_sub(v, o) }
      #[inline(always)]
      fn fetch_inc(a: &Self::Atomic, o: Ordering) -> Self { a.fetch_add(1, o) }
      #[inline(always)]
      fn fetch_dec(a: &Self::Atomic, o: Ordering) -> Self { a.fetch_sub(1, o) }

      #[inline(always)]
      fn fetch_neg(a: &Self::Atomic, o: Ordering, fail: Ordering) -> Self {
        match a.fetch_update(o, fail, |v| Some(v.wrapping_neg())) {
          Ok(old) | Err(old) => old,
        }
      }
    }
  )*};
}

word! {
  u8 AtomicU8 "8";
  u16 AtomicU16 "16";
  u32 AtomicU32 "32";
  u64 AtomicU64 "64";
}

// ─────────────────────────────────────────────────────────────────────────────
// Implicit Domain
// ─────────────────────────────────────────────────────────────────────────────

/// Raw order baked into an implicit instantiation.
#[inline(always)]
const fn order(raw: u32) -> MemoryOrder {
  match MemoryOrder::from_raw(raw) {
    Some(order) => order,
    None => MemoryOrder::SeqCst,
  }
}

mod implicit {
  use super::*;

  pub(super) unsafe fn store<W: Word, const O: u32>(obj: *mut u8, desired: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::store(W::atomic(obj), W::read(desired), order(O).to_store()) }
  }

  pub(super) unsafe fn load<W: Word, const O: u32>(obj: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::load(W::atomic(obj.cast_mut()), order(O).to_load())) }
  }

  pub(super) unsafe fn exchange<W: Word, const O: u32>(obj: *mut u8, desired: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::swap(W::atomic(obj), W::read(desired), order(O).to_rmw())) }
  }

  unsafe fn cmpxchg<W: Word, const O: u32>(obj: *mut u8, expected: *mut u8, desired: *const u8, weak: bool) -> bool {
    let succ = order(O);
    let fail = succ.cmpxchg_fail_order();
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let cur = W::read(expected);
      match W::cas(W::atomic(obj), cur, W::read(desired), weak, succ.to_rmw(), fail.to_load()) {
        Ok(_) => true,
        Err(actual) => {
          W::write(expected, actual);
          false
        }
      }
    }
  }

  pub(super) unsafe fn cmpxchg_weak<W: Word, const O: u32>(obj: *mut u8, expected: *mut u8, desired: *const u8) -> bool {
    // SAFETY: forwarded.
    unsafe { cmpxchg::<W, O>(obj, expected, desired, true) }
  }

  pub(super) unsafe fn cmpxchg_strong<W: Word, const O: u32>(
    obj: *mut u8,
    expected: *mut u8,
    desired: *const u8,
  ) -> bool {
    // SAFETY: forwarded.
    unsafe { cmpxchg::<W, O>(obj, expected, desired, false) }
  }

  pub(super) unsafe fn test<W: Word, const O: u32>(obj: *const u8, offset: usize) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    let v = unsafe { W::load(W::atomic(obj.cast_mut()), order(O).to_load()) };
    W::has_bit(v, offset)
  }

  pub(super) unsafe fn test_compl<W: Word, const O: u32>(obj: *mut u8, offset: usize) -> bool {
    let mask = W::bit(offset);
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_xor(W::atomic(obj), mask, order(O).to_rmw()) };
    W::has_bit(old, offset)
  }

  pub(super) unsafe fn test_set<W: Word, const O: u32>(obj: *mut u8, offset: usize) -> bool {
    let mask = W::bit(offset);
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_or(W::atomic(obj), mask, order(O).to_rmw()) };
    W::has_bit(old, offset)
  }

  pub(super) unsafe fn test_reset<W: Word, const O: u32>(obj: *mut u8, offset: usize) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_and(W::atomic(obj), W::clear_mask(offset), order(O).to_rmw()) };
    W::has_bit(old, offset)
  }

  macro_rules! binary {
    ($($void:ident $fetch:ident => $op:ident;)*) => {$(
      pub(super) unsafe fn $void<W: Word, const O: u32>(obj: *mut u8, arg: *const u8) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::$op(W::atomic(obj), W::read(arg), order(O).to_rmw()) };
      }

      pub(super) unsafe fn $fetch<W: Word, const O: u32>(obj: *mut u8, arg: *const u8, ret: *mut u8) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::write(ret, W::$op(W::atomic(obj), W::read(arg), order(O).to_rmw())) };
      }
    )*};
  }

  macro_rules! unary {
    ($($void:ident $fetch:ident => $op:ident;)*) => {$(
      pub(super) unsafe fn $void<W: Word, const O: u32>(obj: *mut u8) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::$op(W::atomic(obj), order(O).to_rmw()) };
      }

      pub(super) unsafe fn $fetch<W: Word, const O: u32>(obj: *mut u8, ret: *mut u8) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::write(ret, W::$op(W::atomic(obj), order(O).to_rmw())) };
      }
    )*};
  }

  binary! {
    or fetch_or => fetch_or;
    xor fetch_xor => fetch_xor;
    and fetch_and => fetch_and;
    add fetch_add => fetch_add;
    sub fetch_sub => fetch_sub;
  }

  unary! {
    not fetch_not => fetch_not;
    inc fetch_inc => fetch_inc;
    dec fetch_dec => fetch_dec;
  }

  pub(super) unsafe fn neg<W: Word, const O: u32>(obj: *mut u8) {
    let o = order(O);
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::fetch_neg(W::atomic(obj), o.to_rmw(), o.cmpxchg_fail_order().to_load()) };
  }

  pub(super) unsafe fn fetch_neg<W: Word, const O: u32>(obj: *mut u8, ret: *mut u8) {
    let o = order(O);
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::fetch_neg(W::atomic(obj), o.to_rmw(), o.cmpxchg_fail_order().to_load())) };
  }
}

fn implicit_ops<W: Word, const O: u32>() -> OpsImplicit {
  use implicit::*;

  let o = order(O);
  OpsImplicit {
    store: o.is_valid_store().then_some(store::<W, O> as _),
    load: o.is_valid_load().then_some(load::<W, O> as _),
    xchg_ops: XchgOps {
      exchange: Some(exchange::<W, O>),
      cmpxchg_weak: Some(cmpxchg_weak::<W, O>),
      cmpxchg_strong: Some(cmpxchg_strong::<W, O>),
    },
    bitwise_ops: BitwiseOps {
      test: o.is_valid_load().then_some(test::<W, O> as _),
      test_compl: Some(test_compl::<W, O>),
      test_set: Some(test_set::<W, O>),
      test_reset: Some(test_reset::<W, O>),
    },
    binary_ops: BinaryOps {
      or: Some(or::<W, O>),
      xor: Some(xor::<W, O>),
      and: Some(and::<W, O>),
      not: Some(not::<W, O>),
      fetch_or: Some(fetch_or::<W, O>),
      fetch_xor: Some(fetch_xor::<W, O>),
      fetch_and: Some(fetch_and::<W, O>),
      fetch_not: Some(fetch_not::<W, O>),
    },
    arithmetic_ops: ArithmeticOps {
      add: Some(add::<W, O>),
      sub: Some(sub::<W, O>),
      inc: Some(inc::<W, O>),
      dec: Some(dec::<W, O>),
      neg: Some(neg::<W, O>),
      fetch_add: Some(fetch_add::<W, O>),
      fetch_sub: Some(fetch_sub::<W, O>),
      fetch_inc: Some(fetch_inc::<W, O>),
      fetch_dec: Some(fetch_dec::<W, O>),
      fetch_neg: Some(fetch_neg::<W, O>),
    },
  }
}

fn implicit_for<W: Word>(order: MemoryOrder) -> Atomic {
  const RELAXED: u32 = MemoryOrder::Relaxed as u32;
  const CONSUME: u32 = MemoryOrder::Consume as u32;
  const ACQUIRE: u32 = MemoryOrder::Acquire as u32;
  const RELEASE: u32 = MemoryOrder::Release as u32;
  const ACQ_REL: u32 = MemoryOrder::AcqRel as u32;
  const SEQ_CST: u32 = MemoryOrder::SeqCst as u32;

  let ops = match order {
    MemoryOrder::Relaxed => implicit_ops::<W, RELAXED>(),
    MemoryOrder::Consume => implicit_ops::<W, CONSUME>(),
    MemoryOrder::Acquire => implicit_ops::<W, ACQUIRE>(),
    MemoryOrder::Release => implicit_ops::<W, RELEASE>(),
    MemoryOrder::AcqRel => implicit_ops::<W, ACQ_REL>(),
    MemoryOrder::SeqCst => implicit_ops::<W, SEQ_CST>(),
  };
  Atomic {
    ops,
    align: Alignment::natural(W::ALIGN),
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Explicit Domain
// ─────────────────────────────────────────────────────────────────────────────

mod explicit {
  use super::*;

  pub(super) unsafe fn store<W: Word>(obj: *mut u8, desired: *const u8, o: MemoryOrder) {
    debug_assert!(o.is_valid_store(), "{o} is not a store order");
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::store(W::atomic(obj), W::read(desired), o.to_store()) }
  }

  pub(super) unsafe fn load<W: Word>(obj: *const u8, ret: *mut u8, o: MemoryOrder) {
    debug_assert!(o.is_valid_load(), "{o} is not a load order");
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::load(W::atomic(obj.cast_mut()), o.to_load())) }
  }

  pub(super) unsafe fn exchange<W: Word>(obj: *mut u8, desired: *const u8, ret: *mut u8, o: MemoryOrder) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::swap(W::atomic(obj), W::read(desired), o.to_rmw())) }
  }

  unsafe fn cmpxchg<W: Word>(
    obj: *mut u8,
    expected: *mut u8,
    desired: *const u8,
    succ: MemoryOrder,
    fail: MemoryOrder,
    weak: bool,
  ) -> bool {
    debug_assert!(succ.is_valid_fail(fail), "{fail} is not a failure order for {succ}");
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let cur = W::read(expected);
      match W::cas(W::atomic(obj), cur, W::read(desired), weak, succ.to_rmw(), fail.to_load()) {
        Ok(_) => true,
        Err(actual) => {
          W::write(expected, actual);
          false
        }
      }
    }
  }

  pub(super) unsafe fn cmpxchg_weak<W: Word>(
    obj: *mut u8,
    expected: *mut u8,
    desired: *const u8,
    succ: MemoryOrder,
    fail: MemoryOrder,
  ) -> bool {
    // SAFETY: forwarded.
    unsafe { cmpxchg::<W>(obj, expected, desired, succ, fail, true) }
  }

  pub(super) unsafe fn cmpxchg_strong<W: Word>(
    obj: *mut u8,
    expected: *mut u8,
    desired: *const u8,
    succ: MemoryOrder,
    fail: MemoryOrder,
  ) -> bool {
    // SAFETY: forwarded.
    unsafe { cmpxchg::<W>(obj, expected, desired, succ, fail, false) }
  }

  pub(super) unsafe fn test<W: Word>(obj: *const u8, offset: usize, o: MemoryOrder) -> bool {
    debug_assert!(o.is_valid_load(), "{o} is not a load order");
    // SAFETY: caller upholds the table's calling convention.
    let v = unsafe { W::load(W::atomic(obj.cast_mut()), o.to_load()) };
    W::has_bit(v, offset)
  }

  pub(super) unsafe fn test_compl<W: Word>(obj: *mut u8, offset: usize, o: MemoryOrder) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_xor(W::atomic(obj), W::bit(offset), o.to_rmw()) };
    W::has_bit(old, offset)
  }

  pub(super) unsafe fn test_set<W: Word>(obj: *mut u8, offset: usize, o: MemoryOrder) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_or(W::atomic(obj), W::bit(offset), o.to_rmw()) };
    W::has_bit(old, offset)
  }

  pub(super) unsafe fn test_reset<W: Word>(obj: *mut u8, offset: usize, o: MemoryOrder) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    let old = unsafe { W::fetch_and(W::atomic(obj), W::clear_mask(offset), o.to_rmw()) };
    W::has_bit(old, offset)
  }

  macro_rules! binary {
    ($($void:ident $fetch:ident => $op:ident;)*) => {$(
      pub(super) unsafe fn $void<W: Word>(obj: *mut u8, arg: *const u8, o: MemoryOrder) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::$op(W::atomic(obj), W::read(arg), o.to_rmw()) };
      }

      pub(super) unsafe fn $fetch<W: Word>(obj: *mut u8, arg: *const u8, ret: *mut u8, o: MemoryOrder) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::write(ret, W::$op(W::atomic(obj), W::read(arg), o.to_rmw())) };
      }
    )*};
  }

  macro_rules! unary {
    ($($void:ident $fetch:ident => $op:ident;)*) => {$(
      pub(super) unsafe fn $void<W: Word>(obj: *mut u8, o: MemoryOrder) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::$op(W::atomic(obj), o.to_rmw()) };
      }

      pub(super) unsafe fn $fetch<W: Word>(obj: *mut u8, ret: *mut u8, o: MemoryOrder) {
        // SAFETY: caller upholds the table's calling convention.
        unsafe { W::write(ret, W::$op(W::atomic(obj), o.to_rmw())) };
      }
    )*};
  }

  binary! {
    or fetch_or => fetch_or;
    xor fetch_xor => fetch_xor;
    and fetch_and => fetch_and;
    add fetch_add => fetch_add;
    sub fetch_sub => fetch_sub;
  }

  unary! {
    not fetch_not => fetch_not;
    inc fetch_inc => fetch_inc;
    dec fetch_dec => fetch_dec;
  }

  pub(super) unsafe fn neg<W: Word>(obj: *mut u8, o: MemoryOrder) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::fetch_neg(W::atomic(obj), o.to_rmw(), o.cmpxchg_fail_order().to_load()) };
  }

  pub(super) unsafe fn fetch_neg<W: Word>(obj: *mut u8, ret: *mut u8, o: MemoryOrder) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { W::write(ret, W::fetch_neg(W::atomic(obj), o.to_rmw(), o.cmpxchg_fail_order().to_load())) };
  }
}

fn explicit_for<W: Word>() -> AtomicExplicit {
  use explicit::*;

  let ops = OpsExplicit {
    store: Some(store::<W>),
    load: Some(load::<W>),
    xchg_ops: XchgOps {
      exchange: Some(exchange::<W>),
      cmpxchg_weak: Some(cmpxchg_weak::<W>),
      cmpxchg_strong: Some(cmpxchg_strong::<W>),
    },
    bitwise_ops: BitwiseOps {
      test: Some(test::<W>),
      test_compl: Some(test_compl::<W>),
      test_set: Some(test_set::<W>),
      test_reset: Some(test_reset::<W>),
    },
    binary_ops: BinaryOps {
      or: Some(or::<W>),
      xor: Some(xor::<W>),
      and: Some(and::<W>),
      not: Some(not::<W>),
      fetch_or: Some(fetch_or::<W>),
      fetch_xor: Some(fetch_xor::<W>),
      fetch_and: Some(fetch_and::<W>),
      fetch_not: Some(fetch_not::<W>),
    },
    arithmetic_ops: ArithmeticOps {
      add: Some(add::<W>),
      sub: Some(sub::<W>),
      inc: Some(inc::<W>),
      dec: Some(dec::<W>),
      neg: Some(neg::<W>),
      fetch_add: Some(fetch_add::<W>),
      fetch_sub: Some(fetch_sub::<W>),
      fetch_inc: Some(fetch_inc::<W>),
      fetch_dec: Some(fetch_dec::<W>),
      fetch_neg: Some(fetch_neg::<W>),
    },
  };
  AtomicExplicit {
    ops,
    align: Alignment::natural(W::ALIGN),
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter Entry Points
// ─────────────────────────────────────────────────────────────────────────────

pub(super) fn implicit(width: usize, order: MemoryOrder) -> Atomic {
  match width {
    #[cfg(target_has_atomic = "8")]
    1 => implicit_for::<u8>(order),
    #[cfg(target_has_atomic = "16")]
    2 => implicit_for::<u16>(order),
    #[cfg(target_has_atomic = "32")]
    4 => implicit_for::<u32>(order),
    #[cfg(target_has_atomic = "64")]
    8 => implicit_for::<u64>(order),
    _ => Atomic::empty(),
  }
}

pub(super) fn explicit(width: usize) -> AtomicExplicit {
  match width {
    #[cfg(target_has_atomic = "8")]
    1 => explicit_for::<u8>(),
    #[cfg(target_has_atomic = "16")]
    2 => explicit_for::<u16>(),
    #[cfg(target_has_atomic = "32")]
    4 => explicit_for::<u32>(),
    #[cfg(target_has_atomic = "64")]
    8 => explicit_for::<u64>(),
    _ => AtomicExplicit::empty(),
  }
}

/// No transactional support.
pub(super) fn transaction() -> AtomicTransaction {
  AtomicTransaction::empty()
}
