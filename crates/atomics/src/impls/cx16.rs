//! 16-byte operations via x86_64 `lock cmpxchg16b`.
//!
//! Every operation is a compare-exchange loop over the one instruction, so
//! every operation is sequentially consistent and the same function serves
//! every memory order. Loads are a compare-exchange of zero with zero and
//! therefore need writable memory.
//!
//! Objects must be 16-byte aligned.

use core::arch::asm;

use crate::{
  align::Alignment,
  merge::{Atomic, AtomicExplicit, AtomicTransaction, Merge},
  ops::{ArithmeticOps, BinaryOps, BitwiseOps, Ops, OpsExplicit, OpsImplicit, XchgOps},
  order::MemoryOrder,
};

const WIDTH: usize = 16;

const ALIGN: Alignment = Alignment::natural(WIDTH);

/// Compare-exchange 16 bytes at `dst`, returning the previous value and
/// whether it matched `old`.
///
/// # Safety
///
/// `dst` must be valid and 16-byte aligned, and the CPU must support
/// `cmpxchg16b`.
#[inline]
#[target_feature(enable = "cmpxchg16b")]
unsafe fn cas(dst: *mut u8, old: u128, new: u128) -> (u128, bool) {
  let (prev_lo, prev_hi): (u64, u64);
  let ok: u8;
  // SAFETY: caller guarantees `dst` is valid and aligned. rbx is reserved by
  // LLVM, so the low half of `new` is swapped in and restored around the
  // instruction.
  unsafe {
    asm!(
      "xchg {new_lo}, rbx",
      "lock cmpxchg16b xmmword ptr [{dst}]",
      "sete {ok}",
      "mov rbx, {new_lo}",
      dst = in(reg) dst,
      new_lo = inout(reg) new as u64 => _,
      ok = out(reg_byte) ok,
      in("rcx") (new >> 64) as u64,
      inout("rax") old as u64 => prev_lo,
      inout("rdx") (old >> 64) as u64 => prev_hi,
      options(nostack),
    );
  }
  (u128::from(prev_hi) << 64 | u128::from(prev_lo), ok != 0)
}

#[inline(always)]
unsafe fn read(p: *const u8) -> u128 {
  // SAFETY: caller guarantees `p` is valid for 16 bytes.
  unsafe { p.cast::<u128>().read_unaligned() }
}

#[inline(always)]
unsafe fn write(p: *mut u8, v: u128) {
  // SAFETY: caller guarantees `p` is valid for 16 bytes.
  unsafe { p.cast::<u128>().write_unaligned(v) }
}

#[inline(always)]
unsafe fn load_raw(obj: *mut u8) -> u128 {
  // SAFETY: forwarded to the caller.
  unsafe { cas(obj, 0, 0).0 }
}

/// Replace the value with `f(old)`, returning `old`.
#[inline(always)]
unsafe fn rmw(obj: *mut u8, f: impl Fn(u128) -> u128) -> u128 {
  // SAFETY: forwarded to the caller.
  let mut cur = unsafe { load_raw(obj) };
  loop {
    // SAFETY: as above.
    let (prev, ok) = unsafe { cas(obj, cur, f(cur)) };
    if ok {
      return cur;
    }
    cur = prev;
  }
}

#[inline(always)]
fn bit(offset: usize) -> u128 {
  debug_assert!(offset < 128, "bit offset {offset} out of range");
  1 << (offset % 128)
}

/// Defines each operation twice: once for the implicit domain and once with
/// a trailing, ignored order for the explicit domain.
macro_rules! ops16 {
  ($( $name:ident($($arg:ident: $ty:ty),*) $(-> $ret:ty)? $body:block )*) => {
    mod implicit {
      use super::*;
      $( pub(super) unsafe fn $name($($arg: $ty),*) $(-> $ret)? $body )*
    }

    mod explicit {
      use super::*;
      $( pub(super) unsafe fn $name($($arg: $ty,)* _: MemoryOrder) $(-> $ret)? $body )*
    }
  };
}

ops16! {
  store(obj: *mut u8, desired: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let new = read(desired);
      rmw(obj, |_| new);
    }
  }

  load(obj: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { write(ret, load_raw(obj.cast_mut())) }
  }

  exchange(obj: *mut u8, desired: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let new = read(desired);
      write(ret, rmw(obj, |_| new));
    }
  }

  test(obj: *const u8, offset: usize) -> bool {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { load_raw(obj.cast_mut()) & bit(offset) != 0 }
  }

  test_compl(obj: *mut u8, offset: usize) -> bool {
    let mask = bit(offset);
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| v ^ mask) & mask != 0 }
  }

  test_set(obj: *mut u8, offset: usize) -> bool {
    let mask = bit(offset);
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| v | mask) & mask != 0 }
  }

  test_reset(obj: *mut u8, offset: usize) -> bool {
    let mask = bit(offset);
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| v & !mask) & mask != 0 }
  }

  or(obj: *mut u8, arg: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      rmw(obj, |v| v | a);
    }
  }

  xor(obj: *mut u8, arg: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      rmw(obj, |v| v ^ a);
    }
  }

  and(obj: *mut u8, arg: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      rmw(obj, |v| v & a);
    }
  }

  not(obj: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| !v) };
  }

  fetch_or(obj: *mut u8, arg: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      write(ret, rmw(obj, |v| v | a));
    }
  }

  fetch_xor(obj: *mut u8, arg: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      write(ret, rmw(obj, |v| v ^ a));
    }
  }

  fetch_and(obj: *mut u8, arg: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      write(ret, rmw(obj, |v| v & a));
    }
  }

  fetch_not(obj: *mut u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { write(ret, rmw(obj, |v| !v)) }
  }

  add(obj: *mut u8, arg: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      rmw(obj, |v| v.wrapping_add(a));
    }
  }

  sub(obj: *mut u8, arg: *const u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      rmw(obj, |v| v.wrapping_sub(a));
    }
  }

  inc(obj: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| v.wrapping_add(1)) };
  }

  dec(obj: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, |v| v.wrapping_sub(1)) };
  }

  neg(obj: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { rmw(obj, u128::wrapping_neg) };
  }

  fetch_add(obj: *mut u8, arg: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      write(ret, rmw(obj, |v| v.wrapping_add(a)));
    }
  }

  fetch_sub(obj: *mut u8, arg: *const u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe {
      let a = read(arg);
      write(ret, rmw(obj, |v| v.wrapping_sub(a)));
    }
  }

  fetch_inc(obj: *mut u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { write(ret, rmw(obj, |v| v.wrapping_add(1))) }
  }

  fetch_dec(obj: *mut u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { write(ret, rmw(obj, |v| v.wrapping_sub(1))) }
  }

  fetch_neg(obj: *mut u8, ret: *mut u8) {
    // SAFETY: caller upholds the table's calling convention.
    unsafe { write(ret, rmw(obj, u128::wrapping_neg)) }
  }
}

unsafe fn cmpxchg(obj: *mut u8, expected: *mut u8, desired: *const u8) -> bool {
  // SAFETY: caller upholds the table's calling convention.
  unsafe {
    let (prev, ok) = cas(obj, read(expected), read(desired));
    if !ok {
      write(expected, prev);
    }
    ok
  }
}

unsafe fn cmpxchg_explicit(
  obj: *mut u8,
  expected: *mut u8,
  desired: *const u8,
  succ: MemoryOrder,
  fail: MemoryOrder,
) -> bool {
  debug_assert!(succ.is_valid_fail(fail), "{fail} is not a failure order for {succ}");
  // SAFETY: forwarded.
  unsafe { cmpxchg(obj, expected, desired) }
}

/// Fills every slot of one domain from the module of the same name.
macro_rules! table {
  ($m:ident, $cmpxchg:expr) => {{
    use $m::*;
    Ops {
      store: Some(store),
      load: Some(load),
      xchg_ops: XchgOps {
        exchange: Some(exchange),
        cmpxchg_weak: Some($cmpxchg),
        cmpxchg_strong: Some($cmpxchg),
      },
      bitwise_ops: BitwiseOps {
        test: Some(test),
        test_compl: Some(test_compl),
        test_set: Some(test_set),
        test_reset: Some(test_reset),
      },
      binary_ops: BinaryOps {
        or: Some(or),
        xor: Some(xor),
        and: Some(and),
        not: Some(not),
        fetch_or: Some(fetch_or),
        fetch_xor: Some(fetch_xor),
        fetch_and: Some(fetch_and),
        fetch_not: Some(fetch_not),
      },
      arithmetic_ops: ArithmeticOps {
        add: Some(add),
        sub: Some(sub),
        inc: Some(inc),
        dec: Some(dec),
        neg: Some(neg),
        fetch_add: Some(fetch_add),
        fetch_sub: Some(fetch_sub),
        fetch_inc: Some(fetch_inc),
        fetch_dec: Some(fetch_dec),
        fetch_neg: Some(fetch_neg),
      },
    }
  }};
}

pub(super) fn implicit(width: usize, order: MemoryOrder) -> Atomic {
  if width != WIDTH {
    return Atomic::empty();
  }
  let mut ops: OpsImplicit = table!(implicit, cmpxchg);
  if !order.is_valid_store() {
    ops.store = None;
  }
  if !order.is_valid_load() {
    ops.load = None;
    ops.bitwise_ops.test = None;
  }
  Atomic { ops, align: ALIGN }
}

pub(super) fn explicit(width: usize) -> AtomicExplicit {
  if width != WIDTH {
    return AtomicExplicit::empty();
  }
  let ops: OpsExplicit = table!(explicit, cmpxchg_explicit);
  AtomicExplicit { ops, align: ALIGN }
}

/// No transactional support.
pub(super) fn transaction() -> AtomicTransaction {
  AtomicTransaction::empty()
}

#[cfg(test)]
mod tests {
  use backend::ImplId;

  use super::*;

  #[repr(C, align(16))]
  struct Obj(u128);

  fn enabled() -> bool {
    backend::is_available(ImplId::CX16)
  }

  #[test]
  fn other_widths_contribute_nothing() {
    for width in [0usize, 1, 2, 4, 8, 32] {
      let a = implicit(width, MemoryOrder::SeqCst);
      assert!(a.ops.is_empty());
      assert_eq!(a.align, Alignment::PERMISSIVE);
      assert!(explicit(width).ops.is_empty());
    }
    assert!(transaction().ops.is_empty());
  }

  #[test]
  fn width_16_is_aligned_to_16() {
    let a = implicit(16, MemoryOrder::SeqCst);
    assert_eq!(a.align, Alignment::new(16, 16, 0));
    assert!(a.ops.store.is_some() && a.ops.load.is_some());
    assert!(implicit(16, MemoryOrder::Acquire).ops.store.is_none());
    assert!(implicit(16, MemoryOrder::Release).ops.load.is_none());
  }

  #[test]
  fn operations_on_16_bytes() {
    if !enabled() {
      return;
    }
    let ops = implicit(16, MemoryOrder::SeqCst).ops;
    let mut obj = Obj(u64::MAX as u128);
    let p = (&raw mut obj).cast::<u8>();
    let one = 1u128;
    let mut ret = 0u128;
    let r = (&raw mut ret).cast::<u8>();

    // SAFETY: `obj` is 16-byte aligned and cmpxchg16b is available.
    unsafe {
      (ops.arithmetic_ops.fetch_add.unwrap())(p, (&raw const one).cast(), r);
      assert_eq!(ret, u64::MAX as u128);
      (ops.load.unwrap())(p, r);
      assert_eq!(ret, 1u128 << 64);

      assert!(!(ops.bitwise_ops.test_set.unwrap())(p, 127));
      assert!((ops.bitwise_ops.test.unwrap())(p, 127));
      (ops.arithmetic_ops.neg.unwrap())(p);
      (ops.load.unwrap())(p, r);
      assert_eq!(ret, ((1u128 << 127) | (1u128 << 64)).wrapping_neg());

      let mut expected = 0u128;
      let desired = 7u128;
      let e = (&raw mut expected).cast::<u8>();
      assert!(!(ops.xchg_ops.cmpxchg_strong.unwrap())(p, e, (&raw const desired).cast()));
      assert_eq!(expected, ret);
      assert!((ops.xchg_ops.cmpxchg_strong.unwrap())(p, e, (&raw const desired).cast()));
      assert_eq!(obj.0, 7);
    }
  }

  #[test]
  fn explicit_ignores_order() {
    if !enabled() {
      return;
    }
    let ops = explicit(16).ops;
    let mut obj = Obj(0);
    let p = (&raw mut obj).cast::<u8>();
    let v = u128::MAX - 1;
    // SAFETY: `obj` is 16-byte aligned and cmpxchg16b is available.
    unsafe {
      (ops.store.unwrap())(p, (&raw const v).cast(), MemoryOrder::Relaxed);
      (ops.arithmetic_ops.inc.unwrap())(p, MemoryOrder::AcqRel);
    }
    assert_eq!(obj.0, u128::MAX);
  }
}
