//! Width-polymorphic arithmetic on byte spans.
//!
//! A span of `len` bytes is read as an unsigned native-endian integer.
//! Arithmetic wraps. Every access goes through a volatile byte load or store
//! so the compiler keeps them inside the enclosing hardware transaction.
//!
//! # Safety
//!
//! Every function requires its pointers to be valid for `len` bytes. `dst`
//! may alias `arg`.

use core::ptr;

/// Offset of the byte holding bits `[8 * i, 8 * i + 8)`.
#[inline(always)]
const fn lsb(i: usize, len: usize) -> usize {
  if cfg!(target_endian = "little") { i } else { len - 1 - i }
}

#[inline(always)]
unsafe fn get(p: *const u8, i: usize) -> u8 {
  // SAFETY: caller guarantees `i < len` and `p` valid for `len`.
  unsafe { ptr::read_volatile(p.add(i)) }
}

#[inline(always)]
unsafe fn put(p: *mut u8, i: usize, v: u8) {
  // SAFETY: caller guarantees `i < len` and `p` valid for `len`.
  unsafe { ptr::write_volatile(p.add(i), v) }
}

pub(crate) unsafe fn copy(dst: *mut u8, src: *const u8, len: usize) {
  for i in 0..len {
    // SAFETY: `i < len`.
    unsafe { put(dst, i, get(src, i)) };
  }
}

pub(crate) unsafe fn eq(a: *const u8, b: *const u8, len: usize) -> bool {
  // SAFETY: `i < len`.
  (0..len).all(|i| unsafe { get(a, i) == get(b, i) })
}

pub(crate) unsafe fn or(dst: *mut u8, arg: *const u8, len: usize) {
  for i in 0..len {
    // SAFETY: `i < len`.
    unsafe { put(dst, i, get(dst, i) | get(arg, i)) };
  }
}

pub(crate) unsafe fn xor(dst: *mut u8, arg: *const u8, len: usize) {
  for i in 0..len {
    // SAFETY: `i < len`.
    unsafe { put(dst, i, get(dst, i) ^ get(arg, i)) };
  }
}

pub(crate) unsafe fn and(dst: *mut u8, arg: *const u8, len: usize) {
  for i in 0..len {
    // SAFETY: `i < len`.
    unsafe { put(dst, i, get(dst, i) & get(arg, i)) };
  }
}

pub(crate) unsafe fn not(dst: *mut u8, len: usize) {
  for i in 0..len {
    // SAFETY: `i < len`.
    unsafe { put(dst, i, !get(dst, i)) };
  }
}

pub(crate) unsafe fn add(dst: *mut u8, arg: *const u8, len: usize) {
  let mut carry = 0u16;
  for i in 0..len {
    let at = lsb(i, len);
    // SAFETY: `at < len`.
    unsafe {
      let sum = u16::from(get(dst, at)) + u16::from(get(arg, at)) + carry;
      put(dst, at, sum as u8);
      carry = sum >> 8;
    }
  }
}

pub(crate) unsafe fn sub(dst: *mut u8, arg: *const u8, len: usize) {
  let mut borrow = 0u8;
  for i in 0..len {
    let at = lsb(i, len);
    // SAFETY: `at < len`.
    unsafe {
      let (d, b1) = get(dst, at).overflowing_sub(get(arg, at));
      let (d, b2) = d.overflowing_sub(borrow);
      put(dst, at, d);
      borrow = u8::from(b1 | b2);
    }
  }
}

pub(crate) unsafe fn inc(dst: *mut u8, len: usize) {
  for i in 0..len {
    let at = lsb(i, len);
    // SAFETY: `at < len`.
    let (v, carry) = unsafe { get(dst, at) }.overflowing_add(1);
    // SAFETY: as above.
    unsafe { put(dst, at, v) };
    if !carry {
      return;
    }
  }
}

pub(crate) unsafe fn dec(dst: *mut u8, len: usize) {
  for i in 0..len {
    let at = lsb(i, len);
    // SAFETY: `at < len`.
    let (v, borrow) = unsafe { get(dst, at) }.overflowing_sub(1);
    // SAFETY: as above.
    unsafe { put(dst, at, v) };
    if !borrow {
      return;
    }
  }
}

/// Two's-complement negation.
pub(crate) unsafe fn neg(dst: *mut u8, len: usize) {
  // SAFETY: forwarded.
  unsafe {
    not(dst, len);
    inc(dst, len);
  }
}

/// Byte offset and mask of bit `offset`.
#[inline(always)]
const fn bit(offset: usize, len: usize) -> (usize, u8) {
  (lsb(offset / 8, len), 1 << (offset % 8))
}

/// Requires `offset < 8 * len`.
pub(crate) unsafe fn test(src: *const u8, offset: usize, len: usize) -> bool {
  debug_assert!(offset < 8 * len, "bit offset {offset} out of range for width {len}");
  let (at, mask) = bit(offset, len);
  // SAFETY: `at < len` given the precondition.
  unsafe { get(src, at) & mask != 0 }
}

/// How [`modify`] changes the bit.
#[derive(Clone, Copy, Debug)]
pub(crate) enum BitOp {
  Compl,
  Set,
  Reset,
}

/// Modify bit `offset`, returning its old value. Requires `offset < 8 * len`.
pub(crate) unsafe fn modify(dst: *mut u8, offset: usize, len: usize, op: BitOp) -> bool {
  debug_assert!(offset < 8 * len, "bit offset {offset} out of range for width {len}");
  let (at, mask) = bit(offset, len);
  // SAFETY: `at < len` given the precondition.
  unsafe {
    let old = get(dst, at);
    let new = match op {
      BitOp::Compl => old ^ mask,
      BitOp::Set => old | mask,
      BitOp::Reset => old & !mask,
    };
    put(dst, at, new);
    old & mask != 0
  }
}
