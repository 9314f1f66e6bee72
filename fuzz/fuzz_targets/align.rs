//! Fuzz target for the alignment comparator and checks.
//!
//! The comparator must be a total order; the checks must agree with a
//! direct computation on the address.

#![no_main]

use core::cmp::Ordering;

use arbitrary::Arbitrary;
use atomics::{Alignment, align_compare};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
  a: (u8, u8, u16),
  b: (u8, u8, u16),
  c: (u8, u8, u16),
  addr: usize,
  width: u8,
}

fn alignment((r, m, s): (u8, u8, u16)) -> Alignment {
  let r = 1usize << (r % 12);
  let m = 1usize << (m % 12);
  Alignment::new(r.max(m), r.min(m), usize::from(s))
}

fuzz_target!(|input: Input| {
  let (a, b, c) = (alignment(input.a), alignment(input.b), alignment(input.c));

  assert_eq!(a.compare(&a), Ordering::Equal);
  assert_eq!(a.compare(&b), b.compare(&a).reverse());
  assert_eq!(align_compare(a, b).signum(), a.compare(&b) as i32);
  if a <= b && b <= c {
    assert!(a <= c);
  }
  let s = a.stricter(b);
  assert!(s >= a && s >= b);

  let ptr = input.addr as *const u8;
  let width = usize::from(input.width);
  assert_eq!(a.meets_recommended(ptr), input.addr % a.recommended == 0);
  let in_window = a.size_within == 0 || input.addr % a.size_within + width <= a.size_within;
  assert_eq!(a.meets_minimum(ptr, width), input.addr % a.minimum == 0 && in_window);
});
