//! Fuzz target for table construction.
//!
//! Arbitrary id lists, widths and options must never fail, and the result
//! must not depend on ids that are null, unregistered or repeated.

#![no_main]

use arbitrary::Arbitrary;
use atomics::{
  Alignment, ImplId, MemoryOrder, OpCategory, Options, Selection, create, create_explicit, feature_check_any,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
  raw_ids: Vec<u32>,
  width: u8,
  order: u8,
  options: u32,
}

fuzz_target!(|input: Input| {
  let ids: Vec<ImplId> = input.raw_ids.iter().map(|&r| ImplId::try_from(r).unwrap_or_default()).collect();
  let order = MemoryOrder::ALL[usize::from(input.order) % MemoryOrder::ALL.len()];
  let options = Options::from_raw(input.options);
  let width = usize::from(input.width);

  let a = create(width, order, options, Selection::Ids(&ids));
  assert!(a.align >= Alignment::PERMISSIVE);
  if a.ops.is_empty() {
    assert!(feature_check_any(&a.ops, OpCategory::IMPLICIT).is_empty());
  }
  if ids.iter().all(|id| id.is_null()) {
    assert!(a.ops.is_empty());
    assert_eq!(a.align, Alignment::PERMISSIVE);
  }

  let mut doubled = ids.clone();
  doubled.extend_from_slice(&ids);
  let again = create(width, order, options, Selection::Ids(&doubled));
  assert_eq!(a.align, again.align);
  assert_eq!(a.ops.store.map(|f| f as usize), again.ops.store.map(|f| f as usize));

  let x = create_explicit(width, options, Selection::Ids(&ids));
  assert_eq!(x.align, a.align);
});
