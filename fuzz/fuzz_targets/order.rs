//! Fuzz target for memory-order validation.
//!
//! Checks the validator laws on arbitrary raw values, including invalid ones.

#![no_main]

use atomics::{
  MemoryOrder, cmpxchg_fail_order, is_valid_fail_order, is_valid_load_order, is_valid_order, is_valid_store_order,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u32, u32)| {
  let (succ, fail) = input;

  if is_valid_store_order(succ) || is_valid_load_order(succ) {
    assert!(is_valid_order(succ));
  }
  if is_valid_fail_order(succ, fail) {
    assert!(is_valid_order(succ) && is_valid_load_order(fail) && fail <= succ);
  }

  let implied = cmpxchg_fail_order(succ);
  if is_valid_order(succ) {
    assert!(is_valid_fail_order(succ, implied));
  } else {
    assert_eq!(implied, succ);
  }

  match MemoryOrder::try_from(succ) {
    Ok(order) => {
      assert_eq!(order.as_raw(), succ);
      assert_eq!(order.is_valid_store(), is_valid_store_order(succ));
      assert_eq!(order.cmpxchg_fail_order().as_raw(), implied);
    }
    Err(_) => assert!(!is_valid_order(succ)),
  }
});
