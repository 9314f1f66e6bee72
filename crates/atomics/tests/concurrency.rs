//! Composed operations used from several threads at once.
#![allow(unsafe_code)]

use core::{cell::UnsafeCell, sync::atomic::AtomicU64};
use std::thread;

use atomics::{
  ImplSet, KindSet, MemoryOrder, Options, Selection, TransactionConfig, TransactionFlag, create, create_explicit,
  create_transaction, get_ids,
};

const THREADS: usize = 4;
const ITERS: u64 = 10_000;

#[cfg(target_has_atomic = "64")]
#[test]
fn implicit_fetch_add_is_atomic() {
  let a = create(8, MemoryOrder::Relaxed, Options::NONE, Selection::All);
  let (Some(inc), Some(load)) = (a.ops.arithmetic_ops.inc, a.ops.load) else {
    panic!("8-byte inc and load must be available");
  };
  let obj = AtomicU64::new(0);

  thread::scope(|s| {
    for _ in 0..THREADS {
      s.spawn(|| {
        for _ in 0..ITERS {
          // SAFETY: `obj` is an aligned 8-byte atomic.
          unsafe { inc(obj.as_ptr().cast()) };
        }
      });
    }
  });

  let mut out = 0u64;
  // SAFETY: as above; `out` is 8 bytes.
  unsafe { load(obj.as_ptr().cast(), (&raw mut out).cast()) };
  assert_eq!(out, THREADS as u64 * ITERS);
}

#[cfg(target_has_atomic = "64")]
#[test]
fn explicit_cmpxchg_loop_is_atomic() {
  let x = create_explicit(8, Options::NONE, Selection::All);
  let (Some(load), Some(cmpxchg)) = (x.ops.load, x.ops.xchg_ops.cmpxchg_weak) else {
    panic!("8-byte load and cmpxchg must be available");
  };
  let obj = AtomicU64::new(0);

  thread::scope(|s| {
    for _ in 0..THREADS {
      s.spawn(|| {
        let p = obj.as_ptr().cast::<u8>();
        let mut cur = 0u64;
        // SAFETY: `p` is an aligned 8-byte atomic; locals are 8 bytes.
        unsafe { load(p, (&raw mut cur).cast(), MemoryOrder::Relaxed) };
        for _ in 0..ITERS {
          loop {
            let next = cur + 1;
            // SAFETY: as above.
            let ok = unsafe {
              cmpxchg(
                p,
                (&raw mut cur).cast(),
                (&raw const next).cast(),
                MemoryOrder::AcqRel,
                MemoryOrder::Acquire,
              )
            };
            if ok {
              cur = next;
              break;
            }
          }
        }
      });
    }
  });

  assert_eq!(obj.into_inner(), THREADS as u64 * ITERS);
}

struct Shared(UnsafeCell<u64>);

// SAFETY: every access below happens inside a committed transaction or
// while holding the transaction flag.
unsafe impl Sync for Shared {}

impl Shared {
  fn ptr(&self) -> *mut u64 {
    self.0.get()
  }
}

#[test]
fn transactions_and_fallback_exclude_each_other() {
  if !get_ids(KindSet::ALL).contains(ImplSet::TSX) {
    return;
  }
  let t = create_transaction(Options::NONE, Selection::All);
  let Some(generic_wfb) = t.ops.special_ops.generic_wfb else {
    panic!("rtm provides generic_wfb");
  };
  let flag = TransactionFlag::new();
  let counter = Shared(UnsafeCell::new(0));
  let per_thread = 2_000u64;

  thread::scope(|s| {
    for _ in 0..THREADS {
      s.spawn(|| {
        let config = TransactionConfig::new(8, t.recommended.min_rmw).with_flag(&flag);
        for _ in 0..per_thread {
          let p = counter.ptr();
          // SAFETY: `p` is valid for the scope; see `Shared`.
          let mut bump = || unsafe { p.write_volatile(p.read_volatile() + 1) };
          // SAFETY: as above; runs only while the flag is held.
          let mut bump_fallback = || unsafe { p.write_volatile(p.read_volatile() + 1) };
          // SAFETY: RTM is available and `flag` outlives the call.
          unsafe { generic_wfb(&mut bump, &mut bump_fallback, config) };
        }
      });
    }
  });

  assert_eq!(counter.0.into_inner(), THREADS as u64 * per_thread);
  assert!(!flag.is_set());
}
