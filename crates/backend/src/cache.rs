//! Lazy caching for values derived from detected capabilities.
//!
//! [`OnceCache`] has the semantics of `std::sync::OnceLock` for `Copy`
//! values but also works on `no_std` targets.
//!
//! # Caching Strategy
//!
//! - **std**: Uses `OnceLock` for thread-safe lazy initialization
//! - **no_std with atomics**: Uses an atomic state machine
//! - **no_std without atomics**: Per-call computation (single-threaded targets)

#[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
use core::{cell::UnsafeCell, mem::MaybeUninit};

/// A write-once cache for a `Copy` value.
///
/// - Zero-cost after first initialization (one acquire load)
/// - Thread-safe on targets with atomics; the initializer runs at most once
/// - Falls back to per-call computation on targets without atomics
pub struct OnceCache<T: Copy> {
  #[cfg(feature = "std")]
  inner: std::sync::OnceLock<T>,

  #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
  state: core::sync::atomic::AtomicU8,
  #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
  value: UnsafeCell<MaybeUninit<T>>,

  #[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
  _marker: core::marker::PhantomData<*const T>,
}

// SAFETY: the value is only written once, by the thread that moved the state
// from UNINIT to INITING, and only read after READY is published with Release.
#[allow(unsafe_code)]
#[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
unsafe impl<T: Copy + Send + Sync> Sync for OnceCache<T> {}

// SAFETY: targets without atomics are single-threaded.
#[allow(unsafe_code)]
#[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
unsafe impl<T: Copy + Send + Sync> Sync for OnceCache<T> {}

impl<T: Copy> OnceCache<T> {
  #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
  const UNINIT: u8 = 0;
  #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
  const INITING: u8 = 1;
  #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
  const READY: u8 = 2;

  /// Create a new empty cache.
  #[must_use]
  pub const fn new() -> Self {
    Self {
      #[cfg(feature = "std")]
      inner: std::sync::OnceLock::new(),

      #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
      state: core::sync::atomic::AtomicU8::new(0),
      #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
      value: UnsafeCell::new(MaybeUninit::uninit()),

      #[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
      _marker: core::marker::PhantomData,
    }
  }

  /// Get the cached value, initializing with `f` if not yet set.
  #[inline]
  pub fn get_or_init(&self, f: impl FnOnce() -> T) -> T {
    #[cfg(feature = "std")]
    {
      *self.inner.get_or_init(f)
    }

    #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
    {
      use core::sync::atomic::Ordering;

      if self.state.load(Ordering::Acquire) != Self::READY {
        if self
          .state
          .compare_exchange(Self::UNINIT, Self::INITING, Ordering::AcqRel, Ordering::Acquire)
          .is_ok()
        {
          let value = f();
          // SAFETY: exclusive access while in INITING.
          #[allow(unsafe_code)]
          unsafe {
            (*self.value.get()).write(value);
          }
          self.state.store(Self::READY, Ordering::Release);
          return value;
        }
        while self.state.load(Ordering::Acquire) != Self::READY {
          core::hint::spin_loop();
        }
      }
      // SAFETY: initialized once READY is observed.
      #[allow(unsafe_code)]
      unsafe {
        (*self.value.get()).assume_init()
      }
    }

    #[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
    {
      f()
    }
  }

  /// The cached value, if initialized.
  #[inline]
  #[must_use]
  pub fn get(&self) -> Option<T> {
    #[cfg(feature = "std")]
    {
      self.inner.get().copied()
    }

    #[cfg(all(not(feature = "std"), target_has_atomic = "8"))]
    {
      use core::sync::atomic::Ordering;

      if self.state.load(Ordering::Acquire) != Self::READY {
        return None;
      }
      // SAFETY: initialized once READY is observed.
      #[allow(unsafe_code)]
      Some(unsafe { (*self.value.get()).assume_init() })
    }

    #[cfg(all(not(feature = "std"), not(target_has_atomic = "8")))]
    {
      None
    }
  }
}

impl<T: Copy> Default for OnceCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Copy + core::fmt::Debug> core::fmt::Debug for OnceCache<T> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_tuple("OnceCache").field(&self.get()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initializes_once() {
    static CACHE: OnceCache<(u32, u64)> = OnceCache::new();

    assert_eq!(CACHE.get(), None);

    let mut calls = 0;
    let first = CACHE.get_or_init(|| {
      calls += 1;
      (42, 123)
    });
    let second = CACHE.get_or_init(|| {
      calls += 1;
      (99, 999)
    });

    assert_eq!(first, (42, 123));
    assert_eq!(second, (42, 123));
    assert_eq!(CACHE.get(), Some((42, 123)));
    assert_eq!(calls, 1);
  }

  #[cfg(feature = "std")]
  #[test]
  fn concurrent_init_agrees() {
    use std::{thread, vec::Vec};

    static CACHE: OnceCache<usize> = OnceCache::new();

    let seen: Vec<usize> = thread::scope(|s| {
      let handles: Vec<_> = (0..8).map(|i| s.spawn(move || CACHE.get_or_init(|| i + 1))).collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
  }
}
