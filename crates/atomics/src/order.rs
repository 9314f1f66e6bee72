//! Memory orders and their validity rules.
//!
//! Orders are ordinal, weakest to strongest. `Consume` is accepted everywhere
//! `Acquire` is and is always executed as `Acquire`.
//!
//! | Order | Raw | Store | Load | RMW |
//! |-------|-----|-------|------|-----|
//! | Relaxed | 0 | yes | yes | yes |
//! | Consume | 1 | no | yes | yes |
//! | Acquire | 2 | no | yes | yes |
//! | Release | 3 | yes | no | yes |
//! | AcqRel | 4 | no | no | yes |
//! | SeqCst | 5 | yes | yes | yes |
//!
//! The free functions take raw `u32` values so they stay total over inputs
//! that are not valid orders at all; the [`MemoryOrder`] methods are the
//! typed equivalents.

use core::{fmt, sync::atomic::Ordering};

/// A memory order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum MemoryOrder {
  Relaxed = 0,
  Consume = 1,
  Acquire = 2,
  Release = 3,
  AcqRel = 4,
  #[default]
  SeqCst = 5,
}

/// A raw value that is not a memory order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a valid memory order")]
pub struct InvalidMemoryOrder(pub u32);

impl MemoryOrder {
  /// All orders, weakest first.
  pub const ALL: [Self; 6] = [
    Self::Relaxed,
    Self::Consume,
    Self::Acquire,
    Self::Release,
    Self::AcqRel,
    Self::SeqCst,
  ];

  /// Typed order from a raw value.
  #[inline]
  #[must_use]
  pub const fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      0 => Some(Self::Relaxed),
      1 => Some(Self::Consume),
      2 => Some(Self::Acquire),
      3 => Some(Self::Release),
      4 => Some(Self::AcqRel),
      5 => Some(Self::SeqCst),
      _ => None,
    }
  }

  #[inline]
  #[must_use]
  pub const fn as_raw(self) -> u32 {
    self as u32
  }

  #[inline]
  #[must_use]
  pub const fn is_valid_store(self) -> bool {
    is_valid_store_order(self.as_raw())
  }

  #[inline]
  #[must_use]
  pub const fn is_valid_load(self) -> bool {
    is_valid_load_order(self.as_raw())
  }

  /// Whether `fail` may be used as the failure order of a compare-exchange
  /// whose success order is `self`.
  #[inline]
  #[must_use]
  pub const fn is_valid_fail(self, fail: Self) -> bool {
    is_valid_fail_order(self.as_raw(), fail.as_raw())
  }

  /// The strongest failure order implied by `self` as a success order.
  #[inline]
  #[must_use]
  pub const fn cmpxchg_fail_order(self) -> Self {
    match self {
      Self::Release | Self::AcqRel => Self::Acquire,
      other => other,
    }
  }

  /// Equivalent `core` ordering for a read-modify-write.
  #[inline]
  #[must_use]
  pub const fn to_rmw(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Consume | Self::Acquire => Ordering::Acquire,
      Self::Release => Ordering::Release,
      Self::AcqRel => Ordering::AcqRel,
      Self::SeqCst => Ordering::SeqCst,
    }
  }

  /// Equivalent `core` ordering for a store.
  ///
  /// Orders that are not valid for stores are strengthened to `SeqCst`.
  #[inline]
  #[must_use]
  pub const fn to_store(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Release => Ordering::Release,
      _ => Ordering::SeqCst,
    }
  }

  /// Equivalent `core` ordering for a load (also a compare-exchange failure).
  ///
  /// Orders that are not valid for loads are strengthened to `SeqCst`.
  #[inline]
  #[must_use]
  pub const fn to_load(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Consume | Self::Acquire => Ordering::Acquire,
      _ => Ordering::SeqCst,
    }
  }

  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Relaxed => "relaxed",
      Self::Consume => "consume",
      Self::Acquire => "acquire",
      Self::Release => "release",
      Self::AcqRel => "acq_rel",
      Self::SeqCst => "seq_cst",
    }
  }
}

impl TryFrom<u32> for MemoryOrder {
  type Error = InvalidMemoryOrder;

  #[inline]
  fn try_from(raw: u32) -> Result<Self, Self::Error> {
    Self::from_raw(raw).ok_or(InvalidMemoryOrder(raw))
  }
}

impl From<MemoryOrder> for u32 {
  #[inline]
  fn from(order: MemoryOrder) -> Self {
    order.as_raw()
  }
}

impl fmt::Display for MemoryOrder {
  #[inline]
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw Validators
// ─────────────────────────────────────────────────────────────────────────────

const RELAXED: u32 = MemoryOrder::Relaxed as u32;
const CONSUME: u32 = MemoryOrder::Consume as u32;
const ACQUIRE: u32 = MemoryOrder::Acquire as u32;
const RELEASE: u32 = MemoryOrder::Release as u32;
const ACQ_REL: u32 = MemoryOrder::AcqRel as u32;
const SEQ_CST: u32 = MemoryOrder::SeqCst as u32;

/// Whether `order` is any memory order.
#[inline]
#[must_use]
pub const fn is_valid_order(order: u32) -> bool {
  order <= SEQ_CST
}

/// Whether `order` is valid for a store.
#[inline]
#[must_use]
pub const fn is_valid_store_order(order: u32) -> bool {
  matches!(order, RELAXED | RELEASE | SEQ_CST)
}

/// Whether `order` is valid for a load.
#[inline]
#[must_use]
pub const fn is_valid_load_order(order: u32) -> bool {
  matches!(order, RELAXED | CONSUME | ACQUIRE | SEQ_CST)
}

/// Whether (`succ`, `fail`) is a valid compare-exchange order pair.
#[inline]
#[must_use]
pub const fn is_valid_fail_order(succ: u32, fail: u32) -> bool {
  is_valid_order(succ) && is_valid_load_order(fail) && fail <= succ
}

/// Failure order implied by a success order; invalid input is returned unchanged.
#[inline]
#[must_use]
pub const fn cmpxchg_fail_order(succ: u32) -> u32 {
  match succ {
    RELEASE | ACQ_REL => ACQUIRE,
    other => other,
  }
}
