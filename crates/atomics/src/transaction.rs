//! Transaction status, configuration and result types.
//!
//! # Status Layout
//!
//! A [`TransactionStatus`] packs three fields into a `u32`:
//!
//! | Bits | Field |
//! |------|-------|
//! | `[0, 8)` | [`ExitCode`] |
//! | `[8, 16)` | explicit abort reason (only meaningful with [`ExitCode::AbortExplicit`]) |
//! | `[16, 24)` | [`ExitInfo`] flags |

use core::{
  fmt,
  sync::atomic::{AtomicU8, Ordering},
};

/// How a transaction ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitCode {
  #[default]
  Success = 0,
  AbortUnknown = 1,
  AbortExplicit = 2,
  AbortConflict = 3,
  AbortCapacity = 4,
  AbortDebug = 5,
}

impl ExitCode {
  /// Decode a raw exit code; unrecognised values decode as `AbortUnknown`.
  #[inline]
  #[must_use]
  pub const fn from_raw(raw: u8) -> Self {
    match raw {
      0 => Self::Success,
      2 => Self::AbortExplicit,
      3 => Self::AbortConflict,
      4 => Self::AbortCapacity,
      5 => Self::AbortDebug,
      _ => Self::AbortUnknown,
    }
  }

  #[inline]
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::AbortUnknown => "abort-unknown",
      Self::AbortExplicit => "abort-explicit",
      Self::AbortConflict => "abort-conflict",
      Self::AbortCapacity => "abort-capacity",
      Self::AbortDebug => "abort-debug",
    }
  }
}

impl fmt::Display for ExitCode {
  #[inline]
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

bitflags::bitflags! {
  /// Extra information about how a transaction ended.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct ExitInfo: u8 {
    /// No attempt was made because the attempt budget was zero.
    const ZERO_ATTEMPTS = 1 << 0;
    /// The configured transaction flag was set.
    const FLAG_SET = 1 << 1;
    /// The hardware suggests the transaction may succeed if retried.
    const RETRY = 1 << 2;
    /// The abort happened inside a nested transaction.
    const NESTED = 1 << 3;
  }
}

/// Packed transaction status.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TransactionStatus(u32);

impl TransactionStatus {
  pub const SUCCESS: Self = Self(0);

  /// Explicit abort reason reserved for transaction-flag subscription.
  ///
  /// Bodies should not abort with it. If one does, the abort is reported as
  /// a plain explicit abort unless the configured flag is set at the time.
  pub const FLAG_ABORT_REASON: u8 = 0xFF;

  #[inline]
  #[must_use]
  pub const fn from_raw(raw: u32) -> Self {
    Self(raw)
  }

  #[inline]
  #[must_use]
  pub const fn as_raw(self) -> u32 {
    self.0
  }

  /// Pack a status. `reason` is dropped unless `code` is `AbortExplicit`.
  #[inline]
  #[must_use]
  pub const fn new(code: ExitCode, reason: u8, info: ExitInfo) -> Self {
    let reason = if matches!(code, ExitCode::AbortExplicit) { reason } else { 0 };
    Self(code as u32 | (reason as u32) << 8 | (info.bits() as u32) << 16)
  }

  #[inline]
  #[must_use]
  pub const fn exit_code(self) -> ExitCode {
    ExitCode::from_raw((self.0 & 0xFF) as u8)
  }

  #[inline]
  #[must_use]
  pub const fn exit_info(self) -> ExitInfo {
    ExitInfo::from_bits_truncate(((self.0 >> 16) & 0xFF) as u8)
  }

  #[inline]
  #[must_use]
  pub const fn abort_reason(self) -> u8 {
    if self.0 & 0xFF == ExitCode::AbortExplicit as u32 {
      ((self.0 >> 8) & 0xFF) as u8
    } else {
      0
    }
  }

  #[inline]
  #[must_use]
  pub const fn is_success(self) -> bool {
    self.0 & 0xFF == ExitCode::Success as u32
  }

  /// The same status with `info` added.
  #[inline]
  #[must_use]
  pub const fn with_info(self, info: ExitInfo) -> Self {
    Self(self.0 | (info.bits() as u32) << 16)
  }
}

impl fmt::Debug for TransactionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TransactionStatus")
      .field("code", &self.exit_code())
      .field("reason", &self.abort_reason())
      .field("info", &self.exit_info())
      .finish()
  }
}

/// Exit code of a raw status.
#[inline]
#[must_use]
pub const fn transaction_status_exit_code(status: u32) -> ExitCode {
  TransactionStatus(status).exit_code()
}

/// Exit-info flags of a raw status.
#[inline]
#[must_use]
pub const fn transaction_status_exit_info(status: u32) -> ExitInfo {
  TransactionStatus(status).exit_info()
}

/// Explicit abort reason of a raw status; 0 unless the exit code is
/// `AbortExplicit`.
#[inline]
#[must_use]
pub const fn transaction_status_abort_reason(status: u32) -> u8 {
  TransactionStatus(status).abort_reason()
}

// ─────────────────────────────────────────────────────────────────────────────
// Flag, Config, Result
// ─────────────────────────────────────────────────────────────────────────────

/// A flag that transactional operations can subscribe to.
///
/// A non-transactional fallback path sets the flag for its duration; every
/// transaction configured with the flag aborts while it is set.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct TransactionFlag(AtomicU8);

impl TransactionFlag {
  #[must_use]
  pub const fn new() -> Self {
    Self(AtomicU8::new(0))
  }

  #[inline]
  pub fn is_set(&self) -> bool {
    self.0.load(Ordering::Acquire) != 0
  }

  /// Set the flag, returning whether it was already set.
  #[inline]
  pub fn test_set(&self) -> bool {
    self.0.swap(1, Ordering::Acquire) != 0
  }

  #[inline]
  pub fn clear(&self) {
    self.0.store(0, Ordering::Release);
  }
}

/// Per-call configuration of a transactional operation.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TransactionConfig {
  /// Object width in bytes.
  pub width: usize,
  /// Maximum number of attempts; 0 performs nothing.
  pub attempts: usize,
  /// Optional flag to subscribe to; null for none.
  pub flag: *const TransactionFlag,
}

impl TransactionConfig {
  #[inline]
  #[must_use]
  pub const fn new(width: usize, attempts: usize) -> Self {
    Self {
      width,
      attempts,
      flag: core::ptr::null(),
    }
  }

  #[inline]
  #[must_use]
  pub const fn with_flag(mut self, flag: &TransactionFlag) -> Self {
    self.flag = flag;
    self
  }
}

/// Outcome of a transactional operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TransactionResult {
  pub status: TransactionStatus,
  pub attempts_made: usize,
}

impl TransactionResult {
  /// Result of a call configured with zero attempts.
  pub const ZERO_ATTEMPTS: Self = Self {
    status: TransactionStatus::new(ExitCode::AbortUnknown, 0, ExitInfo::ZERO_ATTEMPTS),
    attempts_made: 0,
  };

  #[inline]
  #[must_use]
  pub const fn is_success(&self) -> bool {
    self.status.is_success()
  }
}

/// One leg of a multi-object compare-exchange.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct CmpxchgDesc {
  pub obj: *mut u8,
  pub expected: *mut u8,
  pub desired: *const u8,
}

/// Recommended minimum attempt counts for transactional operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct RecommendedRetryConfig {
  /// For read-modify-write operations.
  pub min_rmw: usize,
  /// For loads.
  pub min_load: usize,
}

impl RecommendedRetryConfig {
  /// Elementwise maximum.
  #[inline]
  #[must_use]
  pub const fn max(self, other: Self) -> Self {
    Self {
      min_rmw: if self.min_rmw > other.min_rmw { self.min_rmw } else { other.min_rmw },
      min_load: if self.min_load > other.min_load { self.min_load } else { other.min_load },
    }
  }
}

/// Bound on buffer sizes raw transactional code may copy or fill safely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct SafeStringInfo {
  /// Largest safe length in bytes; 0 when no raw transactional ops exist.
  pub magic_size: usize,
}
