//! Transactional operations via x86_64 Restricted Transactional Memory.
//!
//! RTM has no width limit beyond what fits in the transactional read and
//! write sets, so every operation takes its width from the
//! [`TransactionConfig`] and works on byte spans.
//!
//! The instructions are emitted as raw bytes so the assembler does not need
//! the `rtm` target feature. Nothing here runs unless the registry found RTM
//! at runtime.
//!
//! # Attempts
//!
//! An operation retries up to `config.attempts` times. It stops early after
//! an explicit abort that did not come from the transaction flag. With a
//! flag configured, every attempt reads the flag first and aborts with
//! [`TransactionStatus::FLAG_ABORT_REASON`] while it is set.
//!
//! Reason `0xFF` is reserved for that flag abort. A body that aborts with it
//! itself is still told apart: the abort only counts as a flag abort when
//! the flag is set once control is back outside the transaction.

use core::arch::asm;

use super::bytes::{self, BitOp};
use crate::{
  align::Alignment,
  merge::{Atomic, AtomicExplicit, AtomicTransaction, Merge},
  ops::{
    ArithmeticOps, BinaryOps, BitwiseOps, FlagOps, OpsTransaction, RawOps, SpecialOps, XchgOps,
  },
  order::MemoryOrder,
  transaction::{
    CmpxchgDesc, ExitCode, ExitInfo, RecommendedRetryConfig, SafeStringInfo, TransactionConfig, TransactionFlag,
    TransactionResult, TransactionStatus,
  },
};

/// Tuning hints reported with the table.
const RECOMMENDED: RecommendedRetryConfig = RecommendedRetryConfig {
  min_rmw: 20,
  min_load: 10,
};

/// One page: raw transactional copies within it never fault on a mapped page.
const MAGIC_SIZE: usize = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// Instructions
// ─────────────────────────────────────────────────────────────────────────────

/// `xbegin` returns this when the transaction started.
const XBEGIN_STARTED: u32 = u32::MAX;

/// Start a transaction. On abort, execution resumes here with the abort
/// status instead of [`XBEGIN_STARTED`].
#[inline(always)]
unsafe fn xbegin() -> u32 {
  let mut status = XBEGIN_STARTED;
  // SAFETY: caller guarantees RTM support. The fallback address is the next
  // instruction, so both outcomes leave the block normally.
  unsafe {
    // xbegin rel32 = 0
    asm!(".byte 0xc7, 0xf8, 0x00, 0x00, 0x00, 0x00", inout("eax") status, options(nostack));
  }
  status
}

/// Commit the innermost transaction. Faults outside a transaction.
#[inline(always)]
unsafe fn xend() {
  // SAFETY: caller guarantees RTM support and an active transaction.
  unsafe { asm!(".byte 0x0f, 0x01, 0xd5", options(nostack)) }
}

/// Whether execution is transactional.
#[inline(always)]
unsafe fn xtest() -> bool {
  let inside: u8;
  // SAFETY: caller guarantees RTM support.
  unsafe {
    asm!(
      ".byte 0x0f, 0x01, 0xd6",
      "setnz {inside}",
      inside = out(reg_byte) inside,
      options(nomem, nostack),
    );
  }
  inside != 0
}

/// Abort with a constant reason. A no-op outside a transaction.
#[inline(always)]
unsafe fn xabort<const REASON: u8>() {
  // SAFETY: caller guarantees RTM support.
  unsafe { asm!(".byte 0xc6, 0xf8, {reason}", reason = const REASON, options(nostack)) }
}

macro_rules! xabort_low {
  ($hi:literal, $low:expr) => {
    match $low {
      0 => xabort::<{ $hi * 16 }>(),
      1 => xabort::<{ $hi * 16 + 1 }>(),
      2 => xabort::<{ $hi * 16 + 2 }>(),
      3 => xabort::<{ $hi * 16 + 3 }>(),
      4 => xabort::<{ $hi * 16 + 4 }>(),
      5 => xabort::<{ $hi * 16 + 5 }>(),
      6 => xabort::<{ $hi * 16 + 6 }>(),
      7 => xabort::<{ $hi * 16 + 7 }>(),
      8 => xabort::<{ $hi * 16 + 8 }>(),
      9 => xabort::<{ $hi * 16 + 9 }>(),
      10 => xabort::<{ $hi * 16 + 10 }>(),
      11 => xabort::<{ $hi * 16 + 11 }>(),
      12 => xabort::<{ $hi * 16 + 12 }>(),
      13 => xabort::<{ $hi * 16 + 13 }>(),
      14 => xabort::<{ $hi * 16 + 14 }>(),
      _ => xabort::<{ $hi * 16 + 15 }>(),
    }
  };
}

/// Abort with a runtime reason. The instruction takes an immediate, so the
/// reason is dispatched to one of 256 instantiations.
unsafe fn xabort_dyn(reason: u8) {
  let low = reason & 0x0F;
  // SAFETY: caller guarantees RTM support.
  unsafe {
    match reason >> 4 {
      0 => xabort_low!(0, low),
      1 => xabort_low!(1, low),
      2 => xabort_low!(2, low),
      3 => xabort_low!(3, low),
      4 => xabort_low!(4, low),
      5 => xabort_low!(5, low),
      6 => xabort_low!(6, low),
      7 => xabort_low!(7, low),
      8 => xabort_low!(8, low),
      9 => xabort_low!(9, low),
      10 => xabort_low!(10, low),
      11 => xabort_low!(11, low),
      12 => xabort_low!(12, low),
      13 => xabort_low!(13, low),
      14 => xabort_low!(14, low),
      _ => xabort_low!(15, low),
    }
  }
}

/// Translate an RTM abort status (`eax` after an abort).
fn decode_rtm_status(raw: u32) -> TransactionStatus {
  const EXPLICIT: u32 = 1 << 0;
  const RETRY: u32 = 1 << 1;
  const CONFLICT: u32 = 1 << 2;
  const CAPACITY: u32 = 1 << 3;
  const DEBUG: u32 = 1 << 4;
  const NESTED: u32 = 1 << 5;

  let code = if raw & EXPLICIT != 0 {
    ExitCode::AbortExplicit
  } else if raw & CONFLICT != 0 {
    ExitCode::AbortConflict
  } else if raw & CAPACITY != 0 {
    ExitCode::AbortCapacity
  } else if raw & DEBUG != 0 {
    ExitCode::AbortDebug
  } else {
    ExitCode::AbortUnknown
  };

  let mut info = ExitInfo::empty();
  info.set(ExitInfo::RETRY, raw & RETRY != 0);
  info.set(ExitInfo::NESTED, raw & NESTED != 0);
  TransactionStatus::new(code, (raw >> 24) as u8, info)
}

// ─────────────────────────────────────────────────────────────────────────────
// Attempt Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Run `body` transactionally, returning its value if an attempt committed.
///
/// # Safety
///
/// RTM must be available and `config.flag` must be null or valid.
unsafe fn run<R>(config: TransactionConfig, mut body: impl FnMut() -> R) -> (Option<R>, TransactionResult) {
  if config.attempts == 0 {
    return (None, TransactionResult::ZERO_ATTEMPTS);
  }
  // SAFETY: caller guarantees the flag is null or valid.
  let flag = unsafe { config.flag.as_ref() };

  let mut attempts_made = 0;
  let mut status = TransactionStatus::SUCCESS;
  while attempts_made < config.attempts {
    attempts_made += 1;
    // SAFETY: RTM is available.
    let raw = unsafe { xbegin() };
    if raw == XBEGIN_STARTED {
      // Reading the flag puts it in the read set, so a later `test_set`
      // from a fallback path aborts this attempt.
      if flag.is_some_and(TransactionFlag::is_set) {
        // SAFETY: RTM is available.
        unsafe { xabort::<{ TransactionStatus::FLAG_ABORT_REASON }>() };
      }
      let value = body();
      // SAFETY: the transaction started above and is still active.
      unsafe { xend() };
      let result = TransactionResult {
        status: TransactionStatus::SUCCESS,
        attempts_made,
      };
      return (Some(value), result);
    }

    let (aborted, retry) = classify_abort(decode_rtm_status(raw), flag);
    status = aborted;
    if !retry {
      break;
    }
  }
  (None, TransactionResult { status, attempts_made })
}

/// Status to report for an aborted attempt, and whether another attempt may
/// follow.
///
/// An explicit abort with [`TransactionStatus::FLAG_ABORT_REASON`] is a flag
/// abort only while `flag` is set; otherwise the body chose that reason and
/// the loop stops like it does for any other explicit abort. A holder that
/// clears the flag between the abort and this check turns a flag abort into
/// a stop, which only costs the remaining attempts.
fn classify_abort(status: TransactionStatus, flag: Option<&TransactionFlag>) -> (TransactionStatus, bool) {
  if status.exit_code() != ExitCode::AbortExplicit {
    return (status, true);
  }
  if status.abort_reason() == TransactionStatus::FLAG_ABORT_REASON && flag.is_some_and(TransactionFlag::is_set) {
    return (status.with_info(ExitInfo::FLAG_SET), true);
  }
  (status, false)
}

/// Run a body without a result, keeping only the outcome.
#[inline(always)]
unsafe fn run_void(config: TransactionConfig, body: impl FnMut()) -> TransactionResult {
  // SAFETY: forwarded.
  unsafe { run(config, body).1 }
}

/// Run a body with a boolean answer; `false` when nothing committed.
#[inline(always)]
unsafe fn run_bool(config: TransactionConfig, body: impl FnMut() -> bool) -> (bool, TransactionResult) {
  // SAFETY: forwarded.
  let (value, result) = unsafe { run(config, body) };
  (value.unwrap_or(false), result)
}

// ─────────────────────────────────────────────────────────────────────────────
// Object Operations
// ─────────────────────────────────────────────────────────────────────────────
//
// SAFETY (every function below): the caller upholds the table's calling
// convention for `config.width` bytes and RTM is available because the
// registry only offers this table when it was detected.

unsafe fn store(obj: *mut u8, desired: *const u8, config: TransactionConfig) -> TransactionResult {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_void(config, || bytes::copy(obj, desired, w)) }
}

unsafe fn load(obj: *const u8, ret: *mut u8, config: TransactionConfig) -> TransactionResult {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_void(config, || bytes::copy(ret, obj, w)) }
}

unsafe fn exchange(obj: *mut u8, desired: *const u8, ret: *mut u8, config: TransactionConfig) -> TransactionResult {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  unsafe {
    run_void(config, || {
      bytes::copy(ret, obj, w);
      bytes::copy(obj, desired, w);
    })
  }
}

/// Compare and swap inside an active transaction.
#[inline(always)]
unsafe fn cas_in_tx(obj: *mut u8, expected: *mut u8, desired: *const u8, w: usize) -> bool {
  // SAFETY: the caller upholds the calling convention.
  unsafe {
    if bytes::eq(obj, expected, w) {
      bytes::copy(obj, desired, w);
      true
    } else {
      bytes::copy(expected, obj, w);
      false
    }
  }
}

unsafe fn cmpxchg(
  obj: *mut u8,
  expected: *mut u8,
  desired: *const u8,
  config: TransactionConfig,
) -> (bool, TransactionResult) {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_bool(config, || cas_in_tx(obj, expected, desired, w)) }
}

unsafe fn test(obj: *const u8, offset: usize, config: TransactionConfig) -> (bool, TransactionResult) {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_bool(config, || bytes::test(obj, offset, w)) }
}

macro_rules! test_modify {
  ($($name:ident => $op:ident;)*) => {$(
    unsafe fn $name(obj: *mut u8, offset: usize, config: TransactionConfig) -> (bool, TransactionResult) {
      let w = config.width;
      // SAFETY: the caller upholds the calling convention.
      unsafe { run_bool(config, || bytes::modify(obj, offset, w, BitOp::$op)) }
    }
  )*};
}

test_modify! {
  test_compl => Compl;
  test_set => Set;
  test_reset => Reset;
}

macro_rules! binary {
  ($($void:ident $fetch:ident => $op:ident;)*) => {$(
    unsafe fn $void(obj: *mut u8, arg: *const u8, config: TransactionConfig) -> TransactionResult {
      let w = config.width;
      // SAFETY: the caller upholds the calling convention.
      unsafe { run_void(config, || bytes::$op(obj, arg, w)) }
    }

    unsafe fn $fetch(obj: *mut u8, arg: *const u8, ret: *mut u8, config: TransactionConfig) -> TransactionResult {
      let w = config.width;
      // SAFETY: the caller upholds the calling convention.
      unsafe {
        run_void(config, || {
          bytes::copy(ret, obj, w);
          bytes::$op(obj, arg, w);
        })
      }
    }
  )*};
}

macro_rules! unary {
  ($($void:ident $fetch:ident => $op:ident;)*) => {$(
    unsafe fn $void(obj: *mut u8, config: TransactionConfig) -> TransactionResult {
      let w = config.width;
      // SAFETY: the caller upholds the calling convention.
      unsafe { run_void(config, || bytes::$op(obj, w)) }
    }

    unsafe fn $fetch(obj: *mut u8, ret: *mut u8, config: TransactionConfig) -> TransactionResult {
      let w = config.width;
      // SAFETY: the caller upholds the calling convention.
      unsafe {
        run_void(config, || {
          bytes::copy(ret, obj, w);
          bytes::$op(obj, w);
        })
      }
    }
  )*};
}

binary! {
  or fetch_or => or;
  xor fetch_xor => xor;
  and fetch_and => and;
  add fetch_add => add;
  sub fetch_sub => sub;
}

unary! {
  not fetch_not => not;
  inc fetch_inc => inc;
  dec fetch_dec => dec;
  neg fetch_neg => neg;
}

// ─────────────────────────────────────────────────────────────────────────────
// Special Operations
// ─────────────────────────────────────────────────────────────────────────────

/// Check every leg first; write only if all match, otherwise report the
/// current values back through every `expected`.
#[inline(always)]
unsafe fn multi_cas_in_tx(descs: &[CmpxchgDesc], w: usize) -> bool {
  // SAFETY: the caller upholds the calling convention.
  unsafe {
    let all_match = descs.iter().all(|d| bytes::eq(d.obj, d.expected, w));
    for d in descs {
      if all_match {
        bytes::copy(d.obj, d.desired, w);
      } else {
        bytes::copy(d.expected, d.obj, w);
      }
    }
    all_match
  }
}

unsafe fn double_cmpxchg(a: CmpxchgDesc, b: CmpxchgDesc, config: TransactionConfig) -> (bool, TransactionResult) {
  let w = config.width;
  let descs = [a, b];
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_bool(config, || multi_cas_in_tx(&descs, w)) }
}

unsafe fn multi_cmpxchg(
  descs: *const CmpxchgDesc,
  len: usize,
  config: TransactionConfig,
) -> (bool, TransactionResult) {
  let w = config.width;
  // SAFETY: the caller upholds the calling convention.
  let descs = if len == 0 { &[][..] } else { unsafe { core::slice::from_raw_parts(descs, len) } };
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_bool(config, || multi_cas_in_tx(descs, w)) }
}

unsafe fn generic(func: &mut dyn FnMut(), config: TransactionConfig) -> TransactionResult {
  // SAFETY: the caller upholds the calling convention.
  unsafe { run_void(config, func) }
}

/// Try `func` transactionally, then run `fallback` once outside a
/// transaction. With a flag configured the fallback holds the flag, which
/// aborts every subscribed transaction until it is cleared.
unsafe fn generic_wfb(
  func: &mut dyn FnMut(),
  fallback: &mut dyn FnMut(),
  config: TransactionConfig,
) -> (bool, TransactionResult) {
  // SAFETY: the caller upholds the calling convention.
  let (done, result) = unsafe { run(config, &mut *func) };
  if done.is_some() {
    return (true, result);
  }
  // SAFETY: the caller guarantees `config.flag` is null or valid.
  match unsafe { config.flag.as_ref() } {
    Some(flag) => {
      while flag.test_set() {
        core::hint::spin_loop();
      }
      fallback();
      flag.clear();
    }
    None => fallback(),
  }
  (false, result)
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw Operations
// ─────────────────────────────────────────────────────────────────────────────

unsafe fn tbegin() -> TransactionStatus {
  // SAFETY: the caller upholds the calling convention.
  let raw = unsafe { xbegin() };
  if raw == XBEGIN_STARTED {
    TransactionStatus::SUCCESS
  } else {
    decode_rtm_status(raw)
  }
}

unsafe fn tabort_all(reason: u8) {
  // SAFETY: the caller upholds the calling convention.
  unsafe { xabort_dyn(reason) }
}

/// Commit if inside a transaction; a no-op otherwise.
unsafe fn tcommit() {
  // SAFETY: the caller upholds the calling convention.
  unsafe {
    if xtest() {
      xend();
    }
  }
}

fn ttest() -> bool {
  // SAFETY: only reachable through a table built after RTM was detected.
  unsafe { xtest() }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter Entry Points
// ─────────────────────────────────────────────────────────────────────────────

/// No fixed-order operations.
pub(super) fn implicit(_width: usize, _order: MemoryOrder) -> Atomic {
  Atomic::empty()
}

/// No per-call-order operations.
pub(super) fn explicit(_width: usize) -> AtomicExplicit {
  AtomicExplicit::empty()
}

pub(super) fn transaction() -> AtomicTransaction {
  let ops = OpsTransaction {
    store: Some(store),
    load: Some(load),
    xchg_ops: XchgOps {
      exchange: Some(exchange),
      cmpxchg_weak: Some(cmpxchg),
      cmpxchg_strong: Some(cmpxchg),
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
    special_ops: SpecialOps {
      double_cmpxchg: Some(double_cmpxchg),
      multi_cmpxchg: Some(multi_cmpxchg),
      generic: Some(generic),
      generic_wfb: Some(generic_wfb),
    },
    flag_ops: FlagOps {
      test: Some(TransactionFlag::is_set),
      test_set: Some(TransactionFlag::test_set),
      clear: Some(TransactionFlag::clear),
    },
    raw_ops: RawOps {
      tbegin: Some(tbegin),
      tabort_all: Some(tabort_all),
      // RTM aborts every nesting level and does not expose the depth.
      tabort_single: None,
      tcommit: Some(tcommit),
      ttest: Some(ttest),
      tdepth: None,
    },
  };
  AtomicTransaction {
    ops,
    align: Alignment::PERMISSIVE,
    recommended: RECOMMENDED,
    sstring: SafeStringInfo { magic_size: MAGIC_SIZE },
  }
}
