//! Atomic operations composed at runtime from the best available backends.
//!
//! `rsatomic` asks every atomic implementation that can run on this machine
//! (compiler builtins, `cmpxchg16b`, Intel RTM) for its operations and merges
//! them into one table per width and memory order. Missing operations are
//! null slots, never errors.
//!
//! # Quick Start
//!
//! ```
//! use core::sync::atomic::AtomicU32;
//!
//! use rsatomic::{MemoryOrder, Options, Selection, create};
//!
//! let a = create(4, MemoryOrder::SeqCst, Options::NONE, Selection::All);
//! let obj = AtomicU32::new(1);
//! let two = 2u32;
//! let mut old = 0u32;
//!
//! if let Some(fetch_add) = a.ops.arithmetic_ops.fetch_add {
//!   assert!(a.align.meets_minimum(obj.as_ptr().cast(), 4));
//!   // SAFETY: `obj` is an aligned 4-byte atomic; `two` and `old` are 4 bytes.
//!   unsafe { fetch_add(obj.as_ptr().cast(), (&raw const two).cast(), (&raw mut old).cast()) };
//!   assert_eq!(old, 1);
//!   assert_eq!(obj.into_inner(), 3);
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | Yes | Runtime CPU detection; compile-time detection only without it |
//!
//! ## `no_std` Usage
//!
//! ```toml
//! [dependencies]
//! rsatomic = { version = "0.1", default-features = false }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]

// =============================================================================
// Construction
// =============================================================================

pub use atomics::{
  Atomic, AtomicExplicit, AtomicTransaction, Merge, OpsExplicit, OpsImplicit, OpsTransaction, create, create_explicit,
  create_transaction, merge_all,
};

// =============================================================================
// Orders and Alignment
// =============================================================================

pub use atomics::{
  Alignment, AlignmentError, InvalidMemoryOrder, MemoryOrder, align_compare, align_meets_minimum,
  align_meets_recommended, cache_line_size, cmpxchg_fail_order, is_valid_fail_order, is_valid_load_order,
  is_valid_order, is_valid_store_order,
};

// =============================================================================
// Feature Checks
// =============================================================================

pub use atomics::{
  FeatureCheck, OpCategory, OpKind, feature_check_all, feature_check_any, feature_check_leaf,
  feature_check_leaf_transaction,
};

// =============================================================================
// Transactions
// =============================================================================

pub use atomics::{
  CmpxchgDesc, ExitCode, ExitInfo, RecommendedRetryConfig, SafeStringInfo, TransactionConfig, TransactionFlag,
  TransactionResult, TransactionStatus, transaction_status_abort_reason, transaction_status_exit_code,
  transaction_status_exit_info,
};

// =============================================================================
// Registry and Platform
// =============================================================================

pub use backend::{
  ImplId, ImplIdError, ImplKind, ImplSet, KindSet, Options, Selection, get_ids, get_kind, get_kind_raw, is_available,
};

/// Operation tables and their signature families.
pub mod ops {
  pub use atomics::ops::*;
}

/// CPU detection used to decide which backends are enabled.
pub mod platform {
  pub use ::platform::{
    Arch, Caps, Detected, MAX_CACHE_LINE_SIZE, OverrideError, arch, caps, clear_override, get, has_override,
    set_override, try_set_override,
  };
}
