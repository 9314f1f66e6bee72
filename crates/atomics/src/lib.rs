//! Runtime composition of atomic operation tables.
//!
//! Several implementations of atomic operations can be present at once:
//! compiler builtins, hand-written assembly for wider objects, hardware
//! transactional memory. Each covers a different subset of widths and
//! operations. This crate asks every enabled implementation for its table
//! and merges them into one, slot by slot, highest priority first.
//!
//! # Quick Start
//!
//! ```
//! use atomics::{MemoryOrder, OpCategory, Options, Selection, create, feature_check_any};
//!
//! let a = create(8, MemoryOrder::SeqCst, Options::NONE, Selection::All);
//! let have = feature_check_any(&a.ops, OpCategory::IMPLICIT);
//! if have.contains(OpCategory::ARI_F) {
//!   // fetch-add and friends are available for 8-byte objects
//! }
//! ```
//!
//! # Domains
//!
//! | Constructor | Table | Order |
//! |-------------|-------|-------|
//! | [`create`] | [`OpsImplicit`] | fixed at construction |
//! | [`create_explicit`] | [`OpsExplicit`] | per call |
//! | [`create_transaction`] | [`OpsTransaction`] | transactional, width per call |
//!
//! Every returned table carries the [`Alignment`] objects must meet. Null
//! slots mean no selected implementation provides that operation; the
//! construction functions never fail.
//!
//! # Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | Yes | Runtime CPU detection; compile-time detection only without it |
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![allow(unsafe_code)]
#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod align;
mod api;
pub mod feature;
mod impls;
pub mod merge;
pub mod ops;
pub mod order;
pub mod transaction;

pub use align::{Alignment, AlignmentError, align_compare, align_meets_minimum, align_meets_recommended, cache_line_size};
pub use api::{create, create_explicit, create_transaction};
pub use backend::{ImplId, ImplKind, ImplSet, KindSet, Options, Selection, get_ids, get_kind, get_kind_raw};
pub use feature::{
  FeatureCheck, OpCategory, OpKind, feature_check_all, feature_check_any, feature_check_leaf,
  feature_check_leaf_transaction,
};
pub use merge::{Atomic, AtomicExplicit, AtomicTransaction, Merge, merge_all};
pub use ops::{OpsExplicit, OpsImplicit, OpsTransaction};
pub use order::{
  InvalidMemoryOrder, MemoryOrder, cmpxchg_fail_order, is_valid_fail_order, is_valid_load_order, is_valid_order,
  is_valid_store_order,
};
pub use transaction::{
  CmpxchgDesc, ExitCode, ExitInfo, RecommendedRetryConfig, SafeStringInfo, TransactionConfig, TransactionFlag,
  TransactionResult, TransactionStatus, transaction_status_abort_reason, transaction_status_exit_code,
  transaction_status_exit_info,
};
