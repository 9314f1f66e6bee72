//! Implementation registry and candidate resolution for atomic backends.
//!
//! This crate knows *which* atomic implementations exist and which of them
//! can run here. It knows nothing about the operations they provide; the
//! `atomics` crate owns the operation tables and the merge engine.
//!
//! - [`ImplId`] / [`ImplSet`]: one bit per registered implementation
//! - [`ImplKind`] / [`KindSet`]: how an implementation reaches the hardware
//! - [`registry`]: the static table, [`get_ids`], [`get_kind`]
//! - [`policy`]: [`Options`], [`Selection`] and ordered [`Candidates`]
//!
//! # Usage
//!
//! ```ignore
//! use backend::{Options, Selection, resolve};
//!
//! for id in resolve(Selection::All, Options::NONE).iter() {
//!     println!("{id} ({})", backend::get_kind(id));
//! }
//! ```
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod cache;
pub mod kind;
pub mod policy;
pub mod registry;

pub use cache::OnceCache;
pub use kind::{ImplKind, KindSet};
pub use platform;
pub use policy::{Candidates, MAX_CANDIDATES, Options, Selection, resolve, resolve_with};
pub use registry::{
  ImplId, ImplIdError, ImplSet, available, get_ids, get_ids_with, get_kind, get_kind_raw, is_available,
};
