//! Backend adapters.
//!
//! Each registered implementation maps to one [`Adapter`]: three
//! constructors that return that implementation's table for a width and
//! order. Adapters report an empty table and [`Alignment::PERMISSIVE`] for
//! widths they do not handle, so an unsupported candidate never tightens the
//! merged alignment.
//!
//! [`Alignment::PERMISSIVE`]: crate::align::Alignment::PERMISSIVE

use backend::ImplId;

use crate::{
  merge::{Atomic, AtomicExplicit, AtomicTransaction},
  order::MemoryOrder,
};

mod builtin;
mod bytes;
#[cfg(target_arch = "x86_64")]
mod cx16;
#[cfg(target_arch = "x86_64")]
mod tsx;

/// Table constructors for one implementation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Adapter {
  pub id: ImplId,
  pub implicit: fn(usize, MemoryOrder) -> Atomic,
  pub explicit: fn(usize) -> AtomicExplicit,
  pub transaction: fn() -> AtomicTransaction,
}

const BUILTIN: Adapter = Adapter {
  id: ImplId::STD,
  implicit: builtin::implicit,
  explicit: builtin::explicit,
  transaction: builtin::transaction,
};

#[cfg(target_arch = "x86_64")]
const CX16: Adapter = Adapter {
  id: ImplId::CX16,
  implicit: cx16::implicit,
  explicit: cx16::explicit,
  transaction: cx16::transaction,
};

#[cfg(target_arch = "x86_64")]
const TSX: Adapter = Adapter {
  id: ImplId::TSX,
  implicit: tsx::implicit,
  explicit: tsx::explicit,
  transaction: tsx::transaction,
};

/// Adapter compiled for `id` on this target.
///
/// Callers only pass ids that resolution found enabled, so the adapter's
/// instructions are known to be supported.
#[must_use]
pub(crate) fn adapter(id: ImplId) -> Option<Adapter> {
  match id {
    ImplId::STD => Some(BUILTIN),
    #[cfg(target_arch = "x86_64")]
    ImplId::CX16 => Some(CX16),
    #[cfg(target_arch = "x86_64")]
    ImplId::TSX => Some(TSX),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use backend::registry::REGISTRY;

  use super::*;
  use crate::align::Alignment;

  #[test]
  fn every_compiled_entry_has_an_adapter() {
    for e in REGISTRY.iter().filter(|e| e.compiled) {
      let a = adapter(e.id);
      assert!(a.is_some(), "no adapter for {}", e.name);
      assert_eq!(a.map(|a| a.id), Some(e.id));
    }
  }

  #[test]
  fn null_and_unregistered_have_none() {
    assert!(adapter(ImplId::NULL).is_none());
    assert!(adapter(ImplId::try_from(1u32 << 17).unwrap_or_default()).is_none());
  }

  #[test]
  fn unsupported_width_is_empty_and_permissive() {
    for e in REGISTRY.iter().filter(|e| e.compiled) {
      let Some(a) = adapter(e.id) else { continue };
      let t = (a.implicit)(3, MemoryOrder::SeqCst);
      assert!(t.ops.is_empty(), "{}", e.name);
      assert_eq!(t.align, Alignment::PERMISSIVE, "{}", e.name);
      let x = (a.explicit)(3);
      assert!(x.ops.is_empty(), "{}", e.name);
      assert_eq!(x.align, Alignment::PERMISSIVE, "{}", e.name);
    }
  }
}
