//! Construction and dispatch cost.
#![allow(unsafe_code)]

use core::{hint::black_box, sync::atomic::AtomicU64};

use atomics::{ImplId, MemoryOrder, Options, Selection, create, create_explicit, create_transaction};
use criterion::{Criterion, criterion_group, criterion_main};

fn construction(c: &mut Criterion) {
  let mut group = c.benchmark_group("create");
  for width in [1usize, 8, 16] {
    group.bench_function(format!("implicit/all/{width}"), |b| {
      b.iter(|| create(black_box(width), MemoryOrder::SeqCst, Options::NONE, Selection::All))
    });
  }
  group.bench_function("implicit/std/8", |b| {
    b.iter(|| create(8, MemoryOrder::SeqCst, Options::PRIORITISE_ARG_IDS, Selection::Ids(&[ImplId::STD])))
  });
  group.bench_function("explicit/all/8", |b| {
    b.iter(|| create_explicit(black_box(8), Options::NONE, Selection::All))
  });
  group.bench_function("transaction/all", |b| {
    b.iter(|| create_transaction(Options::NONE, Selection::All))
  });
  group.finish();
}

fn dispatch(c: &mut Criterion) {
  let a = create(8, MemoryOrder::AcqRel, Options::NONE, Selection::All);
  let Some(fetch_add) = a.ops.arithmetic_ops.fetch_add else {
    return;
  };
  let obj = AtomicU64::new(0);
  let one = 1u64;

  let mut group = c.benchmark_group("dispatch");
  group.bench_function("fetch_add/table/8", |b| {
    b.iter(|| {
      let mut old = 0u64;
      // SAFETY: `obj` is an aligned 8-byte atomic; locals are 8 bytes.
      unsafe { fetch_add(obj.as_ptr().cast(), (&raw const one).cast(), (&raw mut old).cast()) };
      black_box(old)
    })
  });
  group.bench_function("fetch_add/native/8", |b| {
    b.iter(|| black_box(obj.fetch_add(1, core::sync::atomic::Ordering::AcqRel)))
  });
  group.finish();
}

criterion_group!(benches, construction, dispatch);
criterion_main!(benches);
