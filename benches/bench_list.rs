use criterion::{criterion_group, criterion_main, Criterion};
use core::{hint::black_box, ptr::NonNull};
use tieralloc_list::{Chain, FreeList};

const BLOCK: usize = 16;
const COUNT: usize = 1024;

fn region(store: &mut Vec<u64>) -> NonNull<u8> {
  NonNull::new(store.as_mut_ptr().cast::<u8>()).unwrap()
}

fn bench_list_operations(c: &mut Criterion) {
  c.bench_function("list_push_pop", |b| {
    let mut store = vec![0u64; BLOCK * COUNT / 8];
    let base = region(&mut store);
    b.iter(|| {
      let mut list = FreeList::new();
      for i in 0..COUNT {
        unsafe { list.push(base.add(i * BLOCK)) };
      }
      while let Some(ptr) = list.pop() {
        black_box(ptr);
      }
    });
  });

  c.bench_function("list_carve_splice", |b| {
    let mut store = vec![0u64; BLOCK * COUNT / 8];
    let base = region(&mut store);
    b.iter(|| {
      let chain = unsafe { Chain::carve(base, BLOCK, COUNT) }.unwrap();
      let mut list = FreeList::new();
      list.push_chain(chain);
      black_box(list.len());
    });
  });

  c.bench_function("list_take_batch", |b| {
    let mut store = vec![0u64; BLOCK * COUNT / 8];
    let base = region(&mut store);
    b.iter(|| {
      let mut list = FreeList::new();
      list.push_chain(unsafe { Chain::carve(base, BLOCK, COUNT) }.unwrap());
      while let Some(chain) = list.take(64) {
        black_box(chain.len());
      }
    });
  });
}

criterion_group!(list_benches, bench_list_operations);
criterion_main!(list_benches);
