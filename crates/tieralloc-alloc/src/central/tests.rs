use std::collections::HashSet;

use tieralloc_sys::{
  GLOBAL_SYSTEM,
  system::{
    SysError,
    SysResult,
    System,
  },
};

use super::*;
use crate::classes::index_for;

struct RefusingSystem;

unsafe impl System for RefusingSystem {
  unsafe fn alloc<'mem>(&self, _size: usize) -> SysResult<&'mem mut [u8]> {
    Err(SysError::OutOfMemory)
  }
}

static REFUSING: RefusingSystem = RefusingSystem;

fn addrs(chain: &Chain) -> Vec<usize> {
  chain.blocks().map(|p| p.as_ptr() as usize).collect()
}

#[test]
fn span_pages_policy() {
  assert_eq!(span_pages_for(8), SPAN_PAGES);
  assert_eq!(span_pages_for(32 * 1024), SPAN_PAGES);
  assert_eq!(span_pages_for(32 * 1024 + 8), 9);
  assert_eq!(span_pages_for(40_000), 10);
  assert_eq!(span_pages_for(256 * 1024), 64);
}

#[test]
fn refill_hands_out_batch_and_keeps_rest() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();

  let chain = central.fetch_range(0, 64).unwrap();
  assert_eq!(chain.len(), 64);
  assert_eq!(central.free_blocks(0), 4096 - 64);
  assert_eq!(pages.mapped_pages(), SPAN_PAGES);

  let blocks = addrs(&chain);
  let start = blocks[0];
  assert_eq!(start % PAGE_SIZE, 0);
  assert_eq!(pages.lookup(start), Some((NonNull::new(start as *mut u8).unwrap(), SPAN_PAGES)));
  for (i, addr) in blocks.iter().enumerate() {
    assert_eq!(*addr, start + i * 8);
  }

  let next = central.fetch_range(0, 64).unwrap();
  assert_eq!(next.len(), 64);
  assert_eq!(central.free_blocks(0), 4096 - 128);
  assert_eq!(pages.mapped_pages(), SPAN_PAGES);

  let seen: HashSet<usize> = blocks.into_iter().chain(addrs(&next)).collect();
  assert_eq!(seen.len(), 128);
}

#[test]
fn refill_from_small_span_hands_out_fewer() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();
  let index = index_for(16 * 1024);

  // an eight-page span holds two 16K blocks
  let chain = central.fetch_range(index, 4).unwrap();
  assert_eq!(chain.len(), 2);
  assert_eq!(central.free_blocks(index), 0);
}

#[test]
fn short_batch_leaves_list_untouched() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();
  let index = index_for(8 * 1024);

  let chain = central.fetch_range(index, 1).unwrap();
  assert_eq!(chain.len(), 1);
  assert_eq!(central.free_blocks(index), 3);

  assert!(matches!(
    central.fetch_range(index, 4),
    Err(CentralError::ShortBatch)
  ));
  assert_eq!(central.free_blocks(index), 3);
  assert_eq!(pages.mapped_pages(), SPAN_PAGES);

  let rest = central.fetch_range(index, 3).unwrap();
  assert_eq!(rest.len(), 3);
  assert_eq!(central.free_blocks(index), 0);
}

#[test]
fn large_classes_use_whole_span() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();
  let index = index_for(40_000);

  let chain = central.fetch_range(index, 1).unwrap();
  assert_eq!(chain.len(), 1);
  let start = chain.head().as_ptr();
  assert_eq!(pages.lookup(start.as_ptr() as usize), Some((start, 10)));
  assert_eq!(central.free_blocks(index), 0);

  let top = central.fetch_range(NSCLASSES - 1, 1).unwrap();
  assert_eq!(top.len(), 1);
  assert_eq!(pages.mapped_pages(), 10 + 64);
}

#[test]
fn invalid_arguments_are_rejected() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();

  assert!(matches!(
    central.fetch_range(NSCLASSES, 1),
    Err(CentralError::InvalidIndex)
  ));
  assert!(matches!(
    central.fetch_range(0, 0),
    Err(CentralError::ZeroBatch)
  ));
  assert_eq!(central.free_blocks(NSCLASSES), 0);
  assert_eq!(pages.mapped_pages(), 0);
}

#[test]
fn returned_blocks_are_reused_first() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();

  let chain = central.fetch_range(3, 8).unwrap();
  let head = chain.head().as_ptr();
  let before = central.free_blocks(3);

  central.return_range(chain, 3);
  assert_eq!(central.free_blocks(3), before + 8);

  let again = central.fetch_range(3, 8).unwrap();
  assert_eq!(again.head().as_ptr(), head);
  assert_eq!(central.free_blocks(3), before);
}

#[test]
fn return_to_invalid_class_is_ignored() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();

  let chain = central.fetch_range(0, 4).unwrap();
  let before = central.free_blocks(0);
  central.return_range(chain, NSCLASSES + 7);
  assert_eq!(central.free_blocks(0), before);
}

#[test]
fn page_exhaustion_propagates() {
  let pages = PageCache::new(&REFUSING);
  let central = CentralCache::new(&pages).unwrap();

  assert!(matches!(
    central.fetch_range(0, 8),
    Err(CentralError::Page(PageError::System(SysError::OutOfMemory)))
  ));
  assert_eq!(central.free_blocks(0), 0);
}

#[test]
fn concurrent_fetches_never_overlap() {
  let pages = PageCache::new(GLOBAL_SYSTEM);
  let central = CentralCache::new(&pages).unwrap();

  let per_thread: Vec<Vec<usize>> = std::thread::scope(|s| {
    let handles: Vec<_> = (0..8)
      .map(|_| {
        s.spawn(|| {
          let mut out = Vec::new();
          for _ in 0..16 {
            let chain = central.fetch_range(1, 8).unwrap();
            out.extend(addrs(&chain));
          }
          out
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  let all: Vec<usize> = per_thread.into_iter().flatten().collect();
  let unique: HashSet<usize> = all.iter().copied().collect();
  assert_eq!(all.len(), 8 * 16 * 8);
  assert_eq!(unique.len(), all.len());
  for addr in all {
    assert_eq!(addr % 16, 0);
  }
}
