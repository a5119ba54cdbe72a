#![no_std]

use core::{
  alloc::{
    GlobalAlloc,
    Layout,
  },
  ptr::{
    self,
    NonNull,
  },
};

use tieralloc_alloc::{
  central::CentralCache,
  classes::class_size,
  classes::index_for,
  config::{
    ALIGNMENT,
    MAX_BLOCK_SIZE,
  },
  page::PageCache,
  tcache::ThreadCache,
};
use tieralloc_list::Chain;
use tieralloc_sync::{
  LazyLock,
  ThreadLocal,
};
use tieralloc_sys::{
  GLOBAL_SYSTEM,
  heap::{
    heap_alloc,
    heap_free,
  },
};

pub mod prelude {
  pub use super::{
    TierAlloc,
    allocate,
    deallocate,
  };
  pub use tieralloc_alloc::prelude::*;
  pub use tieralloc_sys::prelude::*;
}

static PAGES: PageCache = PageCache::new(GLOBAL_SYSTEM);

fn init_central() -> Option<CentralCache<'static>> {
  CentralCache::new(&PAGES).ok()
}

static CENTRAL: LazyLock<Option<CentralCache<'static>>> = LazyLock::new(init_central);

fn init_tcache() -> Option<ThreadCache<'static>> {
  let central = CENTRAL.as_ref()?;
  ThreadCache::new(central).ok()
}

static TCACHE: ThreadLocal<Option<ThreadCache<'static>>> = ThreadLocal::new(init_tcache);

/// The process-wide page cache behind every thread.
pub fn page_cache() -> &'static PageCache {
  &PAGES
}

/// The process-wide central tier, if its lock array could be mapped.
pub fn central_cache() -> Option<&'static CentralCache<'static>> {
  CENTRAL.as_ref()
}

/// Allocates at least `size` bytes aligned to [`ALIGNMENT`].
///
/// Returns null when the request cannot be satisfied.
pub fn allocate(size: usize) -> *mut u8 {
  if size > MAX_BLOCK_SIZE {
    return heap_alloc(size, ALIGNMENT).map_or(ptr::null_mut(), NonNull::as_ptr);
  }

  TCACHE
    .with(|cache| cache.as_mut()?.allocate(size).ok())
    .flatten()
    .map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Releases a block obtained from [`allocate`]. Null is ignored.
///
/// # Safety
///
/// `ptr` must come from [`allocate`] called with the same `size`, and must
/// not be used afterwards.
pub unsafe fn deallocate(ptr: *mut u8, size: usize) {
  let Some(ptr) = NonNull::new(ptr) else {
    return;
  };

  if size > MAX_BLOCK_SIZE {
    unsafe { heap_free(ptr) };
    return;
  }

  let cached = TCACHE.with(|cache| match cache {
    Some(cache) => {
      unsafe { cache.deallocate(ptr, size) };
      true
    }
    None => false,
  });

  // no thread cache to park it in: hand the block straight to the central tier
  if cached != Some(true) {
    let index = index_for(size);
    let chain = unsafe { Chain::carve(ptr, class_size(index), 1) };
    if let (Some(central), Some(chain)) = (central_cache(), chain) {
      central.return_range(chain, index);
    }
  }
}

/// [`GlobalAlloc`] adapter over [`allocate`] and [`deallocate`].
///
/// Layouts aligned beyond [`ALIGNMENT`] are served by the general-purpose
/// heap.
pub struct TierAlloc;

unsafe impl GlobalAlloc for TierAlloc {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return heap_alloc(layout.size(), layout.align()).map_or(ptr::null_mut(), NonNull::as_ptr);
    }
    allocate(layout.size())
  }

  unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
    if layout.align() > ALIGNMENT {
      if let Some(ptr) = NonNull::new(ptr) {
        unsafe { heap_free(ptr) };
      }
      return;
    }
    unsafe { deallocate(ptr, layout.size()) }
  }
}
