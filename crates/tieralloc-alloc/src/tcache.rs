use core::{
  mem,
  ptr::NonNull,
};

use tieralloc_list::FreeList;
use tieralloc_sys::{
  extent::{
    Extent,
    ExtentError,
  },
  heap::{
    heap_alloc,
    heap_free,
  },
};

use crate::{
  central::{
    CentralCache,
    CentralError,
  },
  classes::{
    class_size,
    index_for,
  },
  config::{
    ALIGNMENT,
    MAX_BATCH_BYTES,
    MAX_BLOCK_SIZE,
    NSCLASSES,
    RETURN_THRESHOLD,
  },
};

#[derive(Debug)]
pub enum TCacheError {
  Central(CentralError),
  Large,
  Backing(ExtentError),
}

pub type TCacheResult<T> = Result<T, TCacheError>;

impl From<CentralError> for TCacheError {
  fn from(err: CentralError) -> Self {
    TCacheError::Central(err)
  }
}

impl From<ExtentError> for TCacheError {
  fn from(err: ExtentError) -> Self {
    TCacheError::Backing(err)
  }
}

/// Blocks pulled from the central tier per refill for blocks of `size` bytes.
pub const fn batch_for(size: usize) -> usize {
  let size = if size == 0 { ALIGNMENT } else { size };
  let base = match size {
    0..=32 => 64,
    33..=64 => 32,
    65..=128 => 16,
    129..=256 => 8,
    257..=512 => 4,
    513..=1024 => 2,
    _ => 1,
  };

  let cap = MAX_BATCH_BYTES / size;
  if cap == 0 {
    1
  } else if base < cap {
    base
  } else {
    cap
  }
}

/// Per-thread free lists, one per size class.
///
/// Never shared between threads. Whatever is still cached when the cache is
/// dropped goes back to the central tier.
pub struct ThreadCache<'c> {
  central: &'c CentralCache<'c>,
  lists: NonNull<FreeList>,
  _backing: Extent,
}

impl<'c> ThreadCache<'c> {
  pub fn new(central: &'c CentralCache<'c>) -> TCacheResult<Self> {
    let mut backing = Extent::new(NSCLASSES * mem::size_of::<FreeList>())?;
    let lists = backing.cast::<FreeList>(NSCLASSES)?;
    for i in 0..NSCLASSES {
      unsafe { lists.add(i).write(FreeList::new()) };
    }

    Ok(Self {
      central,
      lists,
      _backing: backing,
    })
  }

  pub fn central(&self) -> &'c CentralCache<'c> {
    self.central
  }

  #[inline(always)]
  fn list(&self, index: usize) -> &FreeList {
    debug_assert!(index < NSCLASSES);
    unsafe { &*self.lists.as_ptr().add(index) }
  }

  #[inline(always)]
  fn list_mut(&mut self, index: usize) -> &mut FreeList {
    debug_assert!(index < NSCLASSES);
    unsafe { &mut *self.lists.as_ptr().add(index) }
  }

  /// Returns a block of at least `bytes` bytes, aligned to [`ALIGNMENT`].
  ///
  /// Requests above [`MAX_BLOCK_SIZE`] bypass the tiers and go to the
  /// general-purpose heap.
  pub fn allocate(&mut self, bytes: usize) -> TCacheResult<NonNull<u8>> {
    if bytes > MAX_BLOCK_SIZE {
      return heap_alloc(bytes, ALIGNMENT).ok_or(TCacheError::Large);
    }

    let index = index_for(bytes);
    match self.list_mut(index).pop() {
      Some(ptr) => Ok(ptr),
      None => self.fetch_from_central(index),
    }
  }

  /// # Safety
  ///
  /// `ptr` must come from [`ThreadCache::allocate`] on a cache sharing this
  /// one's central tier, with the same `bytes`, and must not be used again.
  pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, bytes: usize) {
    if bytes > MAX_BLOCK_SIZE {
      unsafe { heap_free(ptr) };
      return;
    }

    let index = index_for(bytes);
    let list = self.list_mut(index);
    unsafe { list.push(ptr) };
    if list.len() > RETURN_THRESHOLD {
      self.return_to_central(index);
    }
  }

  fn fetch_from_central(&mut self, index: usize) -> TCacheResult<NonNull<u8>> {
    let batch = batch_for(class_size(index));
    let chain = self.central.fetch_range(index, batch)?;

    let (first, rest) = chain.pop_front();
    if let Some(rest) = rest {
      self.list_mut(index).push_chain(rest);
    }
    Ok(first)
  }

  /// Keeps a quarter of the list (at least one block) and hands the rest
  /// back.
  fn return_to_central(&mut self, index: usize) {
    let count = self.list(index).len();
    if count <= 1 {
      return;
    }

    let keep = (count / 4).max(1);
    let Some(chain) = self.list_mut(index).take(count - keep) else {
      return;
    };

    log::trace!(
      "tcache: class {} returning {} blocks, keeping {}",
      index,
      chain.len(),
      keep
    );
    self.central.return_range(chain, index);
  }

  /// Blocks cached locally for class `index`.
  pub fn cached(&self, index: usize) -> usize {
    if index >= NSCLASSES {
      return 0;
    }
    self.list(index).len()
  }
}

impl Drop for ThreadCache<'_> {
  fn drop(&mut self) {
    for index in 0..NSCLASSES {
      if let Some(chain) = self.list_mut(index).take_all() {
        self.central.return_range(chain, index);
      }
    }
  }
}
