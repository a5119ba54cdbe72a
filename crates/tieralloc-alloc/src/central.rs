use core::{
  mem,
  ptr::NonNull,
};

use spin::{
  mutex::SpinMutex,
  relax::Yield,
};
use tieralloc_list::{
  Chain,
  FreeList,
};
use tieralloc_sys::extent::{
  Extent,
  ExtentError,
};

use crate::{
  classes::class_size,
  config::{
    NSCLASSES,
    PAGE_SIZE,
    SPAN_PAGES,
  },
  page::{
    PageCache,
    PageError,
  },
};

#[derive(Debug)]
pub enum CentralError {
  InvalidIndex,
  ZeroBatch,
  ShortBatch,
  Page(PageError),
  Backing(ExtentError),
}

pub type CentralResult<T> = Result<T, CentralError>;

impl From<PageError> for CentralError {
  fn from(err: PageError) -> Self {
    CentralError::Page(err)
  }
}

impl From<ExtentError> for CentralError {
  fn from(err: ExtentError) -> Self {
    CentralError::Backing(err)
  }
}

type ClassList = SpinMutex<FreeList, Yield>;

/// Pages requested from the page cache when a class runs dry.
#[inline]
pub const fn span_pages_for(size: usize) -> usize {
  if size <= SPAN_PAGES * PAGE_SIZE {
    SPAN_PAGES
  } else {
    size.div_ceil(PAGE_SIZE)
  }
}

/// Shared per-class free lists, one spin lock per class.
///
/// The lock array lives in its own mapping so building the cache never goes
/// through the global allocator.
pub struct CentralCache<'p> {
  pages: &'p PageCache,
  lists: NonNull<ClassList>,
  _backing: Extent,
}

// SAFETY: `lists` points into `_backing`, which lives as long as the cache,
// and every element is a lock.
unsafe impl Send for CentralCache<'_> {}
unsafe impl Sync for CentralCache<'_> {}

impl<'p> CentralCache<'p> {
  pub fn new(pages: &'p PageCache) -> CentralResult<Self> {
    let mut backing = Extent::new(NSCLASSES * mem::size_of::<ClassList>())?;
    let lists = backing.cast::<ClassList>(NSCLASSES)?;
    for i in 0..NSCLASSES {
      unsafe { lists.add(i).write(SpinMutex::new(FreeList::new())) };
    }

    Ok(Self {
      pages,
      lists,
      _backing: backing,
    })
  }

  pub fn page_cache(&self) -> &'p PageCache {
    self.pages
  }

  #[inline]
  fn class(&self, index: usize) -> Option<&ClassList> {
    if index >= NSCLASSES {
      return None;
    }
    // SAFETY: bounds checked above; every slot was written in `new`.
    Some(unsafe { &*self.lists.as_ptr().add(index) })
  }

  /// Detaches `batch` blocks of class `index`.
  ///
  /// An empty class is refilled from a fresh span and may hand out fewer
  /// than `batch` blocks if the span holds fewer. A non-empty class holding
  /// fewer than `batch` blocks refuses with [`CentralError::ShortBatch`].
  pub fn fetch_range(&self, index: usize, batch: usize) -> CentralResult<Chain> {
    let class = self.class(index).ok_or(CentralError::InvalidIndex)?;
    if batch == 0 {
      return Err(CentralError::ZeroBatch);
    }

    let mut list = class.lock();
    if list.is_empty() {
      return self.refill(&mut list, index, batch);
    }

    match list.take(batch) {
      Some(chain) => Ok(chain),
      None => {
        log::debug!(
          "central: class {} holds {} blocks, {} requested",
          index,
          list.len(),
          batch
        );
        Err(CentralError::ShortBatch)
      }
    }
  }

  /// Carves a fresh span into blocks, hands out up to `batch` of them and
  /// keeps the rest on `list`.
  fn refill(&self, list: &mut FreeList, index: usize, batch: usize) -> CentralResult<Chain> {
    let size = class_size(index);
    let pages = span_pages_for(size);
    let start = self.pages.allocate_span(pages)?;

    let total = pages * PAGE_SIZE / size;
    let handed = total.min(batch);

    // SAFETY: the span is ours, page aligned and holds `total` blocks.
    let chain = unsafe { Chain::carve(start, size, handed) }.ok_or(CentralError::ShortBatch)?;
    let rest = unsafe { start.add(handed * size) };
    if let Some(rest) = unsafe { Chain::carve(rest, size, total - handed) } {
      list.push_chain(rest);
    }

    log::trace!(
      "central: class {} refilled from {}-page span, {} of {} blocks handed out",
      index,
      pages,
      handed,
      total
    );
    Ok(chain)
  }

  /// Links `chain` back onto class `index`.
  ///
  /// An out-of-range index leaves every list untouched.
  pub fn return_range(&self, chain: Chain, index: usize) {
    match self.class(index) {
      Some(class) => class.lock().push_chain(chain),
      None => log::warn!(
        "central: dropping {} blocks returned to invalid class {}",
        chain.len(),
        index
      ),
    }
  }

  /// Blocks currently parked on class `index`.
  pub fn free_blocks(&self, index: usize) -> usize {
    self.class(index).map_or(0, |class| class.lock().len())
  }
}

#[cfg(test)]
mod tests;
