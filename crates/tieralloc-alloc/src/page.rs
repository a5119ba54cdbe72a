//! Page-level span allocator shared by every central list.
//!
//! Spans come from the OS through the injected [`System`] and are never given
//! back. Spans that end up free (reserved ahead of time, or the tail left over
//! by a split) sit in a best-fit index bucketed by page count.

use core::{
  ptr::NonNull,
  sync::atomic::{
    AtomicUsize,
    Ordering,
  },
};

use getset::CopyGetters;
use spin::Mutex;
use tieralloc_bitmap::Bitmap;
use tieralloc_fixed::bump::{
  Bump,
  BumpError,
};
use tieralloc_rtree::{
  RTree,
  RTreeError,
};
use tieralloc_sys::{
  prim::{
    PrimError,
    page_align,
  },
  system::{
    SysError,
    System,
  },
};

use crate::config::{
  CHUNK_SIZE,
  FANOUT,
  MAX_INDEXED_PAGES,
  PAGE_SHIFT,
  PAGE_SIZE,
  SPAN_INDEX_WORDS,
};

#[derive(Debug)]
pub enum PageError {
  System(SysError),
  Prim(PrimError),
  Records(BumpError),
  Map(RTreeError),
  InvalidArgument,
  TooLarge,
}

pub type PageResult<T> = Result<T, PageError>;

impl From<SysError> for PageError {
  fn from(err: SysError) -> Self {
    PageError::System(err)
  }
}

impl From<PrimError> for PageError {
  fn from(err: PrimError) -> Self {
    PageError::Prim(err)
  }
}

impl From<BumpError> for PageError {
  fn from(err: BumpError) -> Self {
    PageError::Records(err)
  }
}

impl From<RTreeError> for PageError {
  fn from(err: RTreeError) -> Self {
    PageError::Map(err)
  }
}

/// A run of contiguous pages.
#[derive(Debug, CopyGetters)]
pub struct Span {
  #[getset(get_copy = "pub")]
  start: NonNull<u8>,
  #[getset(get_copy = "pub")]
  pages: usize,
  next: Option<NonNull<Span>>,
}

impl Span {
  #[inline(always)]
  fn page_id(&self) -> usize {
    (self.start.as_ptr() as usize) >> PAGE_SHIFT
  }
}

/// Free spans bucketed by exact page count. A set bit marks a non-empty
/// bucket so best fit is a single forward search.
struct SpanIndex {
  buckets: [Option<NonNull<Span>>; MAX_INDEXED_PAGES + 1],
  occupied: Bitmap<SPAN_INDEX_WORDS>,
  pages: usize,
}

impl SpanIndex {
  const fn new() -> Self {
    Self {
      buckets: [None; MAX_INDEXED_PAGES + 1],
      occupied: Bitmap::new(),
      pages: 0,
    }
  }

  fn insert(&mut self, mut span: NonNull<Span>) -> PageResult<()> {
    // SAFETY: span records live in the page cache's bump arena and are only
    // touched under its lock.
    let record = unsafe { span.as_mut() };
    let bucket = record.pages;
    if bucket == 0 || bucket > MAX_INDEXED_PAGES {
      return Err(PageError::TooLarge);
    }

    record.next = self.buckets[bucket];
    self.buckets[bucket] = Some(span);
    let marked = self.occupied.set(bucket);
    debug_assert!(marked.is_ok());
    self.pages += bucket;
    Ok(())
  }

  /// Removes the smallest free span holding at least `pages` pages.
  fn take_best(&mut self, pages: usize) -> Option<NonNull<Span>> {
    let bucket = self.occupied.find_fs_from(pages)?;
    debug_assert!(matches!(self.occupied.get(bucket), Ok(true)));
    let mut span = self.buckets.get(bucket).copied().flatten()?;

    let record = unsafe { span.as_mut() };
    self.buckets[bucket] = record.next.take();
    if self.buckets[bucket].is_none() {
      let cleared = self.occupied.clear(bucket);
      debug_assert!(cleared.is_ok());
    }
    self.pages -= record.pages;
    Some(span)
  }
}

struct PageState {
  index: SpanIndex,
  map: RTree<NonNull<Span>, FANOUT>,
  records: Bump,
}

// SAFETY: the raw span pointers are owned by `records` and only reached
// through the page cache's lock.
unsafe impl Send for PageState {}

impl PageState {
  const fn new() -> Self {
    Self {
      index: SpanIndex::new(),
      map: RTree::new(CHUNK_SIZE),
      records: Bump::new(CHUNK_SIZE),
    }
  }

  fn new_span(&mut self, start: NonNull<u8>, pages: usize) -> PageResult<NonNull<Span>> {
    let slot = self.records.create::<Span>()?;
    let span = slot.write(Span {
      start,
      pages,
      next: None,
    });
    Ok(NonNull::from(span))
  }

  /// Trims `span` to `pages` pages and files the tail as a new free span.
  fn split(&mut self, mut span: NonNull<Span>, pages: usize) -> PageResult<()> {
    let total = unsafe { span.as_ref() }.pages;
    if total <= pages {
      return Ok(());
    }

    // SAFETY: `pages < total` keeps the offset inside the span's mapping.
    let rest = unsafe { span.as_ref().start.add(pages * PAGE_SIZE) };
    let tail = self.new_span(rest, total - pages)?;
    unsafe { span.as_mut() }.pages = pages;
    self.index.insert(tail)
  }

  /// Puts a span taken by `take_best` back after it could not be handed out.
  fn restore(&mut self, span: NonNull<Span>) {
    let restored = self.index.insert(span);
    debug_assert!(restored.is_ok());
    if let Err(err) = restored {
      log::warn!("page cache: free span at {:p} lost: {:?}", span, err);
    }
  }

  /// Records `span` as in use.
  fn commit(&mut self, span: NonNull<Span>) -> PageResult<NonNull<u8>> {
    let record = unsafe { span.as_ref() };
    self.map.insert(record.page_id(), span)?;
    Ok(record.start)
  }
}

/// Process-wide page allocator. All state sits behind one lock.
pub struct PageCache {
  state: Mutex<PageState>,
  system: &'static dyn System,
  mapped: AtomicUsize,
}

impl PageCache {
  pub const fn new(system: &'static dyn System) -> Self {
    Self {
      state: Mutex::new(PageState::new()),
      system,
      mapped: AtomicUsize::new(0),
    }
  }

  /// Hands out `num_pages` contiguous, page-aligned pages.
  ///
  /// The best-fitting free span is split if it is larger than needed;
  /// otherwise a fresh span is mapped from the OS.
  pub fn allocate_span(&self, num_pages: usize) -> PageResult<NonNull<u8>> {
    if num_pages == 0 {
      return Err(PageError::InvalidArgument);
    }

    let mut state = self.state.lock();

    if let Some(span) = state.index.take_best(num_pages) {
      return state
        .split(span, num_pages)
        .and_then(|()| state.commit(span))
        .inspect_err(|_| state.restore(span));
    }

    let (start, len) = self.fetch_from_system(num_pages)?;
    let span = state.new_span(start, num_pages);
    span
      .and_then(|span| state.commit(span))
      .inspect_err(|_| self.release_to_system(start, len))
  }

  /// Maps a span of `num_pages` pages straight into the free index so later
  /// requests are carved out of it.
  pub fn reserve(&self, num_pages: usize) -> PageResult<()> {
    if num_pages == 0 {
      return Err(PageError::InvalidArgument);
    }
    if num_pages > MAX_INDEXED_PAGES {
      return Err(PageError::TooLarge);
    }

    let mut state = self.state.lock();
    let (start, len) = self.fetch_from_system(num_pages)?;
    let span = state.new_span(start, num_pages);
    span
      .and_then(|span| state.index.insert(span))
      .inspect_err(|_| self.release_to_system(start, len))
  }

  /// Maps `num_pages` pages and returns their start with the mapped length.
  fn fetch_from_system(&self, num_pages: usize) -> PageResult<(NonNull<u8>, usize)> {
    let bytes = num_pages
      .checked_mul(PAGE_SIZE)
      .ok_or(PageError::TooLarge)?;
    let len = page_align(bytes)?;

    let slice = unsafe { self.system.alloc(len) }.map_err(|err| {
      log::warn!("page cache: system refused {} bytes: {:?}", len, err);
      PageError::System(err)
    })?;
    let start = NonNull::new(slice.as_mut_ptr()).ok_or(PageError::System(SysError::OutOfMemory))?;

    self.mapped.fetch_add(len / PAGE_SIZE, Ordering::Relaxed);
    log::debug!("page cache: mapped {} pages at {:p}", num_pages, start);
    Ok((start, len))
  }

  /// Gives back a fresh mapping that never made it into the bookkeeping.
  fn release_to_system(&self, start: NonNull<u8>, len: usize) {
    // SAFETY: `start..start + len` is exactly what `fetch_from_system` mapped
    // and nothing else refers to it.
    let slice = unsafe { core::slice::from_raw_parts(start.as_ptr(), len) };
    match unsafe { self.system.dealloc(slice) } {
      Ok(()) => {
        self.mapped.fetch_sub(len / PAGE_SIZE, Ordering::Relaxed);
      }
      Err(err) => log::warn!("page cache: leaking {} bytes at {:p}: {:?}", len, start, err),
    }
  }

  /// `(start, pages)` of the in-use span beginning at the page containing
  /// `addr`.
  pub fn lookup(&self, addr: usize) -> Option<(NonNull<u8>, usize)> {
    let state = self.state.lock();
    let span = state.map.lookup(addr >> PAGE_SHIFT)?;
    let record = unsafe { span.as_ref() };
    Some((record.start, record.pages))
  }

  /// Pages held from the OS, in `PAGE_SIZE` units. Only a fresh mapping that
  /// could not be recorded is ever given back.
  pub fn mapped_pages(&self) -> usize {
    self.mapped.load(Ordering::Relaxed)
  }

  /// Pages currently parked in the free-span index.
  pub fn free_pages(&self) -> usize {
    self.state.lock().index.pages
  }

  pub fn spans_in_use(&self) -> usize {
    self.state.lock().map.len()
  }
}
