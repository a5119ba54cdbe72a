use core::{
  alloc::Layout,
  mem::{
    ManuallyDrop,
    MaybeUninit,
  },
  ptr::NonNull,
};

use tieralloc_sys::{
  extent::{
    Extent,
    ExtentError,
  },
  math::align_up,
};

use crate::fixed::{
  Fixed,
  FixedError,
};

#[derive(Debug)]
pub enum ChunkError {
  ExtentError(ExtentError),
  FixedError(FixedError),
  Overflow,
}

pub type ChunkResult<T> = Result<T, ChunkError>;

/// One mapping owned by a [`Bump`]. The header lives at the start of the
/// mapping it describes.
struct Chunk {
  next: Option<NonNull<Chunk>>,
  data: NonNull<u8>,
  fixed: Fixed,
  extent: ManuallyDrop<Extent>,
}

impl Chunk {
  const HEADER_ALIGN: usize = 16;

  const fn header() -> usize {
    let size = core::mem::size_of::<Self>();
    (size + Self::HEADER_ALIGN - 1) & !(Self::HEADER_ALIGN - 1)
  }

  fn new(size: usize, next: Option<NonNull<Chunk>>) -> ChunkResult<NonNull<Self>> {
    let mut extent = Extent::new(size).map_err(ChunkError::ExtentError)?;
    let header = Self::header();
    if extent.len() <= header {
      return Err(ChunkError::FixedError(FixedError::OutOfMemory));
    }

    let this = extent.cast::<Self>(1).map_err(ChunkError::ExtentError)?;
    // SAFETY: header < extent.len(), so the data region is inside the mapping.
    let data = unsafe { this.cast::<u8>().add(header) };
    let fixed = Fixed::new(extent.len() - header);

    let chunk = Self {
      next,
      data,
      fixed,
      extent: ManuallyDrop::new(extent),
    };
    unsafe { this.write(chunk) };
    Ok(this)
  }

  fn allocate(&mut self, layout: Layout) -> ChunkResult<NonNull<u8>> {
    let offset = self
      .fixed
      .reserve(self.data.as_ptr() as usize, layout)
      .map_err(ChunkError::FixedError)?;
    Ok(unsafe { self.data.add(offset) })
  }
}

pub type BumpError = ChunkError;
pub type BumpResult<T> = Result<T, BumpError>;

/// Grow-only arena for allocator metadata.
///
/// Memory comes straight from the system mapping layer so metadata never
/// recurses into the allocator it describes. Individual allocations are never
/// freed; every chunk is unmapped when the `Bump` is dropped.
pub struct Bump {
  head: Option<NonNull<Chunk>>,
  chunk_size: usize,
}

impl Bump {
  pub const fn new(chunk_size: usize) -> Self {
    Self {
      head: None,
      chunk_size,
    }
  }

  pub const fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn create<T>(&mut self) -> BumpResult<&mut MaybeUninit<T>> {
    let ptr = self.allocate(Layout::new::<T>())?;
    Ok(unsafe { &mut *ptr.as_ptr().cast::<MaybeUninit<T>>() })
  }

  pub fn allocate(&mut self, layout: Layout) -> BumpResult<NonNull<u8>> {
    if let Some(mut head) = self.head {
      if let Ok(ptr) = unsafe { head.as_mut() }.allocate(layout) {
        return Ok(ptr);
      }
    }

    let padded = align_up(layout.size(), layout.align()).ok_or(ChunkError::Overflow)?;
    let required = Chunk::header()
      .checked_add(padded)
      .and_then(|n| n.checked_add(layout.align()))
      .ok_or(ChunkError::Overflow)?;
    let chunk_size = core::cmp::max(self.chunk_size, required);

    let mut chunk = Chunk::new(chunk_size, self.head)?;
    self.head = Some(chunk);
    unsafe { chunk.as_mut() }.allocate(layout)
  }
}

impl Drop for Bump {
  fn drop(&mut self) {
    let mut cursor = self.head.take();
    while let Some(mut chunk) = cursor {
      let chunk = unsafe { chunk.as_mut() };
      cursor = chunk.next;
      // The header lives inside the mapping, so take the extent out first.
      let extent = unsafe { ManuallyDrop::take(&mut chunk.extent) };
      drop(extent);
    }
  }
}

unsafe impl Send for Bump {}
