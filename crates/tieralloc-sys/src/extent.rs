use core::{
  mem,
  ptr::NonNull,
};

use crate::{
  GLOBAL_SYSTEM,
  math::is_aligned,
  prim::{
    PrimError,
    page_align,
  },
  system::SysError,
};

#[derive(Debug)]
pub enum ExtentError {
  SystemError(SysError),
  Prim(PrimError),
  OutOfBounds,
}

pub type ExtentResult<T> = Result<T, ExtentError>;

/// A private read/write mapping that is unmapped on drop.
///
/// Used for allocator metadata only; span memory handed to callers never
/// goes through an `Extent`.
pub struct Extent {
  slice: &'static mut [u8],
}

impl Extent {
  pub fn new(size: usize) -> ExtentResult<Extent> {
    if size == 0 {
      return Ok(Extent { slice: &mut [] });
    }

    let size = page_align(size).map_err(ExtentError::Prim)?;
    let slice = unsafe { GLOBAL_SYSTEM.alloc(size) }.map_err(ExtentError::SystemError)?;

    Ok(Extent { slice })
  }

  /// Views the start of the mapping as `count` consecutive `T`s.
  ///
  /// The returned memory is zero-filled; callers initialize it before reading.
  pub fn cast<T>(&mut self, count: usize) -> ExtentResult<NonNull<T>> {
    let needed = mem::size_of::<T>()
      .checked_mul(count)
      .ok_or(ExtentError::OutOfBounds)?;
    if needed > self.slice.len() {
      return Err(ExtentError::OutOfBounds);
    }

    let ptr = self.slice.as_mut_ptr();
    if is_aligned(ptr as usize, mem::align_of::<T>()) != Some(true) {
      return Err(ExtentError::OutOfBounds);
    }

    NonNull::new(ptr.cast::<T>()).ok_or(ExtentError::OutOfBounds)
  }

  pub fn len(&self) -> usize {
    self.slice.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slice.is_empty()
  }
}

impl AsRef<[u8]> for Extent {
  fn as_ref(&self) -> &[u8] {
    self.slice
  }
}

impl AsMut<[u8]> for Extent {
  fn as_mut(&mut self) -> &mut [u8] {
    self.slice
  }
}

impl Drop for Extent {
  fn drop(&mut self) {
    if self.slice.is_empty() {
      return;
    }
    let _ = unsafe { GLOBAL_SYSTEM.dealloc(self.slice) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::prim::page_size;

  #[test]
  fn test_extent_new() {
    let ps = page_size();
    let extent = Extent::new(ps);
    assert!(extent.is_ok());
    let extent = extent.unwrap();
    assert_eq!(extent.as_ref().len(), ps);
  }

  #[test]
  fn test_extent_rounds_to_pages() {
    let ps = page_size();
    let extent = Extent::new(ps + 1).unwrap();
    assert_eq!(extent.len(), ps * 2);
  }

  #[test]
  fn test_extent_zero_size() {
    let extent = Extent::new(0);
    assert!(extent.is_ok());
    let extent = extent.unwrap();
    assert!(extent.is_empty());
  }

  #[test]
  fn test_extent_as_mut() {
    let ps = page_size();
    let mut extent = Extent::new(ps).unwrap();
    let slice = extent.as_mut();
    assert_eq!(slice.len(), ps);
    slice[0] = 42;
    assert_eq!(slice[0], 42);
  }

  #[test]
  fn test_extent_cast_fits() {
    let ps = page_size();
    let mut extent = Extent::new(ps).unwrap();
    let words = ps / core::mem::size_of::<usize>();
    let ptr = extent.cast::<usize>(words).unwrap();
    unsafe {
      ptr.as_ptr().add(words - 1).write(7);
      assert_eq!(*ptr.as_ptr().add(words - 1), 7);
      assert_eq!(*ptr.as_ptr(), 0);
    }
  }

  #[test]
  fn test_extent_cast_out_of_bounds() {
    let ps = page_size();
    let mut extent = Extent::new(ps).unwrap();
    let words = ps / core::mem::size_of::<usize>();
    assert!(matches!(
      extent.cast::<usize>(words + 1),
      Err(ExtentError::OutOfBounds)
    ));
    assert!(matches!(
      extent.cast::<usize>(usize::MAX),
      Err(ExtentError::OutOfBounds)
    ));
  }
}
