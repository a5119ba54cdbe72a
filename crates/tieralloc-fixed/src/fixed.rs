use core::alloc::Layout;

use tieralloc_sys::math::align_up;

#[derive(Debug)]
pub enum FixedError {
  OutOfMemory,
  Invalid,
}

pub type FixedResult<T> = Result<T, FixedError>;

/// Bump cursor over a fixed-size byte region the caller owns.
#[derive(Debug)]
pub struct Fixed {
  max: usize,
  offset: usize,
}

impl Fixed {
  pub const fn new(max: usize) -> Self {
    Self { max, offset: 0 }
  }

  pub const fn remaining(&self) -> usize {
    self.max - self.offset
  }

  fn start_offset(&self, base: usize, align: usize) -> FixedResult<usize> {
    let cursor = base.checked_add(self.offset).ok_or(FixedError::Invalid)?;
    let aligned = align_up(cursor, align).ok_or(FixedError::Invalid)?;
    aligned.checked_sub(base).ok_or(FixedError::Invalid)
  }

  /// Reserves `layout` inside the region starting at `base`, returning the
  /// offset of the reservation.
  pub fn reserve(&mut self, base: usize, layout: Layout) -> FixedResult<usize> {
    let start = self.start_offset(base, layout.align())?;
    let end = start
      .checked_add(layout.size())
      .ok_or(FixedError::Invalid)?;

    if end > self.max {
      return Err(FixedError::OutOfMemory);
    }

    self.offset = end;
    Ok(start)
  }

  pub fn allocate<'slice>(
    &mut self,
    slice: &'slice mut [u8],
    layout: Layout,
  ) -> FixedResult<&'slice mut [u8]> {
    if slice.len() < self.max {
      return Err(FixedError::Invalid);
    }

    let start = self.reserve(slice.as_ptr() as usize, layout)?;
    Ok(&mut slice[start..start + layout.size()])
  }
}
