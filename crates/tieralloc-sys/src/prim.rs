use crate::math::{
  align_up,
  is_aligned,
};
use core::sync::atomic::{
  AtomicUsize,
  Ordering,
};

#[derive(Debug, PartialEq)]
pub enum PrimError {
  InvalidAlignment,
  Overflow,
}

pub type PrimResult<T> = Result<T, PrimError>;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const COMMON_PAGE_SIZE: usize = 4096;

/// Number of significant bits in a user-space virtual address.
const VA_BITS: usize = 48;

pub const fn word_width() -> usize {
  core::mem::size_of::<usize>()
}

pub const fn va_size() -> usize {
  VA_BITS
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn page_size_helper() -> usize {
  unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn page_size_helper() -> usize {
  COMMON_PAGE_SIZE
}

/// Native page size of the host, cached after the first query.
pub fn page_size() -> usize {
  static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

  match PAGE_SIZE.load(Ordering::Acquire) {
    0 => {
      let size = page_size_helper();
      PAGE_SIZE.store(size, Ordering::Release);
      size
    }
    size => size,
  }
}

pub fn page_align(value: usize) -> PrimResult<usize> {
  align_up(value, page_size()).ok_or(PrimError::Overflow)
}

pub fn is_page_aligned(value: usize) -> PrimResult<bool> {
  is_aligned(value, page_size()).ok_or(PrimError::InvalidAlignment)
}
