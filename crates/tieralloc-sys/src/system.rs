#[cfg(any(target_os = "linux", target_os = "macos"))]
use crate::unix::UNIX_SYSTEM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysError {
  Unsupported,
  OutOfMemory,
  InvalidArgument,
}

pub type SysResult<T> = Result<T, SysError>;

/// Source of raw, page-granular memory.
///
/// # Safety
///
/// Implementors must ensure that:
/// - `alloc` returns page-aligned, zero-filled, readable and writable memory
///   that is not backed by any file
/// - `dealloc` only operates on memory previously allocated by this system
/// - Memory handed out by `alloc` is never handed out again while mapped
pub unsafe trait System
where
  Self: Send + Sync,
{
  /// Maps `size` bytes of fresh anonymous memory.
  ///
  /// # Safety
  ///
  /// Caller must ensure `size` is a multiple of the host page size.
  unsafe fn alloc<'mem>(&self, size: usize) -> SysResult<&'mem mut [u8]> {
    _ = size;
    Err(SysError::Unsupported)
  }

  /// Unmaps memory previously returned by `alloc`.
  ///
  /// # Safety
  ///
  /// Caller must ensure `slice` was previously allocated by this system,
  /// is still mapped, and will not be accessed after this call.
  unsafe fn dealloc(&self, slice: &[u8]) -> SysResult<()> {
    _ = slice;
    Err(SysError::Unsupported)
  }
}

pub struct UnsupportedSystem {}
unsafe impl System for UnsupportedSystem {}

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub static GLOBAL_SYSTEM: &dyn System = &UNIX_SYSTEM;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub static GLOBAL_SYSTEM: &dyn System = &UnsupportedSystem {};

#[cfg(test)]
mod tests;
