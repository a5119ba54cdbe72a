//! General-purpose heap used for requests the tiers do not serve.

use core::ptr::NonNull;

use crate::prim::word_width;

/// Allocates `size` bytes from the platform heap.
///
/// An `align` at or below the platform's `malloc` guarantee uses `malloc`,
/// larger alignments use `posix_memalign`. Returns `None` when the heap
/// refuses the request.
pub fn heap_alloc(size: usize, align: usize) -> Option<NonNull<u8>> {
  if align <= 2 * word_width() {
    return NonNull::new(unsafe { libc::malloc(size) }.cast::<u8>());
  }

  let mut out: *mut libc::c_void = core::ptr::null_mut();
  let ret = unsafe { libc::posix_memalign(&mut out, align, size) };
  if ret != 0 {
    return None;
  }
  NonNull::new(out.cast::<u8>())
}

/// Returns a block obtained from [`heap_alloc`].
///
/// # Safety
///
/// `ptr` must come from [`heap_alloc`] and must not be used afterwards.
pub unsafe fn heap_free(ptr: NonNull<u8>) {
  unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) };
}
