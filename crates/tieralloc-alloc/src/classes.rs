//! Mapping from request sizes to size classes.
//!
//! Class `i` serves blocks of exactly `(i + 1) * ALIGNMENT` bytes. Every tier
//! indexes its free lists with the value returned by [`index_for`].

use crate::config::ALIGNMENT;

/// Rounds `bytes` up to the next multiple of [`ALIGNMENT`].
///
/// Saturates at the largest representable multiple.
#[inline(always)]
pub const fn round_up(bytes: usize) -> usize {
  match bytes.checked_add(ALIGNMENT - 1) {
    Some(sum) => sum & !(ALIGNMENT - 1),
    None => usize::MAX & !(ALIGNMENT - 1),
  }
}

/// Size-class index for a request of `bytes`. Zero-byte requests share the
/// smallest class.
#[inline(always)]
pub const fn index_for(bytes: usize) -> usize {
  let bytes = if bytes < ALIGNMENT { ALIGNMENT } else { bytes };
  bytes.div_ceil(ALIGNMENT) - 1
}

/// Block size served by class `index`.
#[inline(always)]
pub const fn class_size(index: usize) -> usize {
  (index + 1) * ALIGNMENT
}
