/// `None` when `align` is not a power of two.
pub const fn is_aligned(value: usize, align: usize) -> Option<bool> {
  if !align.is_power_of_two() {
    return None;
  }
  Some((value & (align - 1)) == 0)
}

/// Rounds `value` up to a multiple of `align`; `None` on overflow or a
/// non-power-of-two `align`.
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
  if !align.is_power_of_two() {
    return None;
  }

  let mask = align - 1;
  match value.checked_add(mask) {
    Some(sum) => Some(sum & !mask),
    None => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_and_word_alignment() {
    for align in [8, 4096] {
      assert_eq!(is_aligned(0, align), Some(true));
      assert_eq!(is_aligned(align, align), Some(true));
      assert_eq!(is_aligned(align + 8, align), Some(align == 8));
      assert_eq!(align_up(1, align), Some(align));
      assert_eq!(align_up(align, align), Some(align));
      assert_eq!(align_up(align + 1, align), Some(2 * align));
    }
  }

  #[test]
  fn non_power_of_two_is_rejected() {
    assert_eq!(is_aligned(96, 3), None);
    assert_eq!(is_aligned(96, 0), None);
    assert_eq!(align_up(96, 6), None);
    assert_eq!(align_up(96, 0), None);
  }

  #[test]
  fn align_up_overflow_is_none() {
    assert_eq!(align_up(usize::MAX - 6, 8), None);
    assert_eq!(align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));

    let top = 1usize << (usize::BITS - 1);
    assert_eq!(align_up(1, top), Some(top));
    assert_eq!(align_up(top + 1, top), None);
  }
}
