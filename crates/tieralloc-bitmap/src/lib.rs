#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{
  AtomicUsize,
  Ordering,
};


#[derive(Debug)]
pub enum BitmapError {
  OutOfBounds { index: usize, size: usize },
}

pub type BitmapWord = AtomicUsize;

const USIZE_BITS: usize = usize::BITS as usize;

/// Number of words needed to hold `fields` bits.
#[inline(always)]
pub const fn words_for(fields: usize) -> usize {
  fields.div_ceil(USIZE_BITS)
}

/// Fixed-capacity occupancy bitmap holding `WORDS * usize::BITS` bits.
#[derive(Debug)]
pub struct Bitmap<const WORDS: usize> {
  store: [BitmapWord; WORDS],
}

impl<const WORDS: usize> Default for Bitmap<WORDS> {
  fn default() -> Self {
    Self::new()
  }
}

impl<const WORDS: usize> Bitmap<WORDS> {
  pub const BITS: usize = WORDS * USIZE_BITS;

  pub const fn new() -> Self {
    Self {
      store: [const { AtomicUsize::new(0) }; WORDS],
    }
  }

  const fn position(index: usize) -> Result<(usize, usize), BitmapError> {
    if index >= Self::BITS {
      return Err(BitmapError::OutOfBounds {
        index,
        size: Self::BITS,
      });
    }
    Ok((index / USIZE_BITS, index % USIZE_BITS))
  }

  #[inline]
  pub fn set(&self, index: usize) -> Result<(), BitmapError> {
    let (word_index, bit_index) = Self::position(index)?;
    let mask = 1usize << bit_index;
    self.store[word_index].fetch_or(mask, Ordering::Relaxed);
    Ok(())
  }

  #[inline]
  pub fn clear(&self, index: usize) -> Result<(), BitmapError> {
    let (word_index, bit_index) = Self::position(index)?;
    let mask = 1usize << bit_index;
    self.store[word_index].fetch_and(!mask, Ordering::Relaxed);
    Ok(())
  }

  #[inline]
  pub fn get(&self, index: usize) -> Result<bool, BitmapError> {
    let (word_index, bit_index) = Self::position(index)?;
    let value = self.store[word_index].load(Ordering::Relaxed);
    Ok((value & (1usize << bit_index)) != 0)
  }

  /// Lowest set bit at or above `from`.
  pub fn find_fs_from(&self, from: usize) -> Option<usize> {
    if from >= Self::BITS {
      return None;
    }

    let first = from / USIZE_BITS;
    let skip = from % USIZE_BITS;
    for (word_index, word) in self.store.iter().enumerate().skip(first) {
      let mut value = word.load(Ordering::Relaxed);
      if word_index == first {
        value &= usize::MAX << skip;
      }
      if value != 0 {
        return Some(word_index * USIZE_BITS + value.trailing_zeros() as usize);
      }
    }
    None
  }
}
