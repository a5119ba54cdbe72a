#![cfg_attr(not(test), no_std)]

//! Intrusive singly linked lists threaded through free memory blocks.
//!
//! While a block is free its first word holds the address of the next free
//! block of the same size (or null). That word is only meaningful while the
//! block sits in a list; once a block is handed out the caller owns every byte
//! of it.

use core::{
  marker::PhantomData,
  mem,
  ptr::NonNull,
};

use getset::CopyGetters;

type RawLink = Option<NonNull<u8>>;

/// View of a free block as storage for one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Block(NonNull<u8>);

impl Block {
  pub const LINK_SIZE: usize = mem::size_of::<RawLink>();

  /// # Safety
  ///
  /// `ptr` must point to at least [`Block::LINK_SIZE`] writable bytes,
  /// aligned for a pointer, that nothing else reads or writes while the
  /// block is free.
  #[inline(always)]
  pub const unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
    Self(ptr)
  }

  #[inline(always)]
  pub const fn as_ptr(self) -> NonNull<u8> {
    self.0
  }

  #[inline(always)]
  unsafe fn next(self) -> Option<Block> {
    unsafe { self.0.cast::<RawLink>().read() }.map(Block)
  }

  #[inline(always)]
  unsafe fn set_next(self, next: Option<Block>) {
    unsafe { self.0.cast::<RawLink>().write(next.map(Block::as_ptr)) };
  }
}

/// A detached run of `len` linked blocks.
///
/// Following links from `head` visits exactly `len` blocks ending at `tail`.
/// The link stored in `tail` is unspecified until the chain is spliced.
#[derive(Debug, CopyGetters)]
pub struct Chain {
  #[getset(get_copy = "pub")]
  head: Block,
  #[getset(get_copy = "pub")]
  tail: Block,
  #[getset(get_copy = "pub")]
  len: usize,
}

impl Chain {
  /// Slices `count` blocks of `size` bytes out of `region` and links them in
  /// address order.
  ///
  /// # Safety
  ///
  /// `region` must be owned by the caller, valid for `size * count` bytes and
  /// aligned for a pointer; `size` must be a non-zero multiple of the pointer
  /// alignment and at least [`Block::LINK_SIZE`].
  pub unsafe fn carve(region: NonNull<u8>, size: usize, count: usize) -> Option<Chain> {
    if count == 0 {
      return None;
    }

    let head = unsafe { Block::from_raw(region) };
    let mut tail = head;
    for _ in 1..count {
      let next = unsafe { Block::from_raw(tail.as_ptr().add(size)) };
      unsafe { tail.set_next(Some(next)) };
      tail = next;
    }
    unsafe { tail.set_next(None) };

    Some(Chain {
      head,
      tail,
      len: count,
    })
  }

  /// Splits off the first block, returning it with whatever remains.
  pub fn pop_front(self) -> (NonNull<u8>, Option<Chain>) {
    let first = self.head.as_ptr();
    if self.len == 1 {
      return (first, None);
    }

    // SAFETY: a chain of len > 1 has a linked successor to its head.
    let rest = unsafe { self.head.next() }.map(|head| Chain {
      head,
      tail: self.tail,
      len: self.len - 1,
    });
    (first, rest)
  }

  pub fn blocks(&self) -> ChainIter<'_> {
    ChainIter {
      next: Some(self.head),
      remaining: self.len,
      marker: PhantomData,
    }
  }
}

unsafe impl Send for Chain {}

pub struct ChainIter<'chain> {
  next: Option<Block>,
  remaining: usize,
  marker: PhantomData<&'chain Chain>,
}

impl Iterator for ChainIter<'_> {
  type Item = NonNull<u8>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }

    let current = self.next?;
    self.remaining -= 1;
    if self.remaining > 0 {
      self.next = unsafe { current.next() };
    }
    Some(current.as_ptr())
  }
}

/// Head of a free list plus the number of blocks reachable from it.
#[derive(Debug, CopyGetters)]
pub struct FreeList {
  head: Option<Block>,
  #[getset(get_copy = "pub")]
  len: usize,
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None, len: 0 }
  }

  #[inline(always)]
  pub const fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// # Safety
  ///
  /// `ptr` must satisfy [`Block::from_raw`] and must not already be in any
  /// list.
  #[inline]
  pub unsafe fn push(&mut self, ptr: NonNull<u8>) {
    let block = unsafe { Block::from_raw(ptr) };
    unsafe { block.set_next(self.head) };
    self.head = Some(block);
    self.len += 1;
  }

  #[inline]
  pub fn pop(&mut self) -> Option<NonNull<u8>> {
    let block = self.head?;
    // SAFETY: every block in the list was linked by `push` or `push_chain`.
    self.head = unsafe { block.next() };
    self.len -= 1;
    Some(block.as_ptr())
  }

  /// Links `chain` in front of the current contents.
  pub fn push_chain(&mut self, chain: Chain) {
    // SAFETY: the chain owns its blocks; its tail link is free to overwrite.
    unsafe { chain.tail.set_next(self.head) };
    self.head = Some(chain.head);
    self.len += chain.len;
  }

  /// Detaches exactly `count` blocks from the front.
  ///
  /// All or nothing: if fewer than `count` blocks are linked the list is left
  /// untouched and `None` is returned.
  pub fn take(&mut self, count: usize) -> Option<Chain> {
    if count == 0 {
      return None;
    }

    let head = self.head?;
    let mut tail = head;
    for _ in 1..count {
      tail = unsafe { tail.next() }?;
    }

    self.head = unsafe { tail.next() };
    unsafe { tail.set_next(None) };
    self.len = self.len.saturating_sub(count);

    Some(Chain {
      head,
      tail,
      len: count,
    })
  }

  pub fn take_all(&mut self) -> Option<Chain> {
    let len = self.len;
    self.take(len)
  }
}

unsafe impl Send for FreeList {}
