#![cfg_attr(not(test), no_std)]

//! Radix tree keyed by `usize`, with nodes carved from a private [`Bump`].

use core::{
  ptr::NonNull,
  sync::atomic::{
    AtomicPtr,
    Ordering,
  },
};

use tieralloc_fixed::bump::{
  Bump,
  BumpError,
};
use tieralloc_sys::prim::va_size;

#[derive(Debug)]
pub enum RTreeError {
  Bump(BumpError),
  AlreadyPresent,
}

pub type RTreeResult<T> = Result<T, RTreeError>;

struct RNode<T, const FANOUT: usize> {
  value: Option<T>,
  children: [AtomicPtr<RNode<T, FANOUT>>; FANOUT],
}

impl<T, const FANOUT: usize> RNode<T, FANOUT> {
  fn new() -> Self {
    Self {
      value: None,
      children: core::array::from_fn(|_| AtomicPtr::new(core::ptr::null_mut())),
    }
  }

  #[inline(always)]
  fn child(&self, idx: usize) -> Option<NonNull<RNode<T, FANOUT>>> {
    NonNull::new(self.children[idx].load(Ordering::Acquire))
  }

  #[inline(always)]
  fn set_child(&self, idx: usize, node: NonNull<RNode<T, FANOUT>>) {
    self.children[idx].store(node.as_ptr(), Ordering::Release);
  }
}

pub struct RTree<T, const FANOUT: usize> {
  bump: Bump,
  root: AtomicPtr<RNode<T, FANOUT>>,
  len: usize,
}

impl<T, const FANOUT: usize> RTree<T, FANOUT> {
  const BPL: usize = FANOUT.trailing_zeros() as usize;
  const MASK: usize = FANOUT - 1;

  pub const fn new(chunk_size: usize) -> Self {
    assert!(FANOUT.is_power_of_two() && FANOUT > 1);
    Self {
      bump: Bump::new(chunk_size),
      root: AtomicPtr::new(core::ptr::null_mut()),
      len: 0,
    }
  }

  const fn levels() -> usize {
    va_size().div_ceil(Self::BPL)
  }

  /// Number of keys holding a value.
  pub const fn len(&self) -> usize {
    self.len
  }

  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn new_node(&mut self) -> RTreeResult<NonNull<RNode<T, FANOUT>>> {
    let slot = self
      .bump
      .create::<RNode<T, FANOUT>>()
      .map_err(RTreeError::Bump)?;
    Ok(NonNull::from(slot.write(RNode::new())))
  }

  #[inline(always)]
  const fn index_for(key: usize, level: usize) -> usize {
    let shift = (Self::levels() - 1 - level) * Self::BPL;
    if shift >= usize::BITS as usize {
      return 0;
    }
    (key >> shift) & Self::MASK
  }

  fn ensure_root(&mut self) -> RTreeResult<NonNull<RNode<T, FANOUT>>> {
    if let Some(root) = NonNull::new(self.root.load(Ordering::Acquire)) {
      return Ok(root);
    }

    let root = self.new_node()?;
    self.root.store(root.as_ptr(), Ordering::Release);
    Ok(root)
  }

  fn ensure_leaf(&mut self, key: usize) -> RTreeResult<NonNull<RNode<T, FANOUT>>> {
    let mut current = self.ensure_root()?;

    for level in 0..Self::levels() {
      let idx = Self::index_for(key, level);
      current = match unsafe { current.as_ref() }.child(idx) {
        Some(child) => child,
        None => {
          let child = self.new_node()?;
          unsafe { current.as_ref() }.set_child(idx, child);
          child
        }
      };
    }

    Ok(current)
  }

  fn leaf(&self, key: usize) -> Option<NonNull<RNode<T, FANOUT>>> {
    let mut current = NonNull::new(self.root.load(Ordering::Acquire))?;

    for level in 0..Self::levels() {
      let idx = Self::index_for(key, level);
      current = unsafe { current.as_ref() }.child(idx)?;
    }

    Some(current)
  }

  pub fn insert(&mut self, key: usize, val: T) -> RTreeResult<()> {
    let mut leaf = self.ensure_leaf(key)?;
    let node = unsafe { leaf.as_mut() };
    if node.value.is_some() {
      return Err(RTreeError::AlreadyPresent);
    }

    node.value = Some(val);
    self.len += 1;
    Ok(())
  }

  pub fn lookup(&self, key: usize) -> Option<&T> {
    let node = self.leaf(key)?;
    unsafe { node.as_ref() }.value.as_ref()
  }
}

unsafe impl<T: Send, const FANOUT: usize> Send for RTree<T, FANOUT> {}
unsafe impl<T: Sync, const FANOUT: usize> Sync for RTree<T, FANOUT> {}
