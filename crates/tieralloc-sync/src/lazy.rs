use core::{
  cell::UnsafeCell,
  ops::Deref,
};

use spin::Once;

/// A value computed on first access, usable in a `static`.
///
/// Built on `spin::Once` so initialization never touches the global
/// allocator.
pub struct LazyLock<T, F = fn() -> T> {
  once: Once<T>,
  init: UnsafeCell<Option<F>>,
}

impl<T, F> LazyLock<T, F>
where
  F: FnOnce() -> T,
{
  pub const fn new(f: F) -> Self {
    Self {
      once: Once::new(),
      init: UnsafeCell::new(Some(f)),
    }
  }

  pub fn force(this: &LazyLock<T, F>) -> &T {
    this.once.call_once(|| {
      // SAFETY: `call_once` runs this closure at most once, with exclusive
      // access to `init`.
      match unsafe { (*this.init.get()).take() } {
        Some(f) => f(),
        None => unreachable!("LazyLock initializer already consumed"),
      }
    })
  }

  pub fn get(this: &LazyLock<T, F>) -> Option<&T> {
    this.once.get()
  }
}

impl<T, F> Deref for LazyLock<T, F>
where
  F: FnOnce() -> T,
{
  type Target = T;

  fn deref(&self) -> &Self::Target {
    Self::force(self)
  }
}

unsafe impl<T, F> Sync for LazyLock<T, F>
where
  T: Sync + Send,
  F: Send,
{
}
unsafe impl<T, F> Send for LazyLock<T, F>
where
  T: Send,
  F: Send,
{
}

#[cfg(test)]
mod tests {
  use core::sync::atomic::{
    AtomicUsize,
    Ordering,
  };

  use super::*;

  static CALLS: AtomicUsize = AtomicUsize::new(0);

  fn init() -> usize {
    CALLS.fetch_add(1, Ordering::SeqCst);
    41 + 1
  }

  static VALUE: LazyLock<usize> = LazyLock::new(init);

  #[test]
  fn initializes_once_across_threads() {
    assert!(LazyLock::get(&VALUE).is_none() || CALLS.load(Ordering::SeqCst) == 1);

    std::thread::scope(|s| {
      for _ in 0..8 {
        s.spawn(|| assert_eq!(*VALUE, 42));
      }
    });

    assert_eq!(*VALUE, 42);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(LazyLock::get(&VALUE), Some(&42));
  }

  #[test]
  fn closure_initializer() {
    let lazy = LazyLock::new(|| [7u8; 4]);
    assert!(LazyLock::get(&lazy).is_none());
    assert_eq!(lazy[3], 7);
  }
}
