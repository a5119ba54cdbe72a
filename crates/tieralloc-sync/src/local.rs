use core::{
  alloc::Layout,
  marker::PhantomData,
  mem,
  ptr::NonNull,
};

use spin::Mutex;
use tieralloc_fixed::bump::Bump;
use tieralloc_list::{
  Block,
  FreeList,
};

use crate::lazy::LazyLock;

/// Distinct slot layouts whose slots are recycled. Slots of any further
/// layout are simply not reused.
const SLOT_CLASSES: usize = 8;

struct SlotClass {
  layout: Layout,
  free: FreeList,
}

/// Backing store for every thread's slot, plus the slots of exited threads
/// grouped by layout.
struct SlotPool {
  bump: Bump,
  classes: [Option<SlotClass>; SLOT_CLASSES],
}

static TLS_SLOTS: Mutex<SlotPool> = Mutex::new(SlotPool::new());

/// Slots double as free-list blocks once their value is dropped.
fn slot_layout<T>() -> Option<Layout> {
  let size = mem::size_of::<T>().max(Block::LINK_SIZE);
  let align = mem::align_of::<T>().max(mem::align_of::<usize>());
  Layout::from_size_align(size, align).ok()
}

impl SlotPool {
  const fn new() -> Self {
    Self {
      bump: Bump::new(1024 * 16),
      classes: [const { None }; SLOT_CLASSES],
    }
  }

  fn free_list(&mut self, layout: Layout) -> Option<&mut FreeList> {
    let index = self
      .classes
      .iter()
      .position(|class| matches!(class, Some(class) if class.layout == layout))
      .or_else(|| self.classes.iter().position(Option::is_none))?;

    let class = self.classes[index].get_or_insert(SlotClass {
      layout,
      free: FreeList::new(),
    });
    Some(&mut class.free)
  }

  fn take<T>(&mut self) -> Option<NonNull<T>> {
    let layout = slot_layout::<T>()?;
    if let Some(slot) = self.free_list(layout).and_then(FreeList::pop) {
      return Some(slot.cast());
    }
    self.bump.allocate(layout).ok().map(NonNull::cast)
  }

  /// # Safety
  ///
  /// `slot` must come from [`SlotPool::take::<T>`] and hold no live value.
  unsafe fn give<T>(&mut self, slot: NonNull<T>) {
    let Some(layout) = slot_layout::<T>() else {
      return;
    };
    if let Some(list) = self.free_list(layout) {
      unsafe { list.push(slot.cast()) };
    }
  }
}

/// Per-thread value keyed by a pthread TLS key.
///
/// Unlike `std::thread_local!`, slot storage comes from a private bump arena,
/// so this is safe to use from inside a global allocator. The value is
/// created lazily on first access from each thread and dropped by the key
/// destructor when the thread exits, after which its slot can be handed to
/// a new thread.
pub struct ThreadLocal<T, F = fn() -> T> {
  key: LazyLock<Option<libc::pthread_key_t>>,
  init: F,
  _marker: PhantomData<T>,
}

unsafe extern "C" fn tls_detor<T>(ptr: *mut libc::c_void) {
  if ptr.is_null() {
    return;
  }

  let slot = ptr as *mut T;
  unsafe { core::ptr::drop_in_place(slot) };
  if let Some(slot) = NonNull::new(slot) {
    unsafe { TLS_SLOTS.lock().give(slot) };
  }
}

fn obtain_key<T>() -> Option<libc::pthread_key_t> {
  let mut key: libc::pthread_key_t = 0;
  let ret = unsafe { libc::pthread_key_create(&mut key, Some(tls_detor::<T>)) };
  (ret == 0).then_some(key)
}

impl<T, F> ThreadLocal<T, F>
where
  F: Fn() -> T,
{
  pub const fn new(init: F) -> Self {
    Self {
      key: LazyLock::new(obtain_key::<T>),
      init,
      _marker: PhantomData,
    }
  }

  fn get_or_init(&self) -> Option<*mut T> {
    let key = (*self.key)?;
    let ptr = unsafe { libc::pthread_getspecific(key) } as *mut T;
    if !ptr.is_null() {
      return Some(ptr);
    }

    // the pool lock is released before `init` runs
    let slot = TLS_SLOTS.lock().take::<T>()?;
    unsafe { slot.as_ptr().write((self.init)()) };

    if unsafe { libc::pthread_setspecific(key, slot.as_ptr().cast()) } != 0 {
      unsafe {
        core::ptr::drop_in_place(slot.as_ptr());
        TLS_SLOTS.lock().give(slot);
      }
      return None;
    }
    Some(slot.as_ptr())
  }

  /// Runs `f` on this thread's value, creating it first if needed.
  ///
  /// Returns `None` if no TLS slot could be set up for the calling thread.
  pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let ptr = self.get_or_init()?;
    Some(f(unsafe { &mut *ptr }))
  }
}

impl<T, F> Drop for ThreadLocal<T, F> {
  fn drop(&mut self) {
    if let Some(Some(key)) = LazyLock::get(&self.key) {
      let _ = unsafe { libc::pthread_key_delete(*key) };
    }
  }
}

unsafe impl<T, F> Send for ThreadLocal<T, F> {}
unsafe impl<T, F> Sync for ThreadLocal<T, F> {}
