use super::*;
use crate::prim::page_size;

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_posix_memory_alloc_dealloc() {
  let size = page_size();

  unsafe {
    let memory = GLOBAL_SYSTEM.alloc(size);
    assert!(memory.is_ok(), "Should allocate memory on POSIX systems");

    let slice = memory.unwrap();
    assert_eq!(slice.len(), size, "Allocated size should match requested size");
    assert!(slice.iter().all(|&b| b == 0), "Fresh mappings are zero-filled");

    slice[0] = 42;
    slice[size - 1] = 24;
    assert_eq!(slice[0], 42, "Should be able to write to allocated memory");
    assert_eq!(slice[size - 1], 24, "Should be able to write to end of allocated memory");

    let result = GLOBAL_SYSTEM.dealloc(slice);
    assert!(result.is_ok(), "Should deallocate memory successfully");
  }
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_posix_multi_page_mapping() {
  let size = page_size() * 8;

  unsafe {
    let slice = GLOBAL_SYSTEM.alloc(size).unwrap();
    assert_eq!(slice.as_ptr() as usize % page_size(), 0, "Mappings are page aligned");
    slice.fill(0xAB);
    assert_eq!(slice[size / 2], 0xAB);
    assert!(GLOBAL_SYSTEM.dealloc(slice).is_ok());
  }
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_posix_invalid_size_alignment() {
  unsafe {
    let result = GLOBAL_SYSTEM.alloc(123);
    assert!(
      matches!(result, Err(SysError::InvalidArgument)),
      "Should fail with non-page-aligned size"
    );

    let result = GLOBAL_SYSTEM.alloc(0);
    assert!(matches!(result, Err(SysError::InvalidArgument)), "Zero-sized mappings are rejected");
  }
}

#[test]
fn test_unsupported_system_alloc() {
  let system = UnsupportedSystem {};

  unsafe {
    let result = system.alloc(page_size());
    assert!(matches!(result, Err(SysError::Unsupported)), "Should return Unsupported");
  }
}

#[test]
fn test_unsupported_system_dealloc() {
  let system = UnsupportedSystem {};
  let dummy_slice = &[0u8; 4096];

  unsafe {
    let result = system.dealloc(dummy_slice);
    assert!(matches!(result, Err(SysError::Unsupported)), "Should return Unsupported");
  }
}
