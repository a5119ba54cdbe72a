#![cfg_attr(not(test), no_std)]

pub mod extent;
pub mod heap;
pub mod math;
pub mod prim;
pub mod system;
pub mod unix;

pub use system::GLOBAL_SYSTEM;

pub mod prelude {
  pub use super::{
    GLOBAL_SYSTEM,
    extent::{
      Extent,
      ExtentError,
      ExtentResult,
    },
    math::{
      align_up,
      is_aligned,
    },
    prim::{
      is_page_aligned,
      page_align,
      page_size,
      word_width,
    },
    system::{
      SysError,
      SysResult,
      System,
    },
  };
}
