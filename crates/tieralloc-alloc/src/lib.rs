#![cfg_attr(not(test), no_std)]

pub mod central;
pub mod classes;
pub mod config;
pub mod page;
pub mod tcache;

pub mod prelude {
  pub use super::{
    central::{
      CentralCache,
      CentralError,
      CentralResult,
    },
    classes::{
      class_size,
      index_for,
      round_up,
    },
    config::*,
    page::{
      PageCache,
      PageError,
      PageResult,
    },
    tcache::{
      TCacheError,
      TCacheResult,
      ThreadCache,
    },
  };
}
