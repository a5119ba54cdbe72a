#![cfg_attr(not(test), no_std)]

pub mod bump;
pub mod fixed;

pub use bump::{
  Bump,
  BumpError,
  BumpResult,
};
pub use fixed::{
  Fixed,
  FixedError,
  FixedResult,
};
