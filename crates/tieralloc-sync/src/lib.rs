#![cfg_attr(not(test), no_std)]

pub mod lazy;
pub mod local;

pub use lazy::LazyLock;
pub use local::ThreadLocal;
