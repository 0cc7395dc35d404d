//! Shared utilities.
//!
//! - [`fs`] - atomic writes, modification times and content digests

pub mod fs;

pub use fs::atomic_write;
