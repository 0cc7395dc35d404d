//! File system helpers used by the artifact cache.
//!
//! # Examples
//!
//! ```rust,no_run
//! use prism::utils::fs::{atomic_write, sha256_hex};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let name = format!("{}.prism.json", sha256_hex("templates/home.html"));
//! atomic_write(&Path::new(".prism/cache").join(name), b"{}")?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod metadata;

pub use atomic::atomic_write;
pub use metadata::{modified_time_if_exists, sha256_hex};
