//! Integration test suite for Prism
//!
//! End-to-end tests that drive the engine through real template trees on
//! disk and the `prism` binary through `assert_cmd`.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **rendering**: output, escaping, control flow, includes and components
//! - **inheritance**: layouts, sections, `parent`, stacks
//! - **cache_behavior**: artifact reuse, staleness and corruption
//! - **extensions**: custom filters, directives, functions and host services
//! - **errors**: compile, resolution and runtime failures, debug mode
//! - **cli**: the `prism` command

#[path = "../common/mod.rs"]
mod common;

mod cache_behavior;
mod cli;
mod errors;
mod extensions;
mod inheritance;
mod rendering;
