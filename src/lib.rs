//! Prism - a template compiler and renderer
//!
//! Prism compiles HTML-oriented templates (layout inheritance, includes,
//! components with slots, filter pipelines, custom directives) into
//! serializable programs, caches them on disk, and renders them against
//! JSON data.
//!
//! # Modules
//!
//! - [`templating`] - lexer, compiler, runtime and the [`templating::Engine`] facade
//! - [`config`] - `prism.toml` loading and environment overrides
//! - [`core`] - application errors and user-facing error reporting
//! - [`cli`] - the `prism` command
//! - [`utils`] - atomic file writes and file metadata helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use prism::templating::{Engine, EngineConfig};
//! use serde_json::json;
//!
//! let engine = Engine::new(EngineConfig::new(vec!["templates".into()]));
//! let html = engine.render("pages.home", &json!({"title": "Welcome"}))?;
//! println!("{html}");
//! # Ok::<(), prism::templating::TemplateError>(())
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod templating;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
