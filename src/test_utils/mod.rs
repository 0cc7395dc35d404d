//! Test utilities for Prism
//!
//! - [`init_test_logging`] - route `tracing` output through the test harness
//! - [`TestSite`] - a temporary template tree with its own cache directory
//!
//! # Example
//!
//! ```rust,ignore
//! use prism::test_utils::TestSite;
//! use serde_json::json;
//!
//! let site = TestSite::new()
//!     .with_template("layouts/base.html", "<main>@yield('body')</main>")
//!     .with_template("home.html", "@extends('layouts.base')\n@section('body')hi @endsection");
//! assert_eq!(site.engine().render("home", &json!({})).unwrap(), "<main>hi </main>");
//! ```

use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::templating::{Engine, EngineConfig};

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`. With neither, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=prism=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Template tree in a temporary directory.
///
/// Templates live under `<root>/templates` and artifacts under
/// `<root>/cache`. The directory is removed when the site is dropped.
pub struct TestSite {
    temp: TempDir,
}

impl TestSite {
    #[must_use]
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(temp.path().join("templates")).expect("create templates dir");
        Self {
            temp,
        }
    }

    /// Add a template at `relative` under the templates directory.
    #[must_use]
    pub fn with_template(self, relative: &str, content: &str) -> Self {
        self.write_template(relative, content);
        self
    }

    pub fn write_template(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.templates_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create template parent dir");
        }
        std::fs::write(&path, content).expect("write template");
        path
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("cache")
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(vec![self.templates_dir()]).with_cache_dir(self.cache_dir())
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.config())
    }

    /// Number of artifacts currently in the cache directory.
    pub fn artifact_count(&self) -> usize {
        std::fs::read_dir(self.cache_dir()).map(|entries| entries.count()).unwrap_or(0)
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}
