//! Shared helpers for the Prism integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use prism::test_utils::TestSite;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// A site with `prism.toml` pointing at its own templates and cache.
pub struct CliSite {
    pub site: TestSite,
}

impl CliSite {
    pub fn new() -> Self {
        let site = TestSite::new();
        std::fs::write(
            site.root().join("prism.toml"),
            "[engine]\npaths = [\"templates\"]\ncache_dir = \"cache\"\n\n[globals]\napp_name = \"Prism\"\n",
        )
        .unwrap();
        Self {
            site,
        }
    }

    pub fn with_template(self, relative: &str, content: &str) -> Self {
        self.site.write_template(relative, content);
        self
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.site.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.site.root()
    }

    /// `prism` running inside the site directory with a clean environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("prism").unwrap();
        cmd.current_dir(self.root())
            .env_remove("PRISM_CACHE_DIR")
            .env_remove("PRISM_DEBUG")
            .env_remove("PRISM_NO_CACHE")
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Move a file's modification time `seconds` into the future.
pub fn touch_forward(path: &Path, seconds: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(seconds)).unwrap();
}
