//! Compiled artifact cache.
//!
//! Every compiled program is persisted as JSON under the cache directory:
//!
//! ```text
//! .prism/cache/
//! ├── 3f1c…9a.prism.json          # sha256(resolved source path)
//! └── string-77b0…e1.prism.json   # sha256(template string content)
//! ```
//!
//! An artifact is reused while the source's modification time is not newer
//! than the artifact's. String artifacts are keyed by content, so they never
//! go stale. Artifacts are written to a temporary file in the cache directory
//! and renamed over the target, which lets concurrent renders race on the
//! same artifact without ever exposing a partial file.
//!
//! Decoded programs are memoized in memory by artifact path and artifact
//! modification time, so warm renders skip both the read and the decode.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::ast::Program;
use super::error::TemplateError;
use crate::constants::{ARTIFACT_EXTENSION, ARTIFACT_FORMAT_VERSION, STRING_ARTIFACT_PREFIX};
use crate::utils::fs::{atomic_write, modified_time_if_exists, sha256_hex};

#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    enabled: bool,
    memo: DashMap<PathBuf, (SystemTime, Arc<Program>)>,
    compiles: AtomicUsize,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            memo: DashMap::new(),
            compiles: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Artifact location for a resolved template file.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        let digest = sha256_hex(source.to_string_lossy().as_bytes());
        self.dir.join(format!("{digest}.{ARTIFACT_EXTENSION}"))
    }

    /// Artifact location for an in-memory template string.
    pub fn string_artifact_path(&self, content: &str) -> PathBuf {
        let digest = sha256_hex(content);
        self.dir.join(format!("{STRING_ARTIFACT_PREFIX}{digest}.{ARTIFACT_EXTENSION}"))
    }

    /// Number of compilations performed through this cache.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    /// Whether `artifact` may be used for a source last modified at
    /// `source_mtime` (`None` for content-addressed strings).
    pub fn is_fresh(&self, artifact: &Path, source_mtime: Option<SystemTime>) -> bool {
        if !self.enabled {
            return false;
        }
        match (modified_time_if_exists(artifact), source_mtime) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(artifact_mtime), Some(source_mtime)) => source_mtime <= artifact_mtime,
        }
    }

    /// Load a fresh artifact, or compile and persist a new one.
    ///
    /// A corrupt or outdated artifact is logged and replaced.
    pub fn get_or_compile<F>(
        &self,
        artifact: &Path,
        source_mtime: Option<SystemTime>,
        compile: F,
    ) -> Result<Arc<Program>, TemplateError>
    where
        F: FnOnce() -> Result<Program, TemplateError>,
    {
        if self.is_fresh(artifact, source_mtime) {
            match self.load(artifact) {
                Ok(program) => return Ok(program),
                Err(e) => warn!("{}; recompiling", e),
            }
        }

        let program = compile()?;
        let count = self.compiles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Compiled '{}' (compilation #{})", program.template, count);

        let program = Arc::new(program);
        if self.enabled {
            self.persist(artifact, &program);
        }
        Ok(program)
    }

    fn load(&self, artifact: &Path) -> Result<Arc<Program>, TemplateError> {
        let mtime = modified_time_if_exists(artifact);
        if let (Some(mtime), Some(entry)) = (mtime, self.memo.get(artifact)) {
            if entry.0 == mtime {
                return Ok(Arc::clone(&entry.1));
            }
        }

        let text = fs::read_to_string(artifact).map_err(|e| TemplateError::io(artifact, e))?;
        let program = Program::from_text(&text).map_err(|e| TemplateError::Artifact {
            path: artifact.to_path_buf(),
            reason: e.to_string(),
        })?;
        if program.format != ARTIFACT_FORMAT_VERSION {
            return Err(TemplateError::Artifact {
                path: artifact.to_path_buf(),
                reason: format!(
                    "format version {} does not match {}",
                    program.format, ARTIFACT_FORMAT_VERSION
                ),
            });
        }

        debug!("Loaded artifact {}", artifact.display());
        let program = Arc::new(program);
        if let Some(mtime) = mtime {
            self.memo.insert(artifact.to_path_buf(), (mtime, Arc::clone(&program)));
        }
        Ok(program)
    }

    /// Write `program` to `artifact`. Failure leaves the render unaffected.
    fn persist(&self, artifact: &Path, program: &Arc<Program>) {
        let text = match program.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize '{}': {}", program.template, e);
                return;
            }
        };
        if let Err(e) = atomic_write(artifact, text.as_bytes()) {
            warn!("Failed to persist artifact {}: {:#}", artifact.display(), e);
            return;
        }
        if let Some(mtime) = modified_time_if_exists(artifact) {
            self.memo.insert(artifact.to_path_buf(), (mtime, Arc::clone(program)));
        }
    }

    /// Delete every artifact under the cache directory. Returns how many
    /// were removed.
    pub fn clear(&self) -> Result<usize, TemplateError> {
        self.memo.clear();
        if !self.dir.exists() {
            return Ok(0);
        }

        let suffix = format!(".{ARTIFACT_EXTENSION}");
        let mut removed = 0;
        let entries = fs::read_dir(&self.dir).map_err(|e| TemplateError::io(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| TemplateError::io(&self.dir, e))?.path();
            let is_artifact = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(&suffix));
            if is_artifact && path.is_file() {
                fs::remove_file(&path).map_err(|e| TemplateError::io(&path, e))?;
                removed += 1;
            }
        }

        debug!("Removed {} artifacts from {}", removed, self.dir.display());
        Ok(removed)
    }
}
