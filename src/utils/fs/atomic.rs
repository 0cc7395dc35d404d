//! Atomic file write operations using temp-and-rename strategy.
//!
//! Compiled artifacts may be written by several renders at once. Each writer
//! gets its own temporary file next to the target and renames it into place,
//! so readers see either the old artifact or the new one, never a torn file.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Creates a uniquely named temporary file in the target's directory
/// 2. Writes and syncs the content
/// 3. Persists (renames) the temporary file over the target
///
/// Parent directories are created when missing. Concurrent writers race
/// safely: the last rename wins and every rename installs a complete file.
///
/// # Examples
///
/// ```rust,no_run
/// use prism::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new(".prism/cache/abc.prism.json"), b"{}")?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in: {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("Failed to write to temp file: {}", temp.path().display()))?;
    temp.as_file().sync_all().with_context(|| "Failed to sync file to disk")?;

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}
