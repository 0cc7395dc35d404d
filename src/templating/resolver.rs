//! Logical template name resolution.
//!
//! Templates are addressed by dotted names: `pages.dashboard` maps to
//! `pages/dashboard.<ext>` below a template root. Roots are tried in order,
//! and within each root the extensions are tried in order; the first file
//! that exists wins.

use std::path::{Path, PathBuf};

use super::error::TemplateError;

#[derive(Debug, Clone)]
pub struct TemplateResolver {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl TemplateResolver {
    pub fn new(roots: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            roots,
            extensions,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Every path `name` may resolve to, in lookup order.
    pub fn candidates(&self, name: &str) -> Result<Vec<PathBuf>, TemplateError> {
        let relative = relative_path(name)?;
        let relative = relative.as_path();
        Ok(self
            .roots
            .iter()
            .flat_map(|root| {
                self.extensions.iter().map(move |ext| {
                    let mut path = root.join(relative);
                    let file_name = format!(
                        "{}.{}",
                        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                        ext.trim_start_matches('.')
                    );
                    path.set_file_name(file_name);
                    path
                })
            })
            .collect())
    }

    /// First existing candidate for `name`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, TemplateError> {
        let candidates = self.candidates(name)?;
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => {
                tracing::trace!("Resolved template '{}' to {}", name, path.display());
                Ok(path.clone())
            }
            None => Err(TemplateError::NotFound {
                name: name.to_string(),
                searched: candidates,
            }),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

/// `pages.home` -> `pages/home`, rejecting names that could escape a root.
fn relative_path(name: &str) -> Result<PathBuf, TemplateError> {
    let invalid = |reason: &str| TemplateError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if Path::new(name).is_absolute() {
        return Err(invalid("absolute paths are not template names"));
    }

    let mut path = PathBuf::new();
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if segment.contains(['/', '\\']) {
            return Err(invalid("use dots, not path separators"));
        }
        path.push(segment);
    }
    Ok(path)
}
