//! Configuration for Prism
//!
//! The CLI reads its settings from `prism.toml`:
//!
//! ```toml
//! [engine]
//! paths = ["templates"]               # template roots, tried in order
//! extensions = ["prism.html", "html"]
//! cache_dir = ".prism/cache"
//! cache = true
//! debug = false
//! strict = false
//!
//! [globals]
//! app_name = "Prism"
//!
//! [components]
//! alert = "components.alert"
//! ```
//!
//! Every key is optional. Relative paths are resolved against the directory
//! holding the configuration file, so `prism --config site/prism.toml` works
//! from anywhere.
//!
//! # Environment Overrides
//!
//! - `PRISM_CACHE_DIR` - artifact directory
//! - `PRISM_DEBUG` - `1`/`true` enables inline runtime diagnostics
//! - `PRISM_NO_CACHE` - `1`/`true` disables artifact persistence

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::CONFIG_FILE_NAME;
use crate::core::PrismError;
use crate::templating::{Engine, EngineConfig};

/// Contents of `prism.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrismConfig {
    pub engine: EngineSection,

    /// Variables available to every template.
    pub globals: Map<String, Value>,

    /// Component alias to template name.
    pub components: BTreeMap<String, String>,
}

/// The `[engine]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub paths: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub cache_dir: PathBuf,
    pub cache: bool,
    pub debug: bool,
    pub strict: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            paths: defaults.paths,
            extensions: defaults.extensions,
            cache_dir: defaults.cache_dir,
            cache: defaults.cache,
            debug: defaults.debug,
            strict: defaults.strict,
        }
    }
}

impl PrismConfig {
    /// Load the configuration the CLI should use.
    ///
    /// An explicit path must exist. Without one, `prism.toml` in the current
    /// directory is used when present, otherwise the defaults apply.
    /// Environment overrides are applied in both cases.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(PrismError::ConfigNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Some(path) => Self::load_from(path)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => Self::load_from(Path::new(CONFIG_FILE_NAME))?,
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file and resolve its relative paths.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content).map_err(|e| PrismError::ConfigParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let base = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        config.resolve_relative_to(base);
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in &mut self.engine.paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if self.engine.cache_dir.is_relative() {
            self.engine.cache_dir = base.join(&self.engine.cache_dir);
        }
    }

    /// Apply `PRISM_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("PRISM_CACHE_DIR").filter(|d| !d.is_empty()) {
            self.engine.cache_dir = PathBuf::from(dir);
        }
        if let Some(debug) = lookup("PRISM_DEBUG") {
            self.engine.debug = is_enabled(&debug);
        }
        if lookup("PRISM_NO_CACHE").is_some_and(|v| is_enabled(&v)) {
            self.engine.cache = false;
        }
    }

    pub fn validate(&self) -> Result<(), PrismError> {
        if self.engine.paths.is_empty() {
            return Err(PrismError::InvalidConfig {
                reason: "[engine] paths must name at least one template directory".to_string(),
            });
        }
        if self.engine.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(PrismError::InvalidConfig {
                reason: "[engine] extensions must name at least one file extension".to_string(),
            });
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            paths: self.engine.paths.clone(),
            extensions: self.engine.extensions.clone(),
            cache_dir: self.engine.cache_dir.clone(),
            cache: self.engine.cache,
            debug: self.engine.debug,
            strict: self.engine.strict,
        }
    }

    /// Build an engine with the configured globals and component aliases.
    pub fn build_engine(&self) -> Engine {
        let mut engine = Engine::new(self.engine_config());
        engine.set_globals(self.globals.clone());
        for (alias, template) in &self.components {
            engine.register_component(alias.as_str(), template.as_str());
        }
        engine
    }
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = PrismConfig::default();
        assert_eq!(config.engine.paths, vec![PathBuf::from("templates")]);
        assert_eq!(config.engine.extensions, vec!["prism.html", "html"]);
        assert!(config.engine.cache);
        assert!(!config.engine.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("prism.toml");
        std::fs::write(
            &path,
            r#"
                [engine]
                paths = ["views", "/abs/views"]
                debug = true

                [globals]
                app_name = "Prism"
                nav = ["home", "about"]

                [components]
                alert = "components.alert"
            "#,
        )
        .unwrap();

        let config = PrismConfig::load_from(&path).unwrap();
        assert_eq!(config.engine.paths, vec![temp.path().join("views"), PathBuf::from("/abs/views")]);
        assert_eq!(config.engine.cache_dir, temp.path().join(".prism/cache"));
        assert!(config.engine.debug);
        assert_eq!(Value::Object(config.globals.clone()), json!({"app_name": "Prism", "nav": ["home", "about"]}));
        assert_eq!(config.components.get("alert").map(String::as_str), Some("components.alert"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("prism.toml");
        std::fs::write(&path, "[engine]\ncache_directory = 'x'\n").unwrap();

        let err = PrismConfig::load_from(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<PrismError>(), Some(PrismError::ConfigParseError { .. })));
    }

    #[test]
    fn test_explicit_missing_config() {
        let err = PrismConfig::load(Some(Path::new("/definitely/missing/prism.toml"))).unwrap_err();
        assert!(matches!(err.downcast_ref::<PrismError>(), Some(PrismError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [("PRISM_CACHE_DIR", "/tmp/prism"), ("PRISM_DEBUG", "1"), ("PRISM_NO_CACHE", "true")].into();
        let mut config = PrismConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.cache_dir, PathBuf::from("/tmp/prism"));
        assert!(config.engine.debug);
        assert!(!config.engine.cache);

        config.apply_overrides(|key| (key == "PRISM_DEBUG").then(|| "0".to_string()));
        assert!(!config.engine.debug);
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let mut config = PrismConfig::default();
        config.engine.paths.clear();
        assert!(matches!(config.validate(), Err(PrismError::InvalidConfig { .. })));
    }

    #[test]
    fn test_build_engine_applies_globals_and_components() {
        let temp = tempdir().unwrap();
        let views = temp.path().join("views");
        std::fs::create_dir_all(views.join("ui")).unwrap();
        std::fs::write(views.join("page.html"), "@component('alert')hi @endcomponent").unwrap();
        std::fs::write(views.join("ui/alert.html"), "{{ app_name }}: {{{ slot }}}").unwrap();

        let mut config = PrismConfig::default();
        config.engine.paths = vec![views];
        config.engine.cache_dir = temp.path().join("cache");
        config.globals.insert("app_name".into(), json!("Prism"));
        config.components.insert("alert".into(), "ui.alert".into());

        let engine = config.build_engine();
        assert_eq!(engine.render("page", &json!({})).unwrap(), "Prism: hi ");
    }
}
