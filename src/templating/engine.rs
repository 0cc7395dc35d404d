//! The template engine.
//!
//! [`Engine`] is the entry point used by applications: it resolves logical
//! names to files, keeps compiled artifacts fresh, merges the global context
//! under per-call data and runs the inheritance protocol.
//!
//! # Examples
//!
//! ```rust,no_run
//! use prism::templating::{Engine, EngineConfig};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), prism::templating::TemplateError> {
//! let mut engine = Engine::new(EngineConfig::new(vec!["templates".into()]));
//! engine.add_global("app_name", json!("Prism"));
//!
//! let html = engine.render("pages.home", &json!({ "user": { "name": "Al" } }))?;
//! # Ok(())
//! # }
//! ```
//!
//! Registration methods take `&mut self` and are meant to run during setup;
//! rendering only needs `&self`, so a configured engine can be shared across
//! threads behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::ast::Program;
use super::cache::ArtifactCache;
use super::compiler::Compiler;
use super::directives::DirectiveRegistry;
use super::error::{ErrorKind, TemplateError};
use super::filters::FilterRegistry;
use super::functions::{DefaultHost, FunctionRegistry, Host};
use super::resolver::TemplateResolver;
use super::runtime::{RenderState, Runtime, TemplateLoader};
use super::utils::{merge_context, type_name};
use crate::constants::{DEFAULT_CACHE_DIR, DEFAULT_EXTENSIONS, DEFAULT_TEMPLATE_DIR};
use crate::utils::fs::{modified_time_if_exists, sha256_hex};

/// Settings an [`Engine`] is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Template roots, searched in order.
    pub paths: Vec<PathBuf>,
    /// File extensions tried for every root, in order.
    pub extensions: Vec<String>,
    pub cache_dir: PathBuf,
    /// Persist and reuse compiled artifacts.
    pub cache: bool,
    /// Replace runtime failures with an inline diagnostic.
    pub debug: bool,
    /// Treat undefined variables as errors.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(DEFAULT_TEMPLATE_DIR)],
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache: true,
            debug: false,
            strict: false,
        }
    }
}

impl EngineConfig {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

pub struct Engine {
    config: EngineConfig,
    resolver: TemplateResolver,
    cache: ArtifactCache,
    filters: FilterRegistry,
    directives: DirectiveRegistry,
    functions: FunctionRegistry,
    components: HashMap<String, String>,
    globals: Map<String, Value>,
    host: Arc<dyn Host>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("filters", &self.filters)
            .field("directives", &self.directives)
            .field("functions", &self.functions)
            .field("components", &self.components)
            .field("globals", &self.globals)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with every built-in filter, directive and function.
    pub fn new(config: EngineConfig) -> Self {
        debug!(
            "Creating engine (roots: {:?}, cache: {}, debug: {})",
            config.paths, config.cache, config.debug
        );
        Self {
            resolver: TemplateResolver::new(config.paths.clone(), config.extensions.clone()),
            cache: ArtifactCache::new(config.cache_dir.clone(), config.cache),
            filters: FilterRegistry::with_builtins(),
            directives: DirectiveRegistry::with_builtins(),
            functions: FunctionRegistry::with_builtins(),
            components: HashMap::new(),
            globals: Map::new(),
            host: Arc::new(DefaultHost),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render the template `name` with `data` merged over the globals.
    pub fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError> {
        debug!("Rendering '{}'", name);
        let program = self.load_program(name)?;
        self.run(program, data)
    }

    /// Render template source held in memory.
    ///
    /// The compiled program is cached under a digest of `content`.
    pub fn render_string(&self, content: &str, data: &Value) -> Result<String, TemplateError> {
        let program = self.compile_string(content)?;
        self.run(program, data)
    }

    /// Compiled program for `name`, compiling it if the artifact is stale.
    pub fn load_program(&self, name: &str) -> Result<Arc<Program>, TemplateError> {
        let path = self.resolver.resolve(name)?;
        let artifact = self.cache.artifact_path(&path);
        let source_mtime = modified_time_if_exists(&path);

        self.cache.get_or_compile(&artifact, source_mtime, || {
            let source = fs::read_to_string(&path).map_err(|e| TemplateError::io(&path, e))?;
            self.compiler().compile_program(&source, name)
        })
    }

    fn compile_string(&self, content: &str) -> Result<Arc<Program>, TemplateError> {
        let artifact = self.cache.string_artifact_path(content);
        self.cache.get_or_compile(&artifact, None, || {
            let id = format!("string:{}", &sha256_hex(content)[..12]);
            self.compiler().compile_program(content, &id)
        })
    }

    /// Compiler bound to this engine's registries.
    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.filters, &self.directives, &self.functions)
    }

    fn run(&self, program: Arc<Program>, data: &Value) -> Result<String, TemplateError> {
        let template = program.template.clone();
        let runtime = Runtime {
            filters: &self.filters,
            functions: &self.functions,
            host: self.host.as_ref(),
            loader: self,
            strict: self.config.strict,
        };

        let result = self
            .call_context(&template, data)
            .and_then(|context| runtime.render(program, context, &mut RenderState::new()));

        match result {
            Err(e) if self.config.debug && e.kind() == ErrorKind::Runtime => {
                warn!("Rendering '{}' failed: {}", template, e);
                Ok(e.to_diagnostic_html())
            }
            other => other,
        }
    }

    fn call_context(&self, template: &str, data: &Value) -> Result<Map<String, Value>, TemplateError> {
        match data {
            Value::Object(map) => Ok(merge_context(&self.globals, map)),
            Value::Null => Ok(self.globals.clone()),
            other => Err(TemplateError::runtime(
                template,
                format!("render data must be an object, got {}", type_name(other)),
                None,
            )),
        }
    }

    /// Number of compilations performed so far.
    pub fn compile_count(&self) -> usize {
        self.cache.compile_count()
    }

    /// Delete every compiled artifact. Returns how many were removed.
    pub fn clear_cache(&self) -> Result<usize, TemplateError> {
        self.cache.clear()
    }

    /// Artifact location for the template `name`.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
        let path = self.resolver.resolve(name)?;
        Ok(self.cache.artifact_path(&path))
    }

    pub fn template_exists(&self, name: &str) -> bool {
        self.resolver.exists(name)
    }

    pub fn resolve(&self, name: &str) -> Result<PathBuf, TemplateError> {
        self.resolver.resolve(name)
    }

    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.filters.register(name, filter);
    }

    /// Register a filter whose output is never escaped.
    pub fn register_safe_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.filters.register_safe(name, filter);
    }

    pub fn register_directive<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.directives.register(name, handler);
    }

    pub fn register_block_directive<O, C>(&mut self, name: impl Into<String>, open: O, close: C)
    where
        O: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
        C: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.directives.register_block(name, open, close);
    }

    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&dyn Host, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
    }

    /// Alias a component name to a template.
    pub fn register_component(&mut self, alias: impl Into<String>, template: impl Into<String>) {
        self.components.insert(alias.into(), template.into());
    }

    pub fn add_global(&mut self, key: impl Into<String>, value: Value) {
        self.globals.insert(key.into(), value);
    }

    pub fn set_globals(&mut self, globals: Map<String, Value>) {
        self.globals = globals;
    }

    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }

    pub fn set_host(&mut self, host: impl Host + 'static) {
        self.host = Arc::new(host);
    }
}

impl TemplateLoader for Engine {
    fn load(&self, name: &str) -> Result<Arc<Program>, TemplateError> {
        self.load_program(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.template_exists(name)
    }

    fn component_template(&self, name: &str) -> String {
        self.components.get(name).cloned().unwrap_or_else(|| name.to_string())
    }
}
