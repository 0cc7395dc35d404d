//! Global constants used throughout the Prism codebase.
//!
//! Delimiters, limits and on-disk naming live here so the lexer, the cache and
//! the CLI agree on them without duplicating magic values.

/// Version of the serialized program format.
///
/// Bump this whenever [`crate::templating::ast::Program`] changes shape. Artifacts
/// written with another version are treated as stale and recompiled.
pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

/// File suffix of compiled artifacts inside the cache directory.
pub const ARTIFACT_EXTENSION: &str = "prism.json";

/// Prefix of artifacts compiled from in-memory template strings.
pub const STRING_ARTIFACT_PREFIX: &str = "string-";

/// Default template file extensions, tried in order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["prism.html", "html"];

/// Default directory (relative to the working directory) holding templates.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Default directory for compiled artifacts.
pub const DEFAULT_CACHE_DIR: &str = ".prism/cache";

/// Default configuration file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "prism.toml";

/// Maximum nesting of includes, components and layouts in a single render.
///
/// Turns accidental recursion (a partial including itself, a layout extending
/// itself) into an error instead of a stack overflow.
pub const MAX_RENDER_DEPTH: usize = 64;

/// Maximum nesting of directive expansions.
///
/// A directive handler may emit other directives; this bounds the chain.
pub const MAX_DIRECTIVE_DEPTH: usize = 16;

/// Number of source lines shown around a compile error in diagnostics.
pub const ERROR_CONTEXT_LINES: usize = 2;
