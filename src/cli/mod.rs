//! Command-line interface for Prism.
//!
//! The CLI is a thin layer over [`crate::templating::Engine`]: every command
//! loads `prism.toml` (see [`crate::config`]), builds an engine from it and
//! runs one operation.
//!
//! # Commands
//!
//! - `render` - render a named template (or a string) with JSON data
//! - `compile` - compile a template file and print the program artifact
//! - `cache` - inspect or clear the compiled artifact cache
//!
//! # Examples
//!
//! ```bash
//! prism render pages.home --data home.json
//! prism render --string 'Hello {{ name }}' --data user.json
//! prism compile templates/pages/home.html
//! prism cache clear
//! prism -c site/prism.toml cache path pages.home
//! ```
//!
//! # Logging
//!
//! Logs go to stderr through `tracing`. `--verbose` enables debug output,
//! `--quiet` limits it to errors, and otherwise `RUST_LOG` is honored with
//! `warn` as the fallback.

mod cache;
mod compile;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::PrismConfig;

/// Runtime settings derived from the global flags.
///
/// Kept separate from [`Cli`] so tests can execute commands without touching
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter directive for the log subscriber. `None` defers to `RUST_LOG`.
    pub log_level: Option<String>,

    /// Configuration file given with `--config`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global log subscriber.
    ///
    /// Safe to call more than once; later calls leave the first subscriber in
    /// place.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    pub fn load_config(&self) -> Result<PrismConfig> {
        PrismConfig::load(self.config_path.as_deref())
    }
}

/// Prism template compiler and renderer.
#[derive(Parser)]
#[command(
    name = "prism",
    about = "Prism - compile and render templates",
    version,
    long_about = "Prism compiles templates with inheritance, components and filter pipelines into cached programs and renders them against JSON data."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output, including cache hits and recompiles.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to prism.toml (defaults to ./prism.toml when present).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout.
    ///
    /// The template is looked up by its dotted name (`pages.home` ->
    /// `pages/home.html`) under the configured template paths.
    Render(render::RenderCommand),

    /// Compile a template file and print the program artifact.
    Compile(compile::CompileCommand),

    /// Manage the compiled artifact cache.
    Cache(cache::CacheCommand),
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(&config)
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with explicit settings. Does not install a
    /// log subscriber.
    pub fn execute_with_config(self, config: &CliConfig) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.execute(config),
            Commands::Compile(cmd) => cmd.execute(config),
            Commands::Cache(cmd) => cmd.execute(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_log_levels() {
        let cli = Cli::parse_from(["prism", "--verbose", "cache", "clear"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["prism", "cache", "clear", "-q"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("error"));

        let cli = Cli::parse_from(["prism", "render", "home"]);
        assert_eq!(cli.build_config().log_level, None);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["prism", "-v", "-q", "render", "home"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["prism", "render", "home", "--config", "site/prism.toml"]);
        assert_eq!(cli.build_config().config_path, Some(PathBuf::from("site/prism.toml")));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
