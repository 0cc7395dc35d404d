//! `prism cache`
//!
//! ```bash
//! prism cache clear            # remove every compiled artifact
//! prism cache path pages.home  # where pages.home's artifact lives
//! prism cache warm pages.home pages.about
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CliConfig;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommands,
}

#[derive(Subcommand)]
enum CacheSubcommands {
    /// Remove all compiled artifacts from the cache directory.
    Clear,

    /// Print the artifact path of a template.
    Path {
        /// Dotted template name.
        name: String,
    },

    /// Compile templates ahead of time so the first render is a cache hit.
    Warm {
        /// Dotted template names.
        #[arg(required = true)]
        names: Vec<String>,
    },
}

impl CacheCommand {
    pub fn execute(self, config: &CliConfig) -> Result<()> {
        let engine = config.load_config()?.build_engine();

        match self.command {
            CacheSubcommands::Clear => {
                let removed = engine.clear_cache()?;
                println!(
                    "{} Removed {} artifact(s) from {}",
                    "✓".green(),
                    removed,
                    engine.config().cache_dir.display()
                );
            }
            CacheSubcommands::Path {
                name,
            } => {
                println!("{}", engine.artifact_path(&name)?.display());
            }
            CacheSubcommands::Warm {
                names,
            } => {
                if !engine.config().cache {
                    tracing::warn!("Caching is disabled; artifacts will not be written");
                }
                for name in &names {
                    engine.load_program(name)?;
                    tracing::debug!("Warmed {}", name);
                }
                println!("{} Compiled {} template(s)", "✓".green(), engine.compile_count());
            }
        }
        Ok(())
    }
}
