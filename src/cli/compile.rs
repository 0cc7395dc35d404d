//! `prism compile`

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::CliConfig;
use crate::utils::fs::atomic_write;

#[derive(Args)]
pub struct CompileCommand {
    /// Template source file.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Template name recorded in the program. Defaults to the file stem.
    #[arg(long)]
    name: Option<String>,

    /// Write the program to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl CompileCommand {
    pub fn execute(self, config: &CliConfig) -> Result<()> {
        let engine = config.load_config()?.build_engine();
        let source = std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read template: {}", self.file.display()))?;
        let name = self.name.clone().unwrap_or_else(|| template_stem(&self.file));

        let program = engine.compiler().compile(&source, &name)?;
        tracing::debug!("Compiled {} as '{}'", self.file.display(), name);

        match &self.output {
            Some(path) => atomic_write(path, program.as_bytes())?,
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{program}")?;
            }
        }
        Ok(())
    }
}

/// `pages/home.prism.html` -> `home`
fn template_stem(path: &Path) -> String {
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    match file_name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}
