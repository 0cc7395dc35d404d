//! `prism render`

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::CliConfig;
use crate::core::PrismError;
use crate::templating::utils::type_name;
use crate::utils::fs::atomic_write;

#[derive(Args)]
pub struct RenderCommand {
    /// Dotted template name, or template source with --string.
    #[arg(value_name = "TEMPLATE")]
    template: String,

    /// JSON or YAML file holding the render data. `-` reads JSON from stdin.
    #[arg(short, long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Treat TEMPLATE as template source instead of a name.
    #[arg(long)]
    string: bool,

    /// Write the output to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl RenderCommand {
    pub fn execute(self, config: &CliConfig) -> Result<()> {
        let engine = config.load_config()?.build_engine();
        let data = match &self.data {
            Some(path) => Value::Object(read_data(path)?),
            None => Value::Object(Map::new()),
        };

        let output = if self.string {
            engine.render_string(&self.template, &data)?
        } else {
            engine.render(&self.template, &data)?
        };

        match &self.output {
            Some(path) => {
                atomic_write(path, output.as_bytes())?;
                tracing::info!("Wrote {}", path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Read render data, which must be an object.
///
/// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as
/// JSON.
pub(crate) fn read_data(path: &Path) -> Result<Map<String, Value>> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("Failed to read render data from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read render data: {}", path.display()))?
    };

    let is_yaml = path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml");
    let parsed = if is_yaml {
        serde_yaml::from_str::<Value>(&content).map_err(|e| e.to_string()).and_then(into_object)
    } else {
        parse_data(&content)
    };

    parsed.map_err(|reason| {
        anyhow::Error::new(PrismError::InvalidData {
            path: path.display().to_string(),
            reason,
        })
    })
}

fn parse_data(content: &str) -> Result<Map<String, Value>, String> {
    serde_json::from_str::<Value>(content).map_err(|e| e.to_string()).and_then(into_object)
}

fn into_object(value: Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected an object, found {}", type_name(&other))),
    }
}
