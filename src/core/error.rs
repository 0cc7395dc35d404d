//! Error handling for the Prism CLI
//!
//! Library code reports failures through typed errors: [`TemplateError`] for
//! everything the template engine does, and [`PrismError`] for the
//! surrounding application concerns (configuration, render data). The CLI
//! works with [`anyhow::Error`] and turns whatever reaches `main` into an
//! [`ErrorContext`] with [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use prism::core::{PrismError, user_friendly_error};
//!
//! let error = anyhow::Error::new(PrismError::ConfigNotFound {
//!     path: "prism.toml".to_string(),
//! });
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::templating::TemplateError;

#[derive(Error, Debug)]
pub enum PrismError {
    /// A configuration file named explicitly with `--config` is missing.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: String,
    },

    #[error("Failed to parse {file}: {reason}")]
    ConfigParseError {
        file: String,
        reason: String,
    },

    /// The configuration parsed but holds values Prism cannot use.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    /// A `--data` file is not a JSON object.
    #[error("Invalid render data in {path}: {reason}")]
    InvalidData {
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{message}")]
    Other {
        message: String,
    },
}

/// A [`PrismError`] with the suggestion and details shown to CLI users.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: PrismError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: PrismError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error (shown in green).
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error (shown in yellow).
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a tailored suggestion.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<PrismError>() {
        Ok(prism_error) => return create_error_context(prism_error),
        Err(other) => other,
    };
    let error = match error.downcast::<TemplateError>() {
        Ok(template_error) => return create_error_context(PrismError::Template(template_error)),
        Err(other) => other,
    };

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(PrismError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check the permissions of the template and cache directories");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(PrismError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(PrismError::ConfigParseError {
            file: "prism.toml".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in prism.toml. Verify quotes, brackets, and table names");
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(PrismError::Other {
        message,
    })
}

fn create_error_context(error: PrismError) -> ErrorContext {
    let (details, suggestion) = match &error {
        PrismError::ConfigNotFound {
            ..
        } => (None, Some("Create a prism.toml or drop --config to use the defaults")),
        PrismError::ConfigParseError {
            ..
        } => (None, Some("Check the TOML syntax. Verify quotes, brackets, and table names")),
        PrismError::InvalidConfig {
            ..
        } => (
            Some(
                "Supported keys: [engine] paths, extensions, cache_dir, cache, debug, strict; [globals]; [components]"
                    .to_string(),
            ),
            None,
        ),
        PrismError::InvalidData {
            ..
        } => (None, Some("Render data must be a JSON object, e.g. {\"name\": \"Al\"}")),
        PrismError::Template(template_error) => template_hints(template_error),
        PrismError::Other {
            ..
        } => (None, None),
    };

    let mut context = ErrorContext::new(error);
    if let Some(details) = details {
        context = context.with_details(details);
    }
    if let Some(suggestion) = suggestion {
        context = context.with_suggestion(suggestion);
    }
    context
}

fn template_hints(error: &TemplateError) -> (Option<String>, Option<&'static str>) {
    match error {
        TemplateError::NotFound {
            searched,
            ..
        } => {
            let paths: Vec<String> = searched.iter().map(|p| format!("  {}", p.display())).collect();
            (
                Some(format!("Searched:\n{}", paths.join("\n"))),
                Some(
                    "Template names use dots as directory separators (`pages.home` -> `pages/home.html`). Check [engine] paths and extensions",
                ),
            )
        }
        TemplateError::InvalidName {
            ..
        } => (None, Some("Use a dotted name such as `pages.home`")),
        TemplateError::Compile {
            location,
            fragment,
            ..
        } => (
            Some(match fragment {
                Some(fragment) => format!("at {location}: {fragment}"),
                None => format!("at {location}"),
            }),
            Some("Check for unclosed tags, unbalanced block directives, and unregistered filters or directives"),
        ),
        TemplateError::Runtime {
            ..
        } => (None, Some("Check the render data, or set debug = true to see the failure inline")),
        TemplateError::Io {
            ..
        }
        | TemplateError::Artifact {
            ..
        } => (
            Some("Compiled artifacts are rebuilt automatically after the cache is cleared".to_string()),
            Some("Run `prism cache clear` and check the cache directory permissions"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::Location;
    use std::path::PathBuf;

    #[test]
    fn test_error_context_display() {
        let context = ErrorContext::new(PrismError::InvalidConfig {
            reason: "no template paths".into(),
        })
        .with_details("d")
        .with_suggestion("s");

        assert_eq!(context.to_string(), "Invalid configuration: no template paths\nDetails: d\nSuggestion: s");
    }

    #[test]
    fn test_user_friendly_template_not_found() {
        let error = anyhow::Error::new(TemplateError::NotFound {
            name: "pages.home".into(),
            searched: vec![PathBuf::from("templates/pages/home.html")],
        });
        let context = user_friendly_error(error);

        assert!(matches!(context.error, PrismError::Template(TemplateError::NotFound { .. })));
        assert!(context.details.unwrap().contains("templates/pages/home.html"));
        assert!(context.suggestion.unwrap().contains("dots"));
    }

    #[test]
    fn test_user_friendly_compile_error_keeps_location() {
        let error = anyhow::Error::new(TemplateError::compile(
            "home",
            "unknown filter 'uper'",
            Location::new(3, 7),
            Some("{{ x | uper }}".into()),
        ));
        let context = user_friendly_error(error);
        assert_eq!(context.details.as_deref(), Some("at line 3, column 7: {{ x | uper }}"));
    }

    #[test]
    fn test_user_friendly_error_wrapped_prism_error() {
        let error = anyhow::Error::new(PrismError::ConfigNotFound {
            path: "x.toml".into(),
        })
        .context("loading configuration");
        let context = user_friendly_error(error);
        assert!(matches!(context.error, PrismError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_user_friendly_generic_error_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let context = user_friendly_error(error);
        let message = context.to_string();
        assert!(message.starts_with("outer"));
        assert!(message.contains("1: root cause"));
    }
}
