//! Template error handling for Prism
//!
//! This module provides the structured error type shared by the compiler, the
//! runtime and the engine, together with the formatting used by the CLI and by
//! the engine's diagnostic mode.
//!
//! # Error Categories
//!
//! - **Resolution**: a template name does not map to any source file
//! - **Compile**: unbalanced constructs, unknown directives or filters,
//!   malformed argument lists
//! - **Runtime**: failures while executing a compiled program
//!
//! Resolution and compile failures always reach the caller. Runtime failures
//! are replaced by an inline HTML fragment when the engine runs in debug mode.

use std::fmt;
use std::path::PathBuf;

use crate::constants::ERROR_CONTEXT_LINES;
use crate::templating::utils::escape_html;

/// Position inside a template source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Broad classification of a [`TemplateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    Compile,
    Runtime,
    Io,
}

/// Errors produced while resolving, compiling or rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No candidate file exists for the logical name.
    #[error("Template '{name}' not found")]
    NotFound {
        name: String,
        searched: Vec<PathBuf>,
    },

    /// The logical name cannot be mapped to a path at all.
    #[error("Invalid template name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: String,
    },

    #[error("Compile error in '{template}' at {location}: {message}")]
    Compile {
        template: String,
        message: String,
        location: Location,
        /// Offending source fragment, when it can be isolated
        fragment: Option<String>,
    },

    #[error("Runtime error in '{template}'{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Runtime {
        template: String,
        message: String,
        line: Option<usize>,
    },

    #[error("Failed to access '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A compiled artifact exists but cannot be decoded.
    #[error("Corrupt compiled artifact '{}': {reason}", .path.display())]
    Artifact {
        path: PathBuf,
        reason: String,
    },
}

impl TemplateError {
    pub fn compile(
        template: impl Into<String>,
        message: impl Into<String>,
        location: Location,
        fragment: Option<String>,
    ) -> Self {
        TemplateError::Compile {
            template: template.into(),
            message: message.into(),
            location,
            fragment,
        }
    }

    pub fn runtime(
        template: impl Into<String>,
        message: impl Into<String>,
        line: Option<usize>,
    ) -> Self {
        TemplateError::Runtime {
            template: template.into(),
            message: message.into(),
            line,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::NotFound {
                ..
            }
            | TemplateError::InvalidName {
                ..
            } => ErrorKind::Resolution,
            TemplateError::Compile {
                ..
            } => ErrorKind::Compile,
            TemplateError::Runtime {
                ..
            } => ErrorKind::Runtime,
            TemplateError::Io {
                ..
            }
            | TemplateError::Artifact {
                ..
            } => ErrorKind::Io,
        }
    }

    /// Name of the template the error belongs to, if known.
    pub fn template(&self) -> Option<&str> {
        match self {
            TemplateError::NotFound {
                name,
                ..
            }
            | TemplateError::InvalidName {
                name,
                ..
            } => Some(name),
            TemplateError::Compile {
                template,
                ..
            }
            | TemplateError::Runtime {
                template,
                ..
            } => Some(template),
            _ => None,
        }
    }

    /// Generate a multi-line, user-facing description of the error.
    ///
    /// `source` is the template text, used to quote the lines around a compile
    /// error when available.
    pub fn format_with_context(&self, source: Option<&str>) -> String {
        match self {
            TemplateError::NotFound {
                name,
                searched,
            } => format_not_found_error(name, searched),
            TemplateError::Compile {
                template,
                message,
                location,
                fragment,
            } => format_compile_error(template, message, *location, fragment.as_deref(), source),
            TemplateError::Runtime {
                template,
                message,
                line,
            } => format_runtime_error(template, message, *line),
            other => format!("ERROR: {other}\n"),
        }
    }

    /// Render the error as the inline HTML fragment used by debug mode.
    pub fn to_diagnostic_html(&self) -> String {
        let (template, message, location) = match self {
            TemplateError::Runtime {
                template,
                message,
                line,
            } => (template.as_str(), message.as_str(), line.map(|l| format!("line {l}"))),
            TemplateError::Compile {
                template,
                message,
                location,
                ..
            } => (template.as_str(), message.as_str(), Some(location.to_string())),
            other => {
                return format!(
                    "<div class=\"prism-error\"><strong>Prism error</strong><pre>{}</pre></div>",
                    escape_html(&other.to_string())
                );
            }
        };

        let mut html = String::from("<div class=\"prism-error\">");
        html.push_str("<strong>Prism error</strong> in <code>");
        html.push_str(&escape_html(template));
        html.push_str("</code>");
        if let Some(location) = location {
            html.push_str(" (");
            html.push_str(&escape_html(&location));
            html.push(')');
        }
        html.push_str("<pre>");
        html.push_str(&escape_html(message));
        html.push_str("</pre></div>");
        html
    }
}

fn format_not_found_error(name: &str, searched: &[PathBuf]) -> String {
    let mut msg = String::new();

    msg.push_str("ERROR: Template Not Found\n\n");
    msg.push_str(&format!("Template: {}\n", name));

    if !searched.is_empty() {
        msg.push_str("\nSearched:\n");
        for path in searched {
            msg.push_str(&format!("  {}\n", path.display()));
        }
    }

    msg.push_str("\nSUGGESTION: Template names use dots as directory separators ");
    msg.push_str("(`pages.home` -> `pages/home.html`).\n");
    msg.push_str("Check the configured template paths and extensions.\n\n");

    msg
}

fn format_compile_error(
    template: &str,
    message: &str,
    location: Location,
    fragment: Option<&str>,
    source: Option<&str>,
) -> String {
    let mut msg = String::new();

    msg.push_str("ERROR: Template Compile Error\n\n");
    msg.push_str(&format!("Error: {}\n", message));
    msg.push_str(&format!("Template: {}\n", template));
    msg.push_str(&format!("Location: {}\n", location));

    if let Some(fragment) = fragment {
        msg.push_str(&format!("Fragment: {}\n", fragment));
    }

    if let Some(source) = source {
        let lines = extract_context_lines(source, location.line, ERROR_CONTEXT_LINES);
        if !lines.is_empty() {
            msg.push('\n');
            for (number, line) in lines {
                let marker = if number == location.line {
                    ">"
                } else {
                    " "
                };
                msg.push_str(&format!("{} {:>4} | {}\n", marker, number, line));
            }
        }
    }

    msg.push_str("\nSUGGESTION: Check the template for unclosed tags or unknown names.\n");
    msg.push_str("Common issues:\n");
    msg.push_str("  - Unclosed {{ }} or {% %} delimiters\n");
    msg.push_str("  - Block tags without their matching end tag\n");
    msg.push_str("  - Filters or directives that were never registered\n\n");

    msg
}

fn format_runtime_error(template: &str, message: &str, line: Option<usize>) -> String {
    let mut msg = String::new();

    msg.push_str("ERROR: Template Runtime Error\n\n");
    msg.push_str(&format!("Error: {}\n", message));
    msg.push_str(&format!("Template: {}\n", template));
    if let Some(line) = line {
        msg.push_str(&format!("Line: {}\n", line));
    }
    msg.push('\n');

    msg
}

/// Returns up to `context_size` lines before and after `error_line`, with
/// their 1-based numbers.
fn extract_context_lines(
    content: &str,
    error_line: usize,
    context_size: usize,
) -> Vec<(usize, String)> {
    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();

    if error_line == 0 || error_line > total_lines {
        return Vec::new();
    }

    let start = error_line.saturating_sub(context_size + 1);
    let end = (error_line + context_size).min(total_lines);

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(idx, line)| (start + idx + 1, line.to_string()))
        .collect()
}
