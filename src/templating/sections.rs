//! Section table for layout inheritance.
//!
//! One [`SectionTable`] lives for a whole render call, including the layout
//! passes it triggers. Every template in the extends chain runs at its own
//! *level*: the template being rendered is level 0, its layout level 1, and
//! so on. A section written at a lower level belongs to a descendant and
//! takes precedence over the ancestor's default content.
//!
//! `parent` inside a child section cannot know the layout's content yet (the
//! layout runs afterwards), so it leaves a placeholder that the ancestor's
//! close of the same section fills in.

use std::collections::HashMap;

/// Placeholder for `parent`, filled by the ancestor's section content.
fn parent_placeholder(name: &str) -> String {
    format!("\u{1}prism:parent:{name}\u{1}")
}

/// Remove placeholders that no ancestor filled.
fn strip_placeholders(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("\u{1}prism:parent:") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('\u{1}') {
            Some(end) => rest = &after[end + 1..],
            None => {
                rest = after;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Section,
    Push,
}

/// How a captured body is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Same level accumulates; a descendant's entry wins.
    End,
    Append,
    Overwrite,
}

#[derive(Debug, Clone)]
struct Entry {
    content: String,
    level: usize,
}

#[derive(Debug, Clone)]
struct OpenCapture {
    name: String,
    kind: CaptureKind,
    level: usize,
    used_parent: bool,
}

#[derive(Debug, Default)]
pub struct SectionTable {
    entries: HashMap<String, Entry>,
    open: Vec<OpenCapture>,
}

impl SectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin capturing `name` at `level`.
    ///
    /// A section may not open while anything is being captured; a push may
    /// not open inside another push.
    pub fn open(&mut self, name: &str, kind: CaptureKind, level: usize) -> Result<(), String> {
        let conflict = match kind {
            CaptureKind::Section => self.open.last(),
            CaptureKind::Push => self.open.iter().rev().find(|c| c.kind == CaptureKind::Push),
        };
        if let Some(current) = conflict {
            return Err(format!("cannot open '{}' while '{}' is still open", name, current.name));
        }

        self.open.push(OpenCapture {
            name: name.to_string(),
            kind,
            level,
            used_parent: false,
        });
        Ok(())
    }

    /// Commit the captured `content` of the innermost open capture and
    /// return its name.
    pub fn close(&mut self, content: String, mode: CloseMode) -> Result<String, String> {
        let capture = self.open.pop().ok_or("no section is open")?;
        let mode = if capture.kind == CaptureKind::Push {
            CloseMode::Append
        } else {
            mode
        };

        match self.entries.get_mut(&capture.name) {
            None => {
                self.entries.insert(
                    capture.name.clone(),
                    Entry {
                        content,
                        level: capture.level,
                    },
                );
            }
            Some(entry) => match mode {
                CloseMode::Overwrite => {
                    *entry = Entry {
                        content,
                        level: capture.level,
                    };
                }
                CloseMode::Append => entry.content.push_str(&content),
                CloseMode::End if entry.level < capture.level => {
                    let placeholder = parent_placeholder(&capture.name);
                    entry.content = entry.content.replace(&placeholder, &content);
                }
                CloseMode::End if capture.used_parent => entry.content = content,
                CloseMode::End => entry.content.push_str(&content),
            },
        }

        Ok(capture.name)
    }

    /// Content for `parent` inside the innermost open section.
    pub fn parent(&mut self) -> Result<String, String> {
        let capture = self
            .open
            .iter_mut()
            .rev()
            .find(|c| c.kind == CaptureKind::Section)
            .ok_or("'parent' used outside of a section")?;

        match self.entries.get(&capture.name) {
            Some(entry) if entry.level == capture.level => {
                capture.used_parent = true;
                Ok(entry.content.clone())
            }
            _ => Ok(parent_placeholder(&capture.name)),
        }
    }

    /// Inline `section(name, value)`: replaces anything written at the same
    /// or an ancestor level, but a descendant's entry wins.
    pub fn set(&mut self, name: &str, content: String, level: usize) {
        match self.entries.get_mut(name) {
            Some(entry) if entry.level < level => {
                entry.content = entry.content.replace(&parent_placeholder(name), &content);
            }
            _ => {
                self.entries.insert(
                    name.to_string(),
                    Entry {
                        content,
                        level,
                    },
                );
            }
        }
    }

    /// Final content of `name`, or `None` when nothing was written.
    pub fn yield_content(&self, name: &str) -> Result<Option<String>, String> {
        if self.open.iter().any(|c| c.name == name) {
            return Err(format!("cannot yield section '{name}' while it is still open"));
        }
        Ok(self.entries.get(name).map(|entry| strip_placeholders(&entry.content)))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_capturing(&self) -> bool {
        !self.open.is_empty()
    }
}
