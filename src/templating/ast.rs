//! Compiled program representation.
//!
//! A [`Program`] is what the compiler produces and what the artifact cache
//! stores. Its JSON serialization is the "program text": field order is fixed
//! by the struct definitions and maps preserve insertion order, so compiling
//! the same source twice yields byte-identical text.

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use crate::constants::ARTIFACT_FORMAT_VERSION;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Artifact format version, see [`ARTIFACT_FORMAT_VERSION`].
    pub format: u32,
    /// Identifier the program was compiled under (logical name or digest).
    pub template: String,
    /// Layout declared by a leading `extends`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    pub body: Vec<Node>,
}

impl Program {
    pub fn new(template: impl Into<String>, extends: Option<String>, body: Vec<Node>) -> Self {
        Self {
            format: ARTIFACT_FORMAT_VERSION,
            template: template.into(),
            extends,
            body,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Text {
        text: String,
    },
    /// Verbatim block content, never interpreted.
    Raw {
        text: String,
    },
    Output {
        expr: Expr,
        /// `{{ }}` rather than `{{{ }}}`. A safe outer filter still skips
        /// escaping; that is decided when the node runs.
        escape: bool,
        line: usize,
    },
    If {
        branches: Vec<Branch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Node>>,
        line: usize,
    },
    Foreach {
        iterable: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        value: String,
        body: Vec<Node>,
        /// `forelse` fallback rendered when the iterable is empty.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        empty: Option<Vec<Node>>,
        line: usize,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        inclusive: bool,
        body: Vec<Node>,
        line: usize,
    },
    While {
        condition: Expr,
        body: Vec<Node>,
        line: usize,
    },
    Switch {
        subject: Expr,
        cases: Vec<Case>,
        line: usize,
    },
    Break {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Expr>,
        line: usize,
    },
    Continue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Expr>,
        line: usize,
    },
    Set {
        name: String,
        value: Expr,
        line: usize,
    },
    Include {
        template: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Expr>,
        mode: IncludeMode,
        line: usize,
    },
    Component {
        name: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        props: Option<Expr>,
        /// Default slot body, exposed to the component as `slot`.
        slot: Vec<Node>,
        /// Named `slot(name)` bodies, exposed as top-level variables.
        slots: Vec<NamedSlot>,
        line: usize,
    },
    Section {
        name: String,
        body: Vec<Node>,
        close: SectionClose,
        line: usize,
    },
    /// Inline `section(name, value)`.
    SetSection {
        name: String,
        value: Expr,
        line: usize,
    },
    Yield {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Expr>,
        line: usize,
    },
    Parent {
        line: usize,
    },
    Push {
        name: String,
        body: Vec<Node>,
        line: usize,
    },
    Stack {
        name: String,
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

/// A `case` (with a value) or `default` (without) arm.
///
/// Arms fall through into the next one until a `break` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Expr>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSlot {
    pub name: String,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeMode {
    Always,
    IfExists,
    When(Expr),
}

/// How a section body is committed to the section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionClose {
    /// `endsection` / `stop`
    End,
    /// `show`: close, then yield in place
    Show,
    Append,
    Overwrite,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_program_text_shape() {
        let program = Program::new(
            "pages.home",
            Some("layouts.app".into()),
            vec![Node::Section {
                name: "content".into(),
                body: vec![Node::Text {
                    text: "Hi".into(),
                }],
                close: SectionClose::End,
                line: 2,
            }],
        );

        let value: serde_json::Value = serde_json::from_str(&program.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "format": ARTIFACT_FORMAT_VERSION,
                "template": "pages.home",
                "extends": "layouts.app",
                "body": [{
                    "node": "section",
                    "name": "content",
                    "body": [{"node": "text", "text": "Hi"}],
                    "close": "end",
                    "line": 2
                }]
            })
        );
    }

    #[test]
    fn test_program_text_round_trips() {
        let program = Program::new(
            "t",
            None,
            vec![Node::Include {
                template: Expr::literal("partials.nav"),
                data: None,
                mode: IncludeMode::When(Expr::literal(true)),
                line: 1,
            }],
        );
        let text = program.to_text().unwrap();
        assert_eq!(Program::from_text(&text).unwrap(), program);
    }
}
