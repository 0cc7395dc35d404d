//! Expression language used inside interpolations and tag arguments.
//!
//! Expressions are parsed once at compile time into [`Expr`] trees which are
//! serialized into the compiled program and evaluated by the runtime.
//!
//! Precedence, lowest first:
//!
//! | level | operators |
//! |-------|-----------|
//! | pipeline | `expr \| filter:arg:arg` |
//! | ternary | `cond ? a : b` |
//! | coalesce | `??` |
//! | or | `\|\|`, `or` |
//! | and | `&&`, `and` |
//! | equality | `==`, `!=` |
//! | comparison | `<`, `<=`, `>`, `>=`, `in` |
//! | concat | `~` |
//! | additive | `+`, `-` |
//! | multiplicative | `*`, `/`, `%` |
//! | unary | `!`, `not`, `-` |
//! | postfix | `.name`, `[index]`, `name(args)` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Var {
        name: String,
    },
    Attr {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Array {
        items: Vec<Expr>,
    },
    Object {
        entries: Vec<(String, Expr)>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Filter {
        name: String,
        input: Box<Expr>,
        args: Vec<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    /// `isset`/`empty` guards; lookups inside never fail on undefined names.
    Test {
        test: TestKind,
        operand: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Or,
    And,
    Coalesce,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Isset,
    Empty,
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal {
                value: Value::String(s),
            } => Some(s),
            _ => None,
        }
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal {
                ..
            }
            | Expr::Var {
                ..
            } => {}
            Expr::Attr {
                target,
                ..
            } => target.walk(visit),
            Expr::Index {
                target,
                index,
            } => {
                target.walk(visit);
                index.walk(visit);
            }
            Expr::Array {
                items,
            } => items.iter().for_each(|item| item.walk(visit)),
            Expr::Object {
                entries,
            } => entries.iter().for_each(|(_, value)| value.walk(visit)),
            Expr::Unary {
                operand,
                ..
            }
            | Expr::Test {
                operand,
                ..
            } => operand.walk(visit),
            Expr::Binary {
                left,
                right,
                ..
            } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Expr::Filter {
                input,
                args,
                ..
            } => {
                input.walk(visit);
                args.iter().for_each(|arg| arg.walk(visit));
            }
            Expr::Call {
                args,
                ..
            } => args.iter().for_each(|arg| arg.walk(visit)),
        }
    }

    /// Name of the last filter of a pipeline, if this is one.
    pub fn outer_filter(&self) -> Option<&str> {
        match self {
            Expr::Filter {
                name,
                ..
            } => Some(name),
            _ => None,
        }
    }
}

/// Parse a complete expression.
pub fn parse_expression(source: &str) -> Result<Expr, String> {
    let mut parser = ExprParser::new(source)?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a comma separated argument list (possibly empty).
pub fn parse_arguments(source: &str) -> Result<Vec<Expr>, String> {
    let mut parser = ExprParser::new(source)?;
    let args = parser.parse_list_until_end()?;
    Ok(args)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Punct(&'static str),
}

const PUNCTUATION: &[&str] = &[
    "..=", "==", "!=", "<=", ">=", "&&", "||", "??", "=>", "..", "(", ")", "[", "]", "{", "}", ",",
    ":", ".", "|", "?", "!", "<", ">", "+", "-", "*", "/", "%", "~", "=",
];

fn tokenize(source: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            if is_float {
                tokens.push(Tok::Float(text.parse().map_err(|_| format!("invalid number '{text}'"))?));
            } else {
                tokens.push(Tok::Int(text.parse().map_err(|_| format!("invalid number '{text}'"))?));
            }
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            tokens.push(Tok::Ident(ident.trim_start_matches('$').to_string()));
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err("unterminated string literal".to_string());
                };
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let Some(&escaped) = chars.get(i) else {
                        return Err("unterminated string literal".to_string());
                    };
                    i += 1;
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '\\' | '\'' | '"' => value.push(escaped),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                } else {
                    value.push(ch);
                }
            }
            tokens.push(Tok::Str(value));
        } else {
            let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
            let Some(punct) = PUNCTUATION.iter().find(|p| rest.starts_with(**p)) else {
                return Err(format!("unexpected character '{c}'"));
            };
            tokens.push(Tok::Punct(punct));
            i += punct.chars().count();
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser over expression tokens.
///
/// Tag parsing uses the lower-level methods directly for forms such as
/// `items as key => value` and `i in 1..10`.
pub struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    pub fn new(source: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    /// Current position, for [`ExprParser::restore`].
    pub fn checkpoint(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, checkpoint: usize) {
        self.pos = checkpoint;
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn expect_end(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected {} after expression", describe(tok))),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn peek_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Tok::Punct(p)) if *p == punct)
    }

    pub fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, punct: &str) -> Result<(), String> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(format!("expected '{}', found {}", punct, self.describe_next()))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(name)) if name == keyword)
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("expected '{}', found {}", keyword, self.describe_next()))
        }
    }

    pub fn expect_ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(name)) if !is_reserved(&name) => Ok(name),
            Some(tok) => Err(format!("expected a variable name, found {}", describe(&tok))),
            None => Err("expected a variable name, found end of input".to_string()),
        }
    }

    fn describe_next(&self) -> String {
        self.peek().map(describe).unwrap_or_else(|| "end of input".to_string())
    }

    pub fn parse_list_until_end(&mut self) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        if self.at_end() {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.at_end() {
                return Ok(items);
            }
            self.expect_punct(",")?;
        }
    }

    /// Parse a full expression including filter pipelines.
    pub fn parse_expr(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_ternary()?;
        while self.eat_punct("|") {
            let name = match self.next() {
                Some(Tok::Ident(name)) => name,
                Some(tok) => return Err(format!("expected a filter name, found {}", describe(&tok))),
                None => return Err("expected a filter name after '|'".to_string()),
            };
            let mut args = Vec::new();
            while self.eat_punct(":") {
                args.push(self.parse_unary()?);
            }
            expr = Expr::Filter {
                name,
                input: Box::new(expr),
                args,
            };
        }
        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let condition = self.parse_binary(0)?;
        if self.eat_punct("?") {
            let then = self.parse_binary(0)?;
            self.expect_punct(":")?;
            let otherwise = self.parse_binary(0)?;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(condition)
    }

    fn peek_binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.peek()? {
            Tok::Punct("??") => (BinaryOp::Coalesce, 0),
            Tok::Punct("||") => (BinaryOp::Or, 1),
            Tok::Ident(k) if k == "or" => (BinaryOp::Or, 1),
            Tok::Punct("&&") => (BinaryOp::And, 2),
            Tok::Ident(k) if k == "and" => (BinaryOp::And, 2),
            Tok::Punct("==") => (BinaryOp::Eq, 3),
            Tok::Punct("!=") => (BinaryOp::Ne, 3),
            Tok::Punct("<") => (BinaryOp::Lt, 4),
            Tok::Punct("<=") => (BinaryOp::Le, 4),
            Tok::Punct(">") => (BinaryOp::Gt, 4),
            Tok::Punct(">=") => (BinaryOp::Ge, 4),
            Tok::Ident(k) if k == "in" => (BinaryOp::In, 4),
            Tok::Punct("~") => (BinaryOp::Concat, 5),
            Tok::Punct("+") => (BinaryOp::Add, 6),
            Tok::Punct("-") => (BinaryOp::Sub, 6),
            Tok::Punct("*") => (BinaryOp::Mul, 7),
            Tok::Punct("/") => (BinaryOp::Div, 7),
            Tok::Punct("%") => (BinaryOp::Rem, 7),
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over the binary operator table.
    pub fn parse_binary(&mut self, min_level: u8) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while let Some((op, level)) = self.peek_binary_op() {
            if level < min_level {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Parse an additive-level expression (used by range bounds).
    pub fn parse_additive(&mut self) -> Result<Expr, String> {
        self.parse_binary(6)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat_punct("!") || self.eat_keyword("not") {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.eat_punct("-") {
            let operand = self.parse_unary()?;
            return Ok(match operand {
                Expr::Literal {
                    value,
                } if value.is_i64() => Expr::literal(-value.as_i64().unwrap_or_default()),
                Expr::Literal {
                    value,
                } if value.is_f64() => Expr::literal(-value.as_f64().unwrap_or_default()),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(other),
                },
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = match self.next() {
                    Some(Tok::Ident(name)) => name,
                    Some(Tok::Int(i)) => i.to_string(),
                    Some(tok) => return Err(format!("expected an attribute name, found {}", describe(&tok))),
                    None => return Err("expected an attribute name after '.'".to_string()),
                };
                expr = Expr::Attr {
                    target: Box::new(expr),
                    name,
                };
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Int(i)) => Ok(Expr::literal(i)),
            Some(Tok::Float(f)) => Ok(Expr::literal(f)),
            Some(Tok::Str(s)) => Ok(Expr::literal(s)),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::literal(true)),
                "false" => Ok(Expr::literal(false)),
                "null" | "none" => Ok(Expr::literal(Value::Null)),
                "isset" | "empty" if self.peek_punct("(") => {
                    self.pos += 1;
                    let operand = self.parse_expr()?;
                    self.expect_punct(")")?;
                    let test = if name == "isset" {
                        TestKind::Isset
                    } else {
                        TestKind::Empty
                    };
                    Ok(Expr::Test {
                        test,
                        operand: Box::new(operand),
                    })
                }
                _ if is_reserved(&name) => Err(format!("unexpected keyword '{name}'")),
                _ if self.peek_punct("(") => {
                    self.pos += 1;
                    let args = self.parse_delimited(")")?;
                    Ok(Expr::Call {
                        function: name,
                        args,
                    })
                }
                _ => Ok(Expr::Var {
                    name,
                }),
            },
            Some(Tok::Punct("(")) => {
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Some(Tok::Punct("[")) => Ok(Expr::Array {
                items: self.parse_delimited("]")?,
            }),
            Some(Tok::Punct("{")) => self.parse_object(),
            Some(tok) => Err(format!("unexpected {}", describe(&tok))),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_delimited(&mut self, close: &str) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        if self.eat_punct(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.eat_punct(close) {
                return Ok(items);
            }
            self.expect_punct(",")?;
            if self.eat_punct(close) {
                return Ok(items);
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, String> {
        let mut entries = Vec::new();
        if self.eat_punct("}") {
            return Ok(Expr::Object {
                entries,
            });
        }
        loop {
            let key = match self.next() {
                Some(Tok::Ident(name)) | Some(Tok::Str(name)) => name,
                Some(Tok::Int(i)) => i.to_string(),
                Some(tok) => return Err(format!("expected an object key, found {}", describe(&tok))),
                None => return Err("unterminated object literal".to_string()),
            };
            if !self.eat_punct(":") && !self.eat_punct("=>") {
                return Err(format!("expected ':' after object key '{key}'"));
            }
            let value = self.parse_expr()?;
            entries.push((key, value));
            if self.eat_punct("}") {
                break;
            }
            self.expect_punct(",")?;
            if self.eat_punct("}") {
                break;
            }
        }
        Ok(Expr::Object {
            entries,
        })
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "and" | "or" | "not" | "in" | "as" | "true" | "false" | "null" | "none")
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("'{name}'"),
        Tok::Str(s) => format!("string '{s}'"),
        Tok::Int(i) => format!("number {i}"),
        Tok::Float(f) => format!("number {f}"),
        Tok::Punct(p) => format!("'{p}'"),
    }
}
