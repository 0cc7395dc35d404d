//! Recursive-descent parser from tokens to the program AST.
//!
//! The parser runs after directive expansion, so every tag it sees is a
//! built-in tag. Block tags are parsed by reading nodes until one of the
//! expected closers appears; any other closer, or the end of input, is a
//! compile error pointing at the tag that was left open.

use super::ast::{
    Branch, Case, IncludeMode, NamedSlot, Node, Program, SectionClose,
};
use super::error::{Location, TemplateError};
use super::expr::{Expr, ExprParser, TestKind, UnaryOp, parse_arguments, parse_expression};
use super::filters::FilterRegistry;
use super::functions::FunctionRegistry;
use super::lexer::{Spanned, Token};
use super::utils::{find_similar_names, suggestion_suffix};

/// Tags handled by the compiler itself. They take precedence over
/// directives of the same name.
pub const BUILTIN_TAGS: &[&str] = &[
    "if", "elseif", "else", "endif", "unless", "endunless", "isset", "endisset", "empty",
    "endempty", "foreach", "endforeach", "forelse", "endforelse", "for", "endfor", "while",
    "endwhile", "switch", "case", "default", "endswitch", "break", "continue", "set", "extends",
    "include", "includeIf", "includeWhen", "component", "endcomponent", "slot", "endslot",
    "section", "endsection", "stop", "show", "append", "overwrite", "yield", "parent", "push",
    "endpush", "stack", "raw", "endraw", "verbatim", "endverbatim",
];

pub fn is_builtin_tag(name: &str) -> bool {
    BUILTIN_TAGS.contains(&name)
}

const SECTION_CLOSERS: &[&str] = &["endsection", "stop", "show", "append", "overwrite"];

/// Terminator for a block directive's expansion. Not a valid tag name, so it
/// never collides with source tags.
const DIRECTIVE_END: &str = "@end";

#[derive(Debug, Clone)]
struct Tag {
    name: String,
    args: Option<String>,
    source: String,
    location: Location,
}

/// Lexical blocks that constrain which tags may appear inside them.
#[derive(Debug, Clone, PartialEq)]
enum Block {
    Loop,
    Switch,
    Section(String),
    Push(String),
    Component,
}

pub struct Parser<'a> {
    template: &'a str,
    tokens: std::vec::IntoIter<Spanned>,
    filters: &'a FilterRegistry,
    functions: &'a FunctionRegistry,
    blocks: Vec<Block>,
}

impl<'a> Parser<'a> {
    pub fn new(
        template: &'a str,
        tokens: Vec<Spanned>,
        filters: &'a FilterRegistry,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self {
            template,
            tokens: tokens.into_iter(),
            filters,
            functions,
            blocks: Vec::new(),
        }
    }

    pub fn parse_program(mut self) -> Result<Program, TemplateError> {
        let extends = self.take_extends()?;
        let (body, _) = self.parse_nodes(&[])?;
        Ok(Program::new(self.template, extends, body))
    }

    /// Consume a leading `extends` tag. Only whitespace may precede it.
    fn take_extends(&mut self) -> Result<Option<String>, TemplateError> {
        let remaining: Vec<Spanned> = self.tokens.as_slice().to_vec();
        let first = remaining.iter().position(|spanned| match &spanned.token {
            Token::Text(text) => !text.trim().is_empty(),
            _ => true,
        });

        let Some(index) = first else {
            return Ok(None);
        };
        let Token::Tag {
            name,
            args,
            source,
        } = &remaining[index].token
        else {
            return Ok(None);
        };
        if name != "extends" {
            return Ok(None);
        }

        let tag = Tag {
            name: name.clone(),
            args: args.clone(),
            source: source.clone(),
            location: remaining[index].location,
        };
        let layout = self.literal_name(&tag)?;
        self.tokens = remaining.into_iter().skip(index + 1).collect::<Vec<_>>().into_iter();
        Ok(Some(layout))
    }

    /// Parse nodes until a tag in `ends` (returned) or the end of input.
    fn parse_nodes(&mut self, ends: &[&str]) -> Result<(Vec<Node>, Option<Tag>), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(spanned) = self.tokens.next() {
            let location = spanned.location;
            match spanned.token {
                Token::Text(text) => nodes.push(Node::Text {
                    text,
                }),
                Token::Raw(text) => nodes.push(Node::Raw {
                    text,
                }),
                Token::Output {
                    expr,
                    escape,
                } => nodes.push(self.output(&expr, escape, location)?),
                Token::Tag {
                    name,
                    args,
                    source,
                } => {
                    let tag = Tag {
                        name,
                        args,
                        source,
                        location,
                    };
                    let is_empty_guard = tag.name == "empty" && tag.args.is_some();
                    if ends.contains(&tag.name.as_str()) && !is_empty_guard {
                        return Ok((nodes, Some(tag)));
                    }
                    nodes.push(self.parse_tag(tag)?);
                }
                Token::DirectiveStart {
                    name,
                    source,
                } => {
                    let opener = Tag {
                        name,
                        args: None,
                        source,
                        location,
                    };
                    nodes.extend(self.parse_directive_body(&opener)?);
                }
                Token::DirectiveEnd {
                    name,
                    source,
                } => {
                    let closer = Tag {
                        name: DIRECTIVE_END.to_string(),
                        args: Some(name),
                        source,
                        location,
                    };
                    if ends.contains(&DIRECTIVE_END) {
                        return Ok((nodes, Some(closer)));
                    }
                    let directive = closer.args.as_deref().unwrap_or_default();
                    return Err(self.error(
                        &closer,
                        format!(
                            "'end{directive}' closes directive '{directive}' while a block inside it is still open (expected '{}')",
                            ends.join("' or '")
                        ),
                    ));
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_until(&mut self, opener: &Tag, ends: &[&str]) -> Result<(Vec<Node>, Tag), TemplateError> {
        match self.parse_nodes(ends)? {
            (nodes, Some(closer)) => Ok((nodes, closer)),
            (_, None) => Err(self.error(
                opener,
                format!("unclosed '{}' (expected '{}')", opener.name, ends.join("' or '")),
            )),
        }
    }

    /// Nodes of a block directive's expansion, which must nest cleanly.
    fn parse_directive_body(&mut self, opener: &Tag) -> Result<Vec<Node>, TemplateError> {
        match self.parse_nodes(&[DIRECTIVE_END])? {
            (nodes, Some(_)) => Ok(nodes),
            (_, None) => Err(self.error(opener, format!("unclosed directive '{}'", opener.name))),
        }
    }

    fn parse_tag(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        tracing::trace!("Parsing tag '{}' at {}", tag.name, tag.location);
        match tag.name.as_str() {
            "if" => self.parse_if(tag),
            "unless" => self.parse_unless(tag),
            "isset" => self.parse_guard(tag, TestKind::Isset, "endisset"),
            "empty" if tag.args.is_some() => self.parse_guard(tag, TestKind::Empty, "endempty"),
            "foreach" => self.parse_foreach(tag, false),
            "forelse" => self.parse_foreach(tag, true),
            "for" => self.parse_for(tag),
            "while" => self.parse_while(tag),
            "switch" => self.parse_switch(tag),
            "break" => self.parse_loop_control(tag, true),
            "continue" => self.parse_loop_control(tag, false),
            "set" => self.parse_set(tag),
            "include" | "includeIf" | "includeWhen" => self.parse_include(tag),
            "component" => self.parse_component(tag),
            "section" => self.parse_section(tag),
            "yield" => self.parse_yield(tag),
            "parent" => self.parse_parent(tag),
            "push" => self.parse_push(tag),
            "stack" => Ok(Node::Stack {
                name: self.literal_name(&tag)?,
                line: tag.location.line,
            }),
            "extends" => Err(self.error(&tag, "'extends' must be the first tag in the template")),
            name if SECTION_CLOSERS.contains(&name) => {
                Err(self.error(&tag, format!("'{name}' outside of a section")))
            }
            name if is_builtin_tag(name) => Err(self.error(&tag, format!("unexpected '{name}'"))),
            name => Err(self.error(&tag, format!("unknown directive '{name}'"))),
        }
    }

    fn output(&self, source: &str, escape: bool, location: Location) -> Result<Node, TemplateError> {
        let fragment = if escape {
            format!("{{{{ {source} }}}}")
        } else {
            format!("{{{{{{ {source} }}}}}}")
        };
        let expr = parse_expression(source).map_err(|message| {
            TemplateError::compile(
                self.template,
                format!("invalid expression: {message}"),
                location,
                Some(fragment.clone()),
            )
        })?;
        self.validate(&expr, location, &fragment)?;

        Ok(Node::Output {
            expr,
            escape,
            line: location.line,
        })
    }

    fn parse_if(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let mut condition = self.tag_expr(&tag)?;
        let mut branches = Vec::new();

        let otherwise = loop {
            let (body, closer) = self.parse_until(&tag, &["elseif", "else", "endif"])?;
            branches.push(Branch {
                condition,
                body,
            });
            match closer.name.as_str() {
                "elseif" => condition = self.tag_expr(&closer)?,
                "else" => {
                    self.no_args(&closer)?;
                    break Some(self.parse_until(&tag, &["endif"])?.0);
                }
                _ => break None,
            }
        };

        Ok(Node::If {
            branches,
            otherwise,
            line: tag.location.line,
        })
    }

    fn parse_unless(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let condition = Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self.tag_expr(&tag)?),
        };
        self.conditional(tag, condition, "endunless")
    }

    fn parse_guard(&mut self, tag: Tag, test: TestKind, end: &str) -> Result<Node, TemplateError> {
        let condition = Expr::Test {
            test,
            operand: Box::new(self.tag_expr(&tag)?),
        };
        self.conditional(tag, condition, end)
    }

    /// Single-branch conditional with an optional `else`.
    fn conditional(&mut self, tag: Tag, condition: Expr, end: &str) -> Result<Node, TemplateError> {
        let (body, closer) = self.parse_until(&tag, &["else", end])?;
        let otherwise = if closer.name == "else" {
            self.no_args(&closer)?;
            Some(self.parse_until(&tag, &[end])?.0)
        } else {
            None
        };

        Ok(Node::If {
            branches: vec![Branch {
                condition,
                body,
            }],
            otherwise,
            line: tag.location.line,
        })
    }

    fn parse_foreach(&mut self, tag: Tag, forelse: bool) -> Result<Node, TemplateError> {
        let args = self.required_args(&tag)?;
        let (iterable, key, value) = self
            .foreach_header(args)
            .map_err(|message| self.error(&tag, format!("invalid '{}' header: {message}", tag.name)))?;
        self.validate(&iterable, tag.location, &tag.source)?;

        let end = if forelse {
            "endforelse"
        } else {
            "endforeach"
        };
        let ends: &[&str] = if forelse {
            &["empty", "endforelse"]
        } else {
            &["endforeach"]
        };

        self.blocks.push(Block::Loop);
        let parsed = self.parse_until(&tag, ends);
        self.blocks.pop();
        let (body, closer) = parsed?;

        let empty = if closer.name == "empty" {
            Some(self.parse_until(&tag, &[end])?.0)
        } else {
            None
        };

        Ok(Node::Foreach {
            iterable,
            key,
            value,
            body,
            empty,
            line: tag.location.line,
        })
    }

    /// `items as item` or `items as key => item`.
    fn foreach_header(&self, args: &str) -> Result<(Expr, Option<String>, String), String> {
        let mut parser = ExprParser::new(args)?;
        let iterable = parser.parse_expr()?;
        parser.expect_keyword("as")?;
        let first = parser.expect_ident()?;
        let header = if parser.eat_punct("=>") {
            (iterable, Some(first), parser.expect_ident()?)
        } else {
            (iterable, None, first)
        };
        parser.expect_end()?;
        Ok(header)
    }

    /// `for i in 1..10`, `for i in 1..=10`, or the iterator forms
    /// `for item in items` and `for key, item in items`.
    fn parse_for(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let args = self.required_args(&tag)?;
        let header = self
            .for_header(args)
            .map_err(|message| self.error(&tag, format!("invalid 'for' header: {message}")))?;

        self.blocks.push(Block::Loop);
        let parsed = self.parse_until(&tag, &["endfor"]);
        self.blocks.pop();
        let (body, _) = parsed?;
        let line = tag.location.line;

        match header {
            ForHeader::Range {
                var,
                start,
                end,
                inclusive,
            } => {
                self.validate(&start, tag.location, &tag.source)?;
                self.validate(&end, tag.location, &tag.source)?;
                Ok(Node::For {
                    var,
                    start,
                    end,
                    inclusive,
                    body,
                    line,
                })
            }
            ForHeader::Iterate {
                key,
                value,
                iterable,
            } => {
                self.validate(&iterable, tag.location, &tag.source)?;
                Ok(Node::Foreach {
                    iterable,
                    key,
                    value,
                    body,
                    empty: None,
                    line,
                })
            }
        }
    }

    fn for_header(&self, args: &str) -> Result<ForHeader, String> {
        let mut parser = ExprParser::new(args)?;
        let first = parser.expect_ident()?;
        let second = if parser.eat_punct(",") {
            Some(parser.expect_ident()?)
        } else {
            None
        };
        parser.expect_keyword("in")?;

        let checkpoint = parser.checkpoint();
        let start = parser.parse_additive()?;
        let inclusive = parser.eat_punct("..=");
        if inclusive || parser.eat_punct("..") {
            if second.is_some() {
                return Err("a range loop takes a single variable".to_string());
            }
            let end = parser.parse_additive()?;
            parser.expect_end()?;
            return Ok(ForHeader::Range {
                var: first,
                start,
                end,
                inclusive,
            });
        }

        parser.restore(checkpoint);
        let iterable = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(match second {
            Some(value) => ForHeader::Iterate {
                key: Some(first),
                value,
                iterable,
            },
            None => ForHeader::Iterate {
                key: None,
                value: first,
                iterable,
            },
        })
    }

    fn parse_while(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let condition = self.tag_expr(&tag)?;
        self.blocks.push(Block::Loop);
        let parsed = self.parse_until(&tag, &["endwhile"]);
        self.blocks.pop();
        let (body, _) = parsed?;

        Ok(Node::While {
            condition,
            body,
            line: tag.location.line,
        })
    }

    fn parse_switch(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let subject = self.tag_expr(&tag)?;
        let ends = ["case", "default", "endswitch"];

        let (leading, mut closer) = self.parse_until(&tag, &ends)?;
        let only_whitespace = leading.iter().all(|node| match node {
            Node::Text {
                text,
            } => text.trim().is_empty(),
            _ => false,
        });
        if !only_whitespace {
            return Err(self.error(&tag, "only whitespace may appear between 'switch' and its first 'case'"));
        }

        self.blocks.push(Block::Switch);
        let mut cases = Vec::new();
        let mut seen_default = false;
        let result = loop {
            let value = match closer.name.as_str() {
                "case" => match self.tag_expr(&closer) {
                    Ok(expr) => Some(expr),
                    Err(e) => break Err(e),
                },
                "default" => {
                    if seen_default {
                        break Err(self.error(&closer, "'switch' has more than one 'default'"));
                    }
                    seen_default = true;
                    None
                }
                _ => break Ok(()),
            };
            match self.parse_until(&tag, &ends) {
                Ok((body, next)) => {
                    cases.push(Case {
                        value,
                        body,
                    });
                    closer = next;
                }
                Err(e) => break Err(e),
            }
        };
        self.blocks.pop();
        result?;

        Ok(Node::Switch {
            subject,
            cases,
            line: tag.location.line,
        })
    }

    fn parse_loop_control(&mut self, tag: Tag, is_break: bool) -> Result<Node, TemplateError> {
        let allowed = self
            .blocks
            .iter()
            .rev()
            .take_while(|block| matches!(block, Block::Loop | Block::Switch))
            .any(|block| is_break || *block == Block::Loop);
        if !allowed {
            let target = if is_break {
                "a loop or switch"
            } else {
                "a loop"
            };
            return Err(self.error(&tag, format!("'{}' outside of {target}", tag.name)));
        }

        let condition = match tag.args.as_deref() {
            Some(args) => Some(self.expr(args, &tag)?),
            None => None,
        };
        Ok(if is_break {
            Node::Break {
                condition,
                line: tag.location.line,
            }
        } else {
            Node::Continue {
                condition,
                line: tag.location.line,
            }
        })
    }

    fn parse_set(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let args = self.required_args(&tag)?;
        let parse = |args: &str| -> Result<(String, Expr), String> {
            let mut parser = ExprParser::new(args)?;
            let name = parser.expect_ident()?;
            parser.expect_punct("=")?;
            let value = parser.parse_expr()?;
            parser.expect_end()?;
            Ok((name, value))
        };
        let (name, value) =
            parse(args).map_err(|message| self.error(&tag, format!("invalid 'set': {message}")))?;
        self.validate(&value, tag.location, &tag.source)?;

        Ok(Node::Set {
            name,
            value,
            line: tag.location.line,
        })
    }

    fn parse_include(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let mut args = self.arg_list(&tag)?.into_iter();
        let mode = if tag.name == "includeWhen" {
            IncludeMode::When(args.next().ok_or_else(|| self.arity(&tag, "a condition and a name"))?)
        } else if tag.name == "includeIf" {
            IncludeMode::IfExists
        } else {
            IncludeMode::Always
        };

        let template = args.next().ok_or_else(|| self.arity(&tag, "a template name"))?;
        let data = args.next();
        if args.next().is_some() {
            return Err(self.arity(&tag, "a template name and optional data"));
        }

        Ok(Node::Include {
            template,
            data,
            mode,
            line: tag.location.line,
        })
    }

    fn parse_component(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let mut args = self.arg_list(&tag)?.into_iter();
        let name = args.next().ok_or_else(|| self.arity(&tag, "a component name"))?;
        let props = args.next();
        if args.next().is_some() {
            return Err(self.arity(&tag, "a component name and optional props"));
        }

        self.blocks.push(Block::Component);
        let result = self.component_body(&tag);
        self.blocks.pop();
        let (slot, slots) = result?;

        Ok(Node::Component {
            name,
            props,
            slot,
            slots,
            line: tag.location.line,
        })
    }

    fn component_body(&mut self, tag: &Tag) -> Result<(Vec<Node>, Vec<NamedSlot>), TemplateError> {
        let mut slot = Vec::new();
        let mut slots: Vec<NamedSlot> = Vec::new();

        loop {
            let (nodes, closer) = self.parse_until(tag, &["slot", "endcomponent"])?;
            slot.extend(nodes);
            if closer.name == "endcomponent" {
                return Ok((slot, slots));
            }

            let name = self.literal_name(&closer)?;
            if slots.iter().any(|existing| existing.name == name) {
                return Err(self.error(&closer, format!("slot '{name}' is defined twice")));
            }
            let (body, _) = self.parse_until(&closer, &["endslot"])?;
            slots.push(NamedSlot {
                name,
                body,
            });
        }
    }

    fn parse_section(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let mut args = self.arg_list(&tag)?;
        let name = match args.first().and_then(Expr::as_str_literal) {
            Some(name) => name.to_string(),
            None => return Err(self.error(&tag, "'section' expects a string literal name")),
        };

        match args.len() {
            1 => {}
            2 => {
                let value = args.remove(1);
                return Ok(Node::SetSection {
                    name,
                    value,
                    line: tag.location.line,
                });
            }
            _ => return Err(self.arity(&tag, "a name and optional content")),
        }

        if let Some(open) = self.open_capture() {
            return Err(self.error(&tag, format!("cannot open section '{name}' inside '{open}'")));
        }

        self.blocks.push(Block::Section(name.clone()));
        let parsed = self.parse_until(&tag, SECTION_CLOSERS);
        self.blocks.pop();
        let (body, closer) = parsed?;
        self.no_args(&closer)?;

        let close = match closer.name.as_str() {
            "show" => SectionClose::Show,
            "append" => SectionClose::Append,
            "overwrite" => SectionClose::Overwrite,
            _ => SectionClose::End,
        };

        Ok(Node::Section {
            name,
            body,
            close,
            line: tag.location.line,
        })
    }

    fn parse_yield(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let mut args = self.arg_list(&tag)?.into_iter();
        let name = match args.next() {
            Some(Expr::Literal {
                value: serde_json::Value::String(name),
            }) => name,
            _ => return Err(self.error(&tag, "'yield' expects a string literal name")),
        };
        let default = args.next();
        if args.next().is_some() {
            return Err(self.arity(&tag, "a name and optional default"));
        }

        Ok(Node::Yield {
            name,
            default,
            line: tag.location.line,
        })
    }

    fn parse_parent(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        self.no_args(&tag)?;
        let innermost =
            self.blocks.iter().rev().find(|b| matches!(b, Block::Section(_) | Block::Push(_) | Block::Component));
        if !matches!(innermost, Some(Block::Section(_))) {
            return Err(self.error(&tag, "'parent' outside of a section"));
        }
        Ok(Node::Parent {
            line: tag.location.line,
        })
    }

    fn parse_push(&mut self, tag: Tag) -> Result<Node, TemplateError> {
        let name = self.literal_name(&tag)?;
        if let Some(Block::Push(open)) = self.blocks.iter().rev().find(|b| matches!(b, Block::Push(_))) {
            return Err(self.error(&tag, format!("cannot open push '{name}' inside push '{open}'")));
        }

        self.blocks.push(Block::Push(name.clone()));
        let parsed = self.parse_until(&tag, &["endpush"]);
        self.blocks.pop();
        let (body, _) = parsed?;

        Ok(Node::Push {
            name,
            body,
            line: tag.location.line,
        })
    }

    /// Name of the innermost open section or push, if any.
    fn open_capture(&self) -> Option<&str> {
        self.blocks.iter().rev().find_map(|block| match block {
            Block::Section(name) | Block::Push(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn required_args<'t>(&self, tag: &'t Tag) -> Result<&'t str, TemplateError> {
        tag.args
            .as_deref()
            .ok_or_else(|| self.error(tag, format!("'{}' expects an argument", tag.name)))
    }

    fn no_args(&self, tag: &Tag) -> Result<(), TemplateError> {
        match tag.args {
            None => Ok(()),
            Some(_) => Err(self.error(tag, format!("'{}' takes no arguments", tag.name))),
        }
    }

    /// The tag's single argument, which must be a string literal.
    fn literal_name(&self, tag: &Tag) -> Result<String, TemplateError> {
        let args = self.arg_list(tag)?;
        match args.as_slice() {
            [expr] => expr
                .as_str_literal()
                .map(str::to_string)
                .ok_or_else(|| self.error(tag, format!("'{}' expects a string literal name", tag.name))),
            _ => Err(self.arity(tag, "a single string literal name")),
        }
    }

    fn tag_expr(&self, tag: &Tag) -> Result<Expr, TemplateError> {
        let args = self.required_args(tag)?;
        self.expr(args, tag)
    }

    fn expr(&self, source: &str, tag: &Tag) -> Result<Expr, TemplateError> {
        let expr = parse_expression(source)
            .map_err(|message| self.error(tag, format!("invalid expression in '{}': {message}", tag.name)))?;
        self.validate(&expr, tag.location, &tag.source)?;
        Ok(expr)
    }

    fn arg_list(&self, tag: &Tag) -> Result<Vec<Expr>, TemplateError> {
        let args = parse_arguments(tag.args.as_deref().unwrap_or(""))
            .map_err(|message| self.error(tag, format!("invalid arguments to '{}': {message}", tag.name)))?;
        for arg in &args {
            self.validate(arg, tag.location, &tag.source)?;
        }
        Ok(args)
    }

    /// Reject references to filters and functions that are not registered.
    fn validate(&self, expr: &Expr, location: Location, fragment: &str) -> Result<(), TemplateError> {
        let mut unknown: Option<String> = None;
        expr.walk(&mut |node| {
            if unknown.is_some() {
                return;
            }
            match node {
                Expr::Filter {
                    name,
                    ..
                } if !self.filters.contains(name) => {
                    let suggestions = find_similar_names(name, self.filters.names());
                    unknown =
                        Some(format!("unknown filter '{name}'{}", suggestion_suffix(&suggestions)));
                }
                Expr::Call {
                    function,
                    ..
                } if !self.functions.contains(function) => {
                    let suggestions = find_similar_names(function, self.functions.names());
                    unknown = Some(format!(
                        "unknown function '{function}'{}",
                        suggestion_suffix(&suggestions)
                    ));
                }
                _ => {}
            }
        });

        match unknown {
            Some(message) => {
                Err(TemplateError::compile(self.template, message, location, Some(fragment.to_string())))
            }
            None => Ok(()),
        }
    }

    fn arity(&self, tag: &Tag, expected: &str) -> TemplateError {
        self.error(tag, format!("'{}' expects {expected}", tag.name))
    }

    fn error(&self, tag: &Tag, message: impl Into<String>) -> TemplateError {
        TemplateError::compile(self.template, message, tag.location, Some(tag.source.clone()))
    }
}

enum ForHeader {
    Range {
        var: String,
        start: Expr,
        end: Expr,
        inclusive: bool,
    },
    Iterate {
        key: Option<String>,
        value: String,
        iterable: Expr,
    },
}
