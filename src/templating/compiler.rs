//! Template compiler.
//!
//! Compilation runs in three passes:
//!
//! 1. **Lexing** drops comments, captures raw blocks verbatim and splits the
//!    source into text, interpolations and tags.
//! 2. **Directive expansion** replaces every registered directive tag with
//!    the tokens of the template source its handler returns, checking that
//!    block directives are balanced.
//! 3. **Parsing** lowers the remaining built-in tags into a [`Program`].
//!
//! The result is a pure function of the source, the template identifier and
//! the registries, so compiling the same input twice yields identical
//! program text.

use tracing::debug;

use super::ast::Program;
use super::directives::{Directive, DirectiveFn, DirectiveRegistry};
use super::error::{Location, TemplateError};
use super::filters::FilterRegistry;
use super::functions::FunctionRegistry;
use super::lexer::{Spanned, Token, tokenize};
use super::parser::{BUILTIN_TAGS, Parser, is_builtin_tag};
use super::utils::{find_similar_names, suggestion_suffix};
use crate::constants::MAX_DIRECTIVE_DEPTH;

/// Compiles template source against a set of registries.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    filters: &'a FilterRegistry,
    directives: &'a DirectiveRegistry,
    functions: &'a FunctionRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(
        filters: &'a FilterRegistry,
        directives: &'a DirectiveRegistry,
        functions: &'a FunctionRegistry,
    ) -> Self {
        Self {
            filters,
            directives,
            functions,
        }
    }

    /// Compile `source` to program text.
    pub fn compile(&self, source: &str, template: &str) -> Result<String, TemplateError> {
        let program = self.compile_program(source, template)?;
        program.to_text().map_err(|e| {
            TemplateError::compile(
                template,
                format!("failed to serialize program: {e}"),
                Location::default(),
                None,
            )
        })
    }

    /// Compile `source` to a [`Program`].
    pub fn compile_program(&self, source: &str, template: &str) -> Result<Program, TemplateError> {
        debug!("Compiling template '{}' ({} bytes)", template, source.len());

        let tokens = self.tokenize(source, template)?;
        let mut expander = Expander {
            directives: self.directives,
            template,
            open: Vec::new(),
            output: Vec::with_capacity(tokens.len()),
        };
        expander.expand(tokens, 0)?;
        let tokens = expander.finish()?;

        let program = Parser::new(template, tokens, self.filters, self.functions).parse_program()?;
        debug!(
            "Compiled template '{}' ({} top-level nodes, extends: {:?})",
            template,
            program.body.len(),
            program.extends
        );
        Ok(program)
    }

    fn tokenize(&self, source: &str, template: &str) -> Result<Vec<Spanned>, TemplateError> {
        let directives = self.directives;
        tokenize(source, template, &|name| is_builtin_tag(name) || directives.is_tag_name(name))
    }
}

struct OpenDirective {
    name: String,
    location: Location,
    source: String,
}

/// Whether a directive tag opens or closes a block directive.
///
/// Block expansions are wrapped in [`Token::DirectiveStart`] and
/// [`Token::DirectiveEnd`] so the parser can reject built-in blocks that
/// straddle a directive boundary.
enum Boundary {
    None,
    Open(String),
    Close(String),
}

/// Splices directive output into the token stream.
struct Expander<'a> {
    directives: &'a DirectiveRegistry,
    template: &'a str,
    open: Vec<OpenDirective>,
    output: Vec<Spanned>,
}

impl Expander<'_> {
    fn expand(&mut self, tokens: Vec<Spanned>, depth: usize) -> Result<(), TemplateError> {
        for spanned in tokens {
            let Token::Tag {
                name,
                args,
                source,
            } = &spanned.token
            else {
                self.output.push(spanned);
                continue;
            };
            if is_builtin_tag(name) {
                self.output.push(spanned);
                continue;
            }

            let location = spanned.location;
            let args = args.as_deref().unwrap_or("");
            let (handler, boundary) = self.handler_for(name, location, source)?;

            if depth >= MAX_DIRECTIVE_DEPTH {
                return Err(TemplateError::compile(
                    self.template,
                    format!(
                        "directive '{name}' exceeded the maximum expansion depth of {MAX_DIRECTIVE_DEPTH}"
                    ),
                    location,
                    Some(source.clone()),
                ));
            }

            let fragment = handler(args).map_err(|message| {
                TemplateError::compile(
                    self.template,
                    format!("directive '{name}' failed: {message}"),
                    location,
                    Some(source.clone()),
                )
            })?;
            tracing::trace!("Expanded directive '{}' to {:?}", name, fragment);

            let directives = self.directives;
            let nested = tokenize(&fragment, self.template, &|tag| {
                is_builtin_tag(tag) || directives.is_tag_name(tag)
            })
            .map_err(|e| {
                TemplateError::compile(
                    self.template,
                    format!("directive '{name}' produced invalid template source: {e}"),
                    location,
                    Some(source.clone()),
                )
            })?;

            let relocated = nested
                .into_iter()
                .map(|token| Spanned {
                    location,
                    ..token
                })
                .collect();

            let marker = |token| Spanned {
                token,
                location,
            };
            if let Boundary::Open(base) = &boundary {
                self.output.push(marker(Token::DirectiveStart {
                    name: base.clone(),
                    source: source.clone(),
                }));
            }
            self.expand(relocated, depth + 1)?;
            if let Boundary::Close(base) = boundary {
                self.output.push(marker(Token::DirectiveEnd {
                    name: base,
                    source: source.clone(),
                }));
            }
        }

        Ok(())
    }

    /// Pick the handler for a directive tag, tracking block pairing.
    fn handler_for(
        &mut self,
        name: &str,
        location: Location,
        source: &str,
    ) -> Result<(DirectiveFn, Boundary), TemplateError> {
        if let Some(directive) = self.directives.get(name) {
            return Ok(match directive {
                Directive::Inline(handler) => (handler.clone(), Boundary::None),
                Directive::Block {
                    open,
                    ..
                } => {
                    self.open.push(OpenDirective {
                        name: name.to_string(),
                        location,
                        source: source.to_string(),
                    });
                    (open.clone(), Boundary::Open(name.to_string()))
                }
            });
        }

        if let Some((base, Directive::Block {
            close,
            ..
        })) = self.directives.closing(name)
        {
            return match self.open.pop() {
                Some(open) if open.name == base => Ok((close.clone(), Boundary::Close(open.name))),
                Some(open) => Err(TemplateError::compile(
                    self.template,
                    format!("'{name}' does not match the open directive '{}'; expected 'end{}'", open.name, open.name),
                    location,
                    Some(source.to_string()),
                )),
                None => Err(TemplateError::compile(
                    self.template,
                    format!("unmatched '{name}' without an opening '{base}'"),
                    location,
                    Some(source.to_string()),
                )),
            };
        }

        let candidates = self.directives.names().chain(BUILTIN_TAGS.iter().copied());
        let suggestions = find_similar_names(name, candidates);
        Err(TemplateError::compile(
            self.template,
            format!("unknown directive '{name}'{}", suggestion_suffix(&suggestions)),
            location,
            Some(source.to_string()),
        ))
    }

    fn finish(mut self) -> Result<Vec<Spanned>, TemplateError> {
        match self.open.pop() {
            Some(open) => Err(TemplateError::compile(
                self.template,
                format!("unclosed directive '{}' (expected 'end{}')", open.name, open.name),
                open.location,
                Some(open.source),
            )),
            None => Ok(self.output),
        }
    }
}
