//! Template tokenizer.
//!
//! Splits template source into literal text, raw blocks, interpolations and
//! tags. Comments are dropped here, so nothing inside them ever reaches a
//! later stage. Raw blocks are captured verbatim and never looked into again.
//!
//! Tags have two spellings which produce the same token:
//!
//! ```text
//! {% if user.admin %} ... {% endif %}
//! @if(user.admin) ... @endif
//! ```
//!
//! A bare `@name` without parentheses only becomes a tag when `name` is known
//! (a built-in tag or a registered directive); otherwise it stays literal so
//! that CSS at-rules and e-mail addresses pass through untouched.

use super::error::{Location, TemplateError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal markup.
    Text(String),
    /// Contents of a raw/verbatim block, emitted as-is.
    Raw(String),
    /// `{{ expr }}` (escaped) or `{{{ expr }}}` (raw).
    Output {
        expr: String,
        escape: bool,
    },
    Tag {
        name: String,
        /// Argument text with any wrapping parentheses removed
        args: Option<String>,
        /// Full source text of the tag, used in error messages
        source: String,
    },
    /// Start of a block directive's expansion. Only the compiler emits this.
    DirectiveStart {
        name: String,
        source: String,
    },
    /// End of a block directive's expansion, after its closing tokens.
    DirectiveEnd {
        name: String,
        source: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub location: Location,
}

/// Tokenize `source`.
///
/// `is_tag_name` decides whether a bare `@name` is a tag.
pub fn tokenize(
    source: &str,
    template: &str,
    is_tag_name: &dyn Fn(&str) -> bool,
) -> Result<Vec<Spanned>, TemplateError> {
    Lexer::new(source, template, is_tag_name).run()
}

struct Lexer<'a> {
    source: &'a str,
    template: &'a str,
    is_tag_name: &'a dyn Fn(&str) -> bool,
    pos: usize,
    line_starts: Vec<usize>,
    tokens: Vec<Spanned>,
    text: String,
    text_start: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, template: &'a str, is_tag_name: &'a dyn Fn(&str) -> bool) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            source,
            template,
            is_tag_name,
            pos: 0,
            line_starts,
            tokens: Vec::new(),
            text: String::new(),
            text_start: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Spanned>, TemplateError> {
        while self.pos < self.source.len() {
            let rest = &self.source[self.pos..];
            let Some(offset) = rest.find(['{', '@']) else {
                self.push_text(rest);
                self.pos = self.source.len();
                break;
            };

            let start = self.pos + offset;
            self.push_text(&self.source[self.pos..start]);
            self.pos = start;

            let rest = &self.source[start..];
            if rest.starts_with("{{--") {
                let end = self.find_literal(start + 4, "--}}", "comment")?;
                self.pos = end + 4;
            } else if rest.starts_with("{#") {
                let end = self.find_literal(start + 2, "#}", "comment")?;
                self.pos = end + 2;
            } else if rest.starts_with("{{{") {
                let end = self.find_close(start + 3, "}}}")?;
                let expr = self.source[start + 3..end].trim().to_string();
                self.push_output(start, expr, false)?;
                self.pos = end + 3;
            } else if rest.starts_with("{{") {
                let end = self.find_close(start + 2, "}}")?;
                let expr = self.source[start + 2..end].trim().to_string();
                self.push_output(start, expr, true)?;
                self.pos = end + 2;
            } else if rest.starts_with("{%") {
                self.lex_curly_tag(start)?;
            } else if rest.starts_with('@') {
                self.lex_at(start)?;
            } else {
                self.push_text("{");
                self.pos = start + 1;
            }
        }

        self.flush_text();
        Ok(self.tokens)
    }

    fn lex_curly_tag(&mut self, start: usize) -> Result<(), TemplateError> {
        let end = self.find_close(start + 2, "%}")?;
        let inner = self.source[start + 2..end].trim();
        let tag_source = self.source[start..end + 2].to_string();

        let name_len = identifier_len(inner);
        if name_len == 0 {
            return Err(self.error(start, "empty or malformed tag", Some(tag_source)));
        }
        let name = &inner[..name_len];
        let args = normalize_args(&inner[name_len..]);

        if name == "raw" {
            let (body_end, close_end) = self
                .find_curly_end_tag(end + 2, "endraw")
                .ok_or_else(|| self.error(start, "unclosed 'raw' block", Some(tag_source)))?;
            let body = self.source[end + 2..body_end].to_string();
            self.push_token(start, Token::Raw(body));
            self.pos = close_end;
            return Ok(());
        }

        self.push_token(
            start,
            Token::Tag {
                name: name.to_string(),
                args,
                source: tag_source,
            },
        );
        self.pos = end + 2;
        Ok(())
    }

    fn lex_at(&mut self, start: usize) -> Result<(), TemplateError> {
        let rest = &self.source[start..];

        if rest.starts_with("@@") {
            self.push_text("@");
            self.pos = start + 2;
            return Ok(());
        }
        if rest.starts_with("@{{") {
            self.push_text("{{");
            self.pos = start + 3;
            return Ok(());
        }

        let preceded_by_word = self.source[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '.' || c == '_');
        let name_len = identifier_len(&rest[1..]);
        if preceded_by_word || name_len == 0 {
            self.push_text("@");
            self.pos = start + 1;
            return Ok(());
        }

        let name = &rest[1..=name_len];
        let after_name = start + 1 + name_len;

        if name == "verbatim" {
            let Some(offset) = self.source[after_name..].find("@endverbatim") else {
                return Err(self.error(start, "unclosed 'verbatim' block", Some("@verbatim".into())));
            };
            let body = self.source[after_name..after_name + offset].to_string();
            self.push_token(start, Token::Raw(body));
            self.pos = after_name + offset + "@endverbatim".len();
            return Ok(());
        }

        let known = (self.is_tag_name)(name);
        let spaces = self.source[after_name..].len()
            - self.source[after_name..].trim_start_matches([' ', '\t']).len();
        let paren_at = after_name + spaces;
        let has_parens = self.source[paren_at..].starts_with('(') && (spaces == 0 || known);

        if !known && !has_parens {
            self.push_text("@");
            self.pos = start + 1;
            return Ok(());
        }

        let (args, end) = if has_parens {
            let close = self.find_matching_paren(paren_at)?;
            (Some(self.source[paren_at + 1..close].trim().to_string()), close + 1)
        } else {
            (None, after_name)
        };

        self.push_token(
            start,
            Token::Tag {
                name: name.to_string(),
                args: args.filter(|a| !a.is_empty()),
                source: self.source[start..end].to_string(),
            },
        );
        self.pos = end;
        Ok(())
    }

    /// Find `close` at brace depth zero, skipping string literals.
    fn find_close(&self, from: usize, close: &str) -> Result<usize, TemplateError> {
        let bytes = self.source.as_bytes();
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut i = from;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            } else if depth == 0 && bytes[i..].starts_with(close.as_bytes()) {
                return Ok(i);
            } else {
                match b {
                    b'\'' | b'"' => quote = Some(b),
                    b'{' => depth += 1,
                    b'}' if depth > 0 => depth -= 1,
                    _ => {}
                }
            }
            i += 1;
        }

        let open = &self.source[from - close.len()..from];
        Err(self.error(
            from - close.len(),
            format!("unclosed '{}' (expected '{}')", open, close),
            Some(snippet(&self.source[from - close.len()..])),
        ))
    }

    fn find_matching_paren(&self, open: usize) -> Result<usize, TemplateError> {
        let bytes = self.source.as_bytes();
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut i = open;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            } else {
                match b {
                    b'\'' | b'"' => quote = Some(b),
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(i);
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        Err(self.error(open, "unbalanced parentheses in tag arguments", Some(snippet(&self.source[open..]))))
    }

    fn find_literal(&self, from: usize, needle: &str, what: &str) -> Result<usize, TemplateError> {
        self.source[from..].find(needle).map(|offset| from + offset).ok_or_else(|| {
            self.error(from, format!("unclosed {} (expected '{}')", what, needle), None)
        })
    }

    /// Locate `{% <name> %}` starting at `from`; returns (tag start, tag end).
    fn find_curly_end_tag(&self, from: usize, name: &str) -> Option<(usize, usize)> {
        let mut search = from;
        while let Some(offset) = self.source[search..].find("{%") {
            let tag_start = search + offset;
            let inner = self.source[tag_start + 2..].trim_start();
            if let Some(after) = inner.strip_prefix(name) {
                let after_trim = after.trim_start();
                if after_trim.starts_with("%}") {
                    let close = self.source.len() - after_trim.len() + 2;
                    return Some((tag_start, close));
                }
            }
            search = tag_start + 2;
        }
        None
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.text.is_empty() {
            self.text_start = self.pos;
        }
        self.text.push_str(text);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            let location = self.location(self.text_start);
            self.tokens.push(Spanned {
                token: Token::Text(text),
                location,
            });
        }
    }

    fn push_output(&mut self, start: usize, expr: String, escape: bool) -> Result<(), TemplateError> {
        if expr.is_empty() {
            return Err(self.error(start, "empty interpolation", Some(snippet(&self.source[start..]))));
        }
        self.push_token(
            start,
            Token::Output {
                expr,
                escape,
            },
        );
        Ok(())
    }

    fn push_token(&mut self, start: usize, token: Token) {
        self.flush_text();
        let location = self.location(start);
        self.tokens.push(Spanned {
            token,
            location,
        });
    }

    fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let column = self.source[self.line_starts[line]..offset].chars().count() + 1;
        Location::new(line + 1, column)
    }

    fn error(&self, offset: usize, message: impl Into<String>, fragment: Option<String>) -> TemplateError {
        TemplateError::compile(self.template, message, self.location(offset), fragment)
    }
}

fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Trim tag arguments and strip one pair of parentheses wrapping all of them.
fn normalize_args(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('(') && wrapping_paren_closes_at_end(trimmed) {
        let inner = trimmed[1..trimmed.len() - 1].trim();
        return (!inner.is_empty()).then(|| inner.to_string());
    }
    Some(trimmed.to_string())
}

fn wrapping_paren_closes_at_end(s: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn snippet(s: &str) -> String {
    let line = s.lines().next().unwrap_or("");
    line.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let known = |name: &str| matches!(name, "if" | "else" | "endif" | "auth" | "endauth");
        tokenize(source, "test", &known).unwrap().into_iter().map(|s| s.token).collect()
    }

    fn tag(name: &str, args: Option<&str>, source: &str) -> Token {
        Token::Tag {
            name: name.into(),
            args: args.map(Into::into),
            source: source.into(),
        }
    }

    #[test]
    fn test_text_and_interpolations() {
        assert_eq!(
            lex("Hello, {{ name }}! {{{ html }}}"),
            vec![
                Token::Text("Hello, ".into()),
                Token::Output {
                    expr: "name".into(),
                    escape: true
                },
                Token::Text("! ".into()),
                Token::Output {
                    expr: "html".into(),
                    escape: false
                },
            ]
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(lex("{# {{ x }} #}{{-- @if(y) {% endif %} --}}"), vec![]);
        assert_eq!(lex("a{# c #}b"), vec![Token::Text("ab".into())]);
    }

    #[test]
    fn test_raw_blocks_are_opaque() {
        assert_eq!(
            lex("{% raw %}{{ x }} {# y #}{% endraw %}"),
            vec![Token::Raw("{{ x }} {# y #}".into())]
        );
        assert_eq!(lex("@verbatim@if(x){{ y }}@endverbatim"), vec![Token::Raw("@if(x){{ y }}".into())]);
    }

    #[test]
    fn test_both_tag_spellings() {
        assert_eq!(lex("{% if (ok) %}"), vec![tag("if", Some("ok"), "{% if (ok) %}")]);
        assert_eq!(lex("@if(ok)"), vec![tag("if", Some("ok"), "@if(ok)")]);
        assert_eq!(lex("@if (ok)"), vec![tag("if", Some("ok"), "@if (ok)")]);
        assert_eq!(lex("{% else %}"), vec![tag("else", None, "{% else %}")]);
        assert_eq!(lex("@endif"), vec![tag("endif", None, "@endif")]);
    }

    #[test]
    fn test_partial_parens_are_kept() {
        assert_eq!(lex("{% if (a) && (b) %}"), vec![tag("if", Some("(a) && (b)"), "{% if (a) && (b) %}")]);
    }

    #[test]
    fn test_literal_at_signs() {
        assert_eq!(lex("mail@example.com"), vec![Token::Text("mail@example.com".into())]);
        assert_eq!(lex("@media (max-width: 1px)"), vec![Token::Text("@media (max-width: 1px)".into())]);
        assert_eq!(lex("@@if"), vec![Token::Text("@if".into())]);
        assert_eq!(lex("@{{ x }}"), vec![Token::Text("{{ x }}".into())]);
    }

    #[test]
    fn test_unknown_directive_with_parens_is_a_tag() {
        assert_eq!(lex("@foo(1)"), vec![tag("foo", Some("1"), "@foo(1)")]);
    }

    #[test]
    fn test_braces_inside_expressions() {
        assert_eq!(
            lex("{{ {a: {b: 1}} | json }}"),
            vec![Token::Output {
                expr: "{a: {b: 1}} | json".into(),
                escape: true
            }]
        );
        assert_eq!(
            lex("{{ '}}' }}"),
            vec![Token::Output {
                expr: "'}}'".into(),
                escape: true
            }]
        );
    }

    #[test]
    fn test_locations() {
        let known = |_: &str| false;
        let tokens = tokenize("a\n  {{ x }}", "test", &known).unwrap();
        assert_eq!(tokens[1].location, Location::new(2, 3));
    }

    #[test]
    fn test_unclosed_delimiters() {
        let known = |_: &str| false;
        for source in ["{{ x", "{% if x", "{# c", "{{-- c", "{% raw %}x", "@foo(1"] {
            let err = tokenize(source, "t", &known).unwrap_err();
            assert!(matches!(err, TemplateError::Compile { .. }), "{source}");
        }
    }
}
