//! Directive registry and built-in directives.
//!
//! A directive is a named tag whose handler runs at compile time. The handler
//! receives the raw argument text and returns a fragment of template source,
//! which the compiler lexes and splices in place of the tag:
//!
//! ```text
//! @money(order.total)   =>   {{ (order.total) | number_format:2 }}
//! ```
//!
//! Block directives come in pairs. `@auth` ... `@endauth` calls the `open`
//! handler for `@auth` and the `close` handler for `@endauth`; the compiler
//! rejects an `@endauth` without a matching `@auth` and vice versa.
//!
//! Built-in tags (`if`, `foreach`, `section`, ...) always win over a directive
//! of the same name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a directive handler: argument text in, template source out.
pub type DirectiveFn = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

#[derive(Clone)]
pub enum Directive {
    /// Single tag.
    Inline(DirectiveFn),
    /// `name` ... `endname` pair.
    Block {
        open: DirectiveFn,
        close: DirectiveFn,
    },
}

impl Directive {
    pub fn is_block(&self) -> bool {
        matches!(self, Directive::Block { .. })
    }
}

/// Name to directive table. Later registrations replace earlier ones.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    directives: HashMap<String, Directive>,
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("DirectiveRegistry").field("directives", &names).finish()
    }
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in directive.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::trace!("Registering directive '{}'", name);
        self.directives.insert(name, Directive::Inline(Arc::new(handler)));
    }

    pub fn register_block<O, C>(&mut self, name: impl Into<String>, open: O, close: C)
    where
        O: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
        C: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::trace!("Registering block directive '{}'", name);
        self.directives.insert(
            name,
            Directive::Block {
                open: Arc::new(open),
                close: Arc::new(close),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    /// The block directive closed by `name`, if `name` is `end<block>`.
    pub fn closing(&self, name: &str) -> Option<(&str, &Directive)> {
        let base = name.strip_prefix("end")?;
        self.directives
            .get_key_value(base)
            .filter(|(_, directive)| directive.is_block())
            .map(|(key, directive)| (key.as_str(), directive))
    }

    /// Whether `name` is a directive tag, including block closers.
    pub fn is_tag_name(&self, name: &str) -> bool {
        self.directives.contains_key(name) || self.closing(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }
}

fn register_builtins(registry: &mut DirectiveRegistry) {
    registry.register("upper", |args| Ok(format!("{{{{ ({}) | upper }}}}", required(args, "upper")?)));
    registry.register("lower", |args| Ok(format!("{{{{ ({}) | lower }}}}", required(args, "lower")?)));
    registry.register("money", |args| {
        Ok(format!("{{{{ ({}) | number_format:2 }}}}", required(args, "money")?))
    });
    registry.register("number", |args| {
        let parts = split_arguments(required(args, "number")?);
        match parts.as_slice() {
            [value] => Ok(format!("{{{{ ({value}) | number_format }}}}")),
            [value, decimals] => Ok(format!("{{{{ ({value}) | number_format:({decimals}) }}}}")),
            _ => Err("number expects a value and optional decimals".to_string()),
        }
    });
    registry.register("date", |args| {
        let parts = split_arguments(required(args, "date")?);
        match parts.as_slice() {
            [value] => Ok(format!("{{{{ ({value}) | date }}}}")),
            [value, format] => Ok(format!("{{{{ ({value}) | date:({format}) }}}}")),
            _ => Err("date expects a value and optional format".to_string()),
        }
    });
    registry.register("json", |args| Ok(format!("{{{{{{ ({}) | json }}}}}}", required(args, "json")?)));
    registry.register("dump", |args| Ok(format!("{{{{{{ dump({}) }}}}}}", args.trim())));
    registry.register("asset", |args| Ok(format!("{{{{ asset({}) }}}}", required(args, "asset")?)));
    registry.register("css", |args| {
        Ok(format!("<link rel=\"stylesheet\" href=\"{{{{ asset({}) }}}}\">", required(args, "css")?))
    });
    registry.register("js", |args| {
        Ok(format!("<script src=\"{{{{ asset({}) }}}}\"></script>", required(args, "js")?))
    });
    registry.register_block("auth", |args| Ok(format!("{{% if auth({}) %}}", args.trim())), end_if);
    registry.register_block("guest", |args| Ok(format!("{{% if guest({}) %}}", args.trim())), end_if);
    registry.register_block(
        "env",
        |args| Ok(format!("{{% if env({}) %}}", required(args, "env")?)),
        end_if,
    );
    registry.register_block("production", |_| Ok("{% if env('production') %}".to_string()), end_if);
}

fn end_if(_: &str) -> Result<String, String> {
    Ok("{% endif %}".to_string())
}

fn required<'a>(args: &'a str, directive: &str) -> Result<&'a str, String> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        Err(format!("'{directive}' expects an argument"))
    } else {
        Ok(trimmed)
    }
}

/// Split directive arguments on top-level commas.
///
/// Commas inside strings, parentheses, brackets and braces do not split.
pub fn split_arguments(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in args.char_indices() {
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
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = args[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}
