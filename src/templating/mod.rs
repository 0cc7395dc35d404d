//! Template compiler and renderer.
//!
//! Prism turns template source (markup interleaved with tags, interpolations
//! and filter pipelines) into a compiled [`Program`], persists it as a JSON
//! artifact, and executes it against a data context to produce text.
//!
//! # Overview
//!
//! ```text
//! source ─► lexer ─► directive expansion ─► parser ─► Program ─► artifact
//!                                                        │
//!                           context + globals ─► runtime ─┴─► output
//! ```
//!
//! - [`lexer`]: comments, raw blocks, `{{ }}` / `{{{ }}}`, `{% %}` and `@tag` forms
//! - [`compiler`]: directive expansion and the compile entry points
//! - [`parser`]: lowers built-in tags into [`ast`] nodes
//! - [`runtime`]: executes programs, including includes, components and layouts
//! - [`sections`]: the per-render section table used by inheritance
//! - [`cache`]: artifact persistence and staleness checks
//! - [`engine`]: the public facade
//!
//! # Syntax
//!
//! Every tag has two spellings, `{% name args %}` and `@name(args)`:
//!
//! ```text
//! @extends('layouts.app')
//!
//! @section('content')
//!     <h1>{{ title | upper }}</h1>
//!     {% foreach posts as post %}
//!         <a href="{{ post.url }}">{{ post.title }}</a>{% if !loop.last %},{% endif %}
//!     {% endforeach %}
//!     @include('partials.footer', {year: 2024})
//! @endsection
//! ```
//!
//! - `{{ expr }}` escapes HTML, `{{{ expr }}}` does not
//! - `{# … #}` and `{{-- … --}}` are comments
//! - `{% raw %}…{% endraw %}` and `@verbatim…@endverbatim` are emitted untouched
//! - a bare `@name` is only a tag when `name` is a built-in tag or a
//!   registered directive, so `@media` and e-mail addresses stay literal
//!
//! # Extension points
//!
//! Filters, directives and functions live in registries owned by the
//! [`Engine`]. Registering a name that already exists replaces it, which is
//! how applications swap built-ins such as `auth` for their own logic.
//! Host services reach templates through the [`Host`] trait.

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod directives;
pub mod engine;
pub mod error;
pub mod expr;
pub mod filters;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod runtime;
pub mod sections;
pub mod utils;

pub use ast::{Node, Program};
pub use cache::ArtifactCache;
pub use compiler::Compiler;
pub use directives::{Directive, DirectiveRegistry};
pub use engine::{Engine, EngineConfig};
pub use error::{ErrorKind, Location, TemplateError};
pub use filters::{Filter, FilterRegistry};
pub use functions::{DefaultHost, FunctionRegistry, Host};
pub use resolver::TemplateResolver;
pub use utils::{deep_merge_json, escape_html};
