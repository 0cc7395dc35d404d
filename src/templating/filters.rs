//! Filter registry and built-in filters.
//!
//! Filters are pure transforms applied with the pipe operator:
//!
//! ```text
//! {{ title | truncate:20:'...' | upper }}
//! ```
//!
//! The piped value is the first argument; colon-separated arguments follow.
//! Filter names are checked at compile time, so a template referencing an
//! unregistered filter never compiles.
//!
//! # Escaping
//!
//! Filters registered as *safe* produce markup that is already escaped or is
//! trusted on purpose. When the last filter of an escaped interpolation is
//! safe, the interpolation skips HTML escaping. The flag is read at render
//! time, so re-registering a filter also applies to cached programs. Built-in
//! safe filters are `raw`, `safe`, `escape` and `nl2br`.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use super::utils::{escape_html, is_truthy, number_value, type_name, value_to_string};

/// Signature of a filter: `(input, args) -> output`.
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync>;

/// A registered filter.
#[derive(Clone)]
pub struct Filter {
    func: FilterFn,
    safe: bool,
}

impl Filter {
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    pub fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, String> {
        (self.func)(value, args)
    }
}

/// Name to filter table. Later registrations replace earlier ones.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Filter>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

impl FilterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in filter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(name.into(), Arc::new(func), false);
    }

    /// Register a filter whose output bypasses HTML escaping.
    pub fn register_safe<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(name.into(), Arc::new(func), true);
    }

    fn insert(&mut self, name: String, func: FilterFn, safe: bool) {
        tracing::trace!("Registering filter '{}' (safe: {})", name, safe);
        self.filters.insert(
            name,
            Filter {
                func,
                safe,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn is_safe(&self, name: &str) -> bool {
        self.filters.get(name).is_some_and(Filter::is_safe)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

fn register_builtins(registry: &mut FilterRegistry) {
    registry.register("upper", |v, _| Ok(Value::String(value_to_string(v).to_uppercase())));
    registry.register("lower", |v, _| Ok(Value::String(value_to_string(v).to_lowercase())));
    registry.register("capitalize", |v, _| Ok(Value::String(capitalize(&value_to_string(v)))));
    registry.register("title", |v, _| {
        let text = value_to_string(v);
        let words: Vec<String> = text.split(' ').map(capitalize).collect();
        Ok(Value::String(words.join(" ")))
    });
    registry.register("trim", |v, _| Ok(Value::String(value_to_string(v).trim().to_string())));
    registry.register("length", length);
    registry.register("default", |v, args| {
        let fallback = args.first().cloned().unwrap_or(Value::Null);
        let use_truthiness = args.get(1).is_some_and(is_truthy);
        let missing = match v {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            other => use_truthiness && !is_truthy(other),
        };
        Ok(if missing {
            fallback
        } else {
            v.clone()
        })
    });
    registry.register("truncate", truncate);
    registry.register("replace", |v, args| {
        let search = string_arg(args, 0, "replace")?;
        let replacement = args.get(1).map(value_to_string).unwrap_or_default();
        Ok(Value::String(value_to_string(v).replace(&search, &replacement)))
    });
    registry.register("join", |v, args| {
        let separator = args.first().map(value_to_string).unwrap_or_default();
        let items = expect_array(v, "join")?;
        let parts: Vec<String> = items.iter().map(value_to_string).collect();
        Ok(Value::String(parts.join(&separator)))
    });
    registry.register("split", |v, args| {
        let separator = string_arg(args, 0, "split")?;
        let text = value_to_string(v);
        let parts = if separator.is_empty() {
            text.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            text.split(separator.as_str()).map(|s| Value::String(s.to_string())).collect()
        };
        Ok(Value::Array(parts))
    });
    registry.register("reverse", |v, _| match v {
        Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
        other => Ok(Value::String(value_to_string(other).chars().rev().collect())),
    });
    registry.register("first", |v, _| match v {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        other => Ok(value_to_string(other)
            .chars()
            .next()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
    });
    registry.register("last", |v, _| match v {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        other => Ok(value_to_string(other)
            .chars()
            .next_back()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
    });
    registry.register("slug", |v, _| Ok(Value::String(slugify(&value_to_string(v)))));
    registry.register("abs", |v, _| Ok(number_value(to_number(v, "abs")?.abs())));
    registry.register("round", |v, args| {
        let precision = args.first().map(|a| to_number(a, "round")).transpose()?.unwrap_or(0.0);
        let factor = 10f64.powi(precision as i32);
        Ok(number_value((to_number(v, "round")? * factor).round() / factor))
    });
    registry.register("number_format", number_format);
    registry.register("date", date);
    registry.register("json", |v, _| Ok(Value::String(to_json_text(v)?)));
    registry.register_safe("escape", |v, _| Ok(Value::String(escape_html(&value_to_string(v)))));
    registry.register_safe("raw", |v, _| Ok(v.clone()));
    registry.register_safe("safe", |v, _| Ok(v.clone()));
    registry.register_safe("nl2br", |v, _| {
        let escaped = escape_html(&value_to_string(v));
        Ok(Value::String(escaped.replace("\r\n", "\n").replace('\n', "<br>\n")))
    });
    registry.register("striptags", |v, _| {
        Ok(Value::String(tag_pattern().replace_all(&value_to_string(v), "").into_owned()))
    });
    registry.register("keys", |v, _| {
        let map = expect_object(v, "keys")?;
        Ok(Value::Array(map.keys().map(|k| Value::String(k.clone())).collect()))
    });
    registry.register("values", |v, _| {
        let map = expect_object(v, "values")?;
        Ok(Value::Array(map.values().cloned().collect()))
    });
    registry.register("sort", |v, _| {
        let mut items = expect_array(v, "sort")?.clone();
        items.sort_by(compare_values);
        Ok(Value::Array(items))
    });
    registry.register("wordcount", |v, _| {
        Ok(Value::from(value_to_string(v).split_whitespace().count()))
    });
}

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn length(value: &Value, _: &[Value]) -> Result<Value, String> {
    let len = match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("length: cannot measure a {}", type_name(other))),
    };
    Ok(Value::from(len))
}

fn truncate(value: &Value, args: &[Value]) -> Result<Value, String> {
    let limit = match args.first() {
        Some(arg) => to_number(arg, "truncate")?.max(0.0) as usize,
        None => 255,
    };
    let end = args.get(1).map(value_to_string).unwrap_or_else(|| "...".to_string());
    let text = value_to_string(value);

    if text.chars().count() <= limit {
        return Ok(Value::String(text));
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str(&end);
    Ok(Value::String(truncated))
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

const MAX_DECIMALS: usize = 20;

/// `number_format:decimals:decimal_point:thousands_separator`
fn number_format(value: &Value, args: &[Value]) -> Result<Value, String> {
    let number = to_number(value, "number_format")?;
    let decimals = match args.first() {
        Some(arg) => to_number(arg, "number_format")?.max(0.0) as usize,
        None => 0,
    };
    if decimals > MAX_DECIMALS {
        return Err(format!("number_format: at most {MAX_DECIMALS} decimals are supported, got {decimals}"));
    }
    let point = args.get(1).map(value_to_string).unwrap_or_else(|| ".".to_string());
    let thousands = args.get(2).map(value_to_string).unwrap_or_else(|| ",".to_string());

    let formatted = format!("{:.*}", decimals, number.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push_str(&thousands);
        }
        grouped.push(digit);
    }

    let mut out = String::new();
    if number < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push_str(&point);
        out.push_str(frac);
    }
    Ok(Value::String(out))
}

/// `date:format` over RFC 3339 strings, plain dates, `YYYY-MM-DD HH:MM:SS`
/// strings and unix timestamps.
fn date(value: &Value, args: &[Value]) -> Result<Value, String> {
    let format = args.first().map(value_to_string).unwrap_or_else(|| "%Y-%m-%d".to_string());
    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("date: invalid format '{format}'"));
    }
    let datetime = parse_datetime(value)?;
    let mut out = String::new();
    write!(out, "{}", datetime.format_with_items(items.into_iter()))
        .map_err(|_| format!("date: cannot format with '{format}'"))?;
    Ok(Value::String(out))
}

fn parse_datetime(value: &Value) -> Result<NaiveDateTime, String> {
    match value {
        Value::Number(n) => {
            let seconds = n.as_f64().ok_or("date: invalid timestamp")? as i64;
            DateTime::<Utc>::from_timestamp(seconds, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| format!("date: timestamp {seconds} is out of range"))
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.naive_local());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Ok(dt);
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Ok(d.and_time(Default::default()));
            }
            Err(format!("date: cannot parse '{s}' as a date"))
        }
        other => Err(format!("date: expected a string or timestamp, got {}", type_name(other))),
    }
}

/// JSON text safe to embed in HTML and inline scripts.
pub fn to_json_text(value: &Value) -> Result<String, String> {
    let text = serde_json::to_string(value).map_err(|e| format!("json: {e}"))?;
    Ok(text
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\'', "\\u0027"))
}

fn to_number(value: &Value, filter: &str) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{filter}: invalid number")),
        Value::String(s) => {
            s.trim().parse().map_err(|_| format!("{filter}: '{s}' is not a number"))
        }
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        Value::Null => Ok(0.0),
        other => Err(format!("{filter}: expected a number, got {}", type_name(other))),
    }
}

fn string_arg(args: &[Value], index: usize, filter: &str) -> Result<String, String> {
    args.get(index)
        .map(value_to_string)
        .ok_or_else(|| format!("{filter}: missing argument {}", index + 1))
}

fn expect_array<'a>(value: &'a Value, filter: &str) -> Result<&'a Vec<Value>, String> {
    value.as_array().ok_or_else(|| format!("{filter}: expected an array, got {}", type_name(value)))
}

fn expect_object<'a>(value: &'a Value, filter: &str) -> Result<&'a Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| format!("{filter}: expected an object, got {}", type_name(value)))
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => value_to_string(a).cmp(&value_to_string(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, value: Value, args: &[Value]) -> Value {
        let registry = FilterRegistry::with_builtins();
        registry.get(name).unwrap().apply(&value, args).unwrap()
    }

    #[test]
    fn test_text_filters() {
        assert_eq!(apply("upper", json!("abc"), &[]), json!("ABC"));
        assert_eq!(apply("capitalize", json!("hELLO"), &[]), json!("Hello"));
        assert_eq!(apply("title", json!("the quick fox"), &[]), json!("The Quick Fox"));
        assert_eq!(apply("trim", json!("  x "), &[]), json!("x"));
        assert_eq!(apply("slug", json!("Hello, World!  2024"), &[]), json!("hello-world-2024"));
        assert_eq!(apply("striptags", json!("<p>Hi <b>there</b></p>"), &[]), json!("Hi there"));
        assert_eq!(apply("wordcount", json!("one two  three"), &[]), json!(3));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(apply("truncate", json!("Hello world"), &[json!(5)]), json!("Hello..."));
        assert_eq!(apply("truncate", json!("Hello"), &[json!(5)]), json!("Hello"));
        assert_eq!(apply("truncate", json!("Hello world"), &[json!(5), json!("!")]), json!("Hello!"));
    }

    #[test]
    fn test_default() {
        assert_eq!(apply("default", Value::Null, &[json!("x")]), json!("x"));
        assert_eq!(apply("default", json!(""), &[json!("x")]), json!("x"));
        assert_eq!(apply("default", json!(0), &[json!("x")]), json!(0));
        assert_eq!(apply("default", json!(0), &[json!("x"), json!(true)]), json!("x"));
    }

    #[test]
    fn test_collections() {
        assert_eq!(apply("join", json!(["a", "b", 3]), &[json!(", ")]), json!("a, b, 3"));
        assert_eq!(apply("split", json!("a,b"), &[json!(",")]), json!(["a", "b"]));
        assert_eq!(apply("reverse", json!([1, 2]), &[]), json!([2, 1]));
        assert_eq!(apply("first", json!([]), &[]), Value::Null);
        assert_eq!(apply("last", json!("abc"), &[]), json!("c"));
        assert_eq!(apply("length", json!("héllo"), &[]), json!(5));
        assert_eq!(apply("keys", json!({"b": 1, "a": 2}), &[]), json!(["b", "a"]));
        assert_eq!(apply("sort", json!([3, 1, 2]), &[]), json!([1, 2, 3]));
        assert_eq!(apply("sort", json!(["b", "a"]), &[]), json!(["a", "b"]));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(apply("number_format", json!(1234567.891), &[json!(2)]), json!("1,234,567.89"));
        assert_eq!(apply("number_format", json!(1234.6), &[]), json!("1,235"));
        assert_eq!(
            apply("number_format", json!(-1234.5), &[json!(1), json!(","), json!(".")]),
            json!("-1.234,5")
        );
        assert_eq!(apply("number_format", json!("42"), &[json!(2)]), json!("42.00"));
        assert_eq!(apply("round", json!(2.456), &[json!(2)]), json!(2.46));
        assert_eq!(apply("round", json!(2.5), &[]), json!(3));
        assert_eq!(apply("abs", json!(-4), &[]), json!(4));
    }

    #[test]
    fn test_date() {
        assert_eq!(apply("date", json!("2024-03-05"), &[json!("%d/%m/%Y")]), json!("05/03/2024"));
        assert_eq!(apply("date", json!(0), &[]), json!("1970-01-01"));
        assert_eq!(
            apply("date", json!("2024-03-05T10:20:00+02:00"), &[json!("%H:%M")]),
            json!("10:20")
        );
        let registry = FilterRegistry::with_builtins();
        assert!(registry.get("date").unwrap().apply(&json!("soon"), &[]).is_err());
    }

    #[test]
    fn test_date_rejects_invalid_format() {
        let registry = FilterRegistry::with_builtins();
        let err = registry.get("date").unwrap().apply(&json!("2024-01-01"), &[json!("%Q")]).unwrap_err();
        assert!(err.contains("invalid format '%Q'"), "{err}");
    }

    #[test]
    fn test_number_format_caps_decimals() {
        let registry = FilterRegistry::with_builtins();
        let err = registry.get("number_format").unwrap().apply(&json!(1), &[json!(70000)]).unwrap_err();
        assert!(err.contains("at most 20 decimals"), "{err}");
        assert_eq!(apply("number_format", json!(1), &[json!(20)]), json!("1.00000000000000000000"));
    }

    #[test]
    fn test_json_is_script_safe() {
        assert_eq!(
            apply("json", json!({"html": "</script><b>&'"}), &[]),
            json!(r#"{"html":"\u003c/script\u003e\u003cb\u003e\u0026\u0027"}"#)
        );
    }

    #[test]
    fn test_safe_flags() {
        let registry = FilterRegistry::with_builtins();
        for safe in ["raw", "safe", "escape", "nl2br"] {
            assert!(registry.is_safe(safe), "{safe} should be safe");
        }
        assert!(!registry.is_safe("upper"));
        assert!(!registry.is_safe("json"));
        assert_eq!(apply("nl2br", json!("a<\nb"), &[]), json!("a&lt;<br>\nb"));
    }

    #[test]
    fn test_reregistration_overrides() {
        let mut registry = FilterRegistry::with_builtins();
        registry.register("upper", |_, _| Ok(json!("custom")));
        assert_eq!(registry.get("upper").unwrap().apply(&json!("a"), &[]).unwrap(), json!("custom"));
    }

    #[test]
    fn test_type_errors() {
        let registry = FilterRegistry::with_builtins();
        let err = registry.get("join").unwrap().apply(&json!(5), &[]).unwrap_err();
        assert!(err.contains("expected an array"));
        assert!(registry.get("number_format").unwrap().apply(&json!("abc"), &[]).is_err());
    }
}
