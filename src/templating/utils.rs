//! Utility functions for the templating system.

use serde_json::{Map, Value};
use strsim::levenshtein;

/// Maximum edit distance, as a percentage of the name length, for a name to
/// be offered as a suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Escape text for safe inclusion in HTML content and quoted attributes.
///
/// Replaces `&`, `<`, `>`, `"` and `'`. Every escaped interpolation goes
/// through this function.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + input.len() / 8);
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Convert a value to the text emitted by an interpolation.
///
/// `null` renders as the empty string, whole floats lose their fraction and
/// arrays/objects render as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                format_float(f)
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Template truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Human-readable type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build a number value, keeping integers integral.
pub fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Perform a deep merge of two JSON values.
///
/// Recursively merges `overrides` into `base`. For objects, fields from `overrides`
/// are added or replace fields in `base`. For arrays and primitives, `overrides`
/// completely replaces `base`.
///
/// # Examples
///
/// ```rust,no_run
/// use serde_json::json;
/// use prism::templating::deep_merge_json;
///
/// let base = json!({ "site": { "name": "prism", "lang": "en" } });
/// let overrides = json!({ "site": { "lang": "fr" } });
///
/// let result = deep_merge_json(base, &overrides);
/// // result: { "site": { "name": "prism", "lang": "fr" } }
/// ```
pub fn deep_merge_json(mut base: Value, overrides: &Value) -> Value {
    match (base.as_object_mut(), overrides.as_object()) {
        (Some(base_obj), Some(override_obj)) => {
            for (key, override_value) in override_obj {
                match base_obj.get_mut(key) {
                    Some(base_value) if base_value.is_object() && override_value.is_object() => {
                        let merged = deep_merge_json(base_value.clone(), override_value);
                        base_obj.insert(key.clone(), merged);
                    }
                    _ => {
                        base_obj.insert(key.clone(), override_value.clone());
                    }
                }
            }
            base
        }
        (_, _) => overrides.clone(),
    }
}

/// Shallow-merge `overrides` over `base`: top-level keys of `overrides` win.
///
/// This is the merge used for render contexts (globals under call data,
/// caller context under include overrides and component props).
pub fn merge_context(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Find registered names similar to `target` using Levenshtein distance.
///
/// Returns at most three candidates, closest first.
pub fn find_similar_names<'a>(
    target: &str,
    available: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut scored: Vec<_> =
        available.into_iter().map(|name| (name, levenshtein(target, name))).collect();

    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let limit = (target.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1);
    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= limit)
        .take(3)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Format the " (did you mean ...?)" suffix used by unknown-name errors.
pub fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean '{}'?)", suggestions.join("', '"))
    }
}
