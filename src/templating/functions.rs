//! Host callbacks and functions callable from expressions.
//!
//! Templates reach host services (asset URLs, the current environment,
//! authentication state) through functions such as `asset('app.css')` or
//! `auth()`. The engine owns a [`Host`] implementation; without one the
//! defaults below apply, so templates still render.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::utils::{escape_html, type_name, value_to_string};

/// Services provided by the embedding application.
pub trait Host: Send + Sync {
    /// Public URL of an asset path.
    fn asset_url(&self, path: &str) -> String {
        format!("/{}", path.trim_start_matches('/'))
    }

    /// Name of the running environment (`production`, `local`, ...).
    fn environment(&self) -> Option<String> {
        None
    }

    /// Whether the current request is authenticated, optionally for a guard.
    fn is_authenticated(&self, _guard: Option<&str>) -> bool {
        false
    }
}

/// Host used when the embedder installs none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHost;

impl Host for DefaultHost {}

/// Signature of a template function.
pub type FunctionFn = Arc<dyn Fn(&dyn Host, &[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionFn>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("asset", |host, args| {
            let path = args.first().map(value_to_string).ok_or("asset() expects a path")?;
            Ok(Value::String(host.asset_url(&path)))
        });
        registry.register("env", |host, args| match host.environment() {
            None if args.is_empty() => Ok(Value::Null),
            Some(env) if args.is_empty() => Ok(Value::String(env)),
            env => Ok(Value::Bool(env.is_some_and(|env| environment_matches(&env, args)))),
        });
        registry.register("auth", |host, args| {
            Ok(Value::Bool(host.is_authenticated(guard_arg(args).as_deref())))
        });
        registry.register("guest", |host, args| {
            Ok(Value::Bool(!host.is_authenticated(guard_arg(args).as_deref())))
        });
        registry.register("range", |_, args| range(args));
        registry.register("dump", |_, args| {
            let value = match args {
                [single] => single.clone(),
                many => Value::Array(many.to_vec()),
            };
            let pretty = serde_json::to_string_pretty(&value).map_err(|e| format!("dump: {e}"))?;
            Ok(Value::String(format!("<pre class=\"prism-dump\">{}</pre>", escape_html(&pretty))))
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&dyn Host, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::trace!("Registering function '{}'", name);
        self.functions.insert(name, Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<&FunctionFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn guard_arg(args: &[Value]) -> Option<String> {
    args.first().filter(|v| !v.is_null()).map(value_to_string)
}

/// `env('staging', 'production')` and `env(['staging', 'production'])`.
fn environment_matches(env: &str, args: &[Value]) -> bool {
    args.iter().any(|arg| match arg {
        Value::Array(names) => names.iter().any(|name| value_to_string(name) == env),
        other => value_to_string(other) == env,
    })
}

/// Largest array `range()` will build. `for` loops over `a..b` are lazy and
/// not bound by this.
const MAX_RANGE_ITEMS: usize = 1_000_000;

/// `range(end)`, `range(start, end)` or `range(start, end, step)`, inclusive.
fn range(args: &[Value]) -> Result<Value, String> {
    let ints = args
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| format!("range() expects integers, got {}", type_name(v))))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, end, step) = match ints.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] => (*start, *end, *step),
        _ => return Err("range() expects one to three arguments".to_string()),
    };
    if step <= 0 {
        return Err("range() step must be positive".to_string());
    }
    let count = (i128::from(end) - i128::from(start)).abs() / i128::from(step) + 1;
    if count > MAX_RANGE_ITEMS as i128 {
        return Err(format!("range() would produce {count} items, more than the limit of {MAX_RANGE_ITEMS}"));
    }

    let values: Vec<Value> = if start <= end {
        (start..=end).step_by(step as usize).map(Value::from).collect()
    } else {
        (end..=start).rev().step_by(step as usize).map(Value::from).collect()
    };
    Ok(Value::Array(values))
}
