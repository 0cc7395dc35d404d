//! Program execution.
//!
//! A [`Runtime`] walks a compiled [`Program`] against a data context and
//! produces output text. It owns nothing: registries, the host and the
//! template loader are borrowed from the engine for the duration of one
//! render call.
//!
//! Per-render state (the section table, the current inheritance level and
//! the nesting depth) lives in [`RenderState`]. Layouts share the state of
//! the template that extends them; an included template that declares its
//! own layout gets a fresh one, so its sections never leak into the caller.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use super::ast::{Case, IncludeMode, Node, Program, SectionClose};
use super::error::TemplateError;
use super::expr::{BinaryOp, Expr, TestKind, UnaryOp};
use super::filters::FilterRegistry;
use super::functions::{FunctionRegistry, Host};
use super::sections::{CaptureKind, CloseMode, SectionTable};
use super::utils::{escape_html, is_truthy, merge_context, number_value, type_name, value_to_string};
use crate::constants::MAX_RENDER_DEPTH;

/// Source of compiled programs for includes, components and layouts.
pub trait TemplateLoader {
    fn load(&self, name: &str) -> Result<Arc<Program>, TemplateError>;

    /// Whether `name` resolves to a source file.
    fn exists(&self, name: &str) -> bool;

    /// Template name behind a component alias.
    fn component_template(&self, name: &str) -> String {
        name.to_string()
    }
}

/// State shared by every template taking part in one render call.
#[derive(Debug, Default)]
pub struct RenderState {
    sections: SectionTable,
    level: usize,
    depth: usize,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    fn nested(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
}

#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    pub filters: &'a FilterRegistry,
    pub functions: &'a FunctionRegistry,
    pub host: &'a dyn Host,
    pub loader: &'a dyn TemplateLoader,
    /// Undefined variables are errors instead of `null`.
    pub strict: bool,
}

impl Runtime<'_> {
    /// Render `program` and every layout above it.
    ///
    /// Output produced by a template that extends a layout is discarded;
    /// only its sections reach the layout.
    pub fn render(
        &self,
        program: Arc<Program>,
        context: Map<String, Value>,
        state: &mut RenderState,
    ) -> Result<String, TemplateError> {
        let mut program = program;
        loop {
            let output = self.execute(&program, context.clone(), state)?;
            let Some(layout) = program.extends.clone() else {
                return Ok(output);
            };

            trace!("'{}' extends '{}' (level {})", program.template, layout, state.level + 1);
            state.level += 1;
            state.depth += 1;
            if state.depth > MAX_RENDER_DEPTH {
                return Err(TemplateError::runtime(
                    program.template.as_str(),
                    format!("layout chain through '{layout}' exceeds the maximum depth of {MAX_RENDER_DEPTH}"),
                    None,
                ));
            }
            program = self.loader.load(&layout)?;
        }
    }

    fn execute(
        &self,
        program: &Program,
        context: Map<String, Value>,
        state: &mut RenderState,
    ) -> Result<String, TemplateError> {
        let mut frame = Frame {
            runtime: *self,
            template: &program.template,
            scope: Scope::new(context),
            state,
        };
        let mut out = String::new();
        frame.exec_nodes(&program.body, &mut out)?;
        Ok(out)
    }
}

/// Variable layers; loops push one per iteration.
struct Scope {
    layers: Vec<Map<String, Value>>,
}

impl Scope {
    fn new(base: Map<String, Value>) -> Self {
        Self {
            layers: vec![base],
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    /// Assign to the innermost layer defining `name`, else the template scope.
    fn set(&mut self, name: &str, value: Value) {
        let layer = match self.layers.iter().rposition(|layer| layer.contains_key(name)) {
            Some(index) => &mut self.layers[index],
            None => &mut self.layers[0],
        };
        layer.insert(name.to_string(), value);
    }

    fn push(&mut self, layer: Map<String, Value>) {
        self.layers.push(layer);
    }

    fn pop(&mut self) {
        self.layers.pop();
    }

    fn flatten(&self) -> Map<String, Value> {
        let mut flat = Map::new();
        for layer in &self.layers {
            for (key, value) in layer {
                flat.insert(key.clone(), value.clone());
            }
        }
        flat
    }
}

struct Frame<'r, 's> {
    runtime: Runtime<'r>,
    template: &'s str,
    scope: Scope,
    state: &'s mut RenderState,
}

impl Frame<'_, '_> {
    fn error(&self, message: impl Into<String>, line: usize) -> TemplateError {
        TemplateError::runtime(self.template, message, Some(line))
    }

    fn exec_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<Flow, TemplateError> {
        for node in nodes {
            match self.exec(node, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, node: &Node, out: &mut String) -> Result<Flow, TemplateError> {
        match node {
            Node::Text {
                text,
            }
            | Node::Raw {
                text,
            } => out.push_str(text),

            Node::Output {
                expr,
                escape,
                line,
            } => {
                let value = self.eval_at(expr, *line)?;
                let text = value_to_string(&value);
                let safe = expr.outer_filter().is_some_and(|name| self.runtime.filters.is_safe(name));
                if *escape && !safe {
                    out.push_str(&escape_html(&text));
                } else {
                    out.push_str(&text);
                }
            }

            Node::If {
                branches,
                otherwise,
                line,
            } => {
                for branch in branches {
                    if is_truthy(&self.eval_at(&branch.condition, *line)?) {
                        return self.exec_nodes(&branch.body, out);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_nodes(body, out);
                }
            }

            Node::Foreach {
                iterable,
                key,
                value,
                body,
                empty,
                line,
            } => {
                let items = match self.eval_at(iterable, *line)? {
                    Value::Null => Vec::new(),
                    Value::Array(items) => {
                        items.into_iter().enumerate().map(|(i, v)| (Value::from(i), v)).collect()
                    }
                    Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
                    other => {
                        return Err(self.error(format!("cannot iterate over {}", type_name(&other)), *line));
                    }
                };

                if items.is_empty() {
                    if let Some(fallback) = empty {
                        return self.exec_nodes(fallback, out);
                    }
                    return Ok(Flow::Normal);
                }

                let names = LoopNames {
                    key: key.as_deref(),
                    value,
                };
                let length = items.len();
                self.run_loop(items, length, names, body, out)?;
            }

            Node::For {
                var,
                start,
                end,
                inclusive,
                body,
                line,
            } => {
                let start = self.integer(start, *line)?;
                let end = self.integer(end, *line)?;
                let end = if *inclusive { end.saturating_add(1) } else { end };
                let length = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
                let items = (start..end).map(|i| (Value::Null, Value::from(i)));
                let names = LoopNames {
                    key: None,
                    value: var,
                };
                self.run_loop(items, length, names, body, out)?;
            }

            Node::While {
                condition,
                body,
                line,
            } => {
                while is_truthy(&self.eval_at(condition, *line)?) {
                    if let Flow::Break = self.exec_nodes(body, out)? {
                        break;
                    }
                }
            }

            Node::Switch {
                subject,
                cases,
                line,
            } => return self.exec_switch(subject, cases, *line, out),

            Node::Break {
                condition,
                line,
            } => {
                if self.control_applies(condition.as_ref(), *line)? {
                    return Ok(Flow::Break);
                }
            }

            Node::Continue {
                condition,
                line,
            } => {
                if self.control_applies(condition.as_ref(), *line)? {
                    return Ok(Flow::Continue);
                }
            }

            Node::Set {
                name,
                value,
                line,
            } => {
                let value = self.eval_at(value, *line)?;
                self.scope.set(name, value);
            }

            Node::Include {
                template,
                data,
                mode,
                line,
            } => self.exec_include(template, data.as_ref(), mode, *line, out)?,

            Node::Component {
                name,
                props,
                slot,
                slots,
                line,
            } => {
                let name = value_to_string(&self.eval_at(name, *line)?);
                let mut context = self.scope.flatten();
                if let Some(props) = props {
                    let props = self.object_arg(props, "component props", *line)?;
                    context = merge_context(&context, &props);
                }

                let default_slot = self.capture(slot)?;
                context.insert("slot".to_string(), Value::String(default_slot));
                for named in slots {
                    let content = self.capture(&named.body)?;
                    context.insert(named.name.clone(), Value::String(content));
                }

                let template = self.runtime.loader.component_template(&name);
                trace!("Rendering component '{}' as '{}'", name, template);
                out.push_str(&self.render_nested(&template, context, *line)?);
            }

            Node::Section {
                name,
                body,
                close,
                line,
            } => {
                let level = self.state.level;
                self.state
                    .sections
                    .open(name, CaptureKind::Section, level)
                    .map_err(|e| self.error(e, *line))?;
                let content = self.capture(body)?;
                let mode = match close {
                    SectionClose::End | SectionClose::Show => CloseMode::End,
                    SectionClose::Append => CloseMode::Append,
                    SectionClose::Overwrite => CloseMode::Overwrite,
                };
                self.state.sections.close(content, mode).map_err(|e| self.error(e, *line))?;

                if *close == SectionClose::Show {
                    self.write_section(name, None, *line, out)?;
                }
            }

            Node::SetSection {
                name,
                value,
                line,
            } => {
                let value = self.eval_at(value, *line)?;
                let level = self.state.level;
                self.state.sections.set(name, escape_html(&value_to_string(&value)), level);
            }

            Node::Yield {
                name,
                default,
                line,
            } => self.write_section(name, default.as_ref(), *line, out)?,

            Node::Parent {
                line,
            } => {
                let content = self.state.sections.parent().map_err(|e| self.error(e, *line))?;
                out.push_str(&content);
            }

            Node::Push {
                name,
                body,
                line,
            } => {
                let level = self.state.level;
                self.state
                    .sections
                    .open(name, CaptureKind::Push, level)
                    .map_err(|e| self.error(e, *line))?;
                let content = self.capture(body)?;
                self.state.sections.close(content, CloseMode::Append).map_err(|e| self.error(e, *line))?;
            }

            Node::Stack {
                name,
                line,
            } => self.write_section(name, None, *line, out)?,
        }

        Ok(Flow::Normal)
    }

    /// Render `nodes` into a separate buffer.
    fn capture(&mut self, nodes: &[Node]) -> Result<String, TemplateError> {
        let mut buffer = String::new();
        self.exec_nodes(nodes, &mut buffer)?;
        Ok(buffer)
    }

    fn write_section(
        &self,
        name: &str,
        default: Option<&Expr>,
        line: usize,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        match self.state.sections.yield_content(name).map_err(|e| self.error(e, line))? {
            Some(content) => out.push_str(&content),
            None => {
                if let Some(default) = default {
                    let value = self.eval_at(default, line)?;
                    out.push_str(&escape_html(&value_to_string(&value)));
                }
            }
        }
        Ok(())
    }

    /// Run `body` once per item. `items` may be lazy; `length` feeds the
    /// `loop` metadata.
    fn run_loop(
        &mut self,
        items: impl IntoIterator<Item = (Value, Value)>,
        length: usize,
        names: LoopNames<'_>,
        body: &[Node],
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let parent = self.scope.get("loop").cloned();
        let depth = parent
            .as_ref()
            .and_then(|p| p.get("depth"))
            .and_then(Value::as_u64)
            .map_or(1, |d| d + 1);

        for (index, (key, value)) in items.into_iter().enumerate() {
            let mut layer = Map::new();
            layer.insert(names.value.to_string(), value);
            if let Some(key_name) = names.key {
                layer.insert(key_name.to_string(), key);
            }
            layer.insert(
                "loop".to_string(),
                loop_metadata(index, length, depth, parent.clone().unwrap_or(Value::Null)),
            );

            self.scope.push(layer);
            let flow = self.exec_nodes(body, out);
            self.scope.pop();

            if let Flow::Break = flow? {
                break;
            }
        }
        Ok(())
    }

    fn exec_switch(
        &mut self,
        subject: &Expr,
        cases: &[Case],
        line: usize,
        out: &mut String,
    ) -> Result<Flow, TemplateError> {
        let subject = self.eval_at(subject, line)?;

        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            let Some(value) = &case.value else {
                continue;
            };
            if values_equal(&subject, &self.eval_at(value, line)?) {
                start = Some(index);
                break;
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.value.is_none()));

        let Some(start) = start else {
            return Ok(Flow::Normal);
        };
        for case in &cases[start..] {
            match self.exec_nodes(&case.body, out)? {
                Flow::Normal => {}
                Flow::Break => break,
                Flow::Continue => return Ok(Flow::Continue),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_include(
        &mut self,
        template: &Expr,
        data: Option<&Expr>,
        mode: &IncludeMode,
        line: usize,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        if let IncludeMode::When(condition) = mode {
            if !is_truthy(&self.eval_at(condition, line)?) {
                return Ok(());
            }
        }

        let name = value_to_string(&self.eval_at(template, line)?);
        if matches!(mode, IncludeMode::IfExists) && !self.runtime.loader.exists(&name) {
            trace!("Skipping missing optional include '{}'", name);
            return Ok(());
        }

        let mut context = self.scope.flatten();
        if let Some(data) = data {
            let overrides = self.object_arg(data, "include data", line)?;
            context = merge_context(&context, &overrides);
        }
        out.push_str(&self.render_nested(&name, context, line)?);
        Ok(())
    }

    /// Render another template from inside this one.
    fn render_nested(
        &mut self,
        name: &str,
        context: Map<String, Value>,
        line: usize,
    ) -> Result<String, TemplateError> {
        let depth = self.state.depth + 1;
        if depth > MAX_RENDER_DEPTH {
            return Err(self.error(
                format!("rendering '{name}' exceeds the maximum nesting depth of {MAX_RENDER_DEPTH}"),
                line,
            ));
        }

        let program = self.runtime.loader.load(name)?;
        if program.extends.is_some() {
            let mut isolated = RenderState::nested(depth);
            return self.runtime.render(program, context, &mut isolated);
        }

        self.state.depth = depth;
        let result = self.runtime.execute(&program, context, self.state);
        self.state.depth = depth - 1;
        result
    }

    fn control_applies(&self, condition: Option<&Expr>, line: usize) -> Result<bool, TemplateError> {
        match condition {
            None => Ok(true),
            Some(expr) => Ok(is_truthy(&self.eval_at(expr, line)?)),
        }
    }

    fn integer(&self, expr: &Expr, line: usize) -> Result<i64, TemplateError> {
        let value = self.eval_at(expr, line)?;
        as_integer(&value)
            .ok_or_else(|| self.error(format!("range bound must be an integer, got {}", type_name(&value)), line))
    }

    fn object_arg(&self, expr: &Expr, what: &str, line: usize) -> Result<Map<String, Value>, TemplateError> {
        match self.eval_at(expr, line)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(self.error(format!("{what} must be an object, got {}", type_name(&other)), line)),
        }
    }

    fn eval_at(&self, expr: &Expr, line: usize) -> Result<Value, TemplateError> {
        self.eval(expr, false).map_err(|message| {
            let line = if line == 0 { None } else { Some(line) };
            TemplateError::runtime(self.template, message, line)
        })
    }

    /// Evaluate an expression. `lenient` suppresses undefined-name errors
    /// (inside `isset`/`empty` and on the left of `??`).
    fn eval(&self, expr: &Expr, lenient: bool) -> Result<Value, String> {
        match expr {
            Expr::Literal {
                value,
            } => Ok(value.clone()),

            Expr::Var {
                name,
            } => match self.scope.get(name) {
                Some(value) => Ok(value.clone()),
                None => self.undefined(format!("undefined variable '{name}'"), lenient),
            },

            Expr::Attr {
                target,
                name,
            } => {
                let target = self.eval(target, lenient)?;
                match &target {
                    Value::Object(map) => match map.get(name) {
                        Some(value) => Ok(value.clone()),
                        None => self.undefined(format!("undefined attribute '{name}'"), lenient),
                    },
                    Value::Array(items) => match name.parse::<usize>() {
                        Ok(index) => Ok(items.get(index).cloned().unwrap_or(Value::Null)),
                        Err(_) => self.undefined(format!("arrays have no attribute '{name}'"), lenient),
                    },
                    other => self.undefined(
                        format!("cannot read attribute '{name}' of {}", type_name(other)),
                        lenient,
                    ),
                }
            }

            Expr::Index {
                target,
                index,
            } => {
                let target = self.eval(target, lenient)?;
                let index = self.eval(index, lenient)?;
                index_value(&target, &index).or_else(|message| self.undefined(message, lenient))
            }

            Expr::Array {
                items,
            } => items.iter().map(|item| self.eval(item, lenient)).collect::<Result<Vec<_>, _>>().map(Value::Array),

            Expr::Object {
                entries,
            } => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, lenient)?);
                }
                Ok(Value::Object(map))
            }

            Expr::Unary {
                op,
                operand,
            } => {
                let value = self.eval(operand, lenient)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Neg => match value.as_i64() {
                        Some(i) => Ok(Value::from(-i)),
                        None => value
                            .as_f64()
                            .map(|f| number_value(-f))
                            .ok_or_else(|| format!("cannot negate {}", type_name(&value))),
                    },
                }
            }

            Expr::Binary {
                op,
                left,
                right,
            } => self.eval_binary(*op, left, right, lenient),

            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(&self.eval(condition, lenient)?) {
                    self.eval(then, lenient)
                } else {
                    self.eval(otherwise, lenient)
                }
            }

            Expr::Filter {
                name,
                input,
                args,
            } => {
                let input = self.eval(input, lenient)?;
                let args = self.eval_list(args, lenient)?;
                let filter = self.runtime.filters.get(name).ok_or_else(|| format!("unknown filter '{name}'"))?;
                filter.apply(&input, &args).map_err(|e| format!("filter '{name}': {e}"))
            }

            Expr::Call {
                function,
                args,
            } => {
                let args = self.eval_list(args, lenient)?;
                let func = self
                    .runtime
                    .functions
                    .get(function)
                    .ok_or_else(|| format!("unknown function '{function}'"))?;
                func(self.runtime.host, &args).map_err(|e| format!("{function}(): {e}"))
            }

            Expr::Test {
                test,
                operand,
            } => {
                let value = self.eval(operand, true)?;
                Ok(Value::Bool(match test {
                    TestKind::Isset => !value.is_null(),
                    TestKind::Empty => !is_truthy(&value),
                }))
            }
        }
    }

    fn eval_list(&self, exprs: &[Expr], lenient: bool) -> Result<Vec<Value>, String> {
        exprs.iter().map(|e| self.eval(e, lenient)).collect()
    }

    fn undefined(&self, message: String, lenient: bool) -> Result<Value, String> {
        if self.runtime.strict && !lenient {
            Err(message)
        } else {
            Ok(Value::Null)
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, lenient: bool) -> Result<Value, String> {
        match op {
            BinaryOp::Or => {
                let l = is_truthy(&self.eval(left, lenient)?);
                Ok(Value::Bool(l || is_truthy(&self.eval(right, lenient)?)))
            }
            BinaryOp::And => {
                let l = is_truthy(&self.eval(left, lenient)?);
                Ok(Value::Bool(l && is_truthy(&self.eval(right, lenient)?)))
            }
            BinaryOp::Coalesce => match self.eval(left, true)? {
                Value::Null => self.eval(right, lenient),
                value => Ok(value),
            },
            _ => {
                let l = self.eval(left, lenient)?;
                let r = self.eval(right, lenient)?;
                apply_binary(op, &l, &r)
            }
        }
    }
}

struct LoopNames<'n> {
    key: Option<&'n str>,
    value: &'n str,
}

fn loop_metadata(index: usize, length: usize, depth: u64, parent: Value) -> Value {
    let mut meta = Map::new();
    meta.insert("index".into(), Value::from(index + 1));
    meta.insert("index0".into(), Value::from(index));
    meta.insert("first".into(), Value::Bool(index == 0));
    meta.insert("last".into(), Value::Bool(index + 1 == length));
    meta.insert("length".into(), Value::from(length));
    meta.insert("remaining".into(), Value::from(length.saturating_sub(index + 1)));
    meta.insert("depth".into(), Value::from(depth));
    meta.insert("parent".into(), parent);
    Value::Object(meta)
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

fn index_value(target: &Value, index: &Value) -> Result<Value, String> {
    match (target, index) {
        (Value::Array(items), idx) => {
            let i = as_integer(idx).ok_or_else(|| format!("array index must be an integer, got {}", type_name(idx)))?;
            let position = if i < 0 { items.len() as i64 + i } else { i };
            usize::try_from(position)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .ok_or_else(|| format!("index {i} out of bounds"))
        }
        (Value::Object(map), key) => {
            let key = value_to_string(key);
            map.get(&key).cloned().ok_or_else(|| format!("undefined key '{key}'"))
        }
        (Value::String(s), idx) => {
            let i = as_integer(idx).ok_or_else(|| format!("string index must be an integer, got {}", type_name(idx)))?;
            usize::try_from(i)
                .ok()
                .and_then(|p| s.chars().nth(p))
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(|| format!("index {i} out of bounds"))
        }
        (other, _) => Err(format!("cannot index into {}", type_name(other))),
    }
}

/// Equality with integers and floats compared numerically.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Ok(x.cmp(&y));
            }
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).ok_or_else(|| "cannot compare NaN".to_string())
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(format!("cannot compare {} with {}", type_name(a), type_name(b))),
    }
}

fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
        BinaryOp::Lt => compare(l, r).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => compare(l, r).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => compare(l, r).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => compare(l, r).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::In => match r {
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| values_equal(item, l)))),
            Value::String(haystack) => Ok(Value::Bool(haystack.contains(value_to_string(l).as_str()))),
            Value::Object(map) => Ok(Value::Bool(map.contains_key(&value_to_string(l)))),
            Value::Null => Ok(Value::Bool(false)),
            other => Err(format!("'in' needs an array, string or object, got {}", type_name(other))),
        },
        BinaryOp::Concat => Ok(Value::String(value_to_string(l) + &value_to_string(r))),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, l, r),
        BinaryOp::Or | BinaryOp::And | BinaryOp::Coalesce => Err(format!("operator {op:?} is evaluated lazily")),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, String> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        _ => "%",
    };
    let (Value::Number(x), Value::Number(y)) = (l, r) else {
        return Err(format!("cannot apply '{symbol}' to {} and {}", type_name(l), type_name(r)));
    };

    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y.as_f64() == Some(0.0) {
        return Err("division by zero".to_string());
    }

    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if a % b == 0 => a.checked_div(b),
            BinaryOp::Div => None,
            _ => a.checked_rem(b),
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (a, b) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(number_value(result))
}
