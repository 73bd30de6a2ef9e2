//! Graph → JSON text.
//!
//! The first visit to a container emits it in full and records the path it
//! was emitted under. Any later visit to the same container emits the
//! recorded reference token as a JSON string instead, so cycles terminate and
//! aliases stay aliases. Scalars are always written out in full.

use std::time::Instant;

use chrono::SecondsFormat;
use json_graph_util::{detect_cycles, is_addressable, quote};

use crate::cache::{ResolvedMap, ResolvedValue};
use crate::error::{report, GraphError};
use crate::grammar::{build_path_expression, Base, ExpressionType};
use crate::options::AsJsonOptions;
use crate::value::{format_number, map_key_text, Function, Graph, Node, NodeId, Value};

/// Rewrites a value before it is rendered. Receives the property name (`""`
/// for the top-level value); returning [`Value::Undefined`] drops the entry.
pub type Replacer<'a> = &'a dyn Fn(&str, Value) -> Value;

/// Serializes `value` to JSON text, replacing repeat visits of a container
/// with a reference token.
///
/// Never fails: problems go to `options.on_error` and are replaced by
/// diagnostic text or an omitted entry.
///
/// ```
/// use json_graph::{as_json, AsJsonOptions, Graph, Value};
///
/// let mut graph = Graph::new();
/// let o = graph.object();
/// graph.insert_entry(o, "child", o);
/// assert_eq!(
///     as_json(&graph, &Value::Node(o), None, None, &AsJsonOptions::default()),
///     r#"{"child":"${(@path;@base:root):^}"}"#
/// );
/// ```
pub fn as_json(
    graph: &Graph,
    value: &Value,
    replacer: Option<Replacer<'_>>,
    indent: Option<usize>,
    options: &AsJsonOptions,
) -> String {
    let serializer = Serializer {
        graph,
        options,
        replacer,
        indent: indent.filter(|n| *n > 0).map(|n| " ".repeat(n)),
        cache: ResolvedMap::new(value.clone()),
        path: Vec::new(),
        open: Vec::new(),
        started: Instant::now(),
    };
    serializer.run(value)
}

struct Serializer<'a> {
    graph: &'a Graph,
    options: &'a AsJsonOptions,
    replacer: Option<Replacer<'a>>,
    indent: Option<String>,
    cache: ResolvedMap,
    path: Vec<String>,
    /// Nodes currently being rendered, outermost first.
    open: Vec<NodeId>,
    started: Instant,
}

impl<'a> Serializer<'a> {
    fn run(mut self, value: &Value) -> String {
        let value = self.replace("", value.clone());
        match self.render(&value, 0) {
            Ok(text) => text,
            Err(e) => {
                report(self.options.on_error.as_ref(), &e);
                quote(&e.diagnostic())
            }
        }
    }

    fn replace(&self, key: &str, value: Value) -> Value {
        match self.replacer {
            Some(replacer) => replacer(key, value),
            None => value,
        }
    }

    fn path_text(&self) -> String {
        if self.path.is_empty() {
            "^".to_string()
        } else {
            self.path.join(".")
        }
    }

    fn check_budget(&self, depth: usize) -> Result<(), GraphError> {
        let budget = &self.options.budget;
        if depth > budget.max_depth {
            return Err(GraphError::RecursionLimitExceeded {
                depth,
                limit: budget.max_depth,
                path: self.path_text(),
            });
        }
        let elapsed = self.started.elapsed();
        if elapsed > budget.time_budget {
            return Err(GraphError::TimeoutExceeded {
                elapsed_ms: elapsed.as_millis(),
                budget_ms: budget.time_budget.as_millis(),
                path: self.path_text(),
            });
        }
        if detect_cycles(
            &self.open,
            self.options.cycle_run_length,
            self.options.cycle_repetitions,
        ) {
            return Err(GraphError::CycleDetected {
                path: self.path_text(),
            });
        }
        Ok(())
    }

    fn render(&mut self, value: &Value, depth: usize) -> Result<String, GraphError> {
        let options = self.options;
        let text = match value {
            Value::Undefined => options.undefined_text.clone(),
            Value::Null => "null".to_string(),
            Value::Bool(b) if options.quote_booleans => quote(&b.to_string()),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => self.number(*n),
            Value::BigInt(i) => quote(&format!("{i}n")),
            Value::String(s) if options.trim_strings => quote(s.trim()),
            Value::String(s) => quote(s),
            Value::Date(d) => {
                if !options.format_dates {
                    d.timestamp_millis().to_string()
                } else if let Some(formatter) = &options.date_time_formatter {
                    quote(&formatter(d))
                } else {
                    quote(&d.to_rfc3339_opts(SecondsFormat::Millis, true))
                }
            }
            Value::Function(f) => self.function(f),
            Value::Node(id) => self.render_node(*id, depth)?,
        };
        Ok(text)
    }

    fn number(&self, n: f64) -> String {
        let options = self.options;
        if n.is_nan() {
            return quote(&options.nan_text);
        }
        if n.is_infinite() {
            let sign = if n < 0.0 { "-" } else { "" };
            return quote(&format!("{sign}{}", options.infinity_text));
        }
        let text = format_number(n);
        if options.quote_numbers {
            quote(&text)
        } else {
            text
        }
    }

    fn function(&self, f: &Function) -> String {
        if self.options.omit_functions {
            return String::new();
        }
        let name = f.name.as_deref().unwrap_or("anonymous");
        format!("{{\"type\":\"function\",\"name\":{}}}", quote(name))
    }

    fn render_node(&mut self, id: NodeId, depth: usize) -> Result<String, GraphError> {
        let value = Value::Node(id);
        if let Some(hit) = self.cache.find(self.graph, &value, self.options.alias_mode) {
            tracing::debug!(expression = %hit.expression, path = %self.path_text(), "emitting reference");
            return Ok(hit.json.clone().unwrap_or_else(|| quote(&hit.expression)));
        }
        self.check_budget(depth)?;
        // Only reachable when the node sits under a name no token can spell.
        if self.open.contains(&id) {
            return Err(GraphError::CycleDetected {
                path: self.path_text(),
            });
        }
        let graph = self.graph;
        let node = graph.node(id)?;
        tracing::trace!(node = %id, depth, path = %self.path_text(), "visiting node");

        if self.path.iter().all(|segment| is_addressable(segment)) {
            let expression = build_path_expression(ExpressionType::Path, Base::Root, &self.path);
            let entry = ResolvedValue::new(expression.as_str(), self.cache.root().clone(), None)
                .resolved(value)
                .with_json(quote(&expression))
                .with_path(self.path.clone());
            self.cache.set(&expression, entry);
        } else {
            tracing::debug!(path = %self.path_text(), "path has no token form, node will not be aliased");
        }

        self.open.push(id);
        let text = self.render_body(node, depth);
        self.open.pop();
        Ok(text)
    }

    fn render_body(&mut self, node: &'a Node, depth: usize) -> String {
        match node {
            Node::Object(obj) => {
                if self.options.use_own_serializer {
                    if let Some(text) = obj.serializer.as_ref().and_then(|s| s.to_json()) {
                        if serde_json::from_str::<serde_json::Value>(&text).is_ok() {
                            return text.trim().to_string();
                        }
                        tracing::debug!(path = %self.path_text(), "own serializer returned invalid JSON");
                    }
                }
                let entries = obj.entries.iter().map(|(k, v)| (k.clone(), v));
                self.render_object(entries, depth)
            }
            Node::Map(pairs) => {
                let entries = pairs.iter().map(|(k, v)| (map_key_text(k), v));
                self.render_object(entries, depth)
            }
            Node::Array(items) | Node::Set(items) => self.render_array(items, depth),
        }
    }

    /// Renders one child. `None` means the entry is dropped.
    fn render_entry(&mut self, key: String, value: &Value, depth: usize) -> Option<String> {
        let value = self.replace(&key, value.clone());
        self.path.push(key);
        let rendered = match self.render(&value, depth + 1) {
            Ok(text) => Some(text),
            Err(e) if e.is_guard() => {
                report(self.options.on_error.as_ref(), &e);
                Some(quote(&e.diagnostic()))
            }
            Err(e) => {
                report(self.options.on_error.as_ref(), &e);
                None
            }
        };
        self.path.pop();
        rendered
    }

    fn render_object<'v>(
        &mut self,
        entries: impl Iterator<Item = (String, &'v Value)>,
        depth: usize,
    ) -> String {
        let separator = if self.indent.is_some() { ": " } else { ":" };
        let mut parts = Vec::new();
        for (key, value) in entries {
            if !self.options.is_serializable(&key) {
                continue;
            }
            let quoted_key = quote(&key);
            let text = match self.render_entry(key, value, depth) {
                Some(text) if !text.is_empty() => text,
                Some(_) if self.options.include_empty_properties => "null".to_string(),
                _ => continue,
            };
            parts.push(format!("{quoted_key}{separator}{text}"));
        }
        self.wrap('{', '}', parts, depth)
    }

    fn render_array(&mut self, items: &[Value], depth: usize) -> String {
        let mut parts = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let text = self
                .render_entry(index.to_string(), item, depth)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| "null".to_string());
            parts.push(text);
        }
        self.wrap('[', ']', parts, depth)
    }

    fn wrap(&self, open: char, close: char, parts: Vec<String>, depth: usize) -> String {
        if parts.is_empty() {
            return format!("{open}{close}");
        }
        match &self.indent {
            None => format!("{open}{}{close}", parts.join(",")),
            Some(unit) => {
                let inner = unit.repeat(depth + 1);
                let outer = unit.repeat(depth);
                let body = parts.join(&format!(",\n{inner}"));
                format!("{open}\n{inner}{body}\n{outer}{close}")
            }
        }
    }
}
