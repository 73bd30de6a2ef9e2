//! JSON text → graph, with reference tokens turned back into references.
//!
//! Parsing happens in two steps. The text is read with `serde_json` and
//! copied into a fresh [`Graph`]. If it holds any reference tokens, the graph
//! is then walked in enumeration order and every string that holds a token is
//! resolved and written back into the same container slot. Because writes
//! happen in place, a later token that walks through an already rewritten
//! slot sees the real node, which is what lets cycles close.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Instant;

use json_graph_util::detect_cycles;
use regex::Regex;
use serde_json::Map;

use crate::cache::{ResolutionState, ResolvedMap, ResolvedValue};
use crate::error::{report, GraphError};
use crate::grammar::{contains_interpolatable_content, Base, Expression, ExpressionType};
use crate::lexer::{Template, Token};
use crate::options::{AsJsonOptions, ParseOptions};
use crate::serialize::as_json;
use crate::value::{EntryKey, Graph, Node, NodeId, Value};

/// Rewrites each parsed value before it enters the graph. Called bottom-up
/// with the property name (`""` for the top-level value).
pub type Reviver<'a> = &'a dyn Fn(&str, serde_json::Value) -> serde_json::Value;

/// A parsed graph and its top-level value.
#[derive(Debug, Clone)]
pub struct Document {
    pub graph: Graph,
    pub root: Value,
}

impl Document {
    pub fn new(graph: Graph, root: Value) -> Self {
        Document { graph, root }
    }

    /// Serializes the document back to text.
    pub fn as_json(&self, options: &AsJsonOptions) -> String {
        as_json(&self.graph, &self.root, None, None, options)
    }

    /// Copies the document into a `serde_json` value. Fails on cycles.
    pub fn to_json_value(&self) -> Result<serde_json::Value, GraphError> {
        self.graph.export(&self.root)
    }

    /// Follows a dotted path from the root without resolving anything.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = json_graph_util::split_path(path)?;
        let mut current = &self.root;
        for segment in &segments {
            current = self.graph.child(current.as_node()?, segment)?;
        }
        Some(current)
    }

    pub fn root_node(&self) -> Option<NodeId> {
        self.root.as_node()
    }
}

/// Parses JSON text and reconnects the references it encodes.
///
/// See [`Codec::parse_json`](crate::Codec::parse_json); this uses a codec
/// with no globals.
pub fn parse_json(
    text: &str,
    reviver: Option<Reviver<'_>>,
    options: &ParseOptions,
    scope: Option<&serde_json::Value>,
) -> Document {
    parse_with_globals(text, reviver, options, scope, &Map::new())
}

pub(crate) fn parse_with_globals(
    text: &str,
    reviver: Option<Reviver<'_>>,
    options: &ParseOptions,
    scope: Option<&serde_json::Value>,
    globals: &Map<String, serde_json::Value>,
) -> Document {
    let started = Instant::now();
    let mut graph = Graph::new();
    let trimmed = text.trim();

    let root = if looks_like_json(trimmed) {
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(json) => {
                let json = match reviver {
                    Some(reviver) => revive(reviver, "", json),
                    None => json,
                };
                graph.import(&json)
            }
            Err(e) => {
                report(options.on_error.as_ref(), &GraphError::from(e));
                return Document::new(graph, Value::Undefined);
            }
        }
    } else {
        tracing::debug!("input is not JSON, wrapping it as a one-element array");
        Value::Node(graph.array(vec![Value::String(text.to_string())]))
    };

    if options.revive_bigints {
        revive_bigints(&mut graph);
    }
    let root = match root {
        Value::String(s) if options.revive_bigints => {
            parse_bigint(&s).map(Value::BigInt).unwrap_or(Value::String(s))
        }
        other => other,
    };

    if !options.interpolate && !contains_interpolatable_content(text) {
        return Document::new(graph, root);
    }

    let mut interpolator = Interpolator {
        graph: &mut graph,
        root: root.clone(),
        scope,
        globals,
        scope_root: None,
        globals_root: None,
        options,
        cache: ResolvedMap::new(root),
        walked: HashSet::new(),
        labels: Vec::new(),
        resolving: Vec::new(),
        started,
    };
    let root = interpolator.run();
    Document::new(graph, root)
}

fn looks_like_json(text: &str) -> bool {
    match text.chars().next() {
        Some('{' | '[' | '"' | '-' | '0'..='9') => true,
        Some(_) => matches!(text, "true" | "false" | "null"),
        None => false,
    }
}

fn revive(reviver: Reviver<'_>, key: &str, json: serde_json::Value) -> serde_json::Value {
    let json = match json {
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| revive(reviver, &i.to_string(), item))
                .collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = revive(reviver, &k, v);
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    };
    reviver(key, json)
}

fn bigint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+n$").expect("bigint pattern is valid"))
}

fn parse_bigint(s: &str) -> Option<i128> {
    if !bigint_regex().is_match(s) {
        return None;
    }
    s[..s.len() - 1].parse().ok()
}

fn revive_bigints(graph: &mut Graph) {
    let revive_slot = |slot: &mut Value| {
        if let Value::String(s) = slot {
            if let Some(i) = parse_bigint(s) {
                *slot = Value::BigInt(i);
            }
        }
    };
    for node in graph.nodes_mut() {
        match node {
            Node::Array(items) | Node::Set(items) => items.iter_mut().for_each(revive_slot),
            Node::Object(obj) => obj.entries.values_mut().for_each(revive_slot),
            Node::Map(pairs) => pairs.iter_mut().for_each(|(_, v)| revive_slot(v)),
        }
    }
}

/// Whether any string reachable from `value` still holds a reference token.
///
/// Looks at most `depth` levels deep (default 32) and visits each node once.
pub fn pending_interpolation(graph: &Graph, value: &Value, depth: Option<usize>) -> bool {
    let max_depth = depth.unwrap_or(crate::options::DEFAULT_MAX_DEPTH);
    let mut seen = HashSet::new();
    pending_inner(graph, value, max_depth, &mut seen)
}

fn pending_inner(graph: &Graph, value: &Value, depth: usize, seen: &mut HashSet<NodeId>) -> bool {
    match value {
        Value::String(s) => contains_interpolatable_content(s),
        Value::Node(id) => {
            if depth == 0 || !seen.insert(*id) {
                return false;
            }
            match graph.get(*id) {
                Some(Node::Array(items) | Node::Set(items)) => {
                    items.iter().any(|v| pending_inner(graph, v, depth - 1, seen))
                }
                Some(Node::Object(obj)) => obj
                    .entries
                    .values()
                    .any(|v| pending_inner(graph, v, depth - 1, seen)),
                Some(Node::Map(pairs)) => pairs
                    .iter()
                    .any(|(_, v)| pending_inner(graph, v, depth - 1, seen)),
                None => false,
            }
        }
        _ => false,
    }
}

struct Interpolator<'a> {
    graph: &'a mut Graph,
    root: Value,
    scope: Option<&'a serde_json::Value>,
    globals: &'a Map<String, serde_json::Value>,
    scope_root: Option<Value>,
    globals_root: Option<Value>,
    options: &'a ParseOptions,
    cache: ResolvedMap,
    walked: HashSet<NodeId>,
    /// Entry labels from the root to the slot being rewritten.
    labels: Vec<String>,
    /// Expressions currently being resolved, outermost first.
    resolving: Vec<String>,
    started: Instant,
}

impl<'a> Interpolator<'a> {
    fn run(&mut self) -> Value {
        let root = self.root.clone();
        let result = match &root {
            Value::String(s) => self.interpolate_string(s, None, 0),
            Value::Node(id) => self.walk_node(*id, 0).map(|_| root.clone()),
            _ => Ok(root.clone()),
        };
        match result {
            Ok(value) => value,
            Err(e) => {
                report(self.options.on_error.as_ref(), &e);
                Value::String(e.diagnostic())
            }
        }
    }

    fn label_text(&self) -> String {
        if self.labels.is_empty() {
            "^".to_string()
        } else {
            self.labels.join(".")
        }
    }

    fn check_budget(&self, depth: usize) -> Result<(), GraphError> {
        let budget = &self.options.budget;
        if depth > budget.max_depth {
            return Err(GraphError::RecursionLimitExceeded {
                depth,
                limit: budget.max_depth,
                path: self.label_text(),
            });
        }
        let elapsed = self.started.elapsed();
        if elapsed > budget.time_budget {
            return Err(GraphError::TimeoutExceeded {
                elapsed_ms: elapsed.as_millis(),
                budget_ms: budget.time_budget.as_millis(),
                path: self.label_text(),
            });
        }
        Ok(())
    }

    fn walk_node(&mut self, id: NodeId, depth: usize) -> Result<(), GraphError> {
        if !self.walked.insert(id) {
            return Ok(());
        }
        self.check_budget(depth)?;
        tracing::trace!(node = %id, depth, path = %self.label_text(), "walking node");

        for key in self.graph.keys(id)? {
            let Some(value) = self.graph.entry(id, &key).cloned() else {
                continue;
            };
            self.labels.push(key.to_string());
            let result = match value {
                Value::String(s) if contains_interpolatable_content(&s) => {
                    self.interpolate_string(&s, Some(id), depth + 1).map(Some)
                }
                Value::Node(child) => self.walk_node(child, depth + 1).map(|_| None),
                _ => Ok(None),
            };
            match result {
                Ok(Some(resolved)) => {
                    self.graph.set_entry(id, &key, resolved);
                }
                Ok(None) => {}
                Err(e) => {
                    report(self.options.on_error.as_ref(), &e);
                    if e.is_guard() {
                        self.graph.set_entry(id, &key, Value::String(e.diagnostic()));
                    }
                }
            }
            self.labels.pop();
        }
        Ok(())
    }

    /// Resolves the tokens in `text` until none are left, at most
    /// `max_iterations` times.
    fn interpolate_string(
        &mut self,
        text: &str,
        current: Option<NodeId>,
        depth: usize,
    ) -> Result<Value, GraphError> {
        let mut value = Value::String(text.to_string());
        for _ in 0..self.options.max_iterations {
            let text = match &value {
                Value::String(s) if contains_interpolatable_content(s) => s.clone(),
                _ => return Ok(value),
            };
            let next = self.resolve_template(&text, current, depth)?;
            if next == value {
                break;
            }
            value = next;
        }
        Ok(value)
    }

    fn resolve_template(
        &mut self,
        text: &str,
        current: Option<NodeId>,
        depth: usize,
    ) -> Result<Value, GraphError> {
        let template = Template::parse(text);
        for token in template.malformed() {
            report(
                self.options.on_error.as_ref(),
                &GraphError::MalformedToken(token.clone()),
            );
        }
        if let Some(expression) = template.single_reference() {
            return self.resolve(expression, current, depth);
        }

        let mut parts = Vec::with_capacity(template.spans().len());
        for span in template.spans() {
            match &span.token {
                Token::Literal(literal) => parts.push(Value::String(literal.clone())),
                Token::Reference(expression) => parts.push(self.resolve(expression, current, depth)?),
            }
        }
        Ok(self.compose(parts))
    }

    /// Joins the resolved parts of a composite string. Scalars concatenate;
    /// containers are never stringified, so any container part turns the
    /// whole result into an array of the parts.
    fn compose(&mut self, mut parts: Vec<Value>) -> Value {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        if parts.iter().all(Value::is_scalar) {
            let text: String = parts.iter().filter_map(Value::display_text).collect();
            return Value::String(text);
        }
        Value::Node(self.graph.array(parts))
    }

    fn resolve(
        &mut self,
        expression: &Expression,
        current: Option<NodeId>,
        depth: usize,
    ) -> Result<Value, GraphError> {
        self.check_budget(depth)?;
        let key = ResolvedMap::key_for(expression, current);

        let cached = self.cache.get(&key).map(|hit| (hit.state, hit.value.clone()));
        if let Some((state, value)) = cached {
            match state {
                ResolutionState::Resolved => {
                    tracing::debug!(expression = %key, "resolution cache hit");
                    return Ok(value);
                }
                ResolutionState::Resolving | ResolutionState::CycleDetected => {
                    return Ok(self.cycle(&key, expression, current));
                }
                ResolutionState::Invalid => return Ok(Value::String(expression.to_string())),
                ResolutionState::Unresolved => {}
            }
        }

        self.resolving.push(key.clone());
        if detect_cycles(
            &self.resolving,
            self.options.cycle_run_length,
            self.options.cycle_repetitions,
        ) {
            self.resolving.pop();
            return Ok(self.cycle(&key, expression, current));
        }

        let pending = ResolvedValue::new(key.as_str(), self.root.clone(), current)
            .with_state(ResolutionState::Resolving)
            .with_path(self.labels.clone());
        self.cache.set(&key, pending);
        tracing::debug!(expression = %key, path = %self.label_text(), "resolving reference");

        let result = self.dispatch(expression, current, depth);
        self.resolving.pop();

        match result {
            Ok(Some(value)) => {
                let entry = ResolvedValue::new(key.as_str(), self.root.clone(), current)
                    .resolved(value.clone())
                    .with_path(expression.segments());
                self.cache.set(&key, entry);
                Ok(value)
            }
            Ok(None) => {
                report(
                    self.options.on_error.as_ref(),
                    &GraphError::UnresolvedReference(expression.to_string()),
                );
                self.cache.set(
                    &key,
                    ResolvedValue::new(key.as_str(), self.root.clone(), current)
                        .with_state(ResolutionState::Invalid),
                );
                Ok(Value::String(expression.to_string()))
            }
            Err(e) => {
                self.cache.set(
                    &key,
                    ResolvedValue::new(key.as_str(), self.root.clone(), current),
                );
                Err(e)
            }
        }
    }

    fn cycle(&mut self, key: &str, expression: &Expression, current: Option<NodeId>) -> Value {
        let error = GraphError::CycleDetected {
            path: expression.to_string(),
        };
        report(self.options.on_error.as_ref(), &error);
        self.cache.set(
            key,
            ResolvedValue::new(key, self.root.clone(), current).with_state(ResolutionState::CycleDetected),
        );
        Value::String(error.diagnostic())
    }

    fn dispatch(
        &mut self,
        expression: &Expression,
        current: Option<NodeId>,
        depth: usize,
    ) -> Result<Option<Value>, GraphError> {
        let segments = expression.segments();
        let base = match (expression.kind, expression.base) {
            (ExpressionType::Path, Base::Root | Base::Global) => self.root.clone(),
            (ExpressionType::Path, Base::This | Base::Scope) => match current {
                Some(id) => Value::Node(id),
                None => self.root.clone(),
            },
            (ExpressionType::Var, Base::This | Base::Scope) => self.scope_value(),
            (ExpressionType::Var, Base::Root | Base::Global) => self.globals_value(),
        };
        self.find_node(base, &segments, depth)
    }

    fn scope_value(&mut self) -> Value {
        if let Some(value) = &self.scope_root {
            return value.clone();
        }
        let value = match self.scope {
            Some(scope) => self.graph.import(scope),
            None => Value::Undefined,
        };
        self.scope_root = Some(value.clone());
        value
    }

    fn globals_value(&mut self) -> Value {
        if let Some(value) = &self.globals_root {
            return value.clone();
        }
        let value = self
            .graph
            .import(&serde_json::Value::Object(self.globals.clone()));
        self.globals_root = Some(value.clone());
        value
    }

    /// Walks `segments` from `base`. Token strings met on the way are
    /// resolved first and written back into their slot.
    fn find_node(
        &mut self,
        base: Value,
        segments: &[String],
        depth: usize,
    ) -> Result<Option<Value>, GraphError> {
        let mut value = base;
        let mut slot: Option<(NodeId, EntryKey)> = None;

        for segment in segments {
            value = self.settle(value, &slot, depth)?;
            let Value::Node(id) = value else {
                return Ok(None);
            };
            let Some(key) = self.graph.child_key(id, segment) else {
                return Ok(None);
            };
            value = match self.graph.entry(id, &key) {
                Some(v) => v.clone(),
                None => return Ok(None),
            };
            slot = Some((id, key));
        }

        let value = self.settle(value, &slot, depth)?;
        if matches!(value, Value::Undefined) {
            return Ok(None);
        }
        Ok(Some(value))
    }

    fn settle(
        &mut self,
        value: Value,
        slot: &Option<(NodeId, EntryKey)>,
        depth: usize,
    ) -> Result<Value, GraphError> {
        let text = match &value {
            Value::String(s) if contains_interpolatable_content(s) => s.clone(),
            _ => return Ok(value),
        };
        let holder = slot.as_ref().map(|(id, _)| *id);
        let settled = self.interpolate_string(&text, holder, depth + 1)?;
        if let Some((id, key)) = slot {
            self.graph.set_entry(*id, key, settled.clone());
        }
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_is_not_walked() {
        let doc = parse_json(r#"{"a": [1, "x"]}"#, None, &ParseOptions::default(), None);
        assert_eq!(doc.to_json_value().unwrap(), json!({"a": [1, "x"]}));
    }

    #[test]
    fn non_json_is_wrapped() {
        let doc = parse_json("hello world", None, &ParseOptions::default(), None);
        assert_eq!(doc.to_json_value().unwrap(), json!(["hello world"]));
    }

    #[test]
    fn syntax_error_yields_undefined_root() {
        let doc = parse_json("{\"a\": ", None, &ParseOptions::default(), None);
        assert_eq!(doc.root, Value::Undefined);
        assert!(doc.graph.is_empty());
    }

    #[test]
    fn reviver_runs_bottom_up() {
        let reviver = |key: &str, value: serde_json::Value| {
            if key == "n" {
                json!(value.as_i64().unwrap_or(0) + 1)
            } else {
                value
            }
        };
        let doc = parse_json(r#"{"n": 1, "inner": {"n": 5}}"#, Some(&reviver), &ParseOptions::default(), None);
        assert_eq!(doc.to_json_value().unwrap(), json!({"n": 2, "inner": {"n": 6}}));
    }

    #[test]
    fn bigints_are_revived_on_request() {
        let options = ParseOptions {
            revive_bigints: true,
            ..ParseOptions::default()
        };
        let doc = parse_json(r#"{"big": "170141183460469231731687303715884105727n", "s": "n"}"#, None, &options, None);
        assert_eq!(doc.get("big"), Some(&Value::BigInt(i128::MAX)));
        assert_eq!(doc.get("s"), Some(&Value::from("n")));
    }

    #[test]
    fn this_relative_path() {
        let doc = parse_json(
            r#"{"box": {"size": 3, "copy": "${(@path;@base:this):size}"}}"#,
            None,
            &ParseOptions::default(),
            None,
        );
        assert_eq!(doc.get("box.copy"), Some(&Value::from(3)));
    }

    #[test]
    fn forward_reference_through_placeholder() {
        let doc = parse_json(
            r#"{"x": "${(@path;@base:root):y.k}", "y": "${(@path;@base:root):z}", "z": {"k": "v"}}"#,
            None,
            &ParseOptions::default(),
            None,
        );
        assert_eq!(doc.get("x"), Some(&Value::from("v")));
        assert_eq!(doc.get("y"), doc.get("z"));
    }

    #[test]
    fn composite_strings() {
        let doc = parse_json(
            r#"{"n": 2, "name": "ann", "label": "${(@path;@base:root):name}#${(@path;@base:root):n}"}"#,
            None,
            &ParseOptions::default(),
            None,
        );
        assert_eq!(doc.get("label"), Some(&Value::from("ann#2")));
    }

    #[test]
    fn composite_with_containers_becomes_array() {
        let doc = parse_json(
            r#"{"o": {}, "mix": "${(@path;@base:root):o} and ${(@path;@base:root):o}"}"#,
            None,
            &ParseOptions::default(),
            None,
        );
        let o = doc.get("o").cloned().unwrap();
        let mix = doc.get("mix").and_then(Value::as_node).unwrap();
        match doc.graph.get(mix) {
            Some(Node::Array(parts)) => {
                assert_eq!(parts, &vec![o.clone(), Value::from(" and "), o]);
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn pending_detection() {
        let mut graph = Graph::new();
        let root = graph.import(&json!({"a": {"b": ["${(@path;@base:root):a}"]}}));
        assert!(pending_interpolation(&graph, &root, None));
        assert!(!pending_interpolation(&graph, &root, Some(2)));
        let plain = graph.import(&json!({"a": "${x}"}));
        assert!(!pending_interpolation(&graph, &plain, None));
    }
}
