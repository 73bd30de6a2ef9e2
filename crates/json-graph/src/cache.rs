//! Per-call resolution cache.
//!
//! A [`ResolvedMap`] lives for exactly one top-level serialize or parse call.
//! It maps expression text to what that expression resolved to, and answers
//! the reverse question "was this node already emitted, and under which
//! expression?". It is not synchronized; concurrent calls must each build
//! their own.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::equal::deep_equal;
use crate::grammar::{Expression, ROOT_TOKEN};
use crate::options::AliasMode;
use crate::value::{Graph, NodeId, Value};

/// Where one expression is in its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    CycleDetected,
    Invalid,
}

/// One cache entry.
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    pub expression: String,
    pub root: Value,
    /// Node a `this`-relative expression was resolved against.
    pub current: Option<NodeId>,
    pub value: Value,
    /// JSON text emitted for this entry, when produced by the serializer.
    pub json: Option<String>,
    pub path: Vec<String>,
    pub state: ResolutionState,
}

impl ResolvedValue {
    pub fn new(expression: impl Into<String>, root: Value, current: Option<NodeId>) -> Self {
        ResolvedValue {
            expression: expression.into(),
            root,
            current,
            value: Value::Undefined,
            json: None,
            path: Vec::new(),
            state: ResolutionState::Unresolved,
        }
    }

    pub fn with_state(mut self, state: ResolutionState) -> Self {
        self.state = state;
        self
    }

    pub fn resolved(mut self, value: Value) -> Self {
        self.value = value;
        self.state = ResolutionState::Resolved;
        self
    }

    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }
}

/// Expression text → [`ResolvedValue`], plus a node index for alias lookup.
#[derive(Debug, Clone)]
pub struct ResolvedMap {
    root: Value,
    entries: IndexMap<String, ResolvedValue>,
    by_node: HashMap<NodeId, String>,
}

impl ResolvedMap {
    pub fn new(root: Value) -> Self {
        ResolvedMap {
            root,
            entries: IndexMap::new(),
            by_node: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Cache key of `expression` when resolved against `current`.
    ///
    /// Relative expressions resolve differently per node, so their key
    /// carries the node handle.
    pub fn key_for(expression: &Expression, current: Option<NodeId>) -> String {
        match current {
            Some(id) if expression.base.is_relative() => format!("{expression}#{id}"),
            _ => expression.to_string(),
        }
    }

    fn normalize(key: &str) -> &str {
        if key == "^" {
            ROOT_TOKEN
        } else {
            key
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries.get(Self::normalize(key))
    }

    /// Stores `entry` under its expression. A resolved entry is never
    /// replaced by one that is not resolved; returns whether it was stored.
    pub fn set(&mut self, key: &str, entry: ResolvedValue) -> bool {
        let key = Self::normalize(key).to_string();
        if let Some(existing) = self.entries.get(&key) {
            if existing.is_resolved() && !entry.is_resolved() {
                return false;
            }
        }
        if entry.is_resolved() {
            if let Value::Node(id) = entry.value {
                self.by_node.entry(id).or_insert_with(|| key.clone());
            }
        }
        self.entries.insert(key, entry);
        true
    }

    /// Finds the first resolved entry that already holds `value`.
    ///
    /// Only containers are looked up; scalars always return `None`. In
    /// [`AliasMode::Identity`] the node handle must match; in
    /// [`AliasMode::Structural`] any deep-equal node matches as well.
    pub fn find(&self, graph: &Graph, value: &Value, mode: AliasMode) -> Option<&ResolvedValue> {
        let id = value.as_node()?;
        if let Some(key) = self.by_node.get(&id) {
            return self.entries.get(key);
        }
        match mode {
            AliasMode::Identity => None,
            AliasMode::Structural => self.entries.values().find(|entry| {
                entry.is_resolved()
                    && matches!(entry.value, Value::Node(_))
                    && deep_equal(graph, &entry.value, graph, value)
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
