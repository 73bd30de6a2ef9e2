//! Arena-backed value graph.
//!
//! Containers live in a [`Graph`] and are addressed by copyable [`NodeId`]
//! handles. A [`Value::Node`] slot holds such a handle, so the same container
//! can sit under several parents (an alias) or under one of its own
//! descendants (a cycle) without any shared ownership.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use json_graph_util::is_valid_index;
use serde_json::{Map, Number};

use crate::error::GraphError;

/// Handle of a container node inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stand-in for a callable. Serialized as `{"type":"function","name":...}`
/// and never restored as a callable on parse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub name: Option<String>,
}

impl Function {
    pub fn named(name: impl Into<String>) -> Self {
        Function {
            name: Some(name.into()),
        }
    }

    pub fn anonymous() -> Self {
        Function { name: None }
    }
}

/// A node's own serialization method.
///
/// Returning `None`, or text that is not valid JSON, falls back to the
/// generic object rendering.
pub trait ToJson: Send + Sync {
    fn to_json(&self) -> Option<String>;
}

/// One slot of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Function(Function),
    Node(NodeId),
}

impl Value {
    /// Everything but a container handle.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Node(_))
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Plain text of a scalar, as used when splicing it into a string.
    /// Containers have no display text.
    pub fn display_text(&self) -> Option<String> {
        let text = match self {
            Value::Undefined => String::new(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Function(f) => f.name.clone().unwrap_or_else(|| "anonymous".to_string()),
            Value::Node(_) => return None,
        };
        Some(text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

/// Formats a finite number the way JSON writers print it: integral values
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return format!("{}", n as i64);
    }
    match Number::from_f64(n) {
        Some(num) => num.to_string(),
        None => n.to_string(),
    }
}

/// Plain object with insertion-ordered entries.
#[derive(Clone, Default)]
pub struct ObjectNode {
    pub entries: IndexMap<String, Value>,
    pub serializer: Option<Arc<dyn ToJson>>,
}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("entries", &self.entries)
            .field("serializer", &self.serializer.is_some())
            .finish()
    }
}

/// A container stored in the arena.
#[derive(Debug, Clone)]
pub enum Node {
    Array(Vec<Value>),
    Object(ObjectNode),
    /// Map-like collection with arbitrary keys, in insertion order.
    Map(Vec<(Value, Value)>),
    /// Set-like collection, in insertion order.
    Set(Vec<Value>),
}

/// Position of one entry inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKey {
    Index(usize),
    Key(String),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Index(i) => write!(f, "{i}"),
            EntryKey::Key(k) => f.write_str(k),
        }
    }
}

/// Normalizes a map key to the property name it is serialized under.
/// Container keys have no text of their own and are named by handle.
pub fn map_key_text(key: &Value) -> String {
    match (key.display_text(), key) {
        (Some(text), _) => text,
        (None, Value::Node(id)) => format!("[node #{id}]"),
        (None, _) => String::new(),
    }
}

/// Arena of container nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// New empty object.
    pub fn object(&mut self) -> NodeId {
        self.insert(Node::Object(ObjectNode::default()))
    }

    pub fn array(&mut self, items: Vec<Value>) -> NodeId {
        self.insert(Node::Array(items))
    }

    pub fn map(&mut self, pairs: Vec<(Value, Value)>) -> NodeId {
        self.insert(Node::Map(pairs))
    }

    pub fn set(&mut self, items: Vec<Value>) -> NodeId {
        self.insert(Node::Set(items))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.get(id).ok_or(GraphError::DanglingNode(id))
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    /// Sets `key` on an object node. Returns false when `id` is not an object.
    pub fn insert_entry(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.get_mut(id) {
            Some(Node::Object(obj)) => {
                obj.entries.insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Appends to an array or set node.
    pub fn push(&mut self, id: NodeId, value: impl Into<Value>) -> bool {
        match self.get_mut(id) {
            Some(Node::Array(items)) | Some(Node::Set(items)) => {
                items.push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Attaches a custom serializer to an object node.
    pub fn set_serializer(&mut self, id: NodeId, serializer: Arc<dyn ToJson>) -> bool {
        match self.get_mut(id) {
            Some(Node::Object(obj)) => {
                obj.serializer = Some(serializer);
                true
            }
            _ => false,
        }
    }

    /// Entry positions of a container, in enumeration order.
    pub fn keys(&self, id: NodeId) -> Result<Vec<EntryKey>, GraphError> {
        let keys = match self.node(id)? {
            Node::Array(items) | Node::Set(items) => (0..items.len()).map(EntryKey::Index).collect(),
            Node::Map(pairs) => (0..pairs.len()).map(EntryKey::Index).collect(),
            Node::Object(obj) => obj.entries.keys().cloned().map(EntryKey::Key).collect(),
        };
        Ok(keys)
    }

    /// Value stored at an entry position. For maps the position selects a
    /// pair and the pair's value is returned.
    pub fn entry(&self, id: NodeId, key: &EntryKey) -> Option<&Value> {
        match (self.get(id)?, key) {
            (Node::Array(items) | Node::Set(items), EntryKey::Index(i)) => items.get(*i),
            (Node::Map(pairs), EntryKey::Index(i)) => pairs.get(*i).map(|(_, v)| v),
            (Node::Object(obj), EntryKey::Key(k)) => obj.entries.get(k),
            _ => None,
        }
    }

    /// Overwrites an existing entry in place.
    pub fn set_entry(&mut self, id: NodeId, key: &EntryKey, value: Value) -> bool {
        let slot = match (self.get_mut(id), key) {
            (Some(Node::Array(items) | Node::Set(items)), EntryKey::Index(i)) => items.get_mut(*i),
            (Some(Node::Map(pairs)), EntryKey::Index(i)) => pairs.get_mut(*i).map(|(_, v)| v),
            (Some(Node::Object(obj)), EntryKey::Key(k)) => obj.entries.get_mut(k),
            _ => None,
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Resolves one dotted-path segment against a container.
    ///
    /// Arrays and sets take a decimal index, objects a property name, maps
    /// the normalized text of a key.
    pub fn child_key(&self, id: NodeId, segment: &str) -> Option<EntryKey> {
        match self.get(id)? {
            Node::Array(items) | Node::Set(items) => {
                if !is_valid_index(segment) {
                    return None;
                }
                let index: usize = segment.parse().ok()?;
                (index < items.len()).then_some(EntryKey::Index(index))
            }
            Node::Object(obj) => obj
                .entries
                .contains_key(segment)
                .then(|| EntryKey::Key(segment.to_string())),
            Node::Map(pairs) => pairs
                .iter()
                .position(|(k, _)| map_key_text(k) == segment)
                .map(EntryKey::Index),
        }
    }

    pub fn child(&self, id: NodeId, segment: &str) -> Option<&Value> {
        let key = self.child_key(id, segment)?;
        self.entry(id, &key)
    }

    /// Copies a `serde_json` document into the arena.
    pub fn import(&mut self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let items = items.iter().map(|item| self.import(item)).collect();
                Value::Node(self.array(items))
            }
            serde_json::Value::Object(map) => {
                let entries = map.iter().map(|(k, v)| (k.clone(), self.import(v))).collect();
                Value::Node(self.insert(Node::Object(ObjectNode {
                    entries,
                    serializer: None,
                })))
            }
        }
    }

    /// Copies an acyclic value out of the arena. Aliased nodes are copied
    /// once per occurrence; a cycle is an error.
    pub fn export(&self, value: &Value) -> Result<serde_json::Value, GraphError> {
        let mut ancestors = Vec::new();
        self.export_inner(value, &mut ancestors)
    }

    fn export_inner(
        &self,
        value: &Value,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<serde_json::Value, GraphError> {
        let json = match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::BigInt(i) => match i64::try_from(*i) {
                Ok(small) => serde_json::Value::Number(small.into()),
                Err(_) => serde_json::Value::String(format!("{i}n")),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::Number(d.timestamp_millis().into()),
            Value::Function(f) => serde_json::json!({
                "type": "function",
                "name": f.name.as_deref().unwrap_or("anonymous"),
            }),
            Value::Node(id) => {
                if ancestors.contains(id) {
                    return Err(GraphError::CycleDetected {
                        path: format!("node #{id}"),
                    });
                }
                ancestors.push(*id);
                let result = self.export_node(*id, ancestors);
                ancestors.pop();
                result?
            }
        };
        Ok(json)
    }

    fn export_node(
        &self,
        id: NodeId,
        ancestors: &mut Vec<NodeId>,
    ) -> Result<serde_json::Value, GraphError> {
        let json = match self.node(id)? {
            Node::Array(items) | Node::Set(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.export_inner(item, ancestors))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Object(obj) => {
                let mut map = Map::new();
                for (k, v) in &obj.entries {
                    map.insert(k.clone(), self.export_inner(v, ancestors)?);
                }
                serde_json::Value::Object(map)
            }
            Node::Map(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    map.insert(map_key_text(k), self.export_inner(v, ancestors)?);
                }
                serde_json::Value::Object(map)
            }
        };
        Ok(json)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number((n as i64).into());
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}
