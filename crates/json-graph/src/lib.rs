//! json-graph: a JSON codec for object graphs with cycles and aliases.
//!
//! Plain JSON cannot say "this is the same object as over there". This crate
//! writes the second and later visits of a container as a reference token,
//!
//! ```text
//! ${(@path;@base:root):a.b}
//! ```
//!
//! and on parse turns those tokens back into real references, so the graph
//! comes back with the same shape it had.
//!
//! # Example
//!
//! ```
//! use json_graph::{as_json, parse_json, AsJsonOptions, Graph, ParseOptions, Value};
//!
//! let mut graph = Graph::new();
//! let o = graph.object();
//! graph.insert_entry(o, "child", o);
//!
//! let text = as_json(&graph, &Value::Node(o), None, None, &AsJsonOptions::default());
//! assert_eq!(text, r#"{"child":"${(@path;@base:root):^}"}"#);
//!
//! let doc = parse_json(&text, None, &ParseOptions::default(), None);
//! let root = doc.root_node().unwrap();
//! assert_eq!(doc.get("child"), Some(&Value::Node(root)));
//! assert_eq!(doc.as_json(&AsJsonOptions::default()), text);
//! ```
//!
//! # Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`value`] | [`Graph`] arena, [`Value`] and [`Node`] |
//! | [`grammar`] | token parsing and building |
//! | [`lexer`] | literal/reference spans of a string |
//! | [`cache`] | per-call [`ResolvedMap`] |
//! | [`serialize`] | [`as_json`] |
//! | [`interpolate`] | [`parse_json`] and reference resolution |
//!
//! [`detect_cycles`], the run-length repetition check both directions use as
//! a guard, is re-exported from `json-graph-util` for callers that keep their
//! own traversal stacks.
//!
//! The `json-graph` command-line tool is built with the `cli` feature.

pub mod cache;
pub mod codec;
pub mod equal;
pub mod error;
pub mod grammar;
pub mod interpolate;
pub mod lexer;
pub mod options;
pub mod serialize;
pub mod value;

pub use cache::{ResolutionState, ResolvedMap, ResolvedValue};
pub use codec::Codec;
pub use equal::deep_equal;
pub use error::{ErrorHook, GraphError};
pub use grammar::{
    build_path_expression, contains_interpolatable_content, parse_key, Base, Expression,
    ExpressionType, ROOT_TOKEN,
};
pub use interpolate::{parse_json, pending_interpolation, Document, Reviver};
pub use json_graph_util::detect_cycles;
pub use lexer::{Span, Template, Token};
pub use options::{AliasMode, AsJsonOptions, Budget, DateFormatter, ParseOptions};
pub use serialize::{as_json, Replacer};
pub use value::{EntryKey, Function, Graph, Node, NodeId, ObjectNode, ToJson, Value};
