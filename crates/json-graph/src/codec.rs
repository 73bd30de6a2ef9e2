//! The codec service object.

use serde_json::Map;

use crate::interpolate::{parse_with_globals, Document, Reviver};
use crate::options::{AsJsonOptions, ParseOptions};
use crate::serialize::{as_json, Replacer};
use crate::value::{Graph, Value};

/// Holds what outlives a single call: the globals read by
/// `${(@var;@base:global):...}` tokens.
///
/// Build one when the host starts and pass it around by reference. Every
/// call still gets its own cache and visited set, so one `Codec` can serve
/// concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    globals: Map<String, serde_json::Value>,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_globals(mut self, globals: Map<String, serde_json::Value>) -> Self {
        self.globals = globals;
        self
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn globals(&self) -> &Map<String, serde_json::Value> {
        &self.globals
    }

    /// See [`as_json`](crate::as_json).
    pub fn as_json(
        &self,
        graph: &Graph,
        value: &Value,
        replacer: Option<Replacer<'_>>,
        indent: Option<usize>,
        options: &AsJsonOptions,
    ) -> String {
        as_json(graph, value, replacer, indent, options)
    }

    /// Parses `text` and reconnects the references it encodes.
    ///
    /// Text that does not look like JSON comes back as a one-element array
    /// holding the text. Text that looks like JSON but fails to parse is
    /// reported and yields an undefined root. `scope` backs
    /// `${(@var;@base:scope):...}` tokens.
    ///
    /// ```
    /// use json_graph::{Codec, ParseOptions, Value};
    ///
    /// let doc = Codec::new().parse_json(
    ///     r#"{"child":"${(@path;@base:root):^}"}"#,
    ///     None,
    ///     &ParseOptions::default(),
    ///     None,
    /// );
    /// let root = doc.root_node().unwrap();
    /// assert_eq!(doc.get("child"), Some(&Value::Node(root)));
    /// ```
    pub fn parse_json(
        &self,
        text: &str,
        reviver: Option<Reviver<'_>>,
        options: &ParseOptions,
        scope: Option<&serde_json::Value>,
    ) -> Document {
        parse_with_globals(text, reviver, options, scope, &self.globals)
    }
}
