use std::sync::Arc;

use thiserror::Error;

use crate::value::NodeId;

/// Everything that can degrade a serialize or parse call.
///
/// None of these escape [`as_json`](crate::as_json) or
/// [`parse_json`](crate::parse_json): they are handed to the
/// [`ErrorHook`] and replaced by a diagnostic string, an omitted entry, or
/// the literal token text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("malformed reference token: {0}")]
    MalformedToken(String),

    #[error("cycle detected at {path}")]
    CycleDetected { path: String },

    #[error("recursion limit exceeded: depth {depth} > {limit} at {path}")]
    RecursionLimitExceeded {
        depth: usize,
        limit: usize,
        path: String,
    },

    #[error("timeout exceeded: {elapsed_ms}ms > {budget_ms}ms at {path}")]
    TimeoutExceeded {
        elapsed_ms: u128,
        budget_ms: u128,
        path: String,
    },

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("dangling node handle #{0}")]
    DanglingNode(NodeId),

    #[error("JSON syntax error: {0}")]
    Syntax(String),
}

impl GraphError {
    /// Text substituted in place of the subtree that raised this error.
    pub fn diagnostic(&self) -> String {
        format!("[{self}]")
    }

    /// Whether this error aborts a subtree (and gets a diagnostic) rather than
    /// dropping a single entry.
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            GraphError::CycleDetected { .. }
                | GraphError::RecursionLimitExceeded { .. }
                | GraphError::TimeoutExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Syntax(e.to_string())
    }
}

/// Diagnostic callback invoked for every degradation.
pub type ErrorHook = Arc<dyn Fn(&GraphError) + Send + Sync>;

/// Passes `error` to the hook, if any, and logs it.
pub(crate) fn report(hook: Option<&ErrorHook>, error: &GraphError) {
    tracing::warn!(%error, "json-graph degraded output");
    if let Some(hook) = hook {
        hook(error);
    }
}
