//! Structural equality over value graphs.

use std::collections::HashSet;

use crate::value::{Graph, Node, NodeId, Value};

/// Performs a deep equality check between a value in `ga` and a value in `gb`.
///
/// Objects compare key-by-key regardless of order; arrays, sets and maps
/// compare element-by-element. Pairs of nodes already under comparison are
/// assumed equal, so cyclic graphs terminate. `NaN` equals `NaN`.
///
/// ```
/// use json_graph::{deep_equal, Graph};
/// use serde_json::json;
///
/// let mut g = Graph::new();
/// let a = g.import(&json!({"foo": [1, 2, 3]}));
/// let b = g.import(&json!({"foo": [1, 2, 3]}));
/// let c = g.import(&json!({"foo": [1, 2, 4]}));
///
/// assert!(deep_equal(&g, &a, &g, &b));
/// assert!(!deep_equal(&g, &a, &g, &c));
/// ```
pub fn deep_equal(ga: &Graph, a: &Value, gb: &Graph, b: &Value) -> bool {
    let mut seen = HashSet::new();
    values_equal(ga, a, gb, b, &mut seen)
}

fn values_equal(
    ga: &Graph,
    a: &Value,
    gb: &Graph,
    b: &Value,
    seen: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Node(x), Value::Node(y)) => {
            if !seen.insert((*x, *y)) {
                return true;
            }
            match (ga.get(*x), gb.get(*y)) {
                (Some(nx), Some(ny)) => nodes_equal(ga, nx, gb, ny, seen),
                _ => false,
            }
        }
        (Value::Node(_), _) | (_, Value::Node(_)) => false,
        _ => a == b,
    }
}

fn nodes_equal(
    ga: &Graph,
    a: &Node,
    gb: &Graph,
    b: &Node,
    seen: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    match (a, b) {
        (Node::Array(xs), Node::Array(ys)) | (Node::Set(xs), Node::Set(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| values_equal(ga, x, gb, y, seen))
        }
        (Node::Object(xo), Node::Object(yo)) => {
            if xo.entries.len() != yo.entries.len() {
                return false;
            }
            for (key, x) in &xo.entries {
                match yo.entries.get(key) {
                    Some(y) => {
                        if !values_equal(ga, x, gb, y, seen) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            true
        }
        (Node::Map(xs), Node::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys).all(|((xk, xv), (yk, yv))| {
                    values_equal(ga, xk, gb, yk, seen) && values_equal(ga, xv, gb, yv, seen)
                })
        }
        _ => false,
    }
}
