//! Reference token grammar.
//!
//! A reference token has the shape
//!
//! ```text
//! ${(@<type>;@base:<base>):<variable>}
//! ```
//!
//! where `type` is `path` or `var`, `base` is one of `root`, `this`,
//! `scope`, `global`, and `variable` is a dotted path or an identifier. The
//! `;@base:<base>` part may be left out, in which case `path` tokens are
//! root-relative and `var` tokens read globals.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use json_graph_util::{join_path, split_path};
use regex::Regex;

use crate::error::GraphError;

/// Token for "the root node itself".
pub const ROOT_TOKEN: &str = "${(@path;@base:root):^}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Path,
    Var,
}

impl ExpressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionType::Path => "path",
            ExpressionType::Var => "var",
        }
    }

    fn default_base(&self) -> Base {
        match self {
            ExpressionType::Path => Base::Root,
            ExpressionType::Var => Base::Global,
        }
    }
}

impl FromStr for ExpressionType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(ExpressionType::Path),
            "var" => Ok(ExpressionType::Var),
            other => Err(GraphError::MalformedToken(format!("unknown type @{other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    Root,
    This,
    Scope,
    Global,
}

impl Base {
    pub fn as_str(&self) -> &'static str {
        match self {
            Base::Root => "root",
            Base::This => "this",
            Base::Scope => "scope",
            Base::Global => "global",
        }
    }

    /// `this` and `scope` are read relative to the node being rebuilt.
    pub fn is_relative(&self) -> bool {
        matches!(self, Base::This | Base::Scope)
    }
}

impl FromStr for Base {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Base::Root),
            "this" => Ok(Base::This),
            "scope" => Ok(Base::Scope),
            "global" => Ok(Base::Global),
            other => Err(GraphError::MalformedToken(format!("unknown base {other}"))),
        }
    }
}

/// A parsed reference token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression {
    pub kind: ExpressionType,
    pub base: Base,
    pub variable: String,
}

impl Expression {
    pub fn new(kind: ExpressionType, base: Base, variable: impl Into<String>) -> Self {
        Expression {
            kind,
            base,
            variable: variable.into(),
        }
    }

    /// The canonical "root itself" expression.
    pub fn root() -> Self {
        Expression::new(ExpressionType::Path, Base::Root, "^")
    }

    /// Dotted segments of the variable; empty for `^`.
    pub fn segments(&self) -> Vec<String> {
        split_path(&self.variable).unwrap_or_default()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${{(@{};@base:{}):{}}}",
            self.kind.as_str(),
            self.base.as_str(),
            self.variable
        )
    }
}

impl FromStr for Expression {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s)
    }
}

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$\{\(@([A-Za-z]+)(?:;@base:([A-Za-z]+))?\):([^{}]+)\}$")
            .expect("reference key pattern is valid")
    })
}

fn content_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\(@(?:path|var)(?:;@base:(?:root|this|scope|global))?\):[^{}]+\}")
            .expect("reference content pattern is valid")
    })
}

/// Parses a complete reference token.
///
/// Any deviation from the grammar yields [`GraphError::MalformedToken`];
/// callers degrade such tokens to literal text.
///
/// ```
/// use json_graph::grammar::{parse_key, Base, ExpressionType};
///
/// let expr = parse_key("${(@path;@base:root):a.b}").unwrap();
/// assert_eq!(expr.kind, ExpressionType::Path);
/// assert_eq!(expr.base, Base::Root);
/// assert_eq!(expr.variable, "a.b");
/// assert!(parse_key("${(@path;@base:nowhere):a}").is_err());
/// ```
pub fn parse_key(token: &str) -> Result<Expression, GraphError> {
    let malformed = || GraphError::MalformedToken(token.to_string());
    let caps = key_regex().captures(token.trim()).ok_or_else(malformed)?;
    let kind: ExpressionType = caps[1].parse().map_err(|_| malformed())?;
    let base = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| malformed())?,
        None => kind.default_base(),
    };
    let variable = caps[3].trim();
    if split_path(variable).is_none() {
        return Err(malformed());
    }
    Ok(Expression::new(kind, base, variable))
}

/// Builds canonical token text from path segments.
///
/// Blank segments are skipped; no segments at all produce `^`.
///
/// ```
/// use json_graph::grammar::{build_path_expression, Base, ExpressionType};
///
/// assert_eq!(
///     build_path_expression(ExpressionType::Path, Base::Root, &["a", "b"]),
///     "${(@path;@base:root):a.b}"
/// );
/// assert_eq!(
///     build_path_expression::<&str>(ExpressionType::Path, Base::Root, &[]),
///     "${(@path;@base:root):^}"
/// );
/// ```
pub fn build_path_expression<S: AsRef<str>>(kind: ExpressionType, base: Base, segments: &[S]) -> String {
    Expression::new(kind, base, join_path(segments)).to_string()
}

/// Fast check for at least one well-formed reference token in `text`.
pub fn contains_interpolatable_content(text: &str) -> bool {
    text.contains("${(@") && content_regex().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_bases() {
        for (base_text, base) in [
            ("root", Base::Root),
            ("this", Base::This),
            ("scope", Base::Scope),
            ("global", Base::Global),
        ] {
            let token = format!("${{(@var;@base:{base_text}):name}}");
            let expr = parse_key(&token).unwrap();
            assert_eq!(expr.kind, ExpressionType::Var);
            assert_eq!(expr.base, base);
            assert_eq!(expr.to_string(), token);
        }
    }

    #[test]
    fn default_bases() {
        assert_eq!(parse_key("${(@path):a}").unwrap().base, Base::Root);
        assert_eq!(parse_key("${(@var):a}").unwrap().base, Base::Global);
    }

    #[test]
    fn malformed_tokens() {
        for token in [
            "",
            "plain text",
            "${a.b}",
            "${(@path;@base:root):}",
            "${(@path;@base:root):a..b}",
            "${(@thing;@base:root):a}",
            "${(@path;@base:root):a}trailing",
            "${(@path;@base:root)a}",
        ] {
            assert!(
                matches!(parse_key(token), Err(GraphError::MalformedToken(_))),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn root_token_round_trip() {
        let expr = parse_key(ROOT_TOKEN).unwrap();
        assert_eq!(expr, Expression::root());
        assert!(expr.segments().is_empty());
        assert_eq!(Expression::root().to_string(), ROOT_TOKEN);
    }

    #[test]
    fn segments_of_dotted_variable() {
        let expr = parse_key("${(@path;@base:this):list.0.name}").unwrap();
        assert_eq!(expr.segments(), vec!["list", "0", "name"]);
    }

    #[test]
    fn content_detection() {
        assert!(contains_interpolatable_content("x ${(@path;@base:root):a} y"));
        assert!(contains_interpolatable_content("${(@var):user}"));
        assert!(!contains_interpolatable_content("${user}"));
        assert!(!contains_interpolatable_content("${(@path;@base:elsewhere):a}"));
        assert!(!contains_interpolatable_content("no tokens"));
    }
}
