//! Splits strings into literal text and reference tokens.

use std::sync::OnceLock;

use regex::Regex;

use crate::grammar::{parse_key, Expression};

/// One piece of a scanned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Reference(Expression),
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub token: Token,
    pub start: usize,
}

/// A string viewed as an ordered run of literal spans and references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    spans: Vec<Span>,
    malformed: Vec<String>,
}

fn candidate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\(@[^{}]*\}").expect("token candidate pattern is valid"))
}

impl Template {
    /// Scans `text`. Anything that looks like a token but does not parse is
    /// kept as literal text and remembered in [`Template::malformed`].
    ///
    /// ```
    /// use json_graph::lexer::{Template, Token};
    ///
    /// let t = Template::parse("id=${(@var;@base:scope):id}!");
    /// assert_eq!(t.spans().len(), 3);
    /// assert!(matches!(t.spans()[1].token, Token::Reference(_)));
    /// assert_eq!(t.spans()[1].start, 3);
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut template = Template::default();
        let mut literal = String::new();
        let mut literal_start = 0;
        let mut last = 0;

        for m in candidate_regex().find_iter(text) {
            match parse_key(m.as_str()) {
                Ok(expression) => {
                    literal.push_str(&text[last..m.start()]);
                    template.push_literal(&mut literal, literal_start);
                    template.spans.push(Span {
                        token: Token::Reference(expression),
                        start: m.start(),
                    });
                    literal_start = m.end();
                }
                Err(_) => {
                    literal.push_str(&text[last..m.end()]);
                    template.malformed.push(m.as_str().to_string());
                }
            }
            last = m.end();
        }
        literal.push_str(&text[last..]);
        template.push_literal(&mut literal, literal_start);
        template
    }

    fn push_literal(&mut self, literal: &mut String, start: usize) {
        if literal.is_empty() {
            return;
        }
        self.spans.push(Span {
            token: Token::Literal(std::mem::take(literal)),
            start,
        });
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Token-shaped text that failed to parse.
    pub fn malformed(&self) -> &[String] {
        &self.malformed
    }

    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    pub fn references(&self) -> impl Iterator<Item = &Expression> {
        self.spans.iter().filter_map(|span| match &span.token {
            Token::Reference(e) => Some(e),
            Token::Literal(_) => None,
        })
    }

    /// The expression when the whole string is exactly one token.
    pub fn single_reference(&self) -> Option<&Expression> {
        match self.spans.as_slice() {
            [Span {
                token: Token::Reference(e),
                ..
            }] => Some(e),
            _ => None,
        }
    }

    /// Rebuilds the scanned text.
    pub fn source(&self) -> String {
        self.spans
            .iter()
            .map(|span| match &span.token {
                Token::Literal(text) => text.clone(),
                Token::Reference(e) => e.to_string(),
            })
            .collect()
    }
}
