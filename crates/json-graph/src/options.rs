//! Options for [`as_json`](crate::as_json) and [`parse_json`](crate::parse_json).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use json_graph_util::{DEFAULT_MAX_REPETITIONS, DEFAULT_RUN_LENGTH};

use crate::error::ErrorHook;

/// Properties never serialized, whatever the include list says.
pub const DEFAULT_EXCLUDED: [&str; 7] = [
    "constructor",
    "prototype",
    "toJson",
    "toObject",
    "global",
    "this",
    "arguments",
];

pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

pub type DateFormatter = Arc<dyn Fn(&DateTime<Utc>) -> String + Send + Sync>;

/// Recursion and wall-clock limits for one top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_depth: usize,
    pub time_budget: Duration,
}

impl Default for Budget {
    fn default() -> Self {
        Budget {
            max_depth: DEFAULT_MAX_DEPTH,
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }
}

/// How the serializer decides that a node was already emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasMode {
    /// Same node handle.
    #[default]
    Identity,
    /// Same handle, or any deep-equal node emitted earlier.
    Structural,
}

/// Options for [`as_json`](crate::as_json).
#[derive(Clone)]
pub struct AsJsonOptions {
    pub include_empty_properties: bool,
    pub omit_functions: bool,
    pub use_own_serializer: bool,
    pub quote_booleans: bool,
    pub quote_numbers: bool,
    pub trim_strings: bool,
    pub format_dates: bool,
    pub date_time_formatter: Option<DateFormatter>,
    /// Raw JSON text written for `undefined`. Empty means "leave it out".
    pub undefined_text: String,
    pub nan_text: String,
    pub infinity_text: String,
    /// When non-empty, only these properties are serialized.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub alias_mode: AliasMode,
    pub cycle_run_length: usize,
    pub cycle_repetitions: usize,
    pub budget: Budget,
    pub on_error: Option<ErrorHook>,
}

impl Default for AsJsonOptions {
    fn default() -> Self {
        AsJsonOptions {
            include_empty_properties: false,
            omit_functions: false,
            use_own_serializer: true,
            quote_booleans: false,
            quote_numbers: false,
            trim_strings: false,
            format_dates: false,
            date_time_formatter: None,
            undefined_text: String::new(),
            nan_text: "NaN".to_string(),
            infinity_text: "Infinity".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            alias_mode: AliasMode::Identity,
            cycle_run_length: DEFAULT_RUN_LENGTH,
            cycle_repetitions: DEFAULT_MAX_REPETITIONS,
            budget: Budget::default(),
            on_error: None,
        }
    }
}

impl AsJsonOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    pub fn with_alias_mode(mut self, mode: AliasMode) -> Self {
        self.alias_mode = mode;
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_date_formatter(mut self, formatter: DateFormatter) -> Self {
        self.format_dates = true;
        self.date_time_formatter = Some(formatter);
        self
    }

    pub fn with_include<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a property survives the include/exclude filters.
    pub fn is_serializable(&self, key: &str) -> bool {
        if DEFAULT_EXCLUDED.contains(&key) || self.exclude.iter().any(|k| k == key) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|k| k == key)
    }
}

impl fmt::Debug for AsJsonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsJsonOptions")
            .field("include_empty_properties", &self.include_empty_properties)
            .field("omit_functions", &self.omit_functions)
            .field("use_own_serializer", &self.use_own_serializer)
            .field("quote_booleans", &self.quote_booleans)
            .field("quote_numbers", &self.quote_numbers)
            .field("trim_strings", &self.trim_strings)
            .field("format_dates", &self.format_dates)
            .field("undefined_text", &self.undefined_text)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("alias_mode", &self.alias_mode)
            .field("budget", &self.budget)
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

/// Options for [`parse_json`](crate::parse_json).
#[derive(Clone)]
pub struct ParseOptions {
    /// Walk the document even when the text shows no reference tokens.
    pub interpolate: bool,
    /// Turn strings such as `"12n"` back into big integers.
    pub revive_bigints: bool,
    /// Cap on re-resolving a string whose resolution still holds tokens.
    pub max_iterations: usize,
    pub cycle_run_length: usize,
    pub cycle_repetitions: usize,
    pub budget: Budget,
    pub on_error: Option<ErrorHook>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            interpolate: false,
            revive_bigints: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cycle_run_length: 2,
            cycle_repetitions: 3,
            budget: Budget::default(),
            on_error: None,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("interpolate", &self.interpolate)
            .field("revive_bigints", &self.revive_bigints)
            .field("max_iterations", &self.max_iterations)
            .field("cycle_run_length", &self.cycle_run_length)
            .field("cycle_repetitions", &self.cycle_repetitions)
            .field("budget", &self.budget)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exclusions_always_apply() {
        let options = AsJsonOptions::new().with_include(["constructor", "a"]);
        assert!(!options.is_serializable("constructor"));
        assert!(options.is_serializable("a"));
        assert!(!options.is_serializable("b"));
    }

    #[test]
    fn exclude_list() {
        let options = AsJsonOptions::new().with_exclude(["secret"]);
        assert!(!options.is_serializable("secret"));
        assert!(options.is_serializable("public"));
    }

    #[test]
    fn defaults() {
        let budget = Budget::default();
        assert_eq!(budget.max_depth, 32);
        assert_eq!(budget.time_budget, Duration::from_millis(5000));
        assert_eq!(ParseOptions::default().max_iterations, 10);
        assert_eq!(AsJsonOptions::default().cycle_run_length, 5);
    }
}
