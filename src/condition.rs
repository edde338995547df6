//! Case conditions and parameter extraction.
//!
//! A condition is either a literal substring or a regular expression. Literal
//! conditions are escaped and compiled, so both end up as a single `Regex`.

use indexmap::IndexMap;
use regex::Regex;

/// Condition as written by the caller.
#[derive(Debug, Clone)]
pub enum ConditionSpec {
    /// Matches when the message contains this exact text.
    Literal(String),
    Pattern(Regex),
}

impl ConditionSpec {
    /// Compile a pattern given as text.
    pub fn pattern(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(ConditionSpec::Pattern(Regex::new(pattern)?))
    }
}

impl From<&str> for ConditionSpec {
    fn from(text: &str) -> Self {
        ConditionSpec::Literal(text.to_string())
    }
}

impl From<String> for ConditionSpec {
    fn from(text: String) -> Self {
        ConditionSpec::Literal(text)
    }
}

impl From<Regex> for ConditionSpec {
    fn from(pattern: Regex) -> Self {
        ConditionSpec::Pattern(pattern)
    }
}

/// Parameters pulled out of a matching message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Unnamed groups in order. Empty when the condition captured nothing.
    Positional(Vec<String>),
    Named(IndexMap<String, String>),
    /// The condition captured through named and unnamed groups at once.
    Mixed,
}

/// Compiled condition.
#[derive(Debug, Clone)]
pub struct Condition {
    pattern: Regex,
}

impl Condition {
    pub fn compile(spec: ConditionSpec) -> std::result::Result<Self, regex::Error> {
        let pattern = match spec {
            ConditionSpec::Literal(text) => Regex::new(&regex::escape(&text))?,
            ConditionSpec::Pattern(pattern) => pattern,
        };

        Ok(Self { pattern })
    }

    pub fn as_regex(&self) -> &Regex {
        &self.pattern
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }

    /// Run the condition once against `message`.
    ///
    /// Returns `None` when the message doesn't match. Groups that didn't take
    /// part in the match are ignored.
    pub fn extract(&self, message: &str) -> Option<Extracted> {
        let captures = self.pattern.captures(message)?;

        let positional: Vec<String> = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();

        let named: IndexMap<String, String> = self
            .pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        let extracted = if named.is_empty() {
            Extracted::Positional(positional)
        } else if named.len() == positional.len() {
            Extracted::Named(named)
        } else {
            Extracted::Mixed
        };

        Some(extracted)
    }
}
