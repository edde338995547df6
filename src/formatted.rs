//! The value returned for every transformed error.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CaptureMode;

/// Parameters extracted (and parsed) from a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Named(IndexMap<String, Value>),
}

impl Params {
    pub fn empty(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Positional => Params::Positional(Vec::new()),
            CaptureMode::Named => Params::Named(IndexMap::new()),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        match self {
            Params::Positional(_) => CaptureMode::Positional,
            Params::Named(_) => CaptureMode::Named,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positional parameter by index.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Params::Positional(values) => values.get(index),
            Params::Named(_) => None,
        }
    }

    /// Named parameter by group name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Positional(_) => None,
            Params::Named(values) => values.get(name),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

/// Builds the caller-facing result out of a message, its parameters and its
/// context.
///
/// Implement it to have cases and the engine return your own type.
pub trait FormattedOutput {
    fn from_parts(message: String, params: Params, context: Map<String, Value>) -> Self;
}

/// Default result type.
///
/// Fields are only reachable through shared references once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResult {
    message: String,
    params: Params,
    context: Map<String, Value>,
}

impl FormattedResult {
    pub fn new(message: impl Into<String>, params: Params, context: Map<String, Value>) -> Self {
        Self {
            message: message.into(),
            params,
            context,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// `true` when the original message was kept, either by a case or
    /// because nothing matched.
    pub fn is_original(&self) -> bool {
        self.context.get("original") == Some(&Value::Bool(true))
    }

    pub fn is_fallback(&self) -> bool {
        self.context.get("fallback") == Some(&Value::Bool(true))
    }
}

impl FormattedOutput for FormattedResult {
    fn from_parts(message: String, params: Params, context: Map<String, Value>) -> Self {
        Self::new(message, params, context)
    }
}

impl fmt::Display for FormattedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FormattedResult {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_formatted_result_defaults() {
        let result = FormattedResult::new("Something", Params::default(), Map::new());

        assert_eq!(result.message(), "Something");
        assert!(result.params().is_empty());
        assert!(result.context().is_empty());
        assert!(!result.is_original());
        assert_eq!(result.to_string(), "Something");
    }

    #[test]
    fn test_flags_from_context() {
        let mut context = Map::new();
        context.insert("fallback".to_string(), json!(true));
        let result = FormattedResult::new("Unexpected error", Params::default(), context);

        assert!(result.is_fallback());
        assert!(!result.is_original());
    }

    #[test]
    fn test_params_accessors() {
        let positional = Params::Positional(vec![json!("bob")]);
        assert_eq!(positional.at(0), Some(&json!("bob")));
        assert_eq!(positional.get("name"), None);
        assert_eq!(positional.mode(), CaptureMode::Positional);

        let mut named = IndexMap::new();
        named.insert("code".to_string(), json!("X1"));
        let named = Params::Named(named);
        assert_eq!(named.get("code"), Some(&json!("X1")));
        assert_eq!(named.at(0), None);
        assert_eq!(Params::empty(CaptureMode::Named).mode(), CaptureMode::Named);
    }

    #[test]
    fn test_serializes_to_plain_json() {
        let result = FormattedResult::new(
            "No such user: bob",
            Params::Positional(vec![json!("bob")]),
            Map::new(),
        );

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "message": "No such user: bob", "params": ["bob"], "context": {} })
        );
    }
}
