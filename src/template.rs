//! Message templates used to build the final message of a case.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CaptureMode;
use crate::formatted::Params;

pub type PositionalFn = dyn Fn(&[Value]) -> String + Send + Sync;
pub type NamedFn = dyn Fn(&IndexMap<String, Value>) -> String + Send + Sync;

#[derive(Clone)]
pub enum MessageTemplate {
    /// Fixed text; parameters are still extracted but not used.
    Static(String),
    /// Receives the parameters in capture order.
    Positional(Arc<PositionalFn>),
    /// Receives the parameters keyed by group name.
    Named(Arc<NamedFn>),
}

impl MessageTemplate {
    pub fn positional<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        MessageTemplate::Positional(Arc::new(func))
    }

    pub fn named<F>(func: F) -> Self
    where
        F: Fn(&IndexMap<String, Value>) -> String + Send + Sync + 'static,
    {
        MessageTemplate::Named(Arc::new(func))
    }

    /// Capture mode the template requires, if any.
    pub fn mode(&self) -> Option<CaptureMode> {
        match self {
            MessageTemplate::Static(_) => None,
            MessageTemplate::Positional(_) => Some(CaptureMode::Positional),
            MessageTemplate::Named(_) => Some(CaptureMode::Named),
        }
    }

    pub fn render(&self, params: &Params) -> String {
        // Template/parameter mode mismatches are rejected when a case is built,
        // the crossed arms only ever see empty parameters.
        match (self, params) {
            (MessageTemplate::Static(text), _) => text.clone(),
            (MessageTemplate::Positional(func), Params::Positional(values)) => func(values),
            (MessageTemplate::Named(func), Params::Named(values)) => func(values),
            (MessageTemplate::Positional(func), Params::Named(_)) => func(&[]),
            (MessageTemplate::Named(func), Params::Positional(_)) => func(&IndexMap::new()),
        }
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::Static(text.to_string())
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::Static(text)
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTemplate::Static(text) => f.debug_tuple("Static").field(text).finish(),
            MessageTemplate::Positional(_) => write!(f, "Positional(..)"),
            MessageTemplate::Named(_) => write!(f, "Named(..)"),
        }
    }
}
