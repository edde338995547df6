//! Value parsers used to transform extracted parameters.
//!
//! A parser is either a function or a lookup table. Both are exposed through
//! the same `parse(value) -> value` contract so they can be chained freely.
//!
//! Lookup tables have "extend" semantics: when a table parser receives the
//! output of a previous table parser (an object carrying a `raw` field), it
//! looks up `raw` again and merges its own entry on top of the previous one.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ParserrorError, Result};

/// Field that lookup-table results use to remember the original key.
pub const RAW_FIELD: &str = "raw";

/// Lookup table: raw key -> fields to attach.
pub type LookupTable = IndexMap<String, Map<String, Value>>;

/// Trait for parser functions
///
/// Any `Fn(Value) -> Value` closure that is `Send + Sync` implements it.
pub trait ParseFn: Send + Sync {
    fn call(&self, value: Value) -> Value;
}

impl<F> ParseFn for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn call(&self, value: Value) -> Value {
        self(value)
    }
}

/// What a caller hands over when registering a parser.
#[derive(Clone)]
pub enum ParserSource {
    Function(Arc<dyn ParseFn>),
    Table(LookupTable),
    /// An already built parser, registered as-is.
    Parser(Arc<ValueParser>),
}

impl ParserSource {
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        ParserSource::Function(Arc::new(func))
    }
}

impl From<LookupTable> for ParserSource {
    fn from(table: LookupTable) -> Self {
        ParserSource::Table(table)
    }
}

impl From<Arc<ValueParser>> for ParserSource {
    fn from(parser: Arc<ValueParser>) -> Self {
        ParserSource::Parser(parser)
    }
}

impl fmt::Debug for ParserSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserSource::Function(_) => write!(f, "Function(..)"),
            ParserSource::Table(table) => f.debug_tuple("Table").field(table).finish(),
            ParserSource::Parser(parser) => f.debug_tuple("Parser").field(&parser.name).finish(),
        }
    }
}

#[derive(Clone)]
pub enum ParserKind {
    Function(Arc<dyn ParseFn>),
    Table(LookupTable),
}

/// A named, immutable value transformation.
#[derive(Clone)]
pub struct ValueParser {
    name: String,
    kind: ParserKind,
}

impl ValueParser {
    /// Wrap a function.
    pub fn function<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: ParserKind::Function(Arc::new(func)),
        }
    }

    /// Wrap a lookup table. The table must have at least one entry.
    pub fn table(name: impl Into<String>, table: LookupTable) -> Result<Self> {
        let name = name.into();
        if table.is_empty() {
            return Err(ParserrorError::EmptyLookupTable { parser: name });
        }

        Ok(Self {
            name,
            kind: ParserKind::Table(table),
        })
    }

    /// Build a shared parser out of whatever the caller registered.
    ///
    /// An existing parser instance is returned untouched (same `Arc`), so its
    /// original name is kept.
    pub fn from_source(name: impl Into<String>, source: ParserSource) -> Result<Arc<Self>> {
        match source {
            ParserSource::Function(func) => Ok(Arc::new(Self {
                name: name.into(),
                kind: ParserKind::Function(func),
            })),
            ParserSource::Table(table) => Ok(Arc::new(Self::table(name, table)?)),
            ParserSource::Parser(parser) => Ok(parser),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParserKind {
        &self.kind
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, ParserKind::Table(_))
    }

    /// Apply the parser to a value.
    pub fn parse(&self, value: Value) -> Value {
        match &self.kind {
            ParserKind::Function(func) => func.call(value),
            ParserKind::Table(table) => parse_with_table(table, value),
        }
    }
}

impl fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ParserKind::Function(_) => "function",
            ParserKind::Table(_) => "table",
        };
        f.debug_struct("ValueParser")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

fn parse_with_table(table: &LookupTable, value: Value) -> Value {
    let (key, extend) = match &value {
        Value::Object(fields) => match fields.get(RAW_FIELD) {
            Some(raw) => (lookup_key(raw), true),
            None => (None, false),
        },
        other => (lookup_key(other), false),
    };

    let Some(entry) = key.and_then(|key| table.get(&key)) else {
        return value;
    };

    if extend {
        match value {
            Value::Object(mut previous) => {
                previous.extend(entry.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(previous)
            }
            other => other,
        }
    } else {
        let mut result = Map::new();
        result.insert(RAW_FIELD.to_string(), value);
        result.extend(entry.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(result)
    }
}

fn lookup_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
