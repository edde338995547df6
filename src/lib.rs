//! # Parserror: Rule-Based Error Message Classification
//!
//! Parserror turns raw error messages (from APIs, services or native errors)
//! into friendly, parameterized messages using a registry of cases organized
//! in scopes.
//!
//! ## Features
//!
//! - **Cases**: a condition (literal substring or regular expression), a message
//!   template and per-parameter parse instructions
//! - **Value parsers**: functions or lookup tables applied to extracted parameters
//! - **Scopes**: named, ordered collections of cases and parsers, with an
//!   always-present global scope
//! - **First match wins**: candidates are tried in order and the first match is returned
//! - **Rule files**: case catalogs loaded from YAML
//!
//! ## Example
//!
//! ```ignore
//! use parserror::{CaseDefinition, MessageTemplate, Parserror, TransformOptions};
//! use regex::Regex;
//!
//! let mut engine = Parserror::new();
//! engine.add_case(
//!     CaseDefinition::new("missing-user", Regex::new(r"user (\w+) not found")?)
//!         .message(MessageTemplate::positional(|p| {
//!             format!("No such user: {}", p[0].as_str().unwrap_or_default())
//!         })),
//!     None,
//! )?;
//!
//! let result = engine.transform("user bob not found", &TransformOptions::new())?;
//! assert_eq!(result.message(), "No such user: bob");
//! ```
//!
//! ## Example: rule file
//!
//! ```yaml
//! cases:
//!   - name: timeout
//!     condition: "timed out"
//!     message: "The server took too long to respond"
//! scopes:
//!   billing:
//!     cases:
//!       - name: card-declined
//!         condition: { pattern: 'card (\w+) declined' }
//!         message: "Your card was declined"
//! ```

// Core modules
pub mod error;
pub mod parser;
pub mod condition;
pub mod template;
pub mod formatted;
pub mod case;
pub mod scope;

// Engine facade
pub mod engine;

// YAML rule files
pub mod config;

// Re-export key types
pub use error::{CaptureMode, ErrorKind, ParserrorError, Result};
pub use parser::{LookupTable, ParseFn, ParserKind, ParserSource, ValueParser};
pub use condition::{Condition, ConditionSpec, Extracted};
pub use template::MessageTemplate;
pub use formatted::{FormattedOutput, FormattedResult, Params};
pub use case::{Case, CaseDefinition, ParseDefinition, ParseInstruction};
pub use scope::{CaseKey, ParserKey, Scope};

// Re-export engine types
pub use engine::{
    AllowOriginal, BoundTransform, ErrorInput, Parserror, ParserrorConfig, TransformOptions,
    GLOBAL_SCOPE_NAME,
};

pub use config::{RuleSet, CaseConfig, ScopeConfig};
