//! Rule files: case catalogs kept in YAML.
//!
//! ```yaml
//! settings:
//!   context_fields: [context, response]
//! parsers:
//!   status:
//!     "404": { label: "Not Found" }
//! cases:
//!   - name: http-status
//!     condition: { pattern: 'request failed with (\d+)' }
//!     message: "The request failed"
//!     parse: [status]
//! allow_original:
//!   - "legacy code"
//! scopes:
//!   billing:
//!     cases:
//!       - name: card-declined
//!         condition: "card declined"
//!         message: "Your card was declined"
//! ```
//!
//! Only lookup-table parsers can be written in a rule file. Instructions may
//! still name parsers registered in code; they are resolved when the case
//! matches.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::case::{CaseDefinition, ParseDefinition, ParseInstruction};
use crate::condition::ConditionSpec;
use crate::engine::{AllowOriginal, Parserror, ParserrorConfig, GLOBAL_SCOPE_NAME};
use crate::error::{ParserrorError, Result};
use crate::formatted::FormattedOutput;
use crate::parser::{LookupTable, ParserSource};
use crate::template::MessageTemplate;

/// A whole rule file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub settings: ParserrorConfig,
    /// Parsers of the global scope.
    pub parsers: IndexMap<String, LookupTable>,
    /// Cases of the global scope.
    pub cases: Vec<CaseConfig>,
    pub allow_original: Vec<OriginalConfig>,
    pub scopes: IndexMap<String, ScopeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub parsers: IndexMap<String, LookupTable>,
    pub cases: Vec<CaseConfig>,
    pub allow_original: Vec<OriginalConfig>,
}

/// A case entry. `name` and `condition` are required, they are only optional
/// here so a missing one is reported like any other invalid definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub name: Option<String>,
    pub condition: Option<ConditionConfig>,
    pub message: Option<String>,
    pub use_original: bool,
    pub parsers: IndexMap<String, LookupTable>,
    pub parse: Option<ParseConfig>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConditionConfig {
    /// Matched as a literal substring.
    Literal(String),
    Pattern { pattern: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParseConfig {
    Positional(Vec<InstructionConfig>),
    Named(IndexMap<String, InstructionConfig>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InstructionConfig {
    Reference(String),
    Chain(Vec<InstructionConfig>),
}

/// An `allow_original` entry: a bare condition or a named one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OriginalConfig {
    Condition(ConditionConfig),
    Definition {
        name: Option<String>,
        condition: ConditionConfig,
        scope: Option<String>,
    },
}

impl RuleSet {
    /// Parse a rule file from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a rule file from disk.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML rule file
    ///
    /// # Errors
    /// Returns a `Config` error if the file can't be read or isn't a valid
    /// rule file
    ///
    /// # Example
    /// ```ignore
    /// use parserror::{Parserror, RuleSet};
    ///
    /// let rules = RuleSet::load_from_file("config/errors.yaml")?;
    /// let engine = Parserror::from_rules(rules)?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ParserrorError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "loading rules");
        Self::from_yaml(&contents)
    }

    fn register<R: FormattedOutput>(self, engine: &mut Parserror<R>) -> Result<()> {
        register_scope(
            engine,
            GLOBAL_SCOPE_NAME,
            ScopeConfig {
                parsers: self.parsers,
                cases: self.cases,
                allow_original: self.allow_original,
            },
        )?;

        for (name, scope) in self.scopes {
            engine.scope_or_create(&name);
            register_scope(engine, &name, scope)?;
        }

        Ok(())
    }
}

fn register_scope<R: FormattedOutput>(
    engine: &mut Parserror<R>,
    scope: &str,
    config: ScopeConfig,
) -> Result<()> {
    for (name, table) in config.parsers {
        engine.add_parser(name, table, Some(scope))?;
    }

    for case in config.cases {
        engine.add_case(case.into_definition()?, Some(scope))?;
    }

    for original in config.allow_original {
        engine.allow_original(original.into_allow_original()?, Some(scope))?;
    }

    Ok(())
}

impl ConditionConfig {
    fn into_spec(self, case: &str) -> Result<ConditionSpec> {
        match self {
            ConditionConfig::Literal(text) => Ok(ConditionSpec::Literal(text)),
            ConditionConfig::Pattern { pattern } => {
                ConditionSpec::pattern(&pattern).map_err(|source| ParserrorError::InvalidPattern {
                    case: case.to_string(),
                    source,
                })
            }
        }
    }
}

impl From<InstructionConfig> for ParseInstruction {
    fn from(instruction: InstructionConfig) -> Self {
        match instruction {
            InstructionConfig::Reference(name) => ParseInstruction::Reference(name),
            InstructionConfig::Chain(items) => {
                ParseInstruction::Chain(items.into_iter().map(Into::into).collect())
            }
        }
    }
}

impl From<ParseConfig> for ParseDefinition {
    fn from(parse: ParseConfig) -> Self {
        match parse {
            ParseConfig::Positional(items) => {
                ParseDefinition::Positional(items.into_iter().map(Into::into).collect())
            }
            ParseConfig::Named(items) => ParseDefinition::Named(
                items
                    .into_iter()
                    .map(|(group, instruction)| (group, instruction.into()))
                    .collect(),
            ),
        }
    }
}

impl CaseConfig {
    pub fn into_definition(self) -> Result<CaseDefinition> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or(ParserrorError::MissingProperty { property: "name" })?;
        let condition = self
            .condition
            .ok_or(ParserrorError::MissingProperty { property: "condition" })?
            .into_spec(&name)?;

        Ok(CaseDefinition {
            name,
            condition,
            message: self.message.map(MessageTemplate::Static),
            use_original: self.use_original,
            parsers: self
                .parsers
                .into_iter()
                .map(|(name, table)| (name, ParserSource::Table(table)))
                .collect(),
            parse: self.parse.map(Into::into),
            scope: self.scope,
        })
    }
}

impl OriginalConfig {
    fn into_allow_original(self) -> Result<AllowOriginal> {
        match self {
            OriginalConfig::Condition(condition) => {
                Ok(AllowOriginal::new(condition.into_spec("allow_original")?))
            }
            OriginalConfig::Definition {
                name,
                condition,
                scope,
            } => {
                let label = name.as_deref().unwrap_or("allow_original");
                Ok(AllowOriginal {
                    condition: condition.into_spec(label)?,
                    name,
                    scope,
                })
            }
        }
    }
}

impl<R: FormattedOutput> Parserror<R> {
    /// Build an engine from a rule file, using the file's settings.
    pub fn from_rules(rules: RuleSet) -> Result<Self> {
        let mut engine = Self::with_config(rules.settings.clone());
        rules.register(&mut engine)?;
        Ok(engine)
    }

    /// Register the parsers and cases of a rule file. The engine keeps its
    /// own settings.
    pub fn load_rules(&mut self, rules: RuleSet) -> Result<&mut Self> {
        rules.register(self)?;
        Ok(self)
    }
}
