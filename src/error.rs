//! Error taxonomy for case registration, scope resolution and matching.
//!
//! Every failure is raised synchronously to the direct caller. Nothing in the
//! crate catches these errors to retry or to continue with the next case.

use std::path::PathBuf;
use thiserror::Error;

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid case, parser or scope definition, detected at registration.
    Definition,
    /// A referenced scope or case could not be found.
    Resolution,
    /// A registered case failed while processing a matching message.
    Match,
    /// The value handed to `transform` is not an error message.
    Input,
    /// A rule file could not be read or deserialized.
    Config,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Resolution => "resolution",
            Self::Match => "match",
            Self::Input => "input",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which capture style a condition produced, or a case expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Positional,
    Named,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positional => write!(f, "positional"),
            Self::Named => write!(f, "named"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParserrorError {
    #[error("The '{property}' property is required on a case definition")]
    MissingProperty { property: &'static str },

    #[error("'{case}': invalid condition pattern: {source}")]
    InvalidPattern {
        case: String,
        #[source]
        source: regex::Error,
    },

    #[error("'{parser}': the parser is empty. It should include at least one item to map")]
    EmptyLookupTable { parser: String },

    #[error("'{case}': a {template} message template can't be used with {instructions} 'parse' instructions")]
    TemplateModeMismatch {
        case: String,
        template: CaptureMode,
        instructions: CaptureMode,
    },

    #[error("The case name '{case}' is already being used on the scope '{scope}'")]
    DuplicateCase { case: String, scope: String },

    #[error("The parser name '{parser}' is already being used on the scope '{scope}'")]
    DuplicateParser { parser: String, scope: String },

    #[error(
        "The scope '{0}' already exists. You can use 'remove_scope' to remove it first, \
         or set the 'overwrite' parameter to 'true'"
    )]
    ScopeExists(String),

    #[error("You can't delete the global scope")]
    GlobalScopeRemoval,

    #[error("The scope '{0}' doesn't exist")]
    ScopeNotFound(String),

    #[error("The case '{case}' doesn't exist on the scope '{scope}'")]
    CaseNotFound { case: String, scope: String },

    #[error("The parser '{parser}' doesn't exist on the scope '{scope}'")]
    ParserNotFound { parser: String, scope: String },

    #[error(
        "The condition for the case '{case}' returned {captured} parameters, \
         but the 'parse' instructions were set on a {expected} format"
    )]
    CaptureModeMismatch {
        case: String,
        captured: CaptureMode,
        expected: CaptureMode,
    },

    #[error(
        "The condition for the case '{case}' is trying to extract parameters as named \
         and unnamed groups, only one method is allowed"
    )]
    MixedCaptures { case: String },

    #[error("No parser with the name of '{parser}' could be found for the case '{case}'")]
    UnresolvedParser { parser: String, case: String },

    #[error("Invalid error input: {0}")]
    InvalidInput(String),

    #[error("Failed to read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ParserrorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingProperty { .. }
            | Self::InvalidPattern { .. }
            | Self::EmptyLookupTable { .. }
            | Self::TemplateModeMismatch { .. }
            | Self::DuplicateCase { .. }
            | Self::DuplicateParser { .. }
            | Self::ScopeExists(_)
            | Self::GlobalScopeRemoval => ErrorKind::Definition,
            Self::ScopeNotFound(_) | Self::CaseNotFound { .. } | Self::ParserNotFound { .. } => {
                ErrorKind::Resolution
            }
            Self::CaptureModeMismatch { .. }
            | Self::MixedCaptures { .. }
            | Self::UnresolvedParser { .. } => ErrorKind::Match,
            Self::InvalidInput(_) => ErrorKind::Input,
            Self::Io { .. } | Self::Yaml(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParserrorError>;
