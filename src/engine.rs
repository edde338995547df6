//! The engine: a registry of scopes and the `transform` entry point.
//!
//! `transform` picks the candidate cases and the visible scopes for a call,
//! tries the cases in order and returns the first result, or a fallback when
//! nothing matched.
//!
//! # Case and scope selection
//!
//! - Explicit `cases` (without the global scope among `scopes`) are looked up
//!   in the global scope and tried first; the rest of the global cases are
//!   not candidates.
//! - Without explicit `cases`, the global scope is added to `scopes`.
//! - Every requested scope contributes all of its cases, in order.
//! - Parser names are resolved against the requested scopes first and the
//!   global scope last.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::case::{Case, CaseDefinition};
use crate::condition::ConditionSpec;
use crate::error::{CaptureMode, ParserrorError, Result};
use crate::formatted::{FormattedOutput, FormattedResult, Params};
use crate::parser::{ParserSource, ValueParser};
use crate::scope::Scope;

/// Name of the scope every engine starts with. It can't be removed.
pub const GLOBAL_SCOPE_NAME: &str = "global";

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserrorConfig {
    /// Fields probed, in order, for the context of object inputs.
    pub context_fields: Vec<String>,
    /// Treat scopes requested by `transform` that don't exist as empty
    /// instead of failing. The scope is not registered by the lookup.
    pub create_missing_scopes: bool,
}

impl Default for ParserrorConfig {
    fn default() -> Self {
        Self {
            context_fields: vec![
                "context".to_string(),
                "response".to_string(),
                "data".to_string(),
            ],
            create_missing_scopes: true,
        }
    }
}

/// Selection for a single `transform` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Names of global cases to try.
    pub cases: Vec<String>,
    /// Scopes whose cases are tried, in order.
    pub scopes: Vec<String>,
    /// Message to use when nothing matches.
    pub fallback: Option<String>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cases<I, S>(mut self, cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cases = cases.into_iter().map(Into::into).collect();
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// An error to transform.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorInput {
    Message(String),
    /// Error-shaped object: a string `message` plus any other fields.
    Object(Map<String, Value>),
}

impl ErrorInput {
    /// Use the `Display` output of a native error as the message.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        ErrorInput::Message(error.to_string())
    }
}

impl From<&str> for ErrorInput {
    fn from(message: &str) -> Self {
        ErrorInput::Message(message.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(message: String) -> Self {
        ErrorInput::Message(message)
    }
}

impl From<&String> for ErrorInput {
    fn from(message: &String) -> Self {
        ErrorInput::Message(message.clone())
    }
}

impl From<Map<String, Value>> for ErrorInput {
    fn from(fields: Map<String, Value>) -> Self {
        ErrorInput::Object(fields)
    }
}

impl TryFrom<Value> for ErrorInput {
    type Error = ParserrorError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(message) => Ok(ErrorInput::Message(message)),
            Value::Object(fields) if fields.get("message").is_some_and(Value::is_string) => {
                Ok(ErrorInput::Object(fields))
            }
            other => Err(invalid_input(&other)),
        }
    }
}

fn invalid_input(value: &Value) -> ParserrorError {
    ParserrorError::InvalidInput(format!(
        "only error messages (strings) or objects with a string 'message' field can be \
         transformed, got {}",
        value
    ))
}

/// Case that keeps the original message, see [`Parserror::allow_original`].
#[derive(Debug, Clone)]
pub struct AllowOriginal {
    /// Generated when missing.
    pub name: Option<String>,
    pub condition: ConditionSpec,
    pub scope: Option<String>,
}

impl AllowOriginal {
    pub fn new(condition: impl Into<ConditionSpec>) -> Self {
        Self {
            name: None,
            condition: condition.into(),
            scope: None,
        }
    }

    pub fn named(name: impl Into<String>, condition: impl Into<ConditionSpec>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(condition)
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

impl From<ConditionSpec> for AllowOriginal {
    fn from(condition: ConditionSpec) -> Self {
        Self::new(condition)
    }
}

impl From<&str> for AllowOriginal {
    fn from(condition: &str) -> Self {
        Self::new(condition)
    }
}

impl From<String> for AllowOriginal {
    fn from(condition: String) -> Self {
        Self::new(condition)
    }
}

impl From<Regex> for AllowOriginal {
    fn from(condition: Regex) -> Self {
        Self::new(condition)
    }
}

/// Error classification engine.
///
/// `R` is the type every case and fallback builds; see [`FormattedOutput`].
pub struct Parserror<R = FormattedResult> {
    config: ParserrorConfig,
    global: Scope,
    scopes: IndexMap<String, Scope>,
    _output: PhantomData<fn() -> R>,
}

impl Parserror<FormattedResult> {
    pub fn new() -> Self {
        Self::with_config(ParserrorConfig::default())
    }
}

impl Default for Parserror<FormattedResult> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Parserror<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parserror")
            .field("config", &self.config)
            .field("global", &self.global)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl<R: FormattedOutput> Parserror<R> {
    pub fn with_config(config: ParserrorConfig) -> Self {
        Self {
            config,
            global: Scope::new(GLOBAL_SCOPE_NAME),
            scopes: IndexMap::new(),
            _output: PhantomData,
        }
    }

    pub fn config(&self) -> &ParserrorConfig {
        &self.config
    }

    pub fn global_scope_name(&self) -> &'static str {
        GLOBAL_SCOPE_NAME
    }

    pub fn global_scope(&self) -> &Scope {
        &self.global
    }

    /// Compile a case and register it.
    ///
    /// The target scope is the definition's own `scope`, then `scope`, then
    /// the global scope. Missing scopes are created.
    pub fn add_case(&mut self, definition: CaseDefinition, scope: Option<&str>) -> Result<&mut Self> {
        let scope_name = definition
            .scope
            .clone()
            .or_else(|| scope.map(str::to_string))
            .unwrap_or_else(|| GLOBAL_SCOPE_NAME.to_string());

        let case = Case::new(definition)?;
        let case_name = case.name().to_string();
        self.scope_or_create(&scope_name).add_case(case)?;

        tracing::debug!(case = %case_name, scope = %scope_name, "registered case");
        Ok(self)
    }

    pub fn add_cases<I>(&mut self, definitions: I, scope: Option<&str>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = CaseDefinition>,
    {
        for definition in definitions {
            self.add_case(definition, scope)?;
        }

        Ok(self)
    }

    /// Register a reusable parser on a scope (global by default).
    pub fn add_parser(
        &mut self,
        name: impl Into<String>,
        source: impl Into<ParserSource>,
        scope: Option<&str>,
    ) -> Result<&mut Self> {
        let parser: Arc<ValueParser> = ValueParser::from_source(name, source.into())?;
        let scope_name = scope.unwrap_or(GLOBAL_SCOPE_NAME);
        tracing::debug!(parser = %parser.name(), scope = %scope_name, "registered parser");
        self.scope_or_create(scope_name).add_parser(parser)?;

        Ok(self)
    }

    /// Register a case that keeps the original message of anything matching
    /// `original`.
    pub fn allow_original(
        &mut self,
        original: impl Into<AllowOriginal>,
        scope: Option<&str>,
    ) -> Result<&mut Self> {
        let AllowOriginal {
            name,
            condition,
            scope: own_scope,
        } = original.into();
        let scope_name = own_scope
            .or_else(|| scope.map(str::to_string))
            .unwrap_or_else(|| GLOBAL_SCOPE_NAME.to_string());
        let name = name.unwrap_or_else(|| self.random_case_name(&scope_name));

        let definition = CaseDefinition::new(name, condition)
            .use_original()
            .scope(scope_name);
        self.add_case(definition, None)
    }

    pub fn allow_originals<I, T>(&mut self, originals: I, scope: Option<&str>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<AllowOriginal>,
    {
        for original in originals {
            self.allow_original(original, scope)?;
        }

        Ok(self)
    }

    /// Create a scope, optionally replacing an existing one, and register
    /// `cases` on it.
    pub fn add_scope<I>(&mut self, name: &str, cases: I, overwrite: bool) -> Result<&mut Self>
    where
        I: IntoIterator<Item = CaseDefinition>,
    {
        self.insert_scope(Scope::new(name), overwrite)?;
        self.add_cases(cases, Some(name))
    }

    /// Register a prebuilt scope.
    pub fn insert_scope(&mut self, scope: Scope, overwrite: bool) -> Result<&mut Self> {
        if self.has_scope(scope.name()) {
            if !overwrite {
                return Err(ParserrorError::ScopeExists(scope.name().to_string()));
            }

            self.remove_scope(scope.name())?;
            tracing::debug!(scope = %scope.name(), "overwriting scope");
        }

        tracing::debug!(scope = %scope.name(), "added scope");
        self.scopes.insert(scope.name().to_string(), scope);
        Ok(self)
    }

    /// Remove a scope. The global scope can't be removed.
    pub fn remove_scope(&mut self, name: &str) -> Result<Option<Scope>> {
        if name == GLOBAL_SCOPE_NAME {
            return Err(ParserrorError::GlobalScopeRemoval);
        }

        let removed = self.scopes.shift_remove(name);
        if removed.is_some() {
            tracing::debug!(scope = %name, "removed scope");
        }

        Ok(removed)
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.find_scope(name).is_some()
    }

    pub fn find_scope(&self, name: &str) -> Option<&Scope> {
        if name == GLOBAL_SCOPE_NAME {
            Some(&self.global)
        } else {
            self.scopes.get(name)
        }
    }

    /// Get a scope, failing when it doesn't exist.
    pub fn get_scope(&self, name: &str) -> Result<&Scope> {
        self.find_scope(name)
            .ok_or_else(|| ParserrorError::ScopeNotFound(name.to_string()))
    }

    pub fn get_scope_mut(&mut self, name: &str) -> Result<&mut Scope> {
        if name == GLOBAL_SCOPE_NAME {
            return Ok(&mut self.global);
        }

        self.scopes
            .get_mut(name)
            .ok_or_else(|| ParserrorError::ScopeNotFound(name.to_string()))
    }

    /// Get a scope, creating it when it doesn't exist.
    pub fn scope_or_create(&mut self, name: &str) -> &mut Scope {
        if name == GLOBAL_SCOPE_NAME {
            return &mut self.global;
        }

        self.scopes.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(scope = %name, "created scope");
            Scope::new(name)
        })
    }

    /// Names of every scope, the global one first.
    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(GLOBAL_SCOPE_NAME).chain(self.scopes.keys().map(String::as_str))
    }

    /// Transform an error.
    ///
    /// Errors raised by a matching case abort the call; later cases are not
    /// tried.
    pub fn transform(&self, input: impl Into<ErrorInput>, options: &TransformOptions) -> Result<R> {
        let (message, context) = self.normalize_input(input.into())?;

        let mut includes_global = options.scopes.iter().any(|name| name == GLOBAL_SCOPE_NAME);
        let mut scope_names: Vec<&str> = options.scopes.iter().map(String::as_str).collect();
        let mut explicit_cases: Vec<&Arc<Case>> = Vec::new();
        if !options.cases.is_empty() {
            if !includes_global {
                explicit_cases = options
                    .cases
                    .iter()
                    .map(|name| self.global.get_case(name))
                    .collect::<Result<_>>()?;
            }
        } else if !includes_global {
            scope_names.push(GLOBAL_SCOPE_NAME);
            includes_global = true;
        }

        let scopes: Vec<&Scope> = scope_names
            .iter()
            .filter_map(|name| self.resolve_scope(name).transpose())
            .collect::<Result<_>>()?;

        let mut visible = scopes.clone();
        if !includes_global {
            visible.push(&self.global);
        }

        tracing::debug!(
            explicit_cases = explicit_cases.len(),
            scopes = ?scope_names,
            "transforming error"
        );

        let candidates = explicit_cases
            .into_iter()
            .chain(scopes.iter().copied().flat_map(Scope::cases));
        for case in candidates {
            tracing::trace!(case = %case.name(), "trying case");
            if let Some(result) = case.parse::<R>(&message, &visible, context.as_ref())? {
                tracing::debug!(case = %case.name(), "case matched");
                return Ok(result);
            }
        }

        let mut fallback_context = Map::new();
        let result = match options.fallback.as_deref().filter(|text| !text.is_empty()) {
            Some(fallback) => {
                tracing::debug!("no case matched, using the fallback message");
                fallback_context.insert("fallback".to_string(), Value::Bool(true));
                R::from_parts(
                    fallback.to_string(),
                    Params::empty(CaptureMode::Named),
                    fallback_context,
                )
            }
            None => {
                tracing::debug!("no case matched, keeping the original message");
                fallback_context.insert("original".to_string(), Value::Bool(true));
                R::from_parts(message, Params::empty(CaptureMode::Named), fallback_context)
            }
        };

        Ok(result)
    }

    /// Bind a case/scope selection and a default fallback.
    pub fn wrap<C, S>(&self, cases: C, scopes: S, fallback: Option<&str>) -> BoundTransform<'_, R>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let mut options = TransformOptions::new().cases(cases).scopes(scopes);
        options.fallback = fallback.map(str::to_string);
        BoundTransform {
            engine: self,
            options,
        }
    }

    pub fn wrap_for_scopes<S>(&self, scopes: S, fallback: Option<&str>) -> BoundTransform<'_, R>
    where
        S: IntoIterator,
        S::Item: Into<String>,
    {
        self.wrap(Vec::<String>::new(), scopes, fallback)
    }

    fn resolve_scope(&self, name: &str) -> Result<Option<&Scope>> {
        match self.find_scope(name) {
            Some(scope) => Ok(Some(scope)),
            None if self.config.create_missing_scopes => {
                tracing::warn!(scope = %name, "scope doesn't exist, treating it as empty");
                Ok(None)
            }
            None => Err(ParserrorError::ScopeNotFound(name.to_string())),
        }
    }

    fn normalize_input(&self, input: ErrorInput) -> Result<(String, Option<Map<String, Value>>)> {
        match input {
            ErrorInput::Message(message) => Ok((message, None)),
            ErrorInput::Object(fields) => {
                let Some(Value::String(message)) = fields.get("message").cloned() else {
                    return Err(invalid_input(&Value::Object(fields)));
                };
                let context = self.search_for_context(&fields);
                Ok((message, context))
            }
        }
    }

    fn search_for_context(&self, fields: &Map<String, Value>) -> Option<Map<String, Value>> {
        // A field that is present but null still ends the search.
        let field = self
            .config
            .context_fields
            .iter()
            .find(|field| fields.contains_key(field.as_str()))?;

        match fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Object(context)) => Some(context.clone()),
            Some(other) => {
                let mut context = Map::new();
                context.insert(field.clone(), other.clone());
                Some(context)
            }
        }
    }

    fn random_case_name(&self, scope: &str) -> String {
        loop {
            let name = Uuid::new_v4().simple().to_string();
            let taken = self
                .find_scope(scope)
                .is_some_and(|scope| scope.has_case(&name));
            if !taken {
                return name;
            }
        }
    }
}

/// A `transform` with a fixed selection, returned by [`Parserror::wrap`].
#[derive(Debug)]
pub struct BoundTransform<'a, R = FormattedResult> {
    engine: &'a Parserror<R>,
    options: TransformOptions,
}

impl<R: FormattedOutput> BoundTransform<'_, R> {
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn call(&self, input: impl Into<ErrorInput>) -> Result<R> {
        self.engine.transform(input, &self.options)
    }

    /// Like `call`, with a fallback that replaces the bound one. An empty
    /// fallback keeps the bound one.
    pub fn call_with_fallback(&self, input: impl Into<ErrorInput>, fallback: &str) -> Result<R> {
        if fallback.is_empty() {
            return self.call(input);
        }

        let options = TransformOptions {
            fallback: Some(fallback.to_string()),
            ..self.options.clone()
        };
        self.engine.transform(input, &options)
    }
}
