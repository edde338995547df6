//! Cases: a condition, a message template and the parsers applied to the
//! parameters the condition extracts.
//!
//! A `CaseDefinition` is what callers write. It is validated and compiled into
//! a `Case` once, at registration: local parser references are resolved right
//! away and every other string reference is kept as a deferred lookup that is
//! resolved against the visible scopes each time the case matches.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::condition::{Condition, ConditionSpec, Extracted};
use crate::error::{CaptureMode, ParserrorError, Result};
use crate::formatted::{FormattedOutput, Params};
use crate::parser::{ParseFn, ParserSource, ValueParser};
use crate::scope::Scope;
use crate::template::MessageTemplate;

/// Instruction for a single parameter.
#[derive(Clone)]
pub enum ParseInstruction {
    /// Inline function, wrapped in an anonymous parser.
    Function(Arc<dyn ParseFn>),
    Parser(Arc<ValueParser>),
    /// Parser name: the case's own parsers first, then the visible scopes.
    Reference(String),
    /// Several instructions applied one after the other.
    Chain(Vec<ParseInstruction>),
}

impl ParseInstruction {
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        ParseInstruction::Function(Arc::new(func))
    }
}

impl From<&str> for ParseInstruction {
    fn from(name: &str) -> Self {
        ParseInstruction::Reference(name.to_string())
    }
}

impl From<String> for ParseInstruction {
    fn from(name: String) -> Self {
        ParseInstruction::Reference(name)
    }
}

impl From<Arc<ValueParser>> for ParseInstruction {
    fn from(parser: Arc<ValueParser>) -> Self {
        ParseInstruction::Parser(parser)
    }
}

impl<T: Into<ParseInstruction>> From<Vec<T>> for ParseInstruction {
    fn from(items: Vec<T>) -> Self {
        ParseInstruction::Chain(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for ParseInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseInstruction::Function(_) => write!(f, "Function(..)"),
            ParseInstruction::Parser(parser) => f.debug_tuple("Parser").field(&parser.name()).finish(),
            ParseInstruction::Reference(name) => f.debug_tuple("Reference").field(name).finish(),
            ParseInstruction::Chain(items) => f.debug_tuple("Chain").field(items).finish(),
        }
    }
}

/// Per-parameter instructions, by capture index or by group name.
#[derive(Debug, Clone)]
pub enum ParseDefinition {
    Positional(Vec<ParseInstruction>),
    Named(IndexMap<String, ParseInstruction>),
}

impl ParseDefinition {
    pub fn mode(&self) -> CaptureMode {
        match self {
            ParseDefinition::Positional(_) => CaptureMode::Positional,
            ParseDefinition::Named(_) => CaptureMode::Named,
        }
    }
}

/// Case as written by the caller.
#[derive(Debug, Clone)]
pub struct CaseDefinition {
    pub name: String,
    pub condition: ConditionSpec,
    /// Required unless `use_original` is set.
    pub message: Option<MessageTemplate>,
    /// Keep the original message and skip extraction entirely.
    pub use_original: bool,
    /// Parsers only this case can reference.
    pub parsers: IndexMap<String, ParserSource>,
    pub parse: Option<ParseDefinition>,
    /// Target scope; wins over the scope given at registration.
    pub scope: Option<String>,
}

impl CaseDefinition {
    pub fn new(name: impl Into<String>, condition: impl Into<ConditionSpec>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
            message: None,
            use_original: false,
            parsers: IndexMap::new(),
            parse: None,
            scope: None,
        }
    }

    pub fn message(mut self, message: impl Into<MessageTemplate>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn use_original(mut self) -> Self {
        self.use_original = true;
        self
    }

    pub fn parser(mut self, name: impl Into<String>, source: impl Into<ParserSource>) -> Self {
        self.parsers.insert(name.into(), source.into());
        self
    }

    pub fn parse_positional<I, T>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ParseInstruction>,
    {
        self.parse = Some(ParseDefinition::Positional(
            instructions.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn parse_named<I, K, T>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<ParseInstruction>,
    {
        self.parse = Some(ParseDefinition::Named(
            instructions
                .into_iter()
                .map(|(name, instruction)| (name.into(), instruction.into()))
                .collect(),
        ));
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

#[derive(Debug, Clone)]
enum ParseStep {
    Parser(Arc<ValueParser>),
    /// Looked up in the visible scopes on every match.
    Deferred(String),
}

#[derive(Debug, Clone)]
enum ParseSteps {
    Positional(Vec<Vec<ParseStep>>),
    Named(IndexMap<String, Vec<ParseStep>>),
}

impl ParseSteps {
    fn mode(&self) -> CaptureMode {
        match self {
            ParseSteps::Positional(_) => CaptureMode::Positional,
            ParseSteps::Named(_) => CaptureMode::Named,
        }
    }
}

#[derive(Debug, Clone)]
enum Output {
    Original,
    Template(MessageTemplate),
}

/// Compiled, immutable case.
#[derive(Debug, Clone)]
pub struct Case {
    name: String,
    condition: Condition,
    output: Output,
    parsers: IndexMap<String, Arc<ValueParser>>,
    steps: ParseSteps,
}

impl Case {
    /// Validate a definition and compile it.
    pub fn new(definition: CaseDefinition) -> Result<Self> {
        let CaseDefinition {
            name,
            condition,
            message,
            use_original,
            parsers,
            parse,
            scope: _,
        } = definition;

        if name.is_empty() {
            return Err(ParserrorError::MissingProperty { property: "name" });
        }

        let output = if use_original {
            Output::Original
        } else {
            match message {
                Some(template) => Output::Template(template),
                None => return Err(ParserrorError::MissingProperty { property: "message" }),
            }
        };

        let condition = Condition::compile(condition).map_err(|source| {
            ParserrorError::InvalidPattern {
                case: name.clone(),
                source,
            }
        })?;

        let parsers = parsers
            .into_iter()
            .map(|(parser_name, source)| {
                let parser = ValueParser::from_source(parser_name.clone(), source)?;
                Ok((parser_name, parser))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        let template_mode = match &output {
            Output::Template(template) => template.mode(),
            Output::Original => None,
        };
        let parse = parse.unwrap_or_else(|| match template_mode {
            Some(CaptureMode::Named) => ParseDefinition::Named(IndexMap::new()),
            _ => ParseDefinition::Positional(Vec::new()),
        });
        if let Some(template) = template_mode {
            if template != parse.mode() {
                return Err(ParserrorError::TemplateModeMismatch {
                    case: name,
                    template,
                    instructions: parse.mode(),
                });
            }
        }

        let mut case = Self {
            name,
            condition,
            output,
            parsers,
            steps: ParseSteps::Positional(Vec::new()),
        };
        case.steps = case.compile_steps(parse)?;

        tracing::trace!(case = %case.name, mode = %case.steps.mode(), "compiled case");
        Ok(case)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn uses_original(&self) -> bool {
        matches!(self.output, Output::Original)
    }

    /// Capture mode the case's instructions were declared in.
    pub fn mode(&self) -> CaptureMode {
        self.steps.mode()
    }

    /// Parser declared on the case itself.
    pub fn local_parser(&self, name: &str) -> Option<&Arc<ValueParser>> {
        self.parsers.get(name)
    }

    /// Try the case against a message.
    ///
    /// Returns `Ok(None)` when the condition doesn't match. `scopes` is the
    /// ordered list used to resolve parser names the case couldn't resolve by
    /// itself; the first scope that has the parser wins.
    pub fn parse<R: FormattedOutput>(
        &self,
        message: &str,
        scopes: &[&Scope],
        context: Option<&Map<String, Value>>,
    ) -> Result<Option<R>> {
        let template = match &self.output {
            Output::Original => {
                if !self.condition.is_match(message) {
                    return Ok(None);
                }

                let mut context = context.cloned().unwrap_or_default();
                context.insert("original".to_string(), Value::Bool(true));
                tracing::trace!(case = %self.name, "matched, keeping the original message");
                return Ok(Some(R::from_parts(
                    message.to_string(),
                    Params::empty(self.mode()),
                    context,
                )));
            }
            Output::Template(template) => template,
        };

        let Some(extracted) = self.condition.extract(message) else {
            return Ok(None);
        };
        tracing::trace!(case = %self.name, "matched");

        let params = match (extracted, &self.steps) {
            (Extracted::Mixed, _) => {
                return Err(ParserrorError::MixedCaptures {
                    case: self.name.clone(),
                });
            }
            (Extracted::Positional(values), steps) if values.is_empty() => {
                Params::empty(steps.mode())
            }
            (Extracted::Named(_), ParseSteps::Positional(_)) => {
                return Err(self.mode_mismatch(CaptureMode::Named));
            }
            (Extracted::Positional(_), ParseSteps::Named(_)) => {
                return Err(self.mode_mismatch(CaptureMode::Positional));
            }
            (Extracted::Named(groups), ParseSteps::Named(steps)) => Params::Named(
                groups
                    .into_iter()
                    .map(|(group, raw)| {
                        let value = self.apply_steps(steps.get(&group), Value::String(raw), scopes)?;
                        Ok((group, value))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?,
            ),
            (Extracted::Positional(values), ParseSteps::Positional(steps)) => Params::Positional(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(index, raw)| self.apply_steps(steps.get(index), Value::String(raw), scopes))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        let message = template.render(&params);
        Ok(Some(R::from_parts(
            message,
            params,
            context.cloned().unwrap_or_default(),
        )))
    }

    fn mode_mismatch(&self, captured: CaptureMode) -> ParserrorError {
        ParserrorError::CaptureModeMismatch {
            case: self.name.clone(),
            captured,
            expected: self.steps.mode(),
        }
    }

    fn apply_steps(
        &self,
        steps: Option<&Vec<ParseStep>>,
        value: Value,
        scopes: &[&Scope],
    ) -> Result<Value> {
        let Some(steps) = steps else {
            return Ok(value);
        };

        steps.iter().try_fold(value, |value, step| match step {
            ParseStep::Parser(parser) => Ok(parser.parse(value)),
            ParseStep::Deferred(name) => {
                let parser = scopes
                    .iter()
                    .find_map(|scope| scope.find_parser(name))
                    .ok_or_else(|| ParserrorError::UnresolvedParser {
                        parser: name.clone(),
                        case: self.name.clone(),
                    })?;
                tracing::trace!(case = %self.name, parser = %name, "resolved parser from scope");
                Ok(parser.parse(value))
            }
        })
    }

    fn compile_steps(&self, parse: ParseDefinition) -> Result<ParseSteps> {
        match parse {
            ParseDefinition::Positional(instructions) => {
                let steps = instructions
                    .into_iter()
                    .enumerate()
                    .map(|(index, instruction)| {
                        let mut steps = Vec::new();
                        let id = format!("{}-parser-{}", self.name, index);
                        self.resolve_instruction(&id, instruction, &mut steps)?;
                        Ok(steps)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ParseSteps::Positional(steps))
            }
            ParseDefinition::Named(instructions) => {
                let steps = instructions
                    .into_iter()
                    .map(|(group, instruction)| {
                        let mut steps = Vec::new();
                        let id = format!("{}-parser-{}", self.name, group);
                        self.resolve_instruction(&id, instruction, &mut steps)?;
                        Ok((group, steps))
                    })
                    .collect::<Result<IndexMap<_, _>>>()?;
                Ok(ParseSteps::Named(steps))
            }
        }
    }

    fn resolve_instruction(
        &self,
        id: &str,
        instruction: ParseInstruction,
        steps: &mut Vec<ParseStep>,
    ) -> Result<()> {
        match instruction {
            ParseInstruction::Function(func) => {
                let parser = ValueParser::from_source(id, ParserSource::Function(func))?;
                steps.push(ParseStep::Parser(parser));
            }
            ParseInstruction::Parser(parser) => steps.push(ParseStep::Parser(parser)),
            ParseInstruction::Reference(name) => match self.parsers.get(&name) {
                Some(parser) => steps.push(ParseStep::Parser(parser.clone())),
                None => steps.push(ParseStep::Deferred(name)),
            },
            ParseInstruction::Chain(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    self.resolve_instruction(&format!("{}-sub-{}", id, index), item, steps)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatted::FormattedResult;
    use crate::parser::LookupTable;
    use regex::Regex;
    use serde_json::json;

    fn upper(value: Value) -> Value {
        Value::String(value.as_str().unwrap_or_default().to_uppercase())
    }

    fn parse(case: &Case, message: &str, scopes: &[&Scope]) -> Result<Option<FormattedResult>> {
        case.parse::<FormattedResult>(message, scopes, None)
    }

    #[test]
    fn test_missing_message_is_rejected() {
        let result = Case::new(CaseDefinition::new("no-message", "boom"));

        assert!(matches!(
            result,
            Err(ParserrorError::MissingProperty { property: "message" })
        ));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let result = Case::new(CaseDefinition::new("", "boom").message("Boom"));

        assert!(matches!(
            result,
            Err(ParserrorError::MissingProperty { property: "name" })
        ));
    }

    #[test]
    fn test_empty_local_table_is_rejected() {
        let result = Case::new(
            CaseDefinition::new("c", "boom")
                .message("Boom")
                .parser("empty", LookupTable::new()),
        );

        assert!(matches!(result, Err(ParserrorError::EmptyLookupTable { .. })));
    }

    #[test]
    fn test_template_mode_must_match_instructions() {
        let result = Case::new(
            CaseDefinition::new("c", Regex::new(r"(?P<code>\w+)").unwrap())
                .message(MessageTemplate::named(|_| String::new()))
                .parse_positional(["upper"]),
        );

        assert!(matches!(
            result,
            Err(ParserrorError::TemplateModeMismatch { .. })
        ));
    }

    #[test]
    fn test_named_template_selects_named_mode() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"code (?P<code>\w+)").unwrap())
                .message(MessageTemplate::named(|p| format!("Error {}", p["code"]))),
        )
        .unwrap();

        assert_eq!(case.mode(), CaptureMode::Named);
        let result = parse(&case, "code x1", &[]).unwrap().unwrap();
        assert_eq!(result.message(), "Error \"x1\"");
    }

    #[test]
    fn test_not_matching_returns_none() {
        let case = Case::new(CaseDefinition::new("c", "boom").message("Boom")).unwrap();

        assert!(parse(&case, "all good", &[]).unwrap().is_none());
    }

    #[test]
    fn test_zero_captures() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"something weird happened( with \w+)?").unwrap())
                .message(MessageTemplate::positional(|params| format!("nop {}", params.len()))),
        )
        .unwrap();

        let result = parse(&case, "something weird happened", &[]).unwrap().unwrap();
        assert_eq!(result.message(), "nop 0");
        assert_eq!(result.params(), &Params::Positional(vec![]));
        assert!(result.context().is_empty());
    }

    #[test]
    fn test_positional_with_local_and_inline_parsers() {
        let case = Case::new(
            CaseDefinition::new("robins", Regex::new(r"(\w+) had (\d+) robin").unwrap())
                .message(MessageTemplate::positional(|p| {
                    format!("Did you know that {} actually had {} robins?", p[0].as_str().unwrap_or_default(), p[1])
                }))
                .parser("rename", ParserSource::function(|_| json!("The dark knight")))
                .parser(
                    "number",
                    ParserSource::function(|v: Value| {
                        json!(v.as_str().and_then(|s| s.parse::<i64>().ok()).unwrap_or_default())
                    }),
                )
                .parse_positional(vec![
                    ParseInstruction::from("rename"),
                    ParseInstruction::Chain(vec![
                        "number".into(),
                        ParseInstruction::function(|v| json!(v.as_i64().unwrap_or_default() + 1)),
                        ParseInstruction::function(|v| json!(v.as_i64().unwrap_or_default() + 1)),
                    ]),
                ]),
        )
        .unwrap();

        let result = parse(&case, "Batman had 1 robin", &[]).unwrap().unwrap();
        assert_eq!(
            result.message(),
            "Did you know that The dark knight actually had 3 robins?"
        );
        assert_eq!(result.params(), &Params::Positional(vec![json!("The dark knight"), json!(3)]));
    }

    #[test]
    fn test_inline_parsers_get_generated_names() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"(\w+)").unwrap())
                .message("x")
                .parse_positional(vec![ParseInstruction::Chain(vec![ParseInstruction::function(upper)])]),
        )
        .unwrap();

        match &case.steps {
            ParseSteps::Positional(steps) => match &steps[0][0] {
                ParseStep::Parser(parser) => assert_eq!(parser.name(), "c-parser-0-sub-0"),
                other => panic!("unexpected step: {:?}", other),
            },
            other => panic!("unexpected steps: {:?}", other),
        }
    }

    #[test]
    fn test_deferred_parser_from_scope() {
        let mut scope = Scope::new("custom");
        scope
            .add_parser(Arc::new(ValueParser::function("upper", upper)))
            .unwrap();
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"user (\w+) not found").unwrap())
                .message(MessageTemplate::positional(|p| format!("No such user: {}", p[0].as_str().unwrap_or_default())))
                .parse_positional(["upper"]),
        )
        .unwrap();

        let result = parse(&case, "user bob not found", &[&scope]).unwrap().unwrap();
        assert_eq!(result.message(), "No such user: BOB");
    }

    #[test]
    fn test_deferred_parser_missing() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"user (\w+)").unwrap())
                .message("x")
                .parse_positional(["nowhere"]),
        )
        .unwrap();

        match parse(&case, "user bob", &[&Scope::new("empty")]) {
            Err(ParserrorError::UnresolvedParser { parser, case }) => {
                assert_eq!(parser, "nowhere");
                assert_eq!(case, "c");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_named_groups_with_positional_instructions() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"code (?P<code>\w+)").unwrap()).message("x"),
        )
        .unwrap();

        assert!(matches!(
            parse(&case, "code x1", &[]),
            Err(ParserrorError::CaptureModeMismatch {
                captured: CaptureMode::Named,
                expected: CaptureMode::Positional,
                ..
            })
        ));
    }

    #[test]
    fn test_unnamed_groups_with_named_instructions() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"code (\w+)").unwrap())
                .message("x")
                .parse_named([("code", "upper")]),
        )
        .unwrap();

        assert!(matches!(
            parse(&case, "code x1", &[]),
            Err(ParserrorError::CaptureModeMismatch {
                captured: CaptureMode::Positional,
                expected: CaptureMode::Named,
                ..
            })
        ));
    }

    #[test]
    fn test_mixed_groups_fail() {
        let case = Case::new(
            CaseDefinition::new("mixed", Regex::new(r"(?P<code>\w+) at (\d+)").unwrap())
                .message("x")
                .parse_named(Vec::<(String, String)>::new()),
        )
        .unwrap();

        assert!(matches!(
            parse(&case, "x1 at 12", &[]),
            Err(ParserrorError::MixedCaptures { .. })
        ));
    }

    #[test]
    fn test_named_groups_with_parsers() {
        let case = Case::new(
            CaseDefinition::new("c", Regex::new(r"code (?P<code>\w+) line (?P<line>\d+)").unwrap())
                .message(MessageTemplate::named(|p| {
                    format!("Error {} on {}", p["code"].as_str().unwrap_or_default(), p["line"].as_str().unwrap_or_default())
                }))
                .parse_named([("code", vec![ParseInstruction::function(upper)])]),
        )
        .unwrap();

        let result = parse(&case, "code x1 line 7", &[]).unwrap().unwrap();
        assert_eq!(result.message(), "Error X1 on 7");
        assert_eq!(result.params().get("code"), Some(&json!("X1")));
        assert_eq!(result.params().get("line"), Some(&json!("7")));
    }

    #[test]
    fn test_use_original_keeps_message_and_context() {
        let case = Case::new(CaseDefinition::new("legacy", "legacy code").use_original()).unwrap();
        let mut context = Map::new();
        context.insert("status".to_string(), json!(500));

        let result = case
            .parse::<FormattedResult>("legacy code 7", &[], Some(&context))
            .unwrap()
            .unwrap();

        assert!(case.uses_original());
        assert_eq!(result.message(), "legacy code 7");
        assert!(result.params().is_empty());
        assert_eq!(result.context().get("status"), Some(&json!(500)));
        assert_eq!(result.context().get("original"), Some(&json!(true)));
    }

    #[test]
    fn test_context_is_passed_through() {
        let case = Case::new(CaseDefinition::new("c", "boom").message("Boom")).unwrap();
        let mut context = Map::new();
        context.insert("request".to_string(), json!("r-1"));

        let result = case
            .parse::<FormattedResult>("boom", &[], Some(&context))
            .unwrap()
            .unwrap();

        assert_eq!(result.context(), &context);
    }

    struct Custom(String);

    impl FormattedOutput for Custom {
        fn from_parts(message: String, _params: Params, _context: Map<String, Value>) -> Self {
            Custom(format!("custom: {}", message))
        }
    }

    #[test]
    fn test_custom_output_type() {
        let case = Case::new(CaseDefinition::new("c", "boom").message("Boom")).unwrap();

        let result = case.parse::<Custom>("boom", &[], None).unwrap().unwrap();
        assert_eq!(result.0, "custom: Boom");
    }
}
