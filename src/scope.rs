//! Scopes: named containers of cases and reusable parsers.
//!
//! Cases keep their insertion order, which is the order the engine tries them
//! in. Compiled cases are shared as `Arc<Case>`, so the same case may be placed
//! in several scopes; removing it from one scope leaves the others untouched.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::case::Case;
use crate::error::{ParserrorError, Result};
use crate::parser::ValueParser;

/// Identifies a case to remove, by name or by reference.
#[derive(Debug, Clone, Copy)]
pub enum CaseKey<'a> {
    Name(&'a str),
    Case(&'a Case),
}

impl<'a> CaseKey<'a> {
    fn name(&self) -> &'a str {
        match *self {
            CaseKey::Name(name) => name,
            CaseKey::Case(case) => case.name(),
        }
    }
}

impl<'a> From<&'a str> for CaseKey<'a> {
    fn from(name: &'a str) -> Self {
        CaseKey::Name(name)
    }
}

impl<'a> From<&'a String> for CaseKey<'a> {
    fn from(name: &'a String) -> Self {
        CaseKey::Name(name)
    }
}

impl<'a> From<&'a Case> for CaseKey<'a> {
    fn from(case: &'a Case) -> Self {
        CaseKey::Case(case)
    }
}

impl<'a> From<&'a Arc<Case>> for CaseKey<'a> {
    fn from(case: &'a Arc<Case>) -> Self {
        CaseKey::Case(case)
    }
}

/// Identifies a parser to remove, by name or by reference.
#[derive(Debug, Clone, Copy)]
pub enum ParserKey<'a> {
    Name(&'a str),
    Parser(&'a ValueParser),
}

impl<'a> ParserKey<'a> {
    fn name(&self) -> &'a str {
        match *self {
            ParserKey::Name(name) => name,
            ParserKey::Parser(parser) => parser.name(),
        }
    }
}

impl<'a> From<&'a str> for ParserKey<'a> {
    fn from(name: &'a str) -> Self {
        ParserKey::Name(name)
    }
}

impl<'a> From<&'a String> for ParserKey<'a> {
    fn from(name: &'a String) -> Self {
        ParserKey::Name(name)
    }
}

impl<'a> From<&'a ValueParser> for ParserKey<'a> {
    fn from(parser: &'a ValueParser) -> Self {
        ParserKey::Parser(parser)
    }
}

impl<'a> From<&'a Arc<ValueParser>> for ParserKey<'a> {
    fn from(parser: &'a Arc<ValueParser>) -> Self {
        ParserKey::Parser(parser)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    cases: IndexMap<String, Arc<Case>>,
    parsers: IndexMap<String, Arc<ValueParser>>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: IndexMap::new(),
            parsers: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a case. Names must be unique within the scope.
    pub fn add_case(&mut self, case: impl Into<Arc<Case>>) -> Result<&mut Self> {
        let case = case.into();
        if self.has_case(case.name()) {
            return Err(ParserrorError::DuplicateCase {
                case: case.name().to_string(),
                scope: self.name.clone(),
            });
        }

        self.cases.insert(case.name().to_string(), case);
        Ok(self)
    }

    pub fn add_parser(&mut self, parser: impl Into<Arc<ValueParser>>) -> Result<&mut Self> {
        let parser = parser.into();
        if self.has_parser(parser.name()) {
            return Err(ParserrorError::DuplicateParser {
                parser: parser.name().to_string(),
                scope: self.name.clone(),
            });
        }

        self.parsers.insert(parser.name().to_string(), parser);
        Ok(self)
    }

    /// Get a case, failing when it isn't registered.
    pub fn get_case(&self, name: &str) -> Result<&Arc<Case>> {
        self.find_case(name).ok_or_else(|| ParserrorError::CaseNotFound {
            case: name.to_string(),
            scope: self.name.clone(),
        })
    }

    pub fn find_case(&self, name: &str) -> Option<&Arc<Case>> {
        self.cases.get(name)
    }

    /// All cases, in insertion order.
    pub fn cases(&self) -> impl Iterator<Item = &Arc<Case>> {
        self.cases.values()
    }

    pub fn case_names(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Get a parser, failing when it isn't registered.
    pub fn get_parser(&self, name: &str) -> Result<&Arc<ValueParser>> {
        self.find_parser(name).ok_or_else(|| ParserrorError::ParserNotFound {
            parser: name.to_string(),
            scope: self.name.clone(),
        })
    }

    pub fn find_parser(&self, name: &str) -> Option<&Arc<ValueParser>> {
        self.parsers.get(name)
    }

    pub fn parsers(&self) -> impl Iterator<Item = &Arc<ValueParser>> {
        self.parsers.values()
    }

    pub fn has_case(&self, name: &str) -> bool {
        self.find_case(name).is_some()
    }

    pub fn has_parser(&self, name: &str) -> bool {
        self.find_parser(name).is_some()
    }

    /// Remove a case, keeping the order of the remaining ones.
    pub fn remove_case<'a>(&mut self, key: impl Into<CaseKey<'a>>) -> Result<Arc<Case>> {
        let name = key.into().name();
        self.cases
            .shift_remove(name)
            .ok_or_else(|| ParserrorError::CaseNotFound {
                case: name.to_string(),
                scope: self.name.clone(),
            })
    }

    pub fn remove_parser<'a>(&mut self, key: impl Into<ParserKey<'a>>) -> Result<Arc<ValueParser>> {
        let name = key.into().name();
        self.parsers
            .shift_remove(name)
            .ok_or_else(|| ParserrorError::ParserNotFound {
                parser: name.to_string(),
                scope: self.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseDefinition;
    use serde_json::Value;

    fn case(name: &str) -> Case {
        Case::new(CaseDefinition::new(name, "boom").message("Boom")).unwrap()
    }

    fn parser(name: &str) -> ValueParser {
        ValueParser::function(name, |value: Value| value)
    }

    #[test]
    fn test_new_scope_is_empty() {
        let scope = Scope::new("custom");

        assert_eq!(scope.name(), "custom");
        assert_eq!(scope.case_count(), 0);
        assert_eq!(scope.parsers().count(), 0);
    }

    #[test]
    fn test_duplicated_case_name() {
        let mut scope = Scope::new("custom");
        scope.add_case(case("Rosario")).unwrap();

        match scope.add_case(case("Rosario")) {
            Err(ParserrorError::DuplicateCase { case, scope }) => {
                assert_eq!(case, "Rosario");
                assert_eq!(scope, "custom");
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.name().to_string())),
        }
    }

    #[test]
    fn test_cases_keep_insertion_order() {
        let mut scope = Scope::new("custom");
        scope
            .add_case(case("c"))
            .unwrap()
            .add_case(case("a"))
            .unwrap()
            .add_case(case("b"))
            .unwrap();
        scope.remove_case("a").unwrap();
        scope.add_case(case("a")).unwrap();

        let names: Vec<&str> = scope.case_names().collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_get_case() {
        let mut scope = Scope::new("custom");
        scope.add_case(case("Rosario")).unwrap();

        assert_eq!(scope.get_case("Rosario").unwrap().name(), "Rosario");
        assert!(scope.find_case("Pilar").is_none());
        assert!(!scope.has_case("Pilar"));
        assert!(matches!(
            scope.get_case("Pilar"),
            Err(ParserrorError::CaseNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_case_by_reference() {
        let mut scope = Scope::new("custom");
        let shared = Arc::new(case("Rosario"));
        scope.add_case(shared.clone()).unwrap();

        let removed = scope.remove_case(&shared).unwrap();
        assert!(Arc::ptr_eq(&removed, &shared));
        assert!(!scope.has_case("Rosario"));
    }

    #[test]
    fn test_remove_missing_case() {
        let mut scope = Scope::new("custom");

        assert!(matches!(
            scope.remove_case("Rosario"),
            Err(ParserrorError::CaseNotFound { .. })
        ));
    }

    #[test]
    fn test_shared_case_removed_from_one_scope_only() {
        let shared = Arc::new(case("Rosario"));
        let mut first = Scope::new("first");
        let mut second = Scope::new("second");
        first.add_case(shared.clone()).unwrap();
        second.add_case(shared.clone()).unwrap();

        first.remove_case("Rosario").unwrap();

        assert!(!first.has_case("Rosario"));
        assert!(second.has_case("Rosario"));
    }

    #[test]
    fn test_parsers() {
        let mut scope = Scope::new("custom");
        scope.add_parser(parser("upper")).unwrap();

        assert!(scope.has_parser("upper"));
        assert_eq!(scope.get_parser("upper").unwrap().name(), "upper");
        assert!(matches!(
            scope.add_parser(parser("upper")),
            Err(ParserrorError::DuplicateParser { .. })
        ));
        assert!(matches!(
            scope.get_parser("lower"),
            Err(ParserrorError::ParserNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_parser_by_name_and_reference() {
        let mut scope = Scope::new("custom");
        let upper = Arc::new(parser("upper"));
        scope.add_parser(upper.clone()).unwrap();
        scope.add_parser(parser("lower")).unwrap();

        scope.remove_parser(&upper).unwrap();
        scope.remove_parser("lower").unwrap();

        assert!(!scope.has_parser("upper"));
        assert!(!scope.has_parser("lower"));
        assert!(matches!(
            scope.remove_parser("lower"),
            Err(ParserrorError::ParserNotFound { .. })
        ));
    }
}
