//! Route compiler.
//!
//! Turns a [`ParsedRoute`] into a single anchored regular expression with
//! one named capture group per variable.
//!
//! # Design Decisions
//! - Output is a pure function of (segments, kind, constraints), so the same
//!   input always yields a byte-identical regex source
//! - Host patterns compile like path patterns but match case-insensitively,
//!   and an unconstrained host variable spans exactly one label
//! - Compiled patterns are memoized in a [`PatternCache`]; concurrent first
//!   access may compile twice, which only wastes work

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::parser::{self, ParseError, ParsedRoute, Segment, DEFAULT_CONSTRAINT, DEFAULT_HOST_CONSTRAINT};
use crate::routing::route::Variables;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("variable `{variable}` in pattern `{pattern}` is not a valid capture group name: {reason}")]
    InvalidGroupName {
        pattern: String,
        variable: String,
        reason: String,
    },

    #[error("invalid constraint for variable `{variable}` in pattern `{pattern}`: {reason}")]
    InvalidConstraint {
        pattern: String,
        variable: String,
        reason: String,
    },

    #[error("pattern `{pattern}` compiled to an invalid regex: {reason}")]
    Regex { pattern: String, reason: String },
}

/// Failure to turn a raw pattern into a [`CompiledPattern`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// What a pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Path,
    Host,
}

impl PatternKind {
    /// Constraint for variables with neither an inline nor a route-level one.
    pub fn default_constraint(self) -> &'static str {
        match self {
            PatternKind::Path => DEFAULT_CONSTRAINT,
            PatternKind::Host => DEFAULT_HOST_CONSTRAINT,
        }
    }
}

/// A parsed pattern together with its realized regex.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    kind: PatternKind,
    parsed: ParsedRoute,
    constraints: BTreeMap<String, String>,
    source: String,
    regex: Regex,
    variables: Vec<String>,
}

impl CompiledPattern {
    /// Rebuild from a previously emitted regex source, skipping generation.
    pub(crate) fn from_source(
        kind: PatternKind,
        parsed: ParsedRoute,
        constraints: BTreeMap<String, String>,
        source: String,
    ) -> Result<Self, CompileError> {
        let regex = Regex::new(&source).map_err(|e| CompileError::Regex {
            pattern: parsed.raw().to_string(),
            reason: e.to_string(),
        })?;
        let variables = parsed.variable_names().into_iter().map(str::to_string).collect();
        Ok(Self {
            kind,
            parsed,
            constraints,
            source,
            regex,
            variables,
        })
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn parsed(&self) -> &ParsedRoute {
        &self.parsed
    }

    pub fn raw(&self) -> &str {
        self.parsed.raw()
    }

    /// Constraints from the route definition that apply to this pattern.
    pub fn constraints(&self) -> &BTreeMap<String, String> {
        &self.constraints
    }

    /// The regex source, e.g. `^/users/(?P<id>\d+)$`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Effective constraint of `variable`: inline, then route-level, then default.
    pub fn constraint_for(&self, variable: &str) -> Option<String> {
        effective_constraint(self.parsed.segments(), self.kind, variable, &self.constraints)
    }

    /// Runs the regex; on success returns every variable that participated.
    pub fn captures(&self, subject: &str) -> Option<Variables> {
        let caps = self.regex.captures(subject)?;
        let mut variables = Variables::new();
        for name in &self.variables {
            if let Some(value) = caps.name(name) {
                variables.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(variables)
    }
}

fn effective_constraint(
    segments: &[Segment],
    kind: PatternKind,
    variable: &str,
    constraints: &BTreeMap<String, String>,
) -> Option<String> {
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Variable { name, constraint } if name == variable => {
                return Some(
                    constraint
                        .clone()
                        .or_else(|| constraints.get(name).cloned())
                        .unwrap_or_else(|| kind.default_constraint().to_string()),
                );
            }
            Segment::Variable { .. } => {}
            Segment::Optional(inner) => {
                if let Some(found) = effective_constraint(inner, kind, variable, constraints) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Emit the regex source for a parsed pattern. Pure and deterministic.
pub fn to_regex_source(
    parsed: &ParsedRoute,
    kind: PatternKind,
    constraints: &BTreeMap<String, String>,
) -> String {
    fn emit(segments: &[Segment], kind: PatternKind, constraints: &BTreeMap<String, String>, out: &mut String) {
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(&regex::escape(text)),
                Segment::Variable { name, constraint } => {
                    let constraint = constraint
                        .as_deref()
                        .or_else(|| constraints.get(name).map(String::as_str))
                        .unwrap_or(kind.default_constraint());
                    out.push_str("(?P<");
                    out.push_str(name);
                    out.push('>');
                    out.push_str(constraint);
                    out.push(')');
                }
                Segment::Optional(inner) => {
                    out.push_str("(?:");
                    emit(inner, kind, constraints, out);
                    out.push_str(")?");
                }
            }
        }
    }

    let mut source = String::from(match kind {
        PatternKind::Path => "^",
        PatternKind::Host => "(?i)^",
    });
    emit(parsed.segments(), kind, constraints, &mut source);
    source.push('$');
    source
}

/// Compile a parsed pattern, checking every variable before the whole regex.
pub fn compile(
    parsed: &ParsedRoute,
    kind: PatternKind,
    constraints: &BTreeMap<String, String>,
) -> Result<CompiledPattern, CompileError> {
    let names = parsed.variable_names();
    let relevant: BTreeMap<String, String> = constraints
        .iter()
        .filter(|(name, _)| names.contains(&name.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for name in &names {
        if let Err(e) = Regex::new(&format!("(?P<{}>)", name)) {
            return Err(CompileError::InvalidGroupName {
                pattern: parsed.raw().to_string(),
                variable: name.to_string(),
                reason: e.to_string(),
            });
        }

        let constraint = effective_constraint(parsed.segments(), kind, name, &relevant)
            .unwrap_or_else(|| kind.default_constraint().to_string());
        let checked = Regex::new(&format!("^(?:{})$", constraint)).map_err(|e| {
            CompileError::InvalidConstraint {
                pattern: parsed.raw().to_string(),
                variable: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        if let Some(clash) = checked
            .capture_names()
            .flatten()
            .find(|group| names.contains(group))
        {
            return Err(CompileError::InvalidConstraint {
                pattern: parsed.raw().to_string(),
                variable: name.to_string(),
                reason: format!("constraint redeclares capture group `{}`", clash),
            });
        }
    }

    let source = to_regex_source(parsed, kind, &relevant);
    CompiledPattern::from_source(kind, parsed.clone(), relevant, source)
}

type PatternKey = (PatternKind, String, BTreeMap<String, String>);

/// Memoizes compiled patterns per (kind, raw pattern, relevant constraints).
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: DashMap<PatternKey, Arc<CompiledPattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse and compile `raw`, or return the memoized result.
    pub fn get_or_compile(
        &self,
        raw: &str,
        kind: PatternKind,
        constraints: &BTreeMap<String, String>,
    ) -> Result<Arc<CompiledPattern>, PatternError> {
        let parsed = parser::parse(raw)?;
        let names = parsed.variable_names();
        let relevant: BTreeMap<String, String> = constraints
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let key = (kind, raw.to_string(), relevant);

        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.value().clone());
        }

        let compiled = Arc::new(compile(&parsed, kind, &key.2)?);
        self.entries.insert(key, compiled.clone());
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(raw: &str) -> CompiledPattern {
        compile(&parser::parse(raw).unwrap(), PatternKind::Path, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_regex_source_shape() {
        let pattern = compiled("/users/{id:\\d+}");
        assert_eq!(pattern.source(), "^/users/(?P<id>\\d+)$");

        let pattern = compiled("/a.b/{slug}");
        assert_eq!(pattern.source(), "^/a\\.b/(?P<slug>[^/]+)$");
    }

    #[test]
    fn test_optional_sections() {
        let pattern = compiled("/posts[/{page:\\d+}]");
        assert_eq!(pattern.source(), "^/posts(?:/(?P<page>\\d+))?$");
        assert_eq!(pattern.captures("/posts").unwrap(), Variables::new());
        assert_eq!(pattern.captures("/posts/3").unwrap().get("page").map(String::as_str), Some("3"));
        assert!(pattern.captures("/posts/x").is_none());
    }

    #[test]
    fn test_anchored() {
        let pattern = compiled("/users");
        assert!(pattern.captures("/users").is_some());
        assert!(pattern.captures("/users/extra").is_none());
        assert!(pattern.captures("/prefix/users").is_none());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let parsed = parser::parse("/shop/{category}/{id:[0-9a-f]{8}}[/{tab}]").unwrap();
        let constraints = BTreeMap::from([("tab".to_string(), "[a-z]+".to_string())]);
        let first = to_regex_source(&parsed, PatternKind::Path, &constraints);
        let second = to_regex_source(&parsed, PatternKind::Path, &constraints);
        assert_eq!(first, second);
        assert_eq!(
            compile(&parsed, PatternKind::Path, &constraints).unwrap().source(),
            compile(&parsed, PatternKind::Path, &constraints).unwrap().source()
        );
    }

    #[test]
    fn test_route_level_constraint_applies_when_inline_absent() {
        let parsed = parser::parse("/users/{id}/{tab:[a-z]+}").unwrap();
        let constraints = BTreeMap::from([
            ("id".to_string(), "\\d+".to_string()),
            ("tab".to_string(), "\\d+".to_string()),
        ]);
        let pattern = compile(&parsed, PatternKind::Path, &constraints).unwrap();
        assert_eq!(pattern.source(), "^/users/(?P<id>\\d+)/(?P<tab>[a-z]+)$");
        assert_eq!(pattern.constraint_for("tab").as_deref(), Some("[a-z]+"));
    }

    #[test]
    fn test_host_is_case_insensitive() {
        let parsed = parser::parse("{tenant}.example.com").unwrap();
        let pattern = compile(&parsed, PatternKind::Host, &BTreeMap::new()).unwrap();
        let vars = pattern.captures("ACME.Example.COM").unwrap();
        assert_eq!(vars.get("tenant").map(String::as_str), Some("ACME"));
    }

    #[test]
    fn test_host_variable_spans_one_label() {
        let parsed = parser::parse("{tenant}.example.com").unwrap();
        let pattern = compile(&parsed, PatternKind::Host, &BTreeMap::new()).unwrap();
        assert_eq!(pattern.source(), "(?i)^(?P<tenant>[^.]+)\\.example\\.com$");
        assert_eq!(pattern.constraint_for("tenant").as_deref(), Some("[^.]+"));
        assert!(pattern.captures("evil.acme.example.com").is_none());

        // An explicit constraint may still span labels.
        let constraints = BTreeMap::from([("tenant".to_string(), "[a-z.]+".to_string())]);
        let wide = compile(&parsed, PatternKind::Host, &constraints).unwrap();
        let vars = wide.captures("evil.acme.example.com").unwrap();
        assert_eq!(vars.get("tenant").map(String::as_str), Some("evil.acme"));
    }

    #[test]
    fn test_rejected_group_name_is_reported() {
        let parsed = parser::parse("/{1st}").unwrap();
        let err = compile(&parsed, PatternKind::Path, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidGroupName { ref variable, .. } if variable == "1st"));
    }

    #[test]
    fn test_invalid_constraint_is_reported() {
        let parsed = parser::parse("/{id:(\\d+}").unwrap();
        let err = compile(&parsed, PatternKind::Path, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidConstraint { ref variable, .. } if variable == "id"));
    }

    #[test]
    fn test_constraint_cannot_redeclare_group() {
        let parsed = parser::parse("/{a}/{b:(?P<a>x)}").unwrap();
        let err = compile(&parsed, PatternKind::Path, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidConstraint { ref variable, .. } if variable == "b"));
    }

    #[test]
    fn test_pattern_cache_memoizes() {
        let cache = PatternCache::new();
        let a = cache.get_or_compile("/users/{id}", PatternKind::Path, &BTreeMap::new()).unwrap();
        let b = cache.get_or_compile("/users/{id}", PatternKind::Path, &BTreeMap::new()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let constrained = BTreeMap::from([("id".to_string(), "\\d+".to_string())]);
        let c = cache.get_or_compile("/users/{id}", PatternKind::Path, &constrained).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        let unrelated = BTreeMap::from([("other".to_string(), "x".to_string())]);
        let d = cache.get_or_compile("/users/{id}", PatternKind::Path, &unrelated).unwrap();
        assert!(Arc::ptr_eq(&a, &d));
    }
}
