//! Route pattern parser.
//!
//! Turns a raw path or host pattern into an ordered list of segments:
//!
//! ```text
//! /users/{id:\d+}[/{tab}]
//!   → Literal("/users/")
//!   → Variable { name: "id", constraint: Some("\d+") }
//!   → Optional([Literal("/"), Variable { name: "tab", constraint: None }])
//! ```
//!
//! # Grammar
//! - `{name}` / `{name:regex}` declare a variable; braces inside the regex
//!   (e.g. `\d{4}`) must balance
//! - `[...]` wraps an optional section; sections may nest or follow one
//!   another, but no literal or variable may follow one
//! - everything else is literal text

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint applied to path variables declared without one.
pub const DEFAULT_CONSTRAINT: &str = "[^/]+";

/// Constraint applied to host variables declared without one: a single label.
pub const DEFAULT_HOST_CONSTRAINT: &str = "[^.]+";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced brace at byte {position} in pattern `{pattern}`")]
    UnbalancedBrace { pattern: String, position: usize },

    #[error("unbalanced optional bracket at byte {position} in pattern `{pattern}`")]
    UnbalancedBracket { pattern: String, position: usize },

    #[error("empty variable name in pattern `{pattern}`")]
    EmptyVariableName { pattern: String },

    #[error("invalid variable name `{name}` in pattern `{pattern}`")]
    InvalidVariableName { pattern: String, name: String },

    #[error("variable `{name}` declared more than once in pattern `{pattern}`")]
    DuplicateVariable { pattern: String, name: String },

    #[error("empty constraint for variable `{name}` in pattern `{pattern}`")]
    EmptyConstraint { pattern: String, name: String },

    #[error("optional section must be trailing in pattern `{pattern}`")]
    OptionalNotTrailing { pattern: String },
}

/// One piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    Variable {
        name: String,
        constraint: Option<String>,
    },
    Optional(Vec<Segment>),
}

/// A pattern split into literal, variable and optional segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRoute {
    raw: String,
    segments: Vec<Segment>,
}

impl ParsedRoute {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Variable names in declaration order, optional ones included.
    pub fn variable_names(&self) -> Vec<&str> {
        fn collect<'a>(segments: &'a [Segment], out: &mut Vec<&'a str>) {
            for segment in segments {
                match segment {
                    Segment::Literal(_) => {}
                    Segment::Variable { name, .. } => out.push(name),
                    Segment::Optional(inner) => collect(inner, out),
                }
            }
        }
        let mut names = Vec::new();
        collect(&self.segments, &mut names);
        names
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variable_names().contains(&name)
    }
}

fn is_identifier(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a raw route pattern.
pub fn parse(raw: &str) -> Result<ParsedRoute, ParseError> {
    let chars: Vec<(usize, char)> = raw.char_indices().collect();
    let mut stack: Vec<Vec<Segment>> = vec![Vec::new()];
    let mut literal = String::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut after_optional = false;
    let mut i = 0;

    fn flush(literal: &mut String, stack: &mut [Vec<Segment>]) {
        if !literal.is_empty() {
            if let Some(top) = stack.last_mut() {
                top.push(Segment::Literal(std::mem::take(literal)));
            }
        }
    }

    while i < chars.len() {
        let (position, c) = chars[i];
        if after_optional && c != ']' && c != '[' {
            return Err(ParseError::OptionalNotTrailing {
                pattern: raw.to_string(),
            });
        }

        match c {
            '{' => {
                flush(&mut literal, &mut stack);
                let mut depth = 1;
                let mut placeholder = String::new();
                let mut j = i + 1;
                while j < chars.len() {
                    let ch = chars[j].1;
                    if ch == '{' {
                        depth += 1;
                    } else if ch == '}' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    placeholder.push(ch);
                    j += 1;
                }
                if depth != 0 {
                    return Err(ParseError::UnbalancedBrace {
                        pattern: raw.to_string(),
                        position,
                    });
                }

                let (name, constraint) = match placeholder.split_once(':') {
                    Some((name, constraint)) => (name.trim(), Some(constraint)),
                    None => (placeholder.trim(), None),
                };
                if name.is_empty() {
                    return Err(ParseError::EmptyVariableName {
                        pattern: raw.to_string(),
                    });
                }
                if !is_identifier(name) {
                    return Err(ParseError::InvalidVariableName {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                if constraint.is_some_and(str::is_empty) {
                    return Err(ParseError::EmptyConstraint {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                if !seen.insert(name.to_string()) {
                    return Err(ParseError::DuplicateVariable {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }

                if let Some(top) = stack.last_mut() {
                    top.push(Segment::Variable {
                        name: name.to_string(),
                        constraint: constraint.map(str::to_string),
                    });
                }
                i = j + 1;
                continue;
            }
            '}' => {
                return Err(ParseError::UnbalancedBrace {
                    pattern: raw.to_string(),
                    position,
                });
            }
            '[' => {
                flush(&mut literal, &mut stack);
                stack.push(Vec::new());
                after_optional = false;
            }
            ']' => {
                flush(&mut literal, &mut stack);
                if stack.len() == 1 {
                    return Err(ParseError::UnbalancedBracket {
                        pattern: raw.to_string(),
                        position,
                    });
                }
                let inner = stack.pop().unwrap_or_default();
                if let Some(top) = stack.last_mut() {
                    top.push(Segment::Optional(inner));
                }
                after_optional = true;
            }
            _ => literal.push(c),
        }
        i += 1;
    }

    flush(&mut literal, &mut stack);
    if stack.len() != 1 {
        return Err(ParseError::UnbalancedBracket {
            pattern: raw.to_string(),
            position: raw.len(),
        });
    }

    Ok(ParsedRoute {
        raw: raw.to_string(),
        segments: stack.pop().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, constraint: Option<&str>) -> Segment {
        Segment::Variable {
            name: name.to_string(),
            constraint: constraint.map(str::to_string),
        }
    }

    #[test]
    fn test_literal_only() {
        let parsed = parse("/about/team").unwrap();
        assert_eq!(parsed.segments(), &[Segment::Literal("/about/team".into())]);
        assert!(parsed.variable_names().is_empty());
    }

    #[test]
    fn test_variables_with_and_without_constraints() {
        let parsed = parse("/users/{id:\\d+}/posts/{slug}").unwrap();
        assert_eq!(
            parsed.segments(),
            &[
                Segment::Literal("/users/".into()),
                var("id", Some("\\d+")),
                Segment::Literal("/posts/".into()),
                var("slug", None),
            ]
        );
        assert_eq!(parsed.variable_names(), vec!["id", "slug"]);
    }

    #[test]
    fn test_constraint_with_quantifier_braces() {
        let parsed = parse("/archive/{year:\\d{4}}").unwrap();
        assert_eq!(parsed.segments()[1], var("year", Some("\\d{4}")));
    }

    #[test]
    fn test_nested_optional_sections() {
        let parsed = parse("/posts[/{page}[/{size}]]").unwrap();
        assert_eq!(
            parsed.segments(),
            &[
                Segment::Literal("/posts".into()),
                Segment::Optional(vec![
                    Segment::Literal("/".into()),
                    var("page", None),
                    Segment::Optional(vec![Segment::Literal("/".into()), var("size", None)]),
                ]),
            ]
        );
        assert_eq!(parsed.variable_names(), vec!["page", "size"]);
    }

    #[test]
    fn test_optional_must_be_trailing() {
        assert!(matches!(
            parse("/a[/{b}]/c"),
            Err(ParseError::OptionalNotTrailing { .. })
        ));
        assert!(matches!(
            parse("/a[/b]{c}"),
            Err(ParseError::OptionalNotTrailing { .. })
        ));
        let siblings = parse("/a[/b][/c]").unwrap();
        assert_eq!(siblings.segments().len(), 3);
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(parse("/users/{id"), Err(ParseError::UnbalancedBrace { position: 7, .. })));
        assert!(matches!(parse("/users/id}"), Err(ParseError::UnbalancedBrace { .. })));
        assert!(matches!(parse("/users[/{id}"), Err(ParseError::UnbalancedBracket { .. })));
        assert!(matches!(parse("/users]"), Err(ParseError::UnbalancedBracket { .. })));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(parse("/{}"), Err(ParseError::EmptyVariableName { .. })));
        assert!(matches!(parse("/{:\\d+}"), Err(ParseError::EmptyVariableName { .. })));
        assert!(matches!(parse("/{user-id}"), Err(ParseError::InvalidVariableName { .. })));
        assert!(matches!(parse("/{id:}"), Err(ParseError::EmptyConstraint { .. })));
    }

    #[test]
    fn test_duplicate_variable() {
        let err = parse("/{id}/{id}").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateVariable {
                pattern: "/{id}/{id}".into(),
                name: "id".into()
            }
        );
    }

    #[test]
    fn test_error_names_pattern() {
        let err = parse("/broken/{").unwrap_err();
        assert!(err.to_string().contains("/broken/{"));
    }
}
