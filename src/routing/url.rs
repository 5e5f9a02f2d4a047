//! URL generation from named routes.
//!
//! Walks the parsed path (and host) of a route and substitutes variables.
//! An optional section is emitted only when the caller supplied at least
//! one variable inside it; route defaults then fill the rest. Supplied
//! variables the pattern does not use become the query string.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::routing::collection::RouteCollection;
use crate::routing::compiler::CompiledPattern;
use crate::routing::parser::Segment;
use crate::routing::route::{Route, Scheme, Variables};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named `{0}`")]
    UnknownRoute(String),

    #[error("route `{route}` needs a value for `{variable}`")]
    MissingVariable { route: String, variable: String },

    #[error("route `{route}`: `{value}` does not satisfy the constraint on `{variable}`")]
    ConstraintViolation {
        route: String,
        variable: String,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct UrlGenerator {
    routes: Arc<RouteCollection>,
}

impl UrlGenerator {
    pub fn new(routes: Arc<RouteCollection>) -> Self {
        Self { routes }
    }

    /// Build the URL of route `name`. Host-bound routes produce an absolute
    /// URL, all others a path.
    pub fn generate(&self, name: &str, variables: &Variables) -> Result<String, UrlError> {
        let compiled = self
            .routes
            .named(name)
            .ok_or_else(|| UrlError::UnknownRoute(name.to_string()))?;
        let route = compiled.route();
        let mut used = BTreeSet::new();

        let mut path = String::new();
        let writer = Writer {
            name,
            route,
            pattern: compiled.path(),
            supplied: variables,
            encode: true,
        };
        writer.emit(compiled.path().parsed().segments(), &mut path, &mut used)?;

        let mut url = match compiled.host() {
            Some(host_pattern) => {
                let mut host = String::new();
                let writer = Writer {
                    pattern: host_pattern,
                    encode: false,
                    ..writer
                };
                writer.emit(host_pattern.parsed().segments(), &mut host, &mut used)?;
                let scheme = match route.scheme {
                    Scheme::Https => "https",
                    _ => "http",
                };
                format!("{}://{}{}", scheme, host, path)
            }
            None => path,
        };

        let query: Vec<String> = variables
            .iter()
            .filter(|(key, _)| !used.contains(key.as_str()))
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        Ok(url)
    }
}

#[derive(Clone, Copy)]
struct Writer<'a> {
    name: &'a str,
    route: &'a Route,
    pattern: &'a CompiledPattern,
    supplied: &'a Variables,
    encode: bool,
}

impl<'a> Writer<'a> {
    fn emit(&self, segments: &'a [Segment], out: &mut String, used: &mut BTreeSet<&'a str>) -> Result<(), UrlError> {
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable { name, .. } => {
                    let value = self
                        .supplied
                        .get(name)
                        .or_else(|| self.route.defaults.get(name))
                        .ok_or_else(|| UrlError::MissingVariable {
                            route: self.name.to_string(),
                            variable: name.clone(),
                        })?;
                    self.check(name, value)?;
                    if self.encode {
                        out.push_str(&urlencoding::encode(value));
                    } else {
                        out.push_str(value);
                    }
                    used.insert(name.as_str());
                }
                Segment::Optional(inner) => {
                    if self.mentions_supplied(inner) {
                        self.emit(inner, out, used)?;
                    } else {
                        collect_names(inner, used);
                    }
                }
            }
        }
        Ok(())
    }

    fn mentions_supplied(&self, segments: &[Segment]) -> bool {
        segments.iter().any(|segment| match segment {
            Segment::Literal(_) => false,
            Segment::Variable { name, .. } => self.supplied.contains_key(name),
            Segment::Optional(inner) => self.mentions_supplied(inner),
        })
    }

    fn check(&self, variable: &str, value: &str) -> Result<(), UrlError> {
        let constraint = self.pattern.constraint_for(variable).unwrap_or_default();
        let satisfied = Regex::new(&format!("^(?:{})$", constraint))
            .map(|re| re.is_match(value))
            .unwrap_or(false);
        if satisfied {
            Ok(())
        } else {
            Err(UrlError::ConstraintViolation {
                route: self.name.to_string(),
                variable: variable.to_string(),
                value: value.to_string(),
            })
        }
    }
}

fn collect_names<'a>(segments: &'a [Segment], used: &mut BTreeSet<&'a str>) {
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Variable { name, .. } => {
                used.insert(name.as_str());
            }
            Segment::Optional(inner) => collect_names(inner, used),
        }
    }
}
