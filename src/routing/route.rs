//! Route definition model.
//!
//! # Responsibilities
//! - Describe one URL-handling rule (path, host, methods, scheme, target)
//! - Carry middleware references, variable defaults and constraints
//! - Validate definition-time invariants before compilation
//!
//! # Design Decisions
//! - Controllers and middleware are referenced by name, never by live value,
//!   so a compiled collection can be persisted and re-resolved later
//! - Methods are stored canonical uppercase; empty set means any method

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::compiler::PatternError;

/// Variables bound by a successful match, keyed by placeholder name.
pub type Variables = BTreeMap<String, String>;

/// Scheme requirement of a route, or the scheme of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Any,
    Http,
    Https,
}

impl Scheme {
    /// Returns true if a request arriving over `actual` satisfies this requirement.
    pub fn accepts(self, actual: Scheme) -> bool {
        self == Scheme::Any || self == actual
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Any => "any",
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "*" => Ok(Scheme::Any),
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(format!("unknown scheme `{}`", other)),
        }
    }
}

/// Name of the controller and the action invoked on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRef {
    pub controller: String,
    pub action: String,
}

impl ControllerRef {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.controller, self.action)
    }
}

/// Accepts the `controller@action` shorthand.
impl FromStr for ControllerRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((controller, action)) if !controller.is_empty() && !action.is_empty() => {
                Ok(Self::new(controller, action))
            }
            _ => Err(format!("expected `controller@action`, got `{}`", s)),
        }
    }
}

/// A middleware reference, optionally configured with route-level parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareRef {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl MiddlewareRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Errors raised while defining or compiling routes. Always fatal at startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {route}: path `{path}` must start with '/'")]
    InvalidPath { route: String, path: String },

    #[error("route {route}: {source}")]
    Pattern {
        route: String,
        #[source]
        source: PatternError,
    },

    #[error("route {route}: constraint given for unknown variable `{variable}`")]
    UnknownConstraint { route: String, variable: String },

    #[error("route {route}: invalid HTTP method `{method}`")]
    InvalidMethod { route: String, method: String },

    #[error("duplicate route name `{0}`")]
    DuplicateName(String),
}

/// A single URL-handling rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Optional unique name, used for URL generation.
    pub name: Option<String>,

    /// Raw path pattern, e.g. `/users/{id:\d+}`.
    pub path: String,

    /// Raw host pattern, e.g. `{tenant}.example.com`.
    pub host: Option<String>,

    /// Allowed methods (uppercase). Empty matches any method.
    pub methods: BTreeSet<String>,

    pub scheme: Scheme,

    pub controller: ControllerRef,

    /// Middleware in execution order, outer-most first.
    pub middleware: Vec<MiddlewareRef>,

    /// Values for variables left unbound by an optional section.
    pub defaults: BTreeMap<String, String>,

    /// Regex constraints for variables declared without an inline one.
    pub constraints: BTreeMap<String, String>,
}

impl Route {
    pub fn new<I, S>(methods: I, path: impl Into<String>, controller: ControllerRef) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: None,
            path: path.into(),
            host: None,
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().to_ascii_uppercase())
                .collect(),
            scheme: Scheme::Any,
            controller,
            middleware: Vec::new(),
            defaults: BTreeMap::new(),
            constraints: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(["GET"], path, ControllerRef::new(controller, action))
    }

    pub fn post(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(["POST"], path, ControllerRef::new(controller, action))
    }

    pub fn put(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(["PUT"], path, ControllerRef::new(controller, action))
    }

    pub fn patch(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(["PATCH"], path, ControllerRef::new(controller, action))
    }

    pub fn delete(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(["DELETE"], path, ControllerRef::new(controller, action))
    }

    /// A route that accepts every method.
    pub fn any(path: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(Vec::<String>::new(), path, ControllerRef::new(controller, action))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_middleware(mut self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn with_default(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(variable.into(), value.into());
        self
    }

    pub fn with_constraint(mut self, variable: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.insert(variable.into(), regex.into());
        self
    }

    /// Returns true if the method set is empty or contains `method`.
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(&method.to_ascii_uppercase())
    }

    /// Human-readable identifier for error messages and logs.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("`{}`", name),
            None if self.methods.is_empty() => format!("`ANY {}`", self.path),
            None => {
                let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
                format!("`{} {}`", methods.join("|"), self.path)
            }
        }
    }

    /// Checks the invariants that do not require parsing the patterns.
    pub fn validate(&self) -> Result<(), RouteError> {
        if !self.path.starts_with('/') {
            return Err(RouteError::InvalidPath {
                route: self.label(),
                path: self.path.clone(),
            });
        }
        for method in &self.methods {
            if axum::http::Method::from_bytes(method.as_bytes()).is_err() {
                return Err(RouteError::InvalidMethod {
                    route: self.label(),
                    method: method.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_methods_are_canonical_uppercase() {
        let route = Route::new(["get", "Post"], "/", ControllerRef::new("c", "a"));
        assert!(route.methods.contains("GET"));
        assert!(route.methods.contains("POST"));
        assert!(route.allows_method("post"));
        assert!(!route.allows_method("DELETE"));
    }

    #[test]
    fn test_empty_method_set_allows_anything() {
        let route = Route::any("/", "c", "a");
        assert!(route.allows_method("PURGE"));
    }

    #[test]
    fn test_path_must_start_with_slash() {
        let err = Route::get("users", "c", "a").validate().unwrap_err();
        assert!(matches!(err, RouteError::InvalidPath { .. }));
    }

    #[test]
    fn test_controller_shorthand() {
        let target: ControllerRef = "users@show".parse().unwrap();
        assert_eq!(target, ControllerRef::new("users", "show"));
        assert!("users".parse::<ControllerRef>().is_err());
        assert!("@show".parse::<ControllerRef>().is_err());
    }

    #[test]
    fn test_scheme_acceptance() {
        assert!(Scheme::Any.accepts(Scheme::Http));
        assert!(Scheme::Https.accepts(Scheme::Https));
        assert!(!Scheme::Https.accepts(Scheme::Http));
        assert_eq!("HTTPS".parse::<Scheme>().unwrap(), Scheme::Https);
    }
}
