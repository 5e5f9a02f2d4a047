//! Route matching logic.
//!
//! # Responsibilities
//! - Match decoded path against the compiled path regex
//! - Match host (case-insensitive) when the route declares a host pattern
//! - Match scheme and HTTP method
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Each matcher votes on one dimension; the chain short-circuits
//! - Variables are collected in a scratch map and only handed back on a
//!   full match, so a late failure leaks nothing
//! - Path variables win over host variables of the same name
//! - Chain order is path → host → scheme → method so the router can tell
//!   "wrong method" apart from "no such resource"

use std::fmt;

use crate::http::request::RequestView;
use crate::routing::collection::CompiledRoute;
use crate::routing::route::Variables;

/// The dimension a matcher votes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKind {
    Path,
    Host,
    Scheme,
    Method,
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatcherKind::Path => "path",
            MatcherKind::Host => "host",
            MatcherKind::Scheme => "scheme",
            MatcherKind::Method => "method",
        };
        f.write_str(name)
    }
}

/// Trait for matching requests against one route condition.
pub trait RouteMatcher: Send + Sync + fmt::Debug {
    fn kind(&self) -> MatcherKind;

    /// Returns true if `request` satisfies this condition for `route`.
    /// May add entries to `variables`; must leave it untouched on failure.
    fn is_match(&self, route: &CompiledRoute, request: &RequestView<'_>, variables: &mut Variables) -> bool;
}

/// Matches the decoded request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMatcher;

impl RouteMatcher for PathMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Path
    }

    fn is_match(&self, route: &CompiledRoute, request: &RequestView<'_>, variables: &mut Variables) -> bool {
        match route.path().captures(request.path()) {
            Some(captured) => {
                variables.extend(captured);
                true
            }
            None => false,
        }
    }
}

/// Matches the Host header. Routes without a host pattern always pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMatcher;

impl RouteMatcher for HostMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Host
    }

    fn is_match(&self, route: &CompiledRoute, request: &RequestView<'_>, variables: &mut Variables) -> bool {
        let Some(pattern) = route.host() else {
            return true;
        };
        let Some(captured) = request.host().and_then(|host| pattern.captures(host)) else {
            return false;
        };
        for (name, value) in captured {
            variables.entry(name).or_insert(value);
        }
        true
    }
}

/// Matches the request scheme against the route requirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemeMatcher;

impl RouteMatcher for SchemeMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Scheme
    }

    fn is_match(&self, route: &CompiledRoute, request: &RequestView<'_>, _variables: &mut Variables) -> bool {
        route.route().scheme.accepts(request.scheme())
    }
}

/// Matches the HTTP method. An empty method set is a wildcard.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodMatcher;

impl RouteMatcher for MethodMatcher {
    fn kind(&self) -> MatcherKind {
        MatcherKind::Method
    }

    fn is_match(&self, route: &CompiledRoute, request: &RequestView<'_>, _variables: &mut Variables) -> bool {
        route.route().allows_method(request.method())
    }
}

/// Result of running a route through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerdict {
    Matched(Variables),
    /// The first matcher that voted no.
    Rejected(MatcherKind),
}

/// Combines matchers with AND semantics.
#[derive(Debug)]
pub struct MatcherChain {
    matchers: Vec<Box<dyn RouteMatcher>>,
}

impl MatcherChain {
    pub fn new(matchers: Vec<Box<dyn RouteMatcher>>) -> Self {
        Self { matchers }
    }

    /// Path, host, scheme and method, in that order.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PathMatcher),
            Box::new(HostMatcher),
            Box::new(SchemeMatcher),
            Box::new(MethodMatcher),
        ])
    }

    pub fn kinds(&self) -> impl Iterator<Item = MatcherKind> + '_ {
        self.matchers.iter().map(|m| m.kind())
    }

    pub fn evaluate(&self, route: &CompiledRoute, request: &RequestView<'_>) -> ChainVerdict {
        let mut scratch = Variables::new();
        for matcher in &self.matchers {
            if !matcher.is_match(route, request, &mut scratch) {
                return ChainVerdict::Rejected(matcher.kind());
            }
        }
        ChainVerdict::Matched(scratch)
    }
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::standard()
    }
}
