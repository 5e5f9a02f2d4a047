//! Route collection and registration.
//!
//! # Responsibilities
//! - Register routes in order, optionally inside nested groups
//! - Merge group settings (prefix, host, scheme, middleware, constraints,
//!   controller namespace) into each contained route
//! - Compile every route once, failing fast with the offending route named
//!
//! # Design Decisions
//! - Registration order is match precedence; nothing is re-sorted
//! - Prefixes and middleware accumulate outer to inner; host and scheme
//!   come from the innermost group that sets them, and only when the route
//!   declares none of its own
//! - Group constraints only apply to variables the route actually declares

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::compiler::{CompiledPattern, PatternCache, PatternKind};
use crate::routing::parser;
use crate::routing::route::{MiddlewareRef, Route, RouteError, Scheme};

/// A route with its compiled path and host patterns.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    route: Arc<Route>,
    path: Arc<CompiledPattern>,
    host: Option<Arc<CompiledPattern>>,
}

impl CompiledRoute {
    /// Validate and compile `route`, memoizing patterns in `cache`.
    pub fn compile(route: Route, cache: &PatternCache) -> Result<Self, RouteError> {
        route.validate()?;

        let pattern_error = |source| RouteError::Pattern {
            route: route.label(),
            source,
        };
        let path = cache
            .get_or_compile(&route.path, PatternKind::Path, &route.constraints)
            .map_err(pattern_error)?;
        let host = match &route.host {
            Some(host) => Some(
                cache
                    .get_or_compile(host, PatternKind::Host, &route.constraints)
                    .map_err(pattern_error)?,
            ),
            None => None,
        };

        for variable in route.constraints.keys() {
            let declared = path.variables().contains(variable)
                || host.as_ref().is_some_and(|h| h.variables().contains(variable));
            if !declared {
                return Err(RouteError::UnknownConstraint {
                    route: route.label(),
                    variable: variable.clone(),
                });
            }
        }

        Ok(Self::from_parts(route, path, host))
    }

    pub(crate) fn from_parts(route: Route, path: Arc<CompiledPattern>, host: Option<Arc<CompiledPattern>>) -> Self {
        Self {
            route: Arc::new(route),
            path,
            host,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn path(&self) -> &CompiledPattern {
        &self.path
    }

    pub fn host(&self) -> Option<&CompiledPattern> {
        self.host.as_deref()
    }
}

/// Ordered, read-only set of compiled routes.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<CompiledRoute>,
    names: HashMap<String, usize>,
}

impl RouteCollection {
    /// Build from routes already compiled, in their registration order.
    pub fn from_compiled(routes: Vec<CompiledRoute>) -> Result<Self, RouteError> {
        let mut names = HashMap::new();
        for (index, compiled) in routes.iter().enumerate() {
            if let Some(name) = &compiled.route().name {
                if names.insert(name.clone(), index).is_some() {
                    return Err(RouteError::DuplicateName(name.clone()));
                }
            }
        }
        Ok(Self { routes, names })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompiledRoute> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn named(&self, name: &str) -> Option<&CompiledRoute> {
        self.names.get(name).map(|&index| &self.routes[index])
    }
}

impl<'a> IntoIterator for &'a RouteCollection {
    type Item = &'a CompiledRoute;
    type IntoIter = std::slice::Iter<'a, CompiledRoute>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// Settings shared by every route registered inside a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptions {
    /// Prepended to each route path.
    pub prefix: String,

    pub host: Option<String>,

    pub scheme: Option<Scheme>,

    /// Prepended to each route's own middleware.
    pub middleware: Vec<MiddlewareRef>,

    pub constraints: BTreeMap<String, String>,

    /// Prepended to controller names as `namespace::controller`.
    pub namespace: Option<String>,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn with_middleware(mut self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn with_constraint(mut self, variable: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.insert(variable.into(), regex.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Mutable registration surface used at bootstrap.
#[derive(Debug, Default)]
pub struct RouteCollectionBuilder {
    routes: Vec<Route>,
    frames: Vec<GroupOptions>,
    patterns: Arc<PatternCache>,
}

impl RouteCollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a pattern cache across builders (e.g. on hot reload).
    pub fn with_pattern_cache(mut self, patterns: Arc<PatternCache>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Register a route, applying every enclosing group.
    pub fn add(&mut self, route: Route) -> &mut Self {
        let route = self.apply_frames(route);
        tracing::trace!(route = %route.label(), path = %route.path, "Route registered");
        self.routes.push(route);
        self
    }

    /// Register routes inside a group whose settings apply to each of them.
    pub fn group<F>(&mut self, options: GroupOptions, build: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.frames.push(options);
        build(self);
        self.frames.pop();
        self
    }

    /// Routes registered so far, with group settings applied.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn build(self) -> Result<RouteCollection, RouteError> {
        let compiled = self
            .routes
            .into_iter()
            .map(|route| CompiledRoute::compile(route, &self.patterns))
            .collect::<Result<Vec<_>, _>>()?;
        let collection = RouteCollection::from_compiled(compiled)?;
        tracing::info!(
            routes = collection.len(),
            patterns = self.patterns.len(),
            "Route collection compiled"
        );
        Ok(collection)
    }

    fn apply_frames(&self, mut route: Route) -> Route {
        if self.frames.is_empty() {
            return route;
        }

        let prefix: String = self
            .frames
            .iter()
            .map(|frame| frame.prefix.trim_end_matches('/'))
            .collect();
        if !prefix.is_empty() {
            route.path = if route.path == "/" {
                prefix
            } else {
                format!("{}{}", prefix, route.path)
            };
        }

        let mut middleware: Vec<MiddlewareRef> = self
            .frames
            .iter()
            .flat_map(|frame| frame.middleware.iter().cloned())
            .collect();
        middleware.append(&mut route.middleware);
        route.middleware = middleware;

        if route.host.is_none() {
            route.host = self.frames.iter().rev().find_map(|frame| frame.host.clone());
        }
        if route.scheme == Scheme::Any {
            if let Some(scheme) = self.frames.iter().rev().find_map(|frame| frame.scheme) {
                route.scheme = scheme;
            }
        }

        let namespace: Vec<&str> = self
            .frames
            .iter()
            .filter_map(|frame| frame.namespace.as_deref())
            .collect();
        if !namespace.is_empty() {
            route.controller.controller = format!("{}::{}", namespace.join("::"), route.controller.controller);
        }

        // Unparseable patterns are reported by `build`; they simply inherit nothing here.
        let mut declared: Vec<String> = Vec::new();
        if let Ok(parsed) = parser::parse(&route.path) {
            declared.extend(parsed.variable_names().into_iter().map(str::to_string));
        }
        if let Some(Ok(parsed)) = route.host.as_deref().map(parser::parse) {
            declared.extend(parsed.variable_names().into_iter().map(str::to_string));
        }
        for frame in self.frames.iter().rev() {
            for (variable, regex) in &frame.constraints {
                if declared.contains(variable) {
                    route
                        .constraints
                        .entry(variable.clone())
                        .or_insert_with(|| regex.clone());
                }
            }
        }

        route
    }
}
