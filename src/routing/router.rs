//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Walk the compiled routes in registration order
//! - Return the first full match, or tell "not found" apart from "method
//!   not allowed"
//! - Hand a match to the dispatcher
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes; first match wins, no specificity scoring
//! - Explicit outcomes rather than errors for 404 and 405
//! - Defaults fill only the variables the match left unbound

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::request::RequestView;
use crate::routing::collection::{CompiledRoute, RouteCollection};
use crate::routing::matcher::{ChainVerdict, MatcherChain, MatcherKind};
use crate::routing::route::Variables;
use crate::routing::url::UrlGenerator;

/// A successful match: the route and the variables bound for this request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: CompiledRoute,
    variables: Variables,
}

impl RouteMatch {
    pub fn route(&self) -> &CompiledRoute {
        &self.route
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn into_parts(self) -> (CompiledRoute, Variables) {
        (self.route, self.variables)
    }
}

/// Methods accepted by the routes whose path, host and scheme matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedMethods(BTreeSet<String>);

impl AllowedMethods {
    pub fn contains(&self, method: &str) -> bool {
        self.0.contains(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for the `Allow` response header, e.g. `GET, POST`.
    pub fn header_value(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl FromIterator<String> for AllowedMethods {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of matching a request against the collection.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Matched(RouteMatch),
    NotFound,
    MethodNotAllowed(AllowedMethods),
}

/// Result of routing and dispatching a request.
#[derive(Debug)]
pub enum Routed {
    Response(Response),
    NotFound,
    MethodNotAllowed(AllowedMethods),
}

/// Compiled routes plus the dispatcher that runs them.
#[derive(Debug)]
pub struct Router {
    routes: Arc<RouteCollection>,
    chain: MatcherChain,
    dispatcher: Dispatcher,
}

impl Router {
    pub fn new(routes: RouteCollection, dispatcher: Dispatcher) -> Self {
        Self {
            routes: Arc::new(routes),
            chain: MatcherChain::standard(),
            dispatcher,
        }
    }

    /// Replace the standard matcher chain.
    pub fn with_matchers(mut self, chain: MatcherChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn url_generator(&self) -> UrlGenerator {
        UrlGenerator::new(self.routes.clone())
    }

    pub fn match_request<B>(&self, request: &Request<B>) -> RouteOutcome {
        self.match_view(&RequestView::from_request(request))
    }

    /// Find the first route whose every matcher accepts `request`.
    pub fn match_view(&self, request: &RequestView<'_>) -> RouteOutcome {
        let mut allowed: Option<BTreeSet<String>> = None;

        for compiled in self.routes.iter() {
            match self.chain.evaluate(compiled, request) {
                ChainVerdict::Matched(mut variables) => {
                    for (name, value) in &compiled.route().defaults {
                        variables.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                    tracing::debug!(
                        route = %compiled.route().label(),
                        method = %request.method(),
                        path = %request.path(),
                        "Route matched"
                    );
                    return RouteOutcome::Matched(RouteMatch {
                        route: compiled.clone(),
                        variables,
                    });
                }
                ChainVerdict::Rejected(MatcherKind::Method) => {
                    allowed
                        .get_or_insert_with(BTreeSet::new)
                        .extend(compiled.route().methods.iter().cloned());
                }
                ChainVerdict::Rejected(_) => {}
            }
        }

        match allowed {
            Some(methods) => {
                tracing::debug!(method = %request.method(), path = %request.path(), "Method not allowed");
                RouteOutcome::MethodNotAllowed(AllowedMethods(methods))
            }
            None => {
                tracing::debug!(method = %request.method(), path = %request.path(), "No route matched");
                RouteOutcome::NotFound
            }
        }
    }

    /// Match and, on success, dispatch `request`.
    pub async fn route(&self, request: Request<Body>) -> Result<Routed, DispatchError> {
        match self.match_request(&request) {
            RouteOutcome::Matched(route_match) => {
                let response = self.dispatcher.dispatch(route_match, request).await?;
                Ok(Routed::Response(response))
            }
            RouteOutcome::NotFound => Ok(Routed::NotFound),
            RouteOutcome::MethodNotAllowed(allowed) => Ok(Routed::MethodNotAllowed(allowed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Container;
    use crate::routing::{Route, RouteCollectionBuilder, Scheme};

    fn router(build: impl FnOnce(&mut RouteCollectionBuilder)) -> Router {
        let mut builder = RouteCollectionBuilder::new();
        build(&mut builder);
        Router::new(builder.build().unwrap(), Dispatcher::new(Arc::new(Container::new())))
    }

    fn view<'a>(method: &'a str, path: &'a str) -> RequestView<'a> {
        RequestView::new(method, path, Some("example.com"), Scheme::Http)
    }

    fn matched_name(outcome: RouteOutcome) -> Option<String> {
        match outcome {
            RouteOutcome::Matched(m) => m.route().route().name.clone(),
            _ => None,
        }
    }

    #[test]
    fn test_first_registered_route_wins() {
        let router = router(|b| {
            b.add(Route::get("/users/{id}", "users", "show").with_name("generic"));
            b.add(Route::get("/users/{id:\\d+}", "users", "show").with_name("numeric"));
        });
        assert_eq!(matched_name(router.match_view(&view("GET", "/users/5"))).as_deref(), Some("generic"));
    }

    #[test]
    fn test_method_not_allowed_collects_union() {
        let router = router(|b| {
            b.add(Route::get("/items", "items", "index"));
            b.add(Route::post("/items", "items", "store"));
            b.add(Route::delete("/other", "items", "destroy"));
        });

        match router.match_view(&view("PUT", "/items")) {
            RouteOutcome::MethodNotAllowed(allowed) => {
                assert_eq!(allowed.header_value(), "GET, POST");
                assert!(!allowed.contains("DELETE"));
            }
            other => panic!("expected 405, got {:?}", other),
        }
        assert!(matches!(router.match_view(&view("GET", "/missing")), RouteOutcome::NotFound));
    }

    #[test]
    fn test_defaults_fill_unbound_variables() {
        let router = router(|b| {
            b.add(
                Route::get("/archive[/{year:\\d{4}}]", "archive", "index")
                    .with_default("year", "2024")
                    .with_default("format", "html"),
            );
        });

        match router.match_view(&view("GET", "/archive")) {
            RouteOutcome::Matched(m) => {
                assert_eq!(m.variables()["year"], "2024");
                assert_eq!(m.variables()["format"], "html");
            }
            other => panic!("expected a match, got {:?}", other),
        }
        match router.match_view(&view("GET", "/archive/1999")) {
            RouteOutcome::Matched(m) => assert_eq!(m.variables()["year"], "1999"),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_matcher_chain() {
        use crate::routing::matcher::PathMatcher;

        let router = router(|b| {
            b.add(Route::get("/items", "items", "index"));
        })
        .with_matchers(MatcherChain::new(vec![Box::new(PathMatcher)]));

        assert_eq!(router.chain.kinds().collect::<Vec<_>>(), vec![MatcherKind::Path]);
        // Without a method matcher, any method reaches the route.
        assert!(matches!(router.match_view(&view("DELETE", "/items")), RouteOutcome::Matched(_)));
        assert_eq!(
            MatcherChain::standard().kinds().collect::<Vec<_>>(),
            vec![MatcherKind::Path, MatcherKind::Host, MatcherKind::Scheme, MatcherKind::Method]
        );
    }

    #[test]
    fn test_dispatcher_exposes_its_resolver() {
        use crate::dispatch::{Actions, Resolver};

        let mut container = Container::new();
        container.bind_controller("items", Actions::new);
        let router = Router::new(
            RouteCollectionBuilder::new().build().unwrap(),
            Dispatcher::new(Arc::new(container)),
        );

        let resolver = router.dispatcher().resolver();
        assert!(resolver.resolve_controller("items").is_ok());
        assert!(resolver.resolve_controller("missing").is_err());
    }

    #[tokio::test]
    async fn test_route_reports_not_found_without_error() {
        let router = router(|b| {
            b.add(Route::get("/", "home", "index"));
        });
        let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
        assert!(matches!(router.route(request).await, Ok(Routed::NotFound)));
    }
}
