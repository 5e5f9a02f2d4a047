//! Route dispatch.
//!
//! # Responsibilities
//! - Resolve the controller and middleware a matched route names
//! - Expose the match to downstream code through [`RouteParams`]
//! - Run the middleware pipeline around the controller action
//!
//! # Data Flow
//! ```text
//! RouteMatch + Request
//!     → resolve controller (fresh instance)
//!     → check the action exists
//!     → resolve middleware, declaration order
//!     → Pipeline(middleware..., terminal: bind args → controller.call)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Nothing is resolved before a route matched
//! - Action arguments are bound inside the terminal continuation, so
//!   middleware may still short-circuit requests whose variables would not
//!   coerce
//! - Errors propagate to the caller untouched

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::dispatch::controller::{bind, Controller};
use crate::dispatch::error::DispatchError;
use crate::dispatch::middleware::{Middleware, Next};
use crate::dispatch::pipeline::Pipeline;
use crate::dispatch::resolver::Resolver;
use crate::routing::{RouteMatch, Variables};

/// The matched route, available to middleware and controllers as a
/// request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    /// Route name, if it has one.
    pub name: Option<String>,
    /// Raw path pattern of the route.
    pub pattern: String,
    pub variables: Variables,
}

impl RouteParams {
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.variables.get(variable).map(String::as_str)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn Resolver>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Run `request` through the matched route's pipeline and controller.
    pub async fn dispatch(&self, route_match: RouteMatch, mut request: Request<Body>) -> Result<Response, DispatchError> {
        let (compiled, variables) = route_match.into_parts();
        let route = compiled.route();
        let target = route.controller.clone();

        let controller: Arc<dyn Controller> = Arc::from(self.resolver.resolve_controller(&target.controller)?);
        let signature = controller
            .signature(&target.action)
            .ok_or_else(|| DispatchError::UnknownAction {
                controller: target.controller.clone(),
                action: target.action.clone(),
            })?;

        let mut stages: Vec<Arc<dyn Middleware>> = Vec::with_capacity(route.middleware.len());
        for reference in &route.middleware {
            stages.push(Arc::from(self.resolver.resolve_middleware(reference)?));
        }

        tracing::debug!(
            controller = %target,
            middleware = stages.len(),
            "Dispatching route"
        );

        request.extensions_mut().insert(RouteParams {
            name: route.name.clone(),
            pattern: route.path.clone(),
            variables: variables.clone(),
        });

        let action = target.action;
        let terminal = Next::new(move |request| {
            Box::pin(async move {
                let args = bind(&signature, &variables)?;
                controller.call(&action, request, args).await
            })
        });

        Pipeline::new(stages).run(request, terminal).await
    }
}
