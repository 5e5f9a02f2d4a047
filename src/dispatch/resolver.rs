//! Dependency resolution for controllers and middleware.
//!
//! The dispatcher only sees the [`Resolver`] capability. [`Container`] is an
//! explicit registry of named factories built during application setup;
//! every resolution produces a fresh instance, so nothing is shared between
//! requests unless a factory deliberately captures shared state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dispatch::controller::Controller;
use crate::dispatch::middleware::{Middleware, MiddlewareParams};
use crate::routing::MiddlewareRef;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no controller bound to `{0}`")]
    UnknownController(String),

    #[error("no middleware bound to `{0}`")]
    UnknownMiddleware(String),

    #[error("middleware `{name}` rejected its parameters: {reason}")]
    InvalidParameters { name: String, reason: String },
}

pub trait Resolver: Send + Sync {
    fn resolve_controller(&self, name: &str) -> Result<Box<dyn Controller>, ResolveError>;

    fn resolve_middleware(&self, reference: &MiddlewareRef) -> Result<Box<dyn Middleware>, ResolveError>;
}

type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;
type MiddlewareFactory = Arc<dyn Fn(&MiddlewareRef) -> Result<Box<dyn Middleware>, String> + Send + Sync>;

/// Registry of named controller and middleware factories.
#[derive(Clone, Default)]
pub struct Container {
    controllers: HashMap<String, ControllerFactory>,
    middleware: HashMap<String, MiddlewareFactory>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_controller<F, C>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        let factory: ControllerFactory = Arc::new(move || -> Box<dyn Controller> { Box::new(factory()) });
        self.controllers.insert(name.into(), factory);
        self
    }

    /// Bind a middleware factory. The factory receives the route-level
    /// parameters and may reject them.
    pub fn bind_middleware<F, M>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(MiddlewareParams<'_>) -> Result<M, String> + Send + Sync + 'static,
        M: Middleware + 'static,
    {
        let factory: MiddlewareFactory = Arc::new(
            move |reference: &MiddlewareRef| -> Result<Box<dyn Middleware>, String> {
                factory(MiddlewareParams::new(&reference.name, &reference.params))
                    .map(|m| Box::new(m) as Box<dyn Middleware>)
            },
        );
        self.middleware.insert(name.into(), factory);
        self
    }

    pub fn has_controller(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn has_middleware(&self, name: &str) -> bool {
        self.middleware.contains_key(name)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut controllers: Vec<&String> = self.controllers.keys().collect();
        controllers.sort();
        let mut middleware: Vec<&String> = self.middleware.keys().collect();
        middleware.sort();
        f.debug_struct("Container")
            .field("controllers", &controllers)
            .field("middleware", &middleware)
            .finish()
    }
}

impl Resolver for Container {
    fn resolve_controller(&self, name: &str) -> Result<Box<dyn Controller>, ResolveError> {
        self.controllers
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ResolveError::UnknownController(name.to_string()))
    }

    fn resolve_middleware(&self, reference: &MiddlewareRef) -> Result<Box<dyn Middleware>, ResolveError> {
        let factory = self
            .middleware
            .get(&reference.name)
            .ok_or_else(|| ResolveError::UnknownMiddleware(reference.name.clone()))?;
        factory(reference).map_err(|reason| ResolveError::InvalidParameters {
            name: reference.name.clone(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::controller::Actions;
    use crate::dispatch::middleware::{from_fn, Next};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_controller_factory_runs_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut container = Container::new();
        container.bind_controller("users", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Actions::new()
        });

        assert!(container.resolve_controller("users").is_ok());
        assert!(container.resolve_controller("users").is_ok());
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert!(matches!(
            container.resolve_controller("posts"),
            Err(ResolveError::UnknownController(name)) if name == "posts"
        ));
    }

    #[test]
    fn test_middleware_params_are_validated() {
        let mut container = Container::new();
        container.bind_middleware("limit", |params| {
            let max: u32 = params.require("max")?;
            Ok(from_fn(move |req: Request<Body>, next: Next| async move {
                let _ = max;
                next.run(req).await
            }))
        });

        let ok = MiddlewareRef::new("limit").with_param("max", 3);
        assert!(container.resolve_middleware(&ok).is_ok());

        let bad = MiddlewareRef::new("limit");
        assert!(matches!(
            container.resolve_middleware(&bad),
            Err(ResolveError::InvalidParameters { .. })
        ));

        assert!(matches!(
            container.resolve_middleware(&MiddlewareRef::new("nope")),
            Err(ResolveError::UnknownMiddleware(_))
        ));
    }
}
