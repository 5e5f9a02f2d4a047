//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the route file and compile it, through the cache when enabled
//! - Assemble the default container of built-in controllers and middleware
//! - Produce the router the server starts with (and reloads into)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The same path builds the initial router and every reloaded one

use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::routes::load_route_file;
use crate::config::schema::RoutingConfig;
use crate::dispatch::{builtin, Container, Dispatcher, Resolver};
use crate::routing::{RouteCache, RouteCollection, Router};

/// A container with every built-in bound.
pub fn default_container() -> Container {
    let mut container = Container::new();
    builtin::register(&mut container);
    container
}

/// Compile the configured route file, reusing the cache when it is valid.
pub fn build_collection(routing: &RoutingConfig) -> Result<RouteCollection, ConfigError> {
    let loaded = load_route_file(&routing.routes_file)?;
    if !routing.cache_enabled {
        return loaded.file.build();
    }
    let cache = RouteCache::new(routing.effective_cache_path());
    cache.get_or_build(&loaded.digest, || loaded.file.build())
}

pub fn build_router(routing: &RoutingConfig, resolver: Arc<dyn Resolver>) -> Result<Router, ConfigError> {
    let collection = build_collection(routing)?;
    tracing::info!(
        routes = collection.len(),
        routes_file = %routing.routes_file.display(),
        "Router ready"
    );
    Ok(Router::new(collection, Dispatcher::new(resolver)))
}
