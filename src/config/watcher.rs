//! Route file watcher for hot reload.

use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::schema::RoutingConfig;
use crate::dispatch::Resolver;
use crate::lifecycle::startup::build_router;
use crate::observability::metrics;
use crate::routing::Router;

/// Monitors the route file and rebuilds the router when it changes.
pub struct RouteWatcher {
    routing: RoutingConfig,
    resolver: Arc<dyn Resolver>,
    update_tx: mpsc::UnboundedSender<Arc<Router>>,
}

impl RouteWatcher {
    /// Returns the watcher and a receiver for rebuilt routers.
    pub fn new(routing: RoutingConfig, resolver: Arc<dyn Resolver>) -> (Self, mpsc::UnboundedReceiver<Arc<Router>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                routing,
                resolver,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let routing = self.routing.clone();
        let resolver = self.resolver.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Route file change detected, rebuilding router");
                        match build_router(&routing, resolver.clone()) {
                            Ok(router) => {
                                metrics::record_reload("ok");
                                let _ = tx.send(Arc::new(router));
                            }
                            Err(e) => {
                                metrics::record_reload("error");
                                tracing::error!(error = %e, "Failed to rebuild router; keeping current routes");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.routing.routes_file, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.routing.routes_file, "Route watcher started");
        Ok(watcher)
    }
}
