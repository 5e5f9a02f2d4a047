//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app: every request falls through to the kernel
//! - Wire up middleware (tracing, timeout, request ID, panic recovery)
//! - Bind server to listener
//! - Swap in routers rebuilt by the route watcher
//! - Shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::kernel::{kernel_handler, panic_response, HttpKernel};
use crate::http::request::RequestIdLayer;
use crate::lifecycle::Shutdown;
use crate::routing::Router;

/// HTTP server for the routing kernel.
pub struct HttpServer {
    app: axum::Router,
    kernel: HttpKernel,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig, router: Router) -> Self {
        let kernel = HttpKernel::new(router);
        let app = Self::build_app(&config, kernel.clone());
        Self { app, kernel, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &AppConfig, kernel: HttpKernel) -> axum::Router {
        axum::Router::new()
            .fallback(kernel_handler)
            .with_state(kernel)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered app, for serving or for driving in tests.
    pub fn app(&self) -> axum::Router {
        self.app.clone()
    }

    pub fn kernel(&self) -> &HttpKernel {
        &self.kernel
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` fires. Routers arriving on `updates` replace
    /// the current one.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<Arc<Router>>>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(mut updates) = updates {
            let kernel = self.kernel.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        next = updates.recv() => match next {
                            Some(router) => kernel.swap(router),
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            });
        }

        let mut stop = shutdown.subscribe();
        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
