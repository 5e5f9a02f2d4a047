//! HTTP kernel: the outer error boundary around routing.
//!
//! # Responsibilities
//! - Hand each request to the current router snapshot
//! - Turn "not found", "method not allowed" and dispatch errors into
//!   responses
//! - Log and count every outcome
//!
//! # Design Decisions
//! - The router sits behind an `ArcSwap`; a reload replaces it atomically
//!   while in-flight requests finish on the snapshot they loaded
//! - Server errors never leak their message to the client
//! - A panic inside dispatch is caught by the server's `CatchPanicLayer`
//!   and answered through [`panic_response`]

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::routing::{Routed, Router};

#[derive(Debug, Clone)]
pub struct HttpKernel {
    router: Arc<ArcSwap<Router>>,
}

impl HttpKernel {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(ArcSwap::from_pointee(router)),
        }
    }

    /// Current router snapshot.
    pub fn router(&self) -> Arc<Router> {
        self.router.load_full()
    }

    /// Replace the router for every request that starts from now on.
    pub fn swap(&self, router: Arc<Router>) {
        tracing::info!(routes = router.routes().len(), "Router swapped");
        self.router.store(router);
    }

    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let request_id = request
            .request_id()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let router = self.router();
        let (response, outcome) = match router.route(request).await {
            Ok(Routed::Response(response)) => (response, "ok"),
            Ok(Routed::NotFound) => {
                tracing::warn!(request_id = %request_id, method = %method, path = %path, "No route matched");
                ((StatusCode::NOT_FOUND, "No matching route found").into_response(), "not_found")
            }
            Ok(Routed::MethodNotAllowed(allowed)) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    allowed = %allowed.header_value(),
                    "Method not allowed"
                );
                let mut response = (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
                if let Ok(value) = HeaderValue::from_str(&allowed.header_value()) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                (response, "method_not_allowed")
            }
            Err(e) => {
                let status = e.status_code();
                if status.is_client_error() {
                    tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected request");
                    ((status, e.to_string()).into_response(), "bad_request")
                } else {
                    tracing::error!(request_id = %request_id, path = %path, error = %e, "Dispatch failed");
                    ((status, "Internal Server Error").into_response(), "error")
                }
            }
        };

        metrics::record_request(&method, outcome, start_time);
        tracing::debug!(
            request_id = %request_id,
            status = %response.status(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }
}

/// Opaque 500 for a request whose controller or middleware panicked.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = %message, "Request handler panicked");
    metrics::record_panic();
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Axum fallback handler that routes everything through the kernel.
pub async fn kernel_handler(State(kernel): State<HttpKernel>, request: Request<Body>) -> Response {
    kernel.handle(request).await
}
