//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use route_dispatch::dispatch::{builtin, ActionArgs, ActionSignature, Actions, DispatchError, HandlerResult, ParamKind};
use route_dispatch::{AppConfig, Container, Dispatcher, HttpServer, RouteCollectionBuilder, Router};

async fn explode(_request: Request<Body>, _args: ActionArgs) -> HandlerResult {
    panic!("controller bug")
}

/// Built-ins plus a `users` controller, a `boom` controller that always
/// fails and a `panics` controller that panics.
pub fn test_container() -> Container {
    let mut container = Container::new();
    builtin::register(&mut container);
    container
        .bind_controller("users", || {
            Actions::new().action(
                "show",
                ActionSignature::new().param("id", ParamKind::Int),
                |_req, args| async move {
                    Ok(format!("user {}", args.int("id").unwrap_or_default()).into_response())
                },
            )
        })
        .bind_controller("boom", || {
            Actions::new().action("index", ActionSignature::new(), |_req, _args| async move {
                Err(DispatchError::handler("exploded"))
            })
        })
        .bind_controller("panics", || Actions::new().action("index", ActionSignature::new(), explode));
    container
}

/// Compile the routes registered by `build` into a router over [`test_container`].
pub fn router(build: impl FnOnce(&mut RouteCollectionBuilder)) -> Router {
    let mut builder = RouteCollectionBuilder::new();
    build(&mut builder);
    let collection = builder.build().unwrap();
    Router::new(collection, Dispatcher::new(Arc::new(test_container())))
}

/// A server over `router` with default configuration.
pub fn server(router: Router) -> HttpServer {
    HttpServer::new(AppConfig::default(), router)
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Fresh, empty scratch directory.
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("route-dispatch-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
