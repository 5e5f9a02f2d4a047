//! Built-in controllers: service status and request echo.

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::dispatch::controller::{ActionArgs, ActionSignature, Actions};
use crate::dispatch::dispatcher::RouteParams;
use crate::dispatch::middleware::HandlerResult;
use crate::routing::Variables;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EchoBody {
    pub method: String,
    pub path: String,
    pub route: Option<String>,
    pub pattern: Option<String>,
    pub variables: Variables,
}

async fn status(_request: Request<Body>, _args: ActionArgs) -> HandlerResult {
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
    .into_response())
}

async fn echo(request: Request<Body>, _args: ActionArgs) -> HandlerResult {
    let params = request.extensions().get::<RouteParams>().cloned();
    let body = EchoBody {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        route: params.as_ref().and_then(|p| p.name.clone()),
        pattern: params.as_ref().map(|p| p.pattern.clone()),
        variables: params.map(|p| p.variables).unwrap_or_default(),
    };
    Ok(Json(body).into_response())
}

/// `status@show`: version and liveness.
pub fn status_controller() -> Actions {
    Actions::new().action("show", ActionSignature::new(), status)
}

/// `echo@show`: reflects the matched route and its variables.
pub fn echo_controller() -> Actions {
    Actions::new().action("show", ActionSignature::new(), echo)
}
