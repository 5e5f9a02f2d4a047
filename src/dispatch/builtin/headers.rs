//! Header guard and response header stamping.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;

use crate::dispatch::middleware::{HandlerResult, Middleware, MiddlewareParams, Next};

/// Rejects requests that lack a header with 401.
#[derive(Debug, Clone)]
pub struct RequireHeader {
    header: HeaderName,
}

impl RequireHeader {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn from_params(params: MiddlewareParams<'_>) -> Result<Self, String> {
        let raw: String = params.require("header")?;
        let header = HeaderName::from_bytes(raw.as_bytes()).map_err(|e| format!("header `{}`: {}", raw, e))?;
        Ok(Self::new(header))
    }
}

impl Middleware for RequireHeader {
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let present = request
                .headers()
                .get(&self.header)
                .is_some_and(|v| !v.is_empty());
            if present {
                return next.run(request).await;
            }
            tracing::warn!(header = %self.header, path = %request.uri().path(), "Required header missing");
            Ok((StatusCode::UNAUTHORIZED, format!("Missing {} header", self.header)).into_response())
        })
    }
}

/// Sets a header on every response that passes through.
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    pub fn from_params(params: MiddlewareParams<'_>) -> Result<Self, String> {
        let name: String = params.require("name")?;
        let value: String = params.require("value")?;
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| format!("header `{}`: {}", name, e))?;
        let value = HeaderValue::from_str(&value).map_err(|e| format!("header value `{}`: {}", value, e))?;
        Ok(Self::new(name, value))
    }
}

impl Middleware for SetHeader {
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let mut response = next.run(request).await?;
            response.headers_mut().insert(self.name.clone(), self.value.clone());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ok() -> Next {
        Next::new(|_req| Box::pin(async { Ok(StatusCode::OK.into_response()) }))
    }

    #[tokio::test]
    async fn test_require_header() {
        let guard = RequireHeader::new(HeaderName::from_static("x-api-key"));

        let response = guard.handle(Request::new(Body::empty()), ok()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder().header("x-api-key", "k").body(Body::empty()).unwrap();
        let response = guard.handle(request, ok()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_header_from_params() {
        let params = BTreeMap::from([
            ("name".to_string(), "x-frame-options".to_string()),
            ("value".to_string(), "DENY".to_string()),
        ]);
        let stamp = SetHeader::from_params(MiddlewareParams::new("set_header", &params)).unwrap();
        let response = stamp.handle(Request::new(Body::empty()), ok()).await.unwrap();
        assert_eq!(response.headers()["x-frame-options"], "DENY");

        let bad = BTreeMap::from([("name".to_string(), "bad header".to_string()), ("value".to_string(), "v".to_string())]);
        assert!(SetHeader::from_params(MiddlewareParams::new("set_header", &bad)).is_err());
    }
}
