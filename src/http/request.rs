//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Extract routing-relevant information (method, decoded path, host, scheme)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Host is lowercased and stripped of its port before matching
//! - Scheme comes from the URI, then `X-Forwarded-Proto`, else plain http

use std::borrow::Cow;
use std::task::{Context, Poll};

use axum::http::{header, HeaderValue, Request};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::routing::Scheme;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Identifier attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Accessor for the request ID inserted by [`RequestIdLayer`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Layer that guarantees an `x-request-id` header and [`RequestId`] extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let existing = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                if let Ok(value) = HeaderValue::from_str(&id) {
                    req.headers_mut().insert(X_REQUEST_ID, value);
                }
                id
            }
        };
        req.extensions_mut().insert(RequestId(id));
        self.inner.call(req)
    }
}

/// The parts of a request the matchers look at.
#[derive(Debug, Clone)]
pub struct RequestView<'a> {
    method: Cow<'a, str>,
    path: Cow<'a, str>,
    host: Option<String>,
    scheme: Scheme,
}

impl<'a> RequestView<'a> {
    /// Build a view directly from its parts. The path is used as given.
    pub fn new(method: &'a str, path: &'a str, host: Option<&str>, scheme: Scheme) -> Self {
        Self {
            method: canonical_method(method),
            path: Cow::Borrowed(path),
            host: host.map(normalize_host),
            scheme,
        }
    }

    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        let uri = request.uri();
        let raw_path = uri.path();
        // Undecodable input is matched as-is rather than rejected here.
        let path = urlencoding::decode(raw_path).unwrap_or(Cow::Borrowed(raw_path));

        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.host())
            .map(normalize_host);

        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
            Some(_) => Scheme::Http,
            None => request
                .headers()
                .get(X_FORWARDED_PROTO)
                .and_then(|h| h.to_str().ok())
                .map(|proto| {
                    if proto.trim().eq_ignore_ascii_case("https") {
                        Scheme::Https
                    } else {
                        Scheme::Http
                    }
                })
                .unwrap_or(Scheme::Http),
        };

        Self {
            method: canonical_method(request.method().as_str()),
            path,
            host,
            scheme,
        }
    }

    /// Uppercase HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Percent-decoded path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lowercase host without port.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}

fn canonical_method(method: &str) -> Cow<'_, str> {
    if method.bytes().any(|b| b.is_ascii_lowercase()) {
        Cow::Owned(method.to_ascii_uppercase())
    } else {
        Cow::Borrowed(method)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    // Bracketed IPv6 literals keep their colons.
    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    };
    without_port.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_view_decodes_path_and_strips_port() {
        let req = Request::builder()
            .method("get")
            .uri("/files/hello%20world")
            .header("Host", "API.Example.com:8080")
            .body(Body::empty())
            .unwrap();
        let view = RequestView::from_request(&req);
        assert_eq!(view.method(), "GET");
        assert_eq!(view.path(), "/files/hello world");
        assert_eq!(view.host(), Some("api.example.com"));
        assert_eq!(view.scheme(), Scheme::Http);
    }

    #[test]
    fn test_scheme_from_uri_and_forwarded_header() {
        let req = Request::builder()
            .uri("https://example.com/")
            .body(Body::empty())
            .unwrap();
        let view = RequestView::from_request(&req);
        assert_eq!(view.scheme(), Scheme::Https);
        assert_eq!(view.host(), Some("example.com"));

        let req = Request::builder()
            .uri("/")
            .header(X_FORWARDED_PROTO, "HTTPS")
            .body(Body::empty())
            .unwrap();
        assert_eq!(RequestView::from_request(&req).scheme(), Scheme::Https);
    }

    #[test]
    fn test_ipv6_host() {
        assert_eq!(normalize_host("[::1]:8080"), "[::1]");
    }

    #[test]
    fn test_request_id_layer_preserves_existing() {
        use std::convert::Infallible;
        use tower::ServiceExt;

        let svc = RequestIdLayer.layer(tower::service_fn(|req: Request<Body>| async move {
            Ok::<_, Infallible>(req.request_id().map(|id| id.as_str().to_string()))
        }));

        let req = Request::builder()
            .header(X_REQUEST_ID, "abc")
            .body(Body::empty())
            .unwrap();
        let id = futures_util::FutureExt::now_or_never(svc.clone().oneshot(req))
            .unwrap()
            .unwrap();
        assert_eq!(id.as_deref(), Some("abc"));

        let req = Request::builder().body(Body::empty()).unwrap();
        let id = futures_util::FutureExt::now_or_never(svc.oneshot(req))
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
