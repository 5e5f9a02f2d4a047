//! Middleware contract.
//!
//! A middleware receives the request and a [`Next`] continuation. It either
//! runs `next` (possibly after changing the request, possibly changing the
//! response on the way back) or returns its own response to short-circuit.
//! `Next` is consumed by value, so the rest of the chain runs at most once.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::dispatch::error::DispatchError;

/// What every stage of the pipeline produces.
pub type HandlerResult = Result<Response, DispatchError>;

/// The remainder of the middleware chain, ending in the controller action.
pub struct Next {
    inner: Box<dyn FnOnce(Request<Body>) -> BoxFuture<'static, HandlerResult> + Send>,
}

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request<Body>) -> BoxFuture<'static, HandlerResult> + Send + 'static,
    {
        Self { inner: Box::new(f) }
    }

    pub async fn run(self, request: Request<Body>) -> HandlerResult {
        (self.inner)(request).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

pub trait Middleware: Send + Sync {
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, HandlerResult>;
}

/// Middleware built from an async function, as in `axum::middleware::from_fn`.
pub struct FnMiddleware<F> {
    f: F,
}

pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnMiddleware { f }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin((self.f)(request, next))
    }
}

/// Route-level parameters a middleware was configured with.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareParams<'a> {
    name: &'a str,
    params: &'a BTreeMap<String, String>,
}

impl<'a> MiddlewareParams<'a> {
    pub fn new(name: &'a str, params: &'a BTreeMap<String, String>) -> Self {
        Self { name, params }
    }

    pub fn middleware(&self) -> &str {
        self.name
    }

    pub fn raw(&self, key: &str) -> Option<&'a str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse an optional parameter.
    pub fn get<T: FromStr>(&self, key: &str) -> Result<Option<T>, String>
    where
        T::Err: fmt::Display,
    {
        match self.params.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| format!("parameter `{}` = `{}`: {}", key, raw, e)),
            None => Ok(None),
        }
    }

    /// Parse a parameter that must be present.
    pub fn require<T: FromStr>(&self, key: &str) -> Result<T, String>
    where
        T::Err: fmt::Display,
    {
        self.get(key)?
            .ok_or_else(|| format!("missing required parameter `{}`", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_parsing() {
        let map = BTreeMap::from([
            ("limit".to_string(), "10".to_string()),
            ("bad".to_string(), "ten".to_string()),
        ]);
        let params = MiddlewareParams::new("throttle", &map);
        assert_eq!(params.require::<u32>("limit").unwrap(), 10);
        assert_eq!(params.get::<u32>("absent").unwrap(), None);
        assert!(params.require::<u32>("absent").unwrap_err().contains("missing"));
        assert!(params.get::<u32>("bad").is_err());
        assert_eq!(params.raw("bad"), Some("ten"));
        assert_eq!(params.middleware(), "throttle");
    }
}
