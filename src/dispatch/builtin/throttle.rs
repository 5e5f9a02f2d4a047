//! Per-route, per-client request throttling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::dispatch::dispatcher::RouteParams;
use crate::dispatch::middleware::{HandlerResult, Middleware, MiddlewareParams, Next};
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn refilled(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        (self.tokens + elapsed * self.refill_rate).min(self.capacity)
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        self.tokens = self.refilled(now);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// A full bucket behaves exactly like a fresh one, so it can be dropped.
    fn is_idle(&self, now: Instant) -> bool {
        self.refilled(now) >= self.capacity
    }
}

/// Bucket count above which [`ThrottleState`] sweeps idle buckets.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 10_000;

/// Buckets shared by every throttle instance the container produces.
///
/// Once more than `sweep_threshold` buckets exist, a new bucket triggers a
/// sweep that drops every bucket which has refilled to capacity.
#[derive(Debug)]
pub struct ThrottleState {
    buckets: DashMap<String, TokenBucket>,
    sweep_threshold: usize,
}

impl Default for ThrottleState {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            sweep_threshold,
        }
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket that has refilled to capacity. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle(now));
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.buckets.len(), "Evicted idle throttle buckets");
        }
        removed
    }

    fn check(&self, key: String, capacity: f64, refill_rate: f64) -> bool {
        let created = !self.buckets.contains_key(&key);
        let allowed = self
            .buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(capacity, refill_rate))
            .try_acquire();
        // The entry guard is released above; `retain` would deadlock on it.
        if created && self.buckets.len() > self.sweep_threshold {
            self.evict_idle();
        }
        allowed
    }
}

/// Allows `max_requests` per `per_seconds` for each client on each route.
#[derive(Debug, Clone)]
pub struct Throttle {
    state: Arc<ThrottleState>,
    capacity: f64,
    refill_rate: f64,
}

impl Throttle {
    pub fn new(state: Arc<ThrottleState>, max_requests: u32, per_seconds: u32) -> Self {
        Self {
            state,
            capacity: f64::from(max_requests),
            refill_rate: f64::from(max_requests) / f64::from(per_seconds.max(1)),
        }
    }

    /// Build from route parameters `max_requests` (required) and
    /// `per_seconds` (default 60).
    pub fn from_params(state: Arc<ThrottleState>, params: MiddlewareParams<'_>) -> Result<Self, String> {
        let max_requests: u32 = params.require("max_requests")?;
        let per_seconds: u32 = params.get("per_seconds")?.unwrap_or(60);
        if max_requests == 0 || per_seconds == 0 {
            return Err("`max_requests` and `per_seconds` must be positive".to_string());
        }
        Ok(Self::new(state, max_requests, per_seconds))
    }
}

/// Connection address, then the first `X-Forwarded-For` entry.
fn client_key(request: &Request<Body>) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl Middleware for Throttle {
    fn handle<'a>(&'a self, request: Request<Body>, next: Next) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let route = request
                .extensions()
                .get::<RouteParams>()
                .map(|p| p.name.clone().unwrap_or_else(|| p.pattern.clone()))
                .unwrap_or_default();
            let client = client_key(&request);
            let key = format!("{}|{}", route, client);

            if self.state.check(key, self.capacity, self.refill_rate) {
                next.run(request).await
            } else {
                tracing::warn!(client = %client, route = %route, "Rate limit exceeded");
                metrics::record_throttled(&route);
                Ok((StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(client: &str) -> Request<Body> {
        Request::builder()
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    }

    fn ok() -> Next {
        Next::new(|_req| Box::pin(async { Ok(StatusCode::OK.into_response()) }))
    }

    #[tokio::test]
    async fn test_rejects_after_budget_is_spent() {
        let throttle = Throttle::new(Arc::new(ThrottleState::new()), 2, 60);

        for _ in 0..2 {
            let response = throttle.handle(request("10.0.0.1"), ok()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = throttle.handle(request("10.0.0.1"), ok()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Other clients have their own bucket.
        let response = throttle.handle(request("10.0.0.2"), ok()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        let state = ThrottleState::new();
        assert!(state.check("fast|a".to_string(), 2.0, 1000.0));
        assert!(state.check("slow|b".to_string(), 2.0, 0.001));
        std::thread::sleep(std::time::Duration::from_millis(20));

        assert_eq!(state.evict_idle(), 1);
        assert_eq!(state.len(), 1);
        assert!(state.buckets.contains_key("slow|b"));
    }

    #[test]
    fn test_sweep_runs_once_threshold_is_crossed() {
        let state = ThrottleState::with_sweep_threshold(1);
        assert!(state.check("route|1".to_string(), 2.0, 1000.0));
        std::thread::sleep(std::time::Duration::from_millis(20));

        // A second client pushes the map past the threshold; the refilled
        // bucket of the first client goes, the fresh one stays.
        assert!(state.check("route|2".to_string(), 2.0, 0.001));
        assert_eq!(state.len(), 1);
        assert!(state.buckets.contains_key("route|2"));
    }

    #[test]
    fn test_parameter_validation() {
        let state = Arc::new(ThrottleState::new());
        let empty = BTreeMap::new();
        assert!(Throttle::from_params(state.clone(), MiddlewareParams::new("throttle", &empty)).is_err());

        let zero = BTreeMap::from([("max_requests".to_string(), "0".to_string())]);
        assert!(Throttle::from_params(state.clone(), MiddlewareParams::new("throttle", &zero)).is_err());

        let fine = BTreeMap::from([("max_requests".to_string(), "5".to_string())]);
        assert!(Throttle::from_params(state, MiddlewareParams::new("throttle", &fine)).is_ok());
    }
}
