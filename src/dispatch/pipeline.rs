//! Middleware pipeline.
//!
//! Builds the chain by right-folding the stages around the terminal
//! continuation:
//!
//! ```text
//! [M1, M2] + C  →  M1(req, Next(M2(req, Next(C))))
//! ```
//!
//! M1 sees the request first and the response last.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::dispatch::middleware::{HandlerResult, Middleware, Next};

pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage, outer-most first, ending in `terminal`.
    pub async fn run(self, request: Request<Body>, terminal: Next) -> HandlerResult {
        let chain = self.stages.into_iter().rev().fold(terminal, |next, stage| {
            Next::new(move |req| Box::pin(async move { stage.handle(req, next).await }))
        });
        chain.run(request).await
    }
}
