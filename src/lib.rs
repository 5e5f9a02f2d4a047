//! Route compilation and dispatch.
//!
//! Matches HTTP requests against registered routes (path, host, scheme and
//! method constraints with `{placeholder}` variables compiled to regular
//! expressions) and runs the winning route through its middleware pipeline
//! into a controller action.
//!
//! ```text
//!   Request ─▶ http::kernel ─▶ routing::router ─▶ routing::matcher (per route)
//!                                    │
//!                                    ▼
//!                          dispatch::dispatcher ─▶ dispatch::pipeline ─▶ Controller
//! ```

// Core subsystems
pub mod dispatch;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use dispatch::{Container, Dispatcher};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Route, RouteCollectionBuilder, Router};
