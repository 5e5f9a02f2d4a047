//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, routing view of the request)
//!     → kernel.rs (router snapshot, outcome → response)
//!     → Send to client
//! ```

pub mod kernel;
pub mod request;
pub mod server;

pub use kernel::HttpKernel;
pub use request::{RequestId, RequestIdExt, RequestIdLayer, RequestView, X_REQUEST_ID};
pub use server::HttpServer;
