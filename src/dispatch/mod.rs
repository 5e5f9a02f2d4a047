//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch + Request
//!     → resolver.rs (controller + middleware by name)
//!     → dispatcher.rs (RouteParams extension, terminal continuation)
//!     → pipeline.rs (right-folded middleware chain)
//!     → controller.rs (argument binding, action call)
//!     → Response | DispatchError
//! ```
//!
//! # Design Decisions
//! - Everything is resolved per request from factories
//! - Middleware either call `Next` or answer themselves
//! - Errors are returned, never swallowed; the HTTP kernel maps them

pub mod builtin;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod resolver;

pub use controller::{bind, ActionArgs, ActionSignature, Actions, Controller, ParamKind, ParamValue};
pub use dispatcher::{Dispatcher, RouteParams};
pub use error::DispatchError;
pub use middleware::{from_fn, FnMiddleware, HandlerResult, Middleware, MiddlewareParams, Next};
pub use pipeline::Pipeline;
pub use resolver::{Container, ResolveError, Resolver};
