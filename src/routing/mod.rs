//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Route definitions (builder / route file)
//!     → collection.rs (group merging, registration order)
//!     → parser.rs (pattern → segments)
//!     → compiler.rs (segments → anchored regex, memoized)
//!     → cache.rs (optional: persist / reload compiled collection)
//!     → Freeze as immutable Router
//!
//! Incoming Request (method, host, path, scheme)
//!     → router.rs (ordered scan)
//!     → matcher.rs (path → host → scheme → method)
//!     → Return: Matched / NotFound / MethodNotAllowed
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod cache;
pub mod collection;
pub mod compiler;
pub mod matcher;
pub mod parser;
pub mod route;
pub mod router;
pub mod url;

pub use cache::{source_digest, RouteCache};
pub use collection::{CompiledRoute, GroupOptions, RouteCollection, RouteCollectionBuilder};
pub use compiler::{CompileError, CompiledPattern, PatternCache, PatternError, PatternKind};
pub use matcher::{ChainVerdict, MatcherChain, MatcherKind, RouteMatcher};
pub use parser::{ParseError, ParsedRoute, Segment};
pub use route::{ControllerRef, MiddlewareRef, Route, RouteError, Scheme, Variables};
pub use router::{AllowedMethods, RouteMatch, RouteOutcome, Routed, Router};
pub use url::{UrlError, UrlGenerator};
