//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!
//! route file (TOML)
//!     → routes.rs (entries, nested groups)
//!     → RouteCollectionBuilder
//!
//! On change:
//!     watcher.rs detects route file change
//!     → rebuild router (cache digest changes, so it recompiles)
//!     → atomic swap in the HTTP kernel
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod routes;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use routes::{load_route_file, RouteFile};
pub use schema::{AppConfig, ListenerConfig, ObservabilityConfig, RoutingConfig, TimeoutConfig};
pub use watcher::RouteWatcher;
