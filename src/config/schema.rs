//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! routing service. All types derive Serde traits for deserialization from
//! config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route source, cache and reload settings.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Where routes come from and how the compiled set is kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// TOML route file. Relative paths resolve against the working directory.
    pub routes_file: PathBuf,

    /// Compiled-route cache file. Defaults to `<routes_file>.cache.json`.
    pub cache_path: Option<PathBuf>,

    /// Load and persist the compiled collection through the cache file.
    pub cache_enabled: bool,

    /// Rebuild the router when the route file changes.
    pub watch: bool,
}

impl RoutingConfig {
    pub fn effective_cache_path(&self) -> PathBuf {
        match &self.cache_path {
            Some(path) => path.clone(),
            None => {
                let mut path = self.routes_file.clone().into_os_string();
                path.push(".cache.json");
                PathBuf::from(path)
            }
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            routes_file: PathBuf::from("routes.toml"),
            cache_path: None,
            cache_enabled: true,
            watch: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
