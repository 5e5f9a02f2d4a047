use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use route_dispatch::config::{load_config, AppConfig, RoutingConfig};
use route_dispatch::dispatch::{Container, Dispatcher};
use route_dispatch::lifecycle::startup;
use route_dispatch::routing::{RouteCache, RouteCollection, RouteOutcome, Router, Variables};

#[derive(Parser)]
#[command(name = "routes-cli")]
#[command(about = "Inspect and manage compiled routes", long_about = None)]
struct Cli {
    /// Configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured route file.
    #[arg(short, long)]
    routes: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes in match order
    List,
    /// Show which route a request would reach
    Match {
        /// HTTP method, e.g. GET
        method: String,
        /// Path or absolute URL, e.g. https://api.example.com/users/5
        url: String,
    },
    /// Generate the URL of a named route
    Url {
        name: String,
        /// Variables as key=value
        #[arg(value_parser = parse_pair)]
        vars: Vec<(String, String)>,
    },
    /// Manage the compiled-route cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the cache file
    Flush,
    /// Rebuild the cache from the route file
    Warm,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(routes) = cli.routes {
        config.routing.routes_file = routes;
    }
    let routing = config.routing;

    match cli.command {
        Commands::List => {
            let collection = startup::build_collection(&routing)?;
            print_json(&list(&collection))?;
        }
        Commands::Match { method, url } => {
            let router = offline_router(&routing)?;
            let request = Request::builder()
                .method(method.as_str())
                .uri(url.as_str())
                .body(Body::empty())?;
            let outcome = match router.match_request(&request) {
                RouteOutcome::Matched(m) => json!({
                    "outcome": "matched",
                    "route": describe(m.route().route()),
                    "variables": m.variables(),
                }),
                RouteOutcome::NotFound => json!({ "outcome": "not_found" }),
                RouteOutcome::MethodNotAllowed(allowed) => json!({
                    "outcome": "method_not_allowed",
                    "allowed": allowed.iter().collect::<Vec<_>>(),
                }),
            };
            print_json(&outcome)?;
        }
        Commands::Url { name, vars } => {
            let router = offline_router(&routing)?;
            let vars: Variables = vars.into_iter().collect();
            println!("{}", router.url_generator().generate(&name, &vars)?);
        }
        Commands::Cache { action } => {
            let cache = RouteCache::new(routing.effective_cache_path());
            match action {
                CacheAction::Flush => {
                    let removed = cache.flush()?;
                    print_json(&json!({ "path": cache.path(), "removed": removed }))?;
                }
                CacheAction::Warm => {
                    cache.flush()?;
                    let warmed = RoutingConfig {
                        cache_enabled: true,
                        ..routing
                    };
                    let collection = startup::build_collection(&warmed)?;
                    print_json(&json!({ "path": cache.path(), "routes": collection.len() }))?;
                }
            }
        }
    }

    Ok(())
}

/// Matching and URL generation never resolve controllers.
fn offline_router(routing: &RoutingConfig) -> Result<Router, Box<dyn std::error::Error>> {
    let collection = startup::build_collection(routing)?;
    Ok(Router::new(collection, Dispatcher::new(Arc::new(Container::new()))))
}

fn describe(route: &route_dispatch::routing::Route) -> Value {
    json!({
        "name": route.name,
        "methods": if route.methods.is_empty() { vec!["ANY".to_string()] } else { route.methods.iter().cloned().collect::<Vec<_>>() },
        "path": route.path,
        "host": route.host,
        "scheme": route.scheme,
        "controller": route.controller.to_string(),
        "middleware": route.middleware.iter().map(|m| m.name.clone()).collect::<Vec<_>>(),
    })
}

fn list(collection: &RouteCollection) -> Value {
    Value::Array(
        collection
            .iter()
            .map(|compiled| {
                let mut entry = describe(compiled.route());
                entry["regex"] = Value::String(compiled.path().source().to_string());
                entry
            })
            .collect(),
    )
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
