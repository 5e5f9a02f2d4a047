//! route-dispatch server.
//!
//! Loads the configuration and route file, compiles (or reads from cache)
//! the route collection, and serves it until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_dispatch::config::{load_config, AppConfig, RouteWatcher};
use route_dispatch::dispatch::Resolver;
use route_dispatch::lifecycle::{signals, startup, Shutdown};
use route_dispatch::observability::{logging, metrics};
use route_dispatch::HttpServer;

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "Route compilation and dispatch server", long_about = None)]
struct Args {
    /// Configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured route file.
    #[arg(short, long)]
    routes: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(routes) = args.routes {
        config.routing.routes_file = routes;
    }

    logging::init(&config.observability)?;
    tracing::info!("route-dispatch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes_file = %config.routing.routes_file.display(),
        cache_enabled = config.routing.cache_enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let resolver: Arc<dyn Resolver> = Arc::new(startup::default_container());
    let router = startup::build_router(&config.routing, resolver.clone())?;

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_handler(&shutdown);

    // The watcher stops when dropped, so it lives until the server returns.
    let (_watcher, updates) = if config.routing.watch {
        let (watcher, updates) = RouteWatcher::new(config.routing.clone(), resolver.clone());
        (Some(watcher.run()?), Some(updates))
    } else {
        (None, None)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, router);
    server.run(listener, updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
