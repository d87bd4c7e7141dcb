use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use ratewall::config::{CounterBackend, ServiceConfig};
use ratewall::http::{self, HttpServer};
use ratewall::query::PgQueryExecutor;
use ratewall::ratelimit::{CounterStore, InMemoryCounterStore, RateLimiter, RedisCounterStore};
use ratewall::telemetry;

/// Rate-limited analytics API
#[derive(Parser, Debug)]
#[command(name = "ratewall", version, about)]
struct Args {
    /// Optional YAML configuration file, overridden by the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::install_fail_fast_hook();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    telemetry::init_tracing(&config.logging)?;

    info!("Starting Ratewall analytics API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let policy = config.rate_limiting.policy()?;
    info!(
        threshold = policy.threshold(),
        window_secs = policy.window().as_secs(),
        "Rate limit policy loaded"
    );

    let store: Arc<dyn CounterStore> = match config.counter_store.backend {
        CounterBackend::Redis => {
            let store = RedisCounterStore::new(
                &config.counter_store.host,
                config.counter_store.port,
                config.counter_store.atomic,
            )?;
            let store = Arc::new(store);
            store.ping_in_background();
            store
        }
        CounterBackend::Memory => {
            warn!("Using in-memory counters; limits are not shared between instances");
            Arc::new(InMemoryCounterStore::new())
        }
    };

    let limiter = RateLimiter::new(store, policy);
    let executor = Arc::new(PgQueryExecutor::connect_lazy(&config.database));
    let router = http::router(limiter, executor);

    let server = HttpServer::bind(config.server.addr(), router).await?;
    info!("Running on {}", server.local_addr()?);

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Ratewall analytics API stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
