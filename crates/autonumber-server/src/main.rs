mod server;

use std::sync::Arc;

use anyhow::Context;
use autonumber::{Autonumber, CounterStore, EntitySchema, MemoryBackend, parse_schemas};
use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::routes::{AppState, router};
use server::store::MeteredBackend;
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let schemas = load_schemas(&config)?;
    let store = CounterStore::new(MeteredBackend::new(MemoryBackend::new()))
        .with_max_retries(config.max_retries);
    let numbering = Autonumber::from_schemas(Arc::new(store), &schemas)?;

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config, &schemas);
    tracing::warn!(
        "Counters are held in process memory; a restart begins every sequence again at 1"
    );

    axum::serve(listener, router(AppState::new(numbering)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shut down successfully");
    providers.shutdown();
    Ok(())
}

fn load_schemas(config: &ServerConfig) -> anyhow::Result<Vec<EntitySchema>> {
    let Some(path) = &config.schema_path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_schemas(&raw).with_context(|| format!("invalid schema file {}", path.display()))
}

fn log_startup_info(config: &ServerConfig, schemas: &[EntitySchema]) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting autonumber service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting autonumber service on {} with {} entity schemas",
            config.server_addr,
            schemas.len()
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
