//! Payrail dataset payment service.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p payrail-server --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p payrail-server
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p payrail-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` — Override bind address
//! - `PORT` — Override port
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use payrail_server::config::ServerConfig;
use payrail_server::handlers::{AppState, router};
use payrail_server::ledger::Ledger;
use payrail_server::mesh::MeshClient;
use payrail_svm::rail::SolanaRail;
use payrail_svm::rpc::SolanaRpcClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        rpc_url = %config.rpc_url,
        mesh = %config.mesh.api_server,
        "Loaded configuration"
    );

    if config.rpc_url.is_empty() {
        return Err("rpc_url is not configured".into());
    }

    let rail_config = config.rail_config()?;
    let rpc = SolanaRpcClient::new(config.rpc_url.clone());
    let mesh = Arc::new(MeshClient::new(
        &config.mesh.api_server,
        config.mesh.channel.clone(),
    )?);
    let ledger = Ledger::open(&config.ledger_path)?;

    let rail = SolanaRail::new(rpc, Arc::clone(&mesh), rail_config);
    let state = AppState {
        rail: Arc::new(rail),
        catalog: mesh.clone(),
        permissions: mesh,
        ledger,
        display_decimals: config.display_decimals,
    };

    let app = router(state).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Payrail server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
