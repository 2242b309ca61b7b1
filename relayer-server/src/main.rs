//! # Encrypted Identity Relayer (development mode)
//!
//! Development-mode encryption/decryption collaborator for the identity
//! registry contract. Stands in for the FHE platform during local
//! development and testing: ciphertexts are held in an in-memory keystore,
//! homomorphic operations are executed from the contract's event stream,
//! and decryption is gated by real signed, time-boxed session
//! authorizations and the on-chain grant stream.
//!
//! ## Usage
//!
//! ```bash
//! # Ephemeral coprocessor key (each start invalidates deployed registries)
//! cargo run -p relayer-server
//!
//! # Stable coprocessor key
//! KMS_SECRET_KEY=<hex 32 bytes> cargo run -p relayer-server
//! ```
//!
//! Deploy the registry with the key reported at startup (also served at
//! `GET /status`).
//!
//! ## API Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Detailed server status
//! - `POST /api/v1/encrypt` - Encrypt an identity value, returns {handle, input_proof}
//! - `POST /api/v1/ops` - Ingest registry log lines (FHE ops + grants)
//! - `POST /api/v1/user-decrypt` - Decrypt handles under a session authorization

mod config;
mod routes;
mod services;
mod state;
mod types;

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use routes::create_routes;
use services::KmsSigner;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting encrypted-identity relayer (development mode)"
    );

    // Initialize coprocessor signer
    let kms = KmsSigner::from_env()?;
    info!(
        pubkey = %hex::encode(kms.public_key()),
        "Coprocessor signer initialized; deploy registries against this key"
    );

    // Create application state
    let state = AppState::new(kms);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    // Build router
    let app = create_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.socket_addr();
    info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize logging based on configuration
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}
