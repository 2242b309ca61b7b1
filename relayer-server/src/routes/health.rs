//! Health and status endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::state::AppState;
use crate::types::{HealthResponse, StatusResponse};

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
}

/// Health check endpoint
/// GET /health
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stored_ciphertexts: state.stored_ciphertexts().await,
        uptime_secs: state.uptime_secs(),
    };

    (StatusCode::OK, Json(response))
}

/// Detailed status endpoint
/// GET /status
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let response = StatusResponse {
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        coprocessor_public_key: hex::encode(state.kms().public_key()),
        total_encryptions: state.total_encryptions(),
        total_decryptions: state.total_decryptions(),
        stored_ciphertexts: state.stored_ciphertexts().await,
        uptime_secs: state.uptime_secs(),
    };

    (StatusCode::OK, Json(response))
}
