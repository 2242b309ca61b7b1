//! HTTP Routes for the Relayer Server
//!
//! Provides REST API endpoints for encryption, event ingestion, and
//! authorized decryption.

pub mod fhe;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Create all routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .nest("/api/v1", fhe::routes())
        .with_state(state)
}
