//! Encryption, event ingestion, and authorized decryption endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use crate::services::authorization::AuthorizationError;
use crate::services::keystore::{self, IngestOutcome};
use crate::state::AppState;
use crate::types::{
    EncryptRequest, EncryptResponse, ErrorCode, ErrorResponse, IngestOpsRequest,
    IngestOpsResponse, UserDecryptRequest, UserDecryptResponse,
};

/// Create FHE routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/encrypt", post(encrypt))
        .route("/ops", post(ingest_ops))
        .route("/user-decrypt", post(user_decrypt))
}

fn error(status: StatusCode, code: ErrorCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            code,
            message,
            details: None,
        }),
    )
}

/// Encrypt a 32-bit identity value for (contract, account)
/// POST /api/v1/encrypt
#[instrument(skip(state, request))]
async fn encrypt(
    State(state): State<AppState>,
    Json(request): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.contract_id.is_empty() || request.account_id.is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "contract_id and account_id must be non-empty".to_string(),
        ));
    }

    let handle = state.keystore().write().await.create_ciphertext(
        &request.contract_id,
        &request.account_id,
        request.value,
    );
    let proof =
        state
            .kms()
            .sign_input_attestation(&handle, &request.contract_id, &request.account_id);

    state.increment_encryptions();

    let response = EncryptResponse {
        request_id: uuid::Uuid::new_v4().to_string(),
        handle: hex::encode(handle),
        input_proof: hex::encode(proof),
    };

    info!(
        request_id = %response.request_id,
        contract_id = %request.contract_id,
        account_id = %request.account_id,
        "Ciphertext created"
    );

    Ok(Json(response))
}

/// Ingest registry log lines, executing FHE ops and recording grants
/// POST /api/v1/ops
#[instrument(skip(state, request))]
async fn ingest_ops(
    State(state): State<AppState>,
    Json(request): Json<IngestOpsRequest>,
) -> Result<Json<IngestOpsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut keystore = state.keystore().write().await;

    let mut executed = 0;
    let mut granted = 0;
    let mut skipped = 0;

    for line in &request.events {
        match keystore.ingest_event(line) {
            Ok(IngestOutcome::Executed) => executed += 1,
            Ok(IngestOutcome::Granted) => granted += 1,
            Ok(IngestOutcome::Skipped) => skipped += 1,
            Err(e) => {
                warn!(error = %e, "Rejected event line");
                return Err(error(
                    StatusCode::BAD_REQUEST,
                    ErrorCode::InvalidEvent,
                    e.to_string(),
                ));
            }
        }
    }

    info!(executed, granted, skipped, "Event stream ingested");

    Ok(Json(IngestOpsResponse {
        executed,
        granted,
        skipped,
    }))
}

/// Decrypt ciphertexts under a time-boxed session authorization
/// POST /api/v1/user-decrypt
#[instrument(skip(state, request))]
async fn user_decrypt(
    State(state): State<AppState>,
    Json(request): Json<UserDecryptRequest>,
) -> Result<Json<UserDecryptResponse>, (StatusCode, Json<ErrorResponse>)> {
    let auth = &request.authorization;

    let now = chrono::Utc::now().timestamp();
    if let Err(e) = auth.validate(now) {
        let code = match e {
            AuthorizationError::Expired | AuthorizationError::NotYetValid => {
                ErrorCode::AuthorizationExpired
            }
            _ => ErrorCode::NotAuthorized,
        };
        warn!(error = %e, account_id = %auth.account_id, "Rejected decryption authorization");
        return Err(error(StatusCode::UNAUTHORIZED, code, e.to_string()));
    }

    let keystore = state.keystore().read().await;
    let mut plaintexts = HashMap::new();

    for handle_ref in &request.handles {
        if let Err(e) = auth.assert_covers(&handle_ref.contract_id) {
            return Err(error(
                StatusCode::FORBIDDEN,
                ErrorCode::NotAuthorized,
                e.to_string(),
            ));
        }

        let handle = keystore::decode_handle(&handle_ref.handle).map_err(|e| {
            error(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                e.to_string(),
            )
        })?;

        if !keystore.is_allowed(&handle, &auth.account_id) {
            warn!(
                handle = %handle_ref.handle,
                account_id = %auth.account_id,
                "No access grant for handle"
            );
            return Err(error(
                StatusCode::FORBIDDEN,
                ErrorCode::NotAuthorized,
                format!("{} holds no grant on {}", auth.account_id, handle_ref.handle),
            ));
        }

        let plaintext = keystore.plaintext(&handle).ok_or_else(|| {
            error(
                StatusCode::NOT_FOUND,
                ErrorCode::UnknownHandle,
                format!("No ciphertext behind {}", handle_ref.handle),
            )
        })?;

        plaintexts.insert(hex::encode(handle), plaintext.to_json());
    }

    state.increment_decryptions();

    info!(
        account_id = %auth.account_id,
        handles = request.handles.len(),
        "Decryption served"
    );

    Ok(Json(UserDecryptResponse { plaintexts }))
}
