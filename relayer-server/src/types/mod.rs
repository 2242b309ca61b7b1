//! Request/response types for the relayer API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::authorization::DecryptionAuthorization;

/// Error codes returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request failed validation
    InvalidRequest,
    /// Authorization missing, malformed, or not covering the request
    NotAuthorized,
    /// Authorization window has closed (or not opened yet)
    AuthorizationExpired,
    /// No ciphertext behind the requested handle
    UnknownHandle,
    /// Event stream could not be applied
    InvalidEvent,
    /// Unexpected server-side failure
    InternalError,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Request to encrypt a 32-bit identity value
/// POST /api/v1/encrypt
#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    /// Contract the ciphertext is bound to
    pub contract_id: String,
    /// Account submitting the ciphertext
    pub account_id: String,
    /// Plaintext value to encrypt
    pub value: u32,
}

/// Response carrying the ciphertext handle and its input proof
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Request identifier for correlation
    pub request_id: String,
    /// Hex-encoded ciphertext handle
    pub handle: String,
    /// Hex-encoded input proof (coprocessor attestation)
    pub input_proof: String,
}

/// Request to ingest contract log lines
/// POST /api/v1/ops
#[derive(Debug, Deserialize)]
pub struct IngestOpsRequest {
    /// Raw log lines from registry transactions, in order
    pub events: Vec<String>,
}

/// Summary of an ingestion pass
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestOpsResponse {
    /// Operations executed against the keystore
    pub executed: usize,
    /// Access grants recorded
    pub granted: usize,
    /// Lines carrying no FHE event
    pub skipped: usize,
}

/// A ciphertext handle scoped to the contract that produced it
#[derive(Debug, Serialize, Deserialize)]
pub struct HandleRef {
    /// Hex-encoded ciphertext handle
    pub handle: String,
    /// Contract the handle belongs to
    pub contract_id: String,
}

/// Request to decrypt ciphertexts under a session authorization
/// POST /api/v1/user-decrypt
#[derive(Debug, Deserialize)]
pub struct UserDecryptRequest {
    /// Handles to decrypt
    pub handles: Vec<HandleRef>,
    /// Time-boxed signed session credential
    #[serde(flatten)]
    pub authorization: DecryptionAuthorization,
}

/// Decrypted plaintexts keyed by hex handle
#[derive(Debug, Serialize, Deserialize)]
pub struct UserDecryptResponse {
    pub plaintexts: HashMap<String, serde_json::Value>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub stored_ciphertexts: usize,
    pub uptime_secs: u64,
}

/// Detailed status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    /// Hex-encoded coprocessor public key (what registries are initialized with)
    pub coprocessor_public_key: String,
    pub total_encryptions: u64,
    pub total_decryptions: u64,
    pub stored_ciphertexts: usize,
    pub uptime_secs: u64,
}
