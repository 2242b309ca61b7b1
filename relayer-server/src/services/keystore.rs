//! Development Keystore
//!
//! In-memory stand-in for the FHE platform's ciphertext storage and
//! compute. Ciphertexts are plaintext values keyed by handle; homomorphic
//! operations arrive as the registry contract's event stream and are
//! executed here by lookup. The handle shapes and access-grant semantics
//! are the real design object; only the cryptography is mocked, which is
//! what makes this a development relayer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Log prefix for FHE operations emitted by the registry contract.
pub const FHE_OP_PREFIX: &str = "EVENT_FHE_OP:";

/// Log prefix for ciphertext access grants emitted by the contract.
pub const FHE_ALLOW_PREFIX: &str = "EVENT_FHE_ALLOW:";

/// Domain separator for freshly encrypted inputs.
const CIPHERTEXT_DOMAIN: &[u8] = b"encrypted-identity:ct:v1";

/// Domain separator for encrypted-equality result handles. Must match the
/// registry contract's derivation byte for byte.
const EQ_RESULT_DOMAIN: &[u8] = b"encrypted-identity:eq:v1";

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(String),
    #[error("Result handle does not match operand derivation")]
    HandleMismatch,
    #[error("Unsupported operation: {0}")]
    UnsupportedOp(String),
    #[error("Operand is not an encrypted integer")]
    TypeMismatch,
}

/// A decrypted value held by the development keystore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plaintext {
    U32(u32),
    Bool(bool),
}

impl Plaintext {
    /// JSON rendering used in decryption responses
    pub fn to_json(self) -> serde_json::Value {
        match self {
            Plaintext::U32(v) => serde_json::Value::from(v),
            Plaintext::Bool(v) => serde_json::Value::from(v),
        }
    }
}

/// Outcome of ingesting a single log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// An operation was executed against the keystore
    Executed,
    /// An access grant was recorded
    Granted,
    /// The line carried no FHE event
    Skipped,
}

#[derive(Serialize, Deserialize)]
struct OpEvent {
    op: String,
    lhs: String,
    rhs: String,
    result: String,
}

#[derive(Serialize, Deserialize)]
struct AllowEvent {
    handle: String,
    account: String,
}

/// In-memory ciphertext store with per-handle access grants
#[derive(Default)]
pub struct Keystore {
    ciphertexts: HashMap<[u8; 32], Plaintext>,
    grants: HashMap<[u8; 32], HashSet<String>>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt a 32-bit value for (contract, account), returning the
    /// freshly allocated handle.
    pub fn create_ciphertext(&mut self, contract_id: &str, account_id: &str, value: u32) -> [u8; 32] {
        let nonce: [u8; 16] = rand::random();

        let mut hasher = Sha256::new();
        hasher.update(CIPHERTEXT_DOMAIN);
        hasher.update(contract_id.as_bytes());
        hasher.update(b":");
        hasher.update(account_id.as_bytes());
        hasher.update(nonce);
        let handle: [u8; 32] = hasher.finalize().into();

        self.ciphertexts.insert(handle, Plaintext::U32(value));
        handle
    }

    /// Ingest one contract log line. Operation records are executed against
    /// the stored plaintexts; grant records extend the handle's access set.
    /// Non-event lines are skipped so raw transaction logs can be fed in
    /// unfiltered.
    pub fn ingest_event(&mut self, line: &str) -> Result<IngestOutcome, KeystoreError> {
        if let Some(json) = line.strip_prefix(FHE_OP_PREFIX) {
            let event: OpEvent = serde_json::from_str(json)
                .map_err(|e| KeystoreError::MalformedEvent(e.to_string()))?;
            if event.op != "eq" {
                return Err(KeystoreError::UnsupportedOp(event.op));
            }

            let lhs = decode_handle(&event.lhs)?;
            let rhs = decode_handle(&event.rhs)?;
            let result = decode_handle(&event.result)?;

            if result != eq_result_handle(&lhs, &rhs) {
                return Err(KeystoreError::HandleMismatch);
            }

            let lhs_value = self.integer(&lhs)?;
            let rhs_value = self.integer(&rhs)?;
            self.ciphertexts
                .insert(result, Plaintext::Bool(lhs_value == rhs_value));

            Ok(IngestOutcome::Executed)
        } else if let Some(json) = line.strip_prefix(FHE_ALLOW_PREFIX) {
            let event: AllowEvent = serde_json::from_str(json)
                .map_err(|e| KeystoreError::MalformedEvent(e.to_string()))?;
            let handle = decode_handle(&event.handle)?;
            self.grants.entry(handle).or_default().insert(event.account);
            Ok(IngestOutcome::Granted)
        } else {
            Ok(IngestOutcome::Skipped)
        }
    }

    /// Plaintext behind a handle, if the keystore holds it
    pub fn plaintext(&self, handle: &[u8; 32]) -> Option<Plaintext> {
        self.ciphertexts.get(handle).copied()
    }

    /// Whether `account_id` holds an ingested grant on `handle`
    pub fn is_allowed(&self, handle: &[u8; 32], account_id: &str) -> bool {
        self.grants
            .get(handle)
            .is_some_and(|accounts| accounts.contains(account_id))
    }

    /// Number of ciphertexts currently stored
    pub fn len(&self) -> usize {
        self.ciphertexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertexts.is_empty()
    }

    fn integer(&self, handle: &[u8; 32]) -> Result<u32, KeystoreError> {
        match self.ciphertexts.get(handle) {
            Some(Plaintext::U32(v)) => Ok(*v),
            Some(Plaintext::Bool(_)) => Err(KeystoreError::TypeMismatch),
            None => Err(KeystoreError::UnknownHandle(hex::encode(handle))),
        }
    }
}

/// Result handle for an encrypted equality, mirroring the contract's
/// derivation.
pub fn eq_result_handle(lhs: &[u8; 32], rhs: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(EQ_RESULT_DOMAIN);
    hasher.update(lhs);
    hasher.update(rhs);
    hasher.finalize().into()
}

/// Decode a hex handle, accepting an optional 0x prefix
pub fn decode_handle(s: &str) -> Result<[u8; 32], KeystoreError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| KeystoreError::MalformedEvent(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| KeystoreError::MalformedEvent("handle must be 32 bytes".into()))
}
