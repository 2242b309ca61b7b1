//! Decryption Authorizations
//!
//! A user decryption request carries a time-boxed, signed session
//! credential: an Ed25519 session key, the account it acts for, the
//! contracts it covers, and a validity window, all bound together by a
//! signature over a domain-separated digest. The relayer refuses to serve
//! plaintexts outside the window or for contracts the credential does not
//! name; per-handle access is checked separately against the ingested
//! grant stream.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Domain separator for decryption-session signatures.
const AUTHORIZATION_DOMAIN: &[u8] = b"encrypted-identity:user-decrypt:v1";

/// Longest session a credential may request.
pub const MAX_DURATION_DAYS: u32 = 365;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum AuthorizationError {
    #[error("Invalid session public key: {0}")]
    InvalidKey(String),
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),
    #[error("Signature does not match authorization")]
    SignatureMismatch,
    #[error("Invalid session duration: {0} days")]
    InvalidDuration(u32),
    #[error("Authorization not yet valid")]
    NotYetValid,
    #[error("Authorization expired")]
    Expired,
    #[error("Contract not covered by authorization: {0}")]
    ContractNotCovered(String),
}

/// Time-boxed signed decryption credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    /// Hex-encoded Ed25519 session public key
    pub public_key: String,
    /// Hex-encoded signature over the authorization digest
    pub signature: String,
    /// Contracts whose ciphertexts this session may decrypt
    pub contract_ids: Vec<String>,
    /// Account the session acts for
    pub account_id: String,
    /// Session start (unix seconds)
    pub start_timestamp: i64,
    /// Session length in days
    pub duration_days: u32,
}

impl DecryptionAuthorization {
    /// Digest the session key signs
    pub fn digest(
        public_key: &[u8; 32],
        account_id: &str,
        contract_ids: &[String],
        start_timestamp: i64,
        duration_days: u32,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(AUTHORIZATION_DOMAIN);
        hasher.update(public_key);
        hasher.update(account_id.as_bytes());
        for contract_id in contract_ids {
            hasher.update(b":");
            hasher.update(contract_id.as_bytes());
        }
        hasher.update(start_timestamp.to_le_bytes());
        hasher.update(duration_days.to_le_bytes());
        hasher.finalize().into()
    }

    /// Build and sign a credential with the given session key. Used by
    /// tests and client tooling.
    pub fn sign(
        session_key: &SigningKey,
        account_id: &str,
        contract_ids: Vec<String>,
        start_timestamp: i64,
        duration_days: u32,
    ) -> Self {
        let public_key = session_key.verifying_key().to_bytes();
        let digest = Self::digest(
            &public_key,
            account_id,
            &contract_ids,
            start_timestamp,
            duration_days,
        );
        let signature = session_key.sign(&digest);

        Self {
            public_key: hex::encode(public_key),
            signature: hex::encode(signature.to_bytes()),
            contract_ids,
            account_id: account_id.to_string(),
            start_timestamp,
            duration_days,
        }
    }

    /// Validate signature and time window against `now` (unix seconds)
    pub fn validate(&self, now: i64) -> Result<(), AuthorizationError> {
        if self.duration_days == 0 || self.duration_days > MAX_DURATION_DAYS {
            return Err(AuthorizationError::InvalidDuration(self.duration_days));
        }

        let public_key: [u8; 32] = decode_fixed(&self.public_key)
            .map_err(AuthorizationError::InvalidKey)?;
        let signature_bytes: [u8; 64] = decode_fixed(&self.signature)
            .map_err(AuthorizationError::InvalidSignature)?;

        let verifying_key = VerifyingKey::from_bytes(&public_key)
            .map_err(|e| AuthorizationError::InvalidKey(e.to_string()))?;

        let digest = Self::digest(
            &public_key,
            &self.account_id,
            &self.contract_ids,
            self.start_timestamp,
            self.duration_days,
        );
        let signature = Signature::from_bytes(&signature_bytes);
        verifying_key
            .verify(&digest, &signature)
            .map_err(|_| AuthorizationError::SignatureMismatch)?;

        if now < self.start_timestamp {
            return Err(AuthorizationError::NotYetValid);
        }
        let expires_at = self.start_timestamp + self.duration_days as i64 * SECONDS_PER_DAY;
        if now >= expires_at {
            return Err(AuthorizationError::Expired);
        }

        Ok(())
    }

    /// Check a requested contract against the signed contract list
    pub fn assert_covers(&self, contract_id: &str) -> Result<(), AuthorizationError> {
        if self.contract_ids.iter().any(|c| c == contract_id) {
            Ok(())
        } else {
            Err(AuthorizationError::ContractNotCovered(
                contract_id.to_string(),
            ))
        }
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|_| format!("expected {} bytes", N))
}
