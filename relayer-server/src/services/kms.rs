//! Coprocessor Key Service
//!
//! Holds the Ed25519 key the registry contract trusts and signs input
//! attestations with it. An attestation binds a ciphertext handle to the
//! contract it was encrypted for and the account that submitted it; the
//! contract checks the signature with its `ed25519_verify` host function.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Domain separator for input attestations. Must match the registry
/// contract's derivation byte for byte.
const INPUT_ATTESTATION_DOMAIN: &[u8] = b"encrypted-identity:input:v1";

#[derive(Error, Debug)]
pub enum KmsError {
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// Input attestation signer
pub struct KmsSigner {
    signing_key: SigningKey,
}

impl KmsSigner {
    /// Create a new signer from raw key bytes
    pub fn new(secret_key_bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret_key_bytes),
        }
    }

    /// Create from environment (loads from KMS_SECRET_KEY)
    pub fn from_env() -> Result<Self, KmsError> {
        let secret_hex = std::env::var("KMS_SECRET_KEY").unwrap_or_else(|_| {
            // Generate random key for development
            let key: [u8; 32] = rand::random();
            hex::encode(key)
        });

        let secret_bytes: [u8; 32] = hex::decode(&secret_hex)
            .map_err(|e| KmsError::InvalidSecretKey(format!("Invalid secret key hex: {e}")))?
            .try_into()
            .map_err(|_| KmsError::InvalidSecretKey("Secret key must be 32 bytes".into()))?;

        Ok(Self::new(&secret_bytes))
    }

    /// Get the coprocessor's public key
    pub fn public_key(&self) -> [u8; 32] {
        let verifying_key: VerifyingKey = self.signing_key.verifying_key();
        verifying_key.to_bytes()
    }

    /// Sign an input attestation for (handle, contract, caller)
    pub fn sign_input_attestation(
        &self,
        handle: &[u8; 32],
        contract_id: &str,
        account_id: &str,
    ) -> [u8; 64] {
        let digest = Self::input_attestation_digest(handle, contract_id, account_id);
        self.signing_key.sign(&digest).to_bytes()
    }

    /// Digest covered by an input attestation
    pub fn input_attestation_digest(
        handle: &[u8; 32],
        contract_id: &str,
        account_id: &str,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(INPUT_ATTESTATION_DOMAIN);
        hasher.update(handle);
        hasher.update(contract_id.as_bytes());
        hasher.update(b":");
        hasher.update(account_id.as_bytes());
        hasher.finalize().into()
    }

    /// Verify an input attestation (used in tests and by tooling)
    pub fn verify_input_attestation(
        public_key: &[u8; 32],
        signature: &[u8; 64],
        handle: &[u8; 32],
        contract_id: &str,
        account_id: &str,
    ) -> bool {
        use ed25519_dalek::{Signature, Verifier};

        let verifying_key = match VerifyingKey::from_bytes(public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };

        let digest = Self::input_attestation_digest(handle, contract_id, account_id);
        let signature = Signature::from_bytes(signature);

        verifying_key.verify(&digest, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_attestation() {
        let signer = KmsSigner::new(&[1u8; 32]);
        let handle = [5u8; 32];

        let signature = signer.sign_input_attestation(&handle, "registry.near", "alice.near");

        assert!(KmsSigner::verify_input_attestation(
            &signer.public_key(),
            &signature,
            &handle,
            "registry.near",
            "alice.near",
        ));
    }

    #[test]
    fn test_attestation_does_not_transfer() {
        let signer = KmsSigner::new(&[1u8; 32]);
        let handle = [5u8; 32];

        let signature = signer.sign_input_attestation(&handle, "registry.near", "alice.near");

        // Same handle, different caller: signature must not validate.
        assert!(!KmsSigner::verify_input_attestation(
            &signer.public_key(),
            &signature,
            &handle,
            "registry.near",
            "bob.near",
        ));
        // Different contract: same.
        assert!(!KmsSigner::verify_input_attestation(
            &signer.public_key(),
            &signature,
            &handle,
            "other.near",
            "alice.near",
        ));
    }

    #[test]
    fn test_consistent_public_key() {
        let signer = KmsSigner::new(&[42u8; 32]);

        let pk1 = signer.public_key();
        let pk2 = signer.public_key();

        assert_eq!(pk1, pk2);
    }
}
