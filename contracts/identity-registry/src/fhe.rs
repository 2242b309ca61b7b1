//! Symbolic FHE helpers: input attestations and result-handle derivation.
//!
//! The registry never sees plaintext. Ciphertexts live with the external
//! coprocessor and are referenced on-chain by opaque 32-byte handles. The
//! contract's cryptographic obligations are small: check that a submitted
//! handle was encrypted for this contract on behalf of this caller, and
//! derive the handle under which the coprocessor will publish the result of
//! an operation the contract requests.

use near_sdk::{env, AccountId};
use sha2::{Digest, Sha256};

/// Opaque reference to a ciphertext held by the coprocessor.
pub type CiphertextHandle = [u8; 32];

/// Static protocol identifier reported by `protocol_id`.
pub const PROTOCOL_ID: u64 = 1;

/// Domain separator for input attestations.
const INPUT_ATTESTATION_DOMAIN: &[u8] = b"encrypted-identity:input:v1";

/// Domain separator for encrypted-equality result handles.
const EQ_RESULT_DOMAIN: &[u8] = b"encrypted-identity:eq:v1";

/// Digest the coprocessor signs when attesting that `handle` was encrypted
/// for `contract` on behalf of `caller`.
pub fn input_attestation_digest(
    handle: &CiphertextHandle,
    contract: &AccountId,
    caller: &AccountId,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(INPUT_ATTESTATION_DOMAIN);
    hasher.update(handle);
    hasher.update(contract.as_bytes());
    hasher.update(b":");
    hasher.update(caller.as_bytes());
    hasher.finalize().into()
}

/// Check an input proof (Ed25519 attestation) against the coprocessor key.
///
/// Returns false for proofs of the wrong length or signatures over anything
/// other than the (handle, contract, caller) binding digest.
pub fn verify_input_proof(
    handle: &CiphertextHandle,
    proof: &[u8],
    contract: &AccountId,
    caller: &AccountId,
    coprocessor_public_key: &[u8; 32],
) -> bool {
    let signature: [u8; 64] = match proof.try_into() {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let digest = input_attestation_digest(handle, contract, caller);
    env::ed25519_verify(&signature, &digest, coprocessor_public_key)
}

/// Result handle for an encrypted equality between two operand handles.
///
/// Deterministic: repeating the same comparison yields the same handle, so
/// access grants are idempotent and the coprocessor computes each distinct
/// comparison exactly once.
pub fn eq_result_handle(lhs: &CiphertextHandle, rhs: &CiphertextHandle) -> CiphertextHandle {
    let mut hasher = Sha256::new();
    hasher.update(EQ_RESULT_DOMAIN);
    hasher.update(lhs);
    hasher.update(rhs);
    hasher.finalize().into()
}
