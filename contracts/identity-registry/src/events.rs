//! Typed log events consumed by the off-chain coprocessor.
//!
//! The contract performs no FHE arithmetic itself. The operations it needs
//! executed, and the access grants it issues, are recorded as JSON log
//! entries with a stable prefix; the coprocessor (and the relayer's
//! development keystore) ingest this stream and act on it.

use near_sdk::serde::{Deserialize, Serialize};
use near_sdk::{log, AccountId};

use crate::fhe::CiphertextHandle;

/// Log prefix for FHE operations awaiting off-chain execution.
pub const FHE_OP_PREFIX: &str = "EVENT_FHE_OP:";

/// Log prefix for ciphertext access grants.
pub const FHE_ALLOW_PREFIX: &str = "EVENT_FHE_ALLOW:";

/// An FHE operation the coprocessor must execute.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(crate = "near_sdk::serde")]
pub struct FheOpEvent {
    /// Operation mnemonic (currently only `eq`).
    pub op: String,
    /// Hex-encoded operand handles.
    pub lhs: String,
    pub rhs: String,
    /// Hex-encoded result handle derived by the contract.
    pub result: String,
}

/// An access grant on a ciphertext handle.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(crate = "near_sdk::serde")]
pub struct FheAllowEvent {
    /// Hex-encoded ciphertext handle.
    pub handle: String,
    /// Principal granted access.
    pub account: AccountId,
}

/// Record an encrypted-equality request in the event stream.
pub fn emit_eq(lhs: &CiphertextHandle, rhs: &CiphertextHandle, result: &CiphertextHandle) {
    let event = FheOpEvent {
        op: "eq".to_string(),
        lhs: hex::encode(lhs),
        rhs: hex::encode(rhs),
        result: hex::encode(result),
    };
    log!("{}{}", FHE_OP_PREFIX, serde_json::to_string(&event).unwrap());
}

/// Record an access grant in the event stream.
pub fn emit_allow(handle: &CiphertextHandle, account: &AccountId) {
    let event = FheAllowEvent {
        handle: hex::encode(handle),
        account: account.clone(),
    };
    log!("{}{}", FHE_ALLOW_PREFIX, serde_json::to_string(&event).unwrap());
}
