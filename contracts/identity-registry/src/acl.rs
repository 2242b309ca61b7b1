//! Per-ciphertext access control.
//!
//! Every ciphertext handle carries an explicit capability list: a principal
//! appears in a handle's list iff it may operate on (the contract) or
//! decrypt (a user, via the relayer) that ciphertext. Grants are issued by
//! `register` and `verify` and are never revoked.

use near_sdk::borsh::{BorshDeserialize, BorshSerialize};
use near_sdk::collections::LookupMap;
use near_sdk::AccountId;

use crate::events;
use crate::fhe::CiphertextHandle;
use crate::StorageKey;

#[derive(BorshDeserialize, BorshSerialize)]
#[borsh(crate = "near_sdk::borsh")]
pub struct CiphertextAcl {
    grants: LookupMap<CiphertextHandle, Vec<AccountId>>,
}

impl CiphertextAcl {
    pub fn new() -> Self {
        Self {
            grants: LookupMap::new(StorageKey::AclGrants),
        }
    }

    /// Grant `account` access to `handle`, emitting the grant event the
    /// off-chain coprocessor consumes. Repeated grants are no-ops.
    pub fn allow(&mut self, handle: &CiphertextHandle, account: &AccountId) {
        let mut principals = self.grants.get(handle).unwrap_or_default();
        if principals.contains(account) {
            return;
        }
        principals.push(account.clone());
        self.grants.insert(handle, &principals);
        events::emit_allow(handle, account);
    }

    pub fn is_allowed(&self, handle: &CiphertextHandle, account: &AccountId) -> bool {
        self.grants
            .get(handle)
            .map_or(false, |principals| principals.contains(account))
    }
}
