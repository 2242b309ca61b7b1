//! # Encrypted Identity Registry for NEAR Protocol
//!
//! Stores one encrypted identity value per account and lets that account
//! later prove, under encryption, that a freshly supplied encrypted value
//! matches the stored one.
//!
//! ## Architecture
//! - Identity values are ciphertexts owned by an external FHE coprocessor
//!   and referenced on-chain by opaque 32-byte handles; the contract never
//!   sees plaintext.
//! - Input proofs are coprocessor attestations binding a handle to this
//!   contract and the submitting account, checked with the `ed25519_verify`
//!   host function against the coprocessor key injected at initialization.
//! - Homomorphic equality is requested through the contract's event stream
//!   and executed off-chain; the caller decrypts the result through the
//!   relayer using the access grant issued here.
//!
//! ## Registration lifecycle
//! A record exists for an account iff that account has registered. The
//! transition is one-way: there is no update, rotation, or unregister
//! operation, so an identity binding can never be silently replaced.

mod acl;
mod events;
mod fhe;

pub use acl::CiphertextAcl;
pub use events::{FheAllowEvent, FheOpEvent, FHE_ALLOW_PREFIX, FHE_OP_PREFIX};
pub use fhe::{
    eq_result_handle, input_attestation_digest, CiphertextHandle, PROTOCOL_ID,
};

use near_sdk::borsh::{BorshDeserialize, BorshSerialize};
use near_sdk::collections::LookupMap;
use near_sdk::serde::{Deserialize, Serialize};
use near_sdk::{env, near_bindgen, AccountId, BorshStorageKey, NearSchema, PanicOnDefault};

/// Storage keys for collections
#[derive(BorshStorageKey, BorshSerialize)]
#[borsh(crate = "near_sdk::borsh")]
pub enum StorageKey {
    Registrations,
    AclGrants,
}

/// A stored encrypted identity. A record exists iff the account is
/// registered, so "ciphertext exists iff registered" holds structurally.
#[derive(BorshDeserialize, BorshSerialize, Serialize, Deserialize, Clone, NearSchema)]
#[borsh(crate = "near_sdk::borsh")]
#[serde(crate = "near_sdk::serde")]
pub struct RegisteredIdentity {
    /// Ciphertext handle of the identity value (encrypted u32).
    pub ciphertext: CiphertextHandle,
    /// Registration timestamp (nanoseconds).
    pub registered_at: u64,
}

/// Main registry contract
#[near_bindgen]
#[derive(BorshDeserialize, BorshSerialize, PanicOnDefault)]
#[borsh(crate = "near_sdk::borsh")]
pub struct IdentityRegistry {
    /// Contract owner (may rotate the coprocessor key)
    pub owner: AccountId,
    /// Ed25519 key the coprocessor signs input attestations with
    pub coprocessor_public_key: [u8; 32],
    /// One encrypted identity per account, write-once
    pub registrations: LookupMap<AccountId, RegisteredIdentity>,
    /// Access grants per ciphertext handle
    pub acl: CiphertextAcl,
    /// Total successful registrations
    pub total_registrations: u64,
    /// Total verification requests served
    pub total_verifications: u64,
}

#[near_bindgen]
impl IdentityRegistry {
    /// Initialize the registry with the coprocessor attestation key
    #[init]
    pub fn new(owner: AccountId, coprocessor_public_key: Vec<u8>) -> Self {
        assert_eq!(
            coprocessor_public_key.len(),
            32,
            "Coprocessor public key must be 32 bytes"
        );
        let mut key = [0u8; 32];
        key.copy_from_slice(&coprocessor_public_key);

        env::log_str("Identity registry initialized");

        Self {
            owner,
            coprocessor_public_key: key,
            registrations: LookupMap::new(StorageKey::Registrations),
            acl: CiphertextAcl::new(),
            total_registrations: 0,
            total_verifications: 0,
        }
    }

    // ==================== REGISTRATION ====================

    /// Register the caller's encrypted identity. Write-once per account.
    ///
    /// `encrypted_identity` is a ciphertext handle produced by the
    /// encryption collaborator for this contract and this caller;
    /// `input_proof` is the coprocessor attestation for that binding.
    ///
    /// Grants access on the stored ciphertext to the contract account (for
    /// future `verify` calls) and to the caller (for later decryption).
    pub fn register(&mut self, encrypted_identity: CiphertextHandle, input_proof: Vec<u8>) {
        let caller = env::predecessor_account_id();
        assert!(
            self.registrations.get(&caller).is_none(),
            "User already registered"
        );
        assert!(
            fhe::verify_input_proof(
                &encrypted_identity,
                &input_proof,
                &env::current_account_id(),
                &caller,
                &self.coprocessor_public_key,
            ),
            "Invalid input proof"
        );

        let record = RegisteredIdentity {
            ciphertext: encrypted_identity,
            registered_at: env::block_timestamp(),
        };
        self.registrations.insert(&caller, &record);

        self.acl.allow(&encrypted_identity, &env::current_account_id());
        self.acl.allow(&encrypted_identity, &caller);

        self.total_registrations += 1;

        env::log_str(&format!("Identity registered for {}", caller));
    }

    // ==================== VERIFICATION ====================

    /// Compare a fresh encrypted value against the caller's stored identity.
    ///
    /// Returns the handle of an encrypted boolean; the comparison itself is
    /// executed by the off-chain coprocessor from the emitted operation
    /// record. Only the caller (and the contract) receive access to the
    /// result, so the outcome stays private.
    ///
    /// Repeatable with any candidate value; the stored identity is read,
    /// never written.
    pub fn verify(
        &mut self,
        encrypted_identity: CiphertextHandle,
        input_proof: Vec<u8>,
    ) -> CiphertextHandle {
        let caller = env::predecessor_account_id();
        let record = self.registrations.get(&caller).expect("User not registered");
        assert!(
            fhe::verify_input_proof(
                &encrypted_identity,
                &input_proof,
                &env::current_account_id(),
                &caller,
                &self.coprocessor_public_key,
            ),
            "Invalid input proof"
        );

        let result = fhe::eq_result_handle(&record.ciphertext, &encrypted_identity);
        events::emit_eq(&record.ciphertext, &encrypted_identity, &result);

        self.acl.allow(&result, &env::current_account_id());
        self.acl.allow(&result, &caller);

        self.total_verifications += 1;

        env::log_str(&format!("Verification requested by {}", caller));

        result
    }

    // ==================== ADMIN OPERATIONS ====================

    /// Rotate the coprocessor attestation key (owner only)
    pub fn update_coprocessor_key(&mut self, coprocessor_public_key: Vec<u8>) {
        self.assert_owner();
        assert_eq!(
            coprocessor_public_key.len(),
            32,
            "Coprocessor public key must be 32 bytes"
        );
        self.coprocessor_public_key
            .copy_from_slice(&coprocessor_public_key);
        env::log_str(&format!(
            "Coprocessor key updated to {}",
            hex::encode(self.coprocessor_public_key)
        ));
    }

    /// Transfer ownership
    pub fn transfer_ownership(&mut self, new_owner: AccountId) {
        self.assert_owner();
        self.owner = new_owner.clone();
        env::log_str(&format!("Ownership transferred to {}", new_owner));
    }

    // ==================== VIEW METHODS ====================

    /// Whether `account_id` has registered an identity
    pub fn is_registered(&self, account_id: AccountId) -> bool {
        self.registrations.get(&account_id).is_some()
    }

    /// Stored ciphertext handle for `account_id`, if registered.
    /// Opaque without decryption rights.
    pub fn get_encrypted_identity(&self, account_id: AccountId) -> Option<CiphertextHandle> {
        self.registrations.get(&account_id).map(|r| r.ciphertext)
    }

    /// Full registration record for `account_id`, if registered
    pub fn get_registration(&self, account_id: AccountId) -> Option<RegisteredIdentity> {
        self.registrations.get(&account_id)
    }

    /// Whether `account_id` holds an access grant on `handle`.
    /// Consulted by the relayer before serving a decryption.
    pub fn is_allowed(&self, handle: CiphertextHandle, account_id: AccountId) -> bool {
        self.acl.is_allowed(&handle, &account_id)
    }

    /// Static protocol identifier
    pub fn protocol_id(&self) -> u64 {
        PROTOCOL_ID
    }

    /// Get owner
    pub fn get_owner(&self) -> AccountId {
        self.owner.clone()
    }

    /// Current coprocessor attestation key
    pub fn get_coprocessor_public_key(&self) -> Vec<u8> {
        self.coprocessor_public_key.to_vec()
    }

    /// Get registration/verification counters
    pub fn get_stats(&self) -> (u64, u64) {
        (self.total_registrations, self.total_verifications)
    }

    // ==================== INTERNAL ====================

    fn assert_owner(&self) {
        assert_eq!(
            env::predecessor_account_id(),
            self.owner,
            "Only owner can call this"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use near_sdk::test_utils::{get_logs, VMContextBuilder};
    use near_sdk::testing_env;
    use sha2::{Digest, Sha256};
    use std::collections::{HashMap, HashSet};

    const REGISTRY: &str = "registry.near";
    const OWNER: &str = "owner.near";
    const ALICE: &str = "alice.near";
    const BOB: &str = "bob.near";

    fn account(s: &str) -> AccountId {
        s.parse().unwrap()
    }

    fn get_context(predecessor: AccountId) -> VMContextBuilder {
        let mut builder = VMContextBuilder::new();
        builder
            .current_account_id(account(REGISTRY))
            .predecessor_account_id(predecessor);
        builder
    }

    /// Test double for the external coprocessor/relayer pair: encrypts
    /// inputs, signs attestations, ingests the contract's event stream,
    /// executes `eq` operations, and honors access grants when decrypting.
    struct MockCoprocessor {
        signing_key: SigningKey,
        values: HashMap<CiphertextHandle, u32>,
        results: HashMap<CiphertextHandle, bool>,
        grants: HashMap<CiphertextHandle, HashSet<AccountId>>,
        counter: u32,
    }

    impl MockCoprocessor {
        fn new() -> Self {
            Self {
                signing_key: SigningKey::from_bytes(&[7u8; 32]),
                values: HashMap::new(),
                results: HashMap::new(),
                grants: HashMap::new(),
                counter: 0,
            }
        }

        fn public_key(&self) -> Vec<u8> {
            self.signing_key.verifying_key().to_bytes().to_vec()
        }

        /// Encrypt a 32-bit value for (contract, user), returning the handle
        /// and the input proof the contract expects.
        fn encrypt_u32(
            &mut self,
            contract: &AccountId,
            user: &AccountId,
            value: u32,
        ) -> (CiphertextHandle, Vec<u8>) {
            let mut hasher = Sha256::new();
            hasher.update(b"encrypted-identity:ct:v1");
            hasher.update(contract.as_bytes());
            hasher.update(b":");
            hasher.update(user.as_bytes());
            hasher.update(self.counter.to_le_bytes());
            self.counter += 1;
            let handle: CiphertextHandle = hasher.finalize().into();

            self.values.insert(handle, value);

            let digest = input_attestation_digest(&handle, contract, user);
            let proof = self.signing_key.sign(&digest).to_bytes().to_vec();
            (handle, proof)
        }

        /// Consume the contract's log output, executing operation records
        /// and recording grants.
        fn ingest(&mut self, logs: &[String]) {
            for line in logs {
                if let Some(json) = line.strip_prefix(FHE_OP_PREFIX) {
                    let event: FheOpEvent = serde_json::from_str(json).unwrap();
                    assert_eq!(event.op, "eq", "unsupported op in event stream");
                    let lhs = decode_handle(&event.lhs);
                    let rhs = decode_handle(&event.rhs);
                    let result = decode_handle(&event.result);
                    assert_eq!(
                        result,
                        eq_result_handle(&lhs, &rhs),
                        "result handle does not match derivation"
                    );
                    let lhs_value = self.values[&lhs];
                    let rhs_value = self.values[&rhs];
                    self.results.insert(result, lhs_value == rhs_value);
                } else if let Some(json) = line.strip_prefix(FHE_ALLOW_PREFIX) {
                    let event: FheAllowEvent = serde_json::from_str(json).unwrap();
                    self.grants
                        .entry(decode_handle(&event.handle))
                        .or_default()
                        .insert(event.account);
                }
            }
        }

        /// Decrypt an encrypted boolean for `account`, refusing without a
        /// grant (mirrors the relayer's authorization check).
        fn user_decrypt_bool(&self, handle: &CiphertextHandle, account: &AccountId) -> Option<bool> {
            if !self.grants.get(handle).is_some_and(|g| g.contains(account)) {
                return None;
            }
            self.results.get(handle).copied()
        }
    }

    fn decode_handle(hex_str: &str) -> CiphertextHandle {
        let bytes = hex::decode(hex_str).unwrap();
        bytes.try_into().unwrap()
    }

    fn new_registry(mock: &MockCoprocessor) -> IdentityRegistry {
        IdentityRegistry::new(account(OWNER), mock.public_key())
    }

    #[test]
    fn test_new_contract() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(OWNER)).build());

        let contract = new_registry(&mock);
        assert_eq!(contract.get_owner(), account(OWNER));
        assert_eq!(contract.protocol_id(), PROTOCOL_ID);
        assert_eq!(contract.get_stats(), (0, 0));
        assert_eq!(contract.get_coprocessor_public_key(), mock.public_key());
    }

    #[test]
    #[should_panic(expected = "Coprocessor public key must be 32 bytes")]
    fn test_new_rejects_short_key() {
        testing_env!(get_context(account(OWNER)).build());
        IdentityRegistry::new(account(OWNER), vec![1, 2, 3]);
    }

    #[test]
    fn test_unregistered_account_has_no_record() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let contract = new_registry(&mock);
        assert!(!contract.is_registered(account(ALICE)));
        assert!(contract.get_encrypted_identity(account(ALICE)).is_none());
        assert!(contract.get_registration(account(ALICE)).is_none());
    }

    #[test]
    fn test_register_stores_ciphertext_and_grants_access() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);

        contract.register(handle, proof);

        assert!(contract.is_registered(account(ALICE)));
        assert_eq!(contract.get_encrypted_identity(account(ALICE)), Some(handle));
        assert!(contract.is_allowed(handle, account(REGISTRY)));
        assert!(contract.is_allowed(handle, account(ALICE)));
        assert!(!contract.is_allowed(handle, account(BOB)));
        assert_eq!(contract.get_stats(), (1, 0));

        // Grant events must reach the event stream.
        let logs = get_logs();
        let grant_count = logs
            .iter()
            .filter(|l| l.starts_with(FHE_ALLOW_PREFIX))
            .count();
        assert_eq!(grant_count, 2);
    }

    #[test]
    #[should_panic(expected = "User already registered")]
    fn test_double_register_rejected() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(handle, proof);

        let (handle2, proof2) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 67890);
        contract.register(handle2, proof2);
    }

    #[test]
    #[should_panic(expected = "Invalid input proof")]
    fn test_register_rejects_proof_for_other_caller() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        // Proof bound to bob, submitted by alice.
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(BOB), 12345);
        contract.register(handle, proof);
    }

    #[test]
    #[should_panic(expected = "Invalid input proof")]
    fn test_register_rejects_garbage_proof() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        contract.register([9u8; 32], vec![0u8; 64]);
    }

    #[test]
    #[should_panic(expected = "User not registered")]
    fn test_verify_requires_registration() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.verify(handle, proof);
    }

    #[test]
    fn test_verify_matching_identity_decrypts_true() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(handle, proof);
        mock.ingest(&get_logs());

        testing_env!(get_context(account(ALICE)).build());
        let (candidate, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        let result = contract.verify(candidate, proof);
        mock.ingest(&get_logs());

        assert_eq!(mock.user_decrypt_bool(&result, &account(ALICE)), Some(true));
        assert_eq!(contract.get_stats(), (1, 1));
    }

    #[test]
    fn test_verify_mismatched_identity_decrypts_false() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(handle, proof);
        mock.ingest(&get_logs());

        testing_env!(get_context(account(ALICE)).build());
        let (candidate, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 99999);
        let result = contract.verify(candidate, proof);
        mock.ingest(&get_logs());

        assert_eq!(mock.user_decrypt_bool(&result, &account(ALICE)), Some(false));
    }

    #[test]
    fn test_verify_is_repeatable_and_reads_only() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (stored, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(stored, proof);
        mock.ingest(&get_logs());

        // Wrong value, then the right one again, then the same candidate twice.
        testing_env!(get_context(account(ALICE)).build());
        let (wrong, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 99999);
        let wrong_result = contract.verify(wrong, proof);
        mock.ingest(&get_logs());

        testing_env!(get_context(account(ALICE)).build());
        let (right, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        let right_result = contract.verify(right, proof.clone());
        mock.ingest(&get_logs());

        testing_env!(get_context(account(ALICE)).build());
        let repeat_result = contract.verify(right, proof);
        mock.ingest(&get_logs());

        assert_eq!(mock.user_decrypt_bool(&wrong_result, &account(ALICE)), Some(false));
        assert_eq!(mock.user_decrypt_bool(&right_result, &account(ALICE)), Some(true));
        // Same operands, same result handle.
        assert_eq!(right_result, repeat_result);
        assert_ne!(wrong_result, right_result);
        // Stored record untouched throughout.
        assert_eq!(contract.get_encrypted_identity(account(ALICE)), Some(stored));
    }

    #[test]
    fn test_verify_result_access_is_caller_scoped() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (stored, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(stored, proof);
        mock.ingest(&get_logs());

        testing_env!(get_context(account(ALICE)).build());
        let (candidate, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        let result = contract.verify(candidate, proof);
        mock.ingest(&get_logs());

        assert!(contract.is_allowed(result, account(ALICE)));
        assert!(contract.is_allowed(result, account(REGISTRY)));
        assert!(!contract.is_allowed(result, account(BOB)));
        // The mock relayer refuses to decrypt for a principal without a grant.
        assert_eq!(mock.user_decrypt_bool(&result, &account(BOB)), None);
    }

    #[test]
    fn test_accounts_are_independent() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (handle, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(handle, proof);

        assert!(contract.is_registered(account(ALICE)));
        assert!(!contract.is_registered(account(BOB)));

        testing_env!(get_context(account(BOB)).build());
        let (bob_handle, bob_proof) = mock.encrypt_u32(&account(REGISTRY), &account(BOB), 555);
        contract.register(bob_handle, bob_proof);

        assert!(contract.is_registered(account(BOB)));
        assert_eq!(contract.get_encrypted_identity(account(ALICE)), Some(handle));
        assert_eq!(contract.get_encrypted_identity(account(BOB)), Some(bob_handle));
        assert_eq!(contract.get_stats(), (2, 0));
    }

    #[test]
    fn test_verify_emits_eq_op_for_coprocessor() {
        let mut mock = MockCoprocessor::new();
        testing_env!(get_context(account(ALICE)).build());

        let mut contract = new_registry(&mock);
        let (stored, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        contract.register(stored, proof);

        testing_env!(get_context(account(ALICE)).build());
        let (candidate, proof) = mock.encrypt_u32(&account(REGISTRY), &account(ALICE), 12345);
        let result = contract.verify(candidate, proof);

        let logs = get_logs();
        let op_line = logs
            .iter()
            .find(|l| l.starts_with(FHE_OP_PREFIX))
            .expect("no op event emitted");
        let event: FheOpEvent =
            serde_json::from_str(op_line.strip_prefix(FHE_OP_PREFIX).unwrap()).unwrap();
        assert_eq!(event.op, "eq");
        assert_eq!(event.lhs, hex::encode(stored));
        assert_eq!(event.rhs, hex::encode(candidate));
        assert_eq!(event.result, hex::encode(result));
    }

    #[test]
    fn test_update_coprocessor_key() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(OWNER)).build());

        let mut contract = new_registry(&mock);
        let new_key = vec![9u8; 32];
        contract.update_coprocessor_key(new_key.clone());
        assert_eq!(contract.get_coprocessor_public_key(), new_key);
    }

    #[test]
    #[should_panic(expected = "Only owner can call this")]
    fn test_update_coprocessor_key_requires_owner() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(OWNER)).build());
        let mut contract = new_registry(&mock);

        testing_env!(get_context(account(ALICE)).build());
        contract.update_coprocessor_key(vec![9u8; 32]);
    }

    #[test]
    fn test_transfer_ownership() {
        let mock = MockCoprocessor::new();
        testing_env!(get_context(account(OWNER)).build());

        let mut contract = new_registry(&mock);
        contract.transfer_ownership(account(BOB));
        assert_eq!(contract.get_owner(), account(BOB));
    }
}
