//! Application State
//!
//! Shared state for the relayer, accessible from all route handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::services::{Keystore, KmsSigner};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Input attestation signer
    kms: KmsSigner,
    /// Development ciphertext store
    keystore: RwLock<Keystore>,
    /// Total encryptions served
    total_encryptions: AtomicU64,
    /// Total decryption requests served
    total_decryptions: AtomicU64,
    /// Server start time
    start_time: Instant,
}

impl AppState {
    /// Create a new application state
    pub fn new(kms: KmsSigner) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                kms,
                keystore: RwLock::new(Keystore::new()),
                total_encryptions: AtomicU64::new(0),
                total_decryptions: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    /// Get the attestation signer
    pub fn kms(&self) -> &KmsSigner {
        &self.inner.kms
    }

    /// Get the keystore lock
    pub fn keystore(&self) -> &RwLock<Keystore> {
        &self.inner.keystore
    }

    /// Number of ciphertexts currently stored
    pub async fn stored_ciphertexts(&self) -> usize {
        self.inner.keystore.read().await.len()
    }

    /// Get total encryptions served
    pub fn total_encryptions(&self) -> u64 {
        self.inner.total_encryptions.load(Ordering::Relaxed)
    }

    /// Increment encryption counter
    pub fn increment_encryptions(&self) {
        self.inner.total_encryptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total decryption requests served
    pub fn total_decryptions(&self) -> u64 {
        self.inner.total_decryptions.load(Ordering::Relaxed)
    }

    /// Increment decryption counter
    pub fn increment_decryptions(&self) {
        self.inner.total_decryptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }
}
