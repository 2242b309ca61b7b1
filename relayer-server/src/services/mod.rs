//! Services for the Relayer Server
//!
//! Contains the core business logic: input attestations, the development
//! keystore, and decryption authorizations.

pub mod authorization;
pub mod keystore;
pub mod kms;

pub use authorization::DecryptionAuthorization;
pub use keystore::Keystore;
pub use kms::KmsSigner;
