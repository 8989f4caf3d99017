//! `keyhaven-crypto-core`: cryptographic and password primitives for Keyhaven.
//!
//! Zero I/O, zero async, no logging. Everything here is a pure function of its
//! inputs plus the OS CSPRNG.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod keys;
pub mod vault_format;

pub mod biometric;

pub mod breach;
pub mod password;
pub mod strength;

pub use biometric::{generate_token, seal_vault_key, unseal_vault_key, BiometricToken};
pub use breach::{breach_hash_split, BreachHash};
pub use error::CryptoError;
pub use kdf::{Argon2idParams, KdfPreset};
pub use keys::{derive_and_verify, derive_key, setup, VaultKey};
pub use memory::{SecretBuffer, SecretBytes};
pub use password::{generate_password, CharsetConfig, DEFAULT_PASSWORD_LENGTH};
pub use strength::{analyze, strength, strength_color, strength_label, StrengthAnalysis, StrengthTier};
pub use symmetric::{decrypt, encrypt, SealedData};
pub use vault_format::{VaultMetadata, FORMAT_VERSION, MAGIC, PADDING_BOUNDARY};
