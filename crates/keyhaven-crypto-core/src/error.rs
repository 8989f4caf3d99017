//! Cryptographic error types for `keyhaven-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (Argon2id parameter validation, memory allocation).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure, or malformed key/ciphertext input.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed: ciphertext tampered or wrong key.
    ///
    /// Never accompanied by partial plaintext.
    #[error("integrity check failed: ciphertext tampered or wrong key")]
    IntegrityFailure,

    /// The master password did not reproduce the stored verifier.
    #[error("master password verification failed")]
    VerifierMismatch,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secure memory allocation or entropy source failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Vault container parsing or serialization error.
    #[error("vault format error: {0}")]
    VaultFormat(String),

    /// Password generation rejected its configuration.
    #[error("password generation error: {0}")]
    PasswordGeneration(String),

    /// Fast-unlock token derivation failure.
    #[error("biometric error: {0}")]
    Biometric(String),
}
