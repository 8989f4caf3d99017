//! Vault error types for `keyhaven-vault`.

use keyhaven_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong master password, or a fast-unlock token that no longer matches.
    #[error("authentication failed")]
    Authentication,

    /// Cryptographic operation failed (delegated from crypto-core).
    ///
    /// `CryptoError::IntegrityFailure` here means the store is corrupt or
    /// tampered; the vault stays locked.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Caller input rejected (empty site name, short master password, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Vault is locked: operation requires an unlocked vault.
    #[error("vault is locked")]
    Locked,

    /// Unlock attempted while already unlocked.
    #[error("vault is already unlocked")]
    AlreadyUnlocked,

    /// No vault has been set up in the data directory yet.
    #[error("no vault found")]
    NotFound,

    /// A vault already exists at the target path.
    #[error("vault already exists: {0}")]
    VaultAlreadyExists(String),

    /// Entry not found by ID.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Entry is in the trash and cannot be edited.
    #[error("entry is in the trash: {0}")]
    EntryTrashed(String),

    /// Import format parsing failure.
    #[error("import error: {0}")]
    Import(String),

    /// Export failure.
    #[error("export error: {0}")]
    Export(String),

    /// Configuration file could not be written.
    #[error("config error: {0}")]
    Config(String),
}

impl VaultError {
    /// Whether this error signals a corrupt or tampered store.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::IntegrityFailure))
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Crypto(CryptoError::VaultFormat(format!("entry set encoding: {err}")))
    }
}
