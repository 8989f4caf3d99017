//! Encrypted JSON backup.
//!
//! ```json
//! {
//!   "format": "keyhaven-backup",
//!   "version": 1,
//!   "exportedAt": 1718000000000,
//!   "kdf": { "algorithm": "argon2id", "salt": "<base64>", "params": { ... } },
//!   "ciphertext": "<base64 nonce || ciphertext || tag>"
//! }
//! ```
//!
//! The full entry set, trashed items and secure notes included, is encrypted
//! under the current vault key. The vault's salt and KDF params travel with
//! it, so the same master password re-derives the key on import.

use keyhaven_crypto_core::kdf::Argon2idParams;
use keyhaven_crypto_core::keys::VaultKey;
use keyhaven_crypto_core::symmetric;
use keyhaven_crypto_core::vault_format::VaultMetadata;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::entries::Entry;
use crate::error::VaultError;

/// Format tag identifying a backup document.
pub const BACKUP_FORMAT: &str = "keyhaven-backup";

/// Current backup version.
pub const BACKUP_VERSION: u8 = 1;

pub(crate) const BACKUP_AAD: &[u8] = b"keyhaven-backup-v1";

const KDF_ALGORITHM: &str = "argon2id";

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBackup {
    pub format: String,
    pub version: u8,
    pub exported_at: i64,
    pub kdf: BackupKdf,
    pub ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupKdf {
    pub algorithm: String,
    /// Base64 salt.
    pub salt: String,
    pub params: Argon2idParams,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Build the backup document for `entries`.
///
/// # Errors
///
/// Returns [`VaultError::Export`] if serialization fails and
/// [`VaultError::Crypto`] if encryption fails.
pub fn export(
    entries: &[Entry],
    metadata: &VaultMetadata,
    key: &VaultKey,
    exported_at: i64,
) -> Result<String, VaultError> {
    let mut plain = serde_json::to_vec(entries)
        .map_err(|e| VaultError::Export(format!("failed to serialize entries: {e}")))?;
    let sealed = symmetric::encrypt(&plain, key.expose(), BACKUP_AAD);
    plain.zeroize();
    let sealed = sealed?;

    let doc = EncryptedBackup {
        format: BACKUP_FORMAT.into(),
        version: BACKUP_VERSION,
        exported_at,
        kdf: BackupKdf {
            algorithm: KDF_ALGORITHM.into(),
            salt: data_encoding::BASE64.encode(&metadata.salt),
            params: metadata.kdf_params.clone(),
        },
        ciphertext: sealed.to_base64(),
    };

    serde_json::to_string_pretty(&doc)
        .map_err(|e| VaultError::Export(format!("failed to serialize backup: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhaven_crypto_core::keys;

    const TEST_PARAMS: Argon2idParams = Argon2idParams {
        m_cost: 32,
        t_cost: 1,
        p_cost: 1,
    };

    #[test]
    fn document_is_self_describing() {
        let (meta, key) = keys::setup(b"pw-123456", &TEST_PARAMS).unwrap();
        let json = export(&[], &meta, &key, 77).unwrap();
        let doc: EncryptedBackup = serde_json::from_str(&json).unwrap();

        assert_eq!(doc.format, BACKUP_FORMAT);
        assert_eq!(doc.version, BACKUP_VERSION);
        assert_eq!(doc.exported_at, 77);
        assert_eq!(doc.kdf.algorithm, "argon2id");
        assert_eq!(doc.kdf.params, TEST_PARAMS);
        assert_eq!(
            data_encoding::BASE64.decode(doc.kdf.salt.as_bytes()).unwrap(),
            meta.salt
        );
        assert!(!doc.ciphertext.is_empty());
    }
}
