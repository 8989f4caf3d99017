//! Encrypted JSON backup import.
//!
//! Re-derives the key from the backup's own salt and params, so a backup
//! taken before a master-password change still opens with the password that
//! was current at export time.

use keyhaven_crypto_core::keys;
use keyhaven_crypto_core::symmetric::{self, SealedData};
use keyhaven_crypto_core::CryptoError;

use crate::entries::Entry;
use crate::error::VaultError;
use crate::export::encrypted_json::{EncryptedBackup, BACKUP_AAD, BACKUP_FORMAT, BACKUP_VERSION};

/// Decrypt a backup document into its entry set.
///
/// # Errors
///
/// - [`VaultError::Import`] for malformed JSON, a foreign format tag, or a
///   newer version
/// - [`VaultError::Authentication`] if `master_password` does not open it
///   (a tampered ciphertext is indistinguishable and reported the same way)
pub fn decrypt(json: &str, master_password: &[u8]) -> Result<Vec<Entry>, VaultError> {
    let doc: EncryptedBackup = serde_json::from_str(json)
        .map_err(|e| VaultError::Import(format!("invalid backup document: {e}")))?;

    if doc.format != BACKUP_FORMAT {
        return Err(VaultError::Import(format!(
            "unrecognised backup format: {}",
            doc.format
        )));
    }
    if doc.version > BACKUP_VERSION {
        return Err(VaultError::Import(format!(
            "backup version {} is newer than supported version {BACKUP_VERSION}",
            doc.version
        )));
    }

    let salt = data_encoding::BASE64
        .decode(doc.kdf.salt.as_bytes())
        .map_err(|e| VaultError::Import(format!("invalid salt: {e}")))?;
    let sealed = SealedData::from_base64(&doc.ciphertext)
        .map_err(|e| VaultError::Import(format!("invalid ciphertext: {e}")))?;

    let key = keys::derive_key(master_password, &salt, &doc.kdf.params)?;
    let plain = match symmetric::decrypt(&sealed, key.expose(), BACKUP_AAD) {
        Ok(plain) => plain,
        Err(CryptoError::IntegrityFailure) => return Err(VaultError::Authentication),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(plain.expose())
        .map_err(|e| VaultError::Import(format!("invalid backup payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{Category, EntryKind};
    use crate::export::encrypted_json as export;
    use keyhaven_crypto_core::kdf::Argon2idParams;

    const TEST_PARAMS: Argon2idParams = Argon2idParams {
        m_cost: 32,
        t_cost: 1,
        p_cost: 1,
    };

    fn entries() -> Vec<Entry> {
        let mut trashed = Entry {
            id: "t".into(),
            site_name: "old.example".into(),
            kind: EntryKind::Credential {
                username: Some("me".into()),
                password: "pw".into(),
                url: None,
            },
            notes: None,
            category: Category::Shopping,
            is_favourite: true,
            created_at: 100,
            modified_at: 200,
            last_used_at: Some(150),
            deleted_at: None,
        };
        trashed.deleted_at = Some(300);
        let note = Entry {
            id: "n".into(),
            kind: EntryKind::SecureNote,
            notes: Some("wifi: hunter2".into()),
            deleted_at: None,
            ..trashed.clone()
        };
        vec![trashed, note]
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let (meta, key) = keys::setup(b"backup-pw-1", &TEST_PARAMS).unwrap();
        let json = export::export(&entries(), &meta, &key, 1).unwrap();
        assert!(!json.contains("hunter2"));
        assert_eq!(decrypt(&json, b"backup-pw-1").unwrap(), entries());
    }

    #[test]
    fn wrong_password_is_authentication_error() {
        let (meta, key) = keys::setup(b"backup-pw-1", &TEST_PARAMS).unwrap();
        let json = export::export(&entries(), &meta, &key, 1).unwrap();
        assert!(matches!(
            decrypt(&json, b"backup-pw-2"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn foreign_documents_are_rejected() {
        assert!(matches!(decrypt("not json", b"x"), Err(VaultError::Import(_))));

        let (meta, key) = keys::setup(b"pw", &TEST_PARAMS).unwrap();
        let json = export::export(&[], &meta, &key, 1).unwrap();
        let mut doc: EncryptedBackup = serde_json::from_str(&json).unwrap();
        doc.version = BACKUP_VERSION + 1;
        let newer = serde_json::to_string(&doc).unwrap();
        assert!(matches!(decrypt(&newer, b"pw"), Err(VaultError::Import(_))));

        doc.version = BACKUP_VERSION;
        doc.format = "other-app".into();
        let foreign = serde_json::to_string(&doc).unwrap();
        assert!(matches!(decrypt(&foreign, b"pw"), Err(VaultError::Import(_))));
    }
}
