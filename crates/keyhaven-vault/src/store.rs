//! Durable vault file: one container per data directory.
//!
//! `{data_dir}/vault.khv` holds the metadata header and the sealed entry
//! set (see `keyhaven_crypto_core::vault_format`). Every write goes through
//! a temp file in the same directory, is fsynced, then renamed over the
//! target, so a failed write leaves the previous file intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use keyhaven_crypto_core::keys::VaultKey;
use keyhaven_crypto_core::vault_format::{self, VaultMetadata};
use zeroize::Zeroize;

use crate::entries::Entry;
use crate::error::VaultError;

/// Vault file name inside the data directory.
pub const VAULT_FILE: &str = "vault.khv";

#[derive(Debug, Clone)]
pub struct VaultStore {
    dir: PathBuf,
}

impl VaultStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(VAULT_FILE)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Raw container bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if no vault exists, or
    /// [`VaultError::Io`] if it cannot be read.
    pub fn read_bytes(&self) -> Result<Vec<u8>, VaultError> {
        match fs::read(self.path()) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VaultError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Metadata header only; no key needed.
    ///
    /// # Errors
    ///
    /// As [`read_bytes`](Self::read_bytes), plus `VaultFormat` for a
    /// malformed header.
    pub fn read_metadata(&self) -> Result<VaultMetadata, VaultError> {
        let bytes = self.read_bytes()?;
        Ok(vault_format::parse_metadata(&bytes)?)
    }

    /// Write the first version of the vault.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultAlreadyExists`] if the file is present.
    pub fn create(
        &self,
        metadata: &VaultMetadata,
        entries: &[Entry],
        key: &VaultKey,
    ) -> Result<(), VaultError> {
        if self.exists() {
            return Err(VaultError::VaultAlreadyExists(
                self.path().display().to_string(),
            ));
        }
        fs::create_dir_all(&self.dir)?;
        self.save(metadata, entries, key)
    }

    /// Re-encrypt and atomically replace the whole vault.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the write fails; the previous file is
    /// left untouched.
    pub fn save(
        &self,
        metadata: &VaultMetadata,
        entries: &[Entry],
        key: &VaultKey,
    ) -> Result<(), VaultError> {
        let bytes = seal_entries(metadata, entries, key)?;
        atomic_write(&self.path(), &bytes)?;
        tracing::debug!(entries = entries.len(), bytes = bytes.len(), "vault persisted");
        Ok(())
    }

    /// Replace the metadata header, keeping the sealed entry set byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`], `VaultFormat`, or [`VaultError::Io`].
    pub fn save_metadata(&self, metadata: &VaultMetadata) -> Result<(), VaultError> {
        let original = self.read_bytes()?;
        let bytes = vault_format::rewrite_metadata(&original, metadata)?;
        atomic_write(&self.path(), &bytes)?;
        tracing::debug!(bytes = bytes.len(), "vault metadata rewritten");
        Ok(())
    }
}

/// Serialize and seal `entries` with `metadata` as the header.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if sealing fails.
pub fn seal_entries(
    metadata: &VaultMetadata,
    entries: &[Entry],
    key: &VaultKey,
) -> Result<Vec<u8>, VaultError> {
    let mut plain = serde_json::to_vec(entries)?;
    let sealed = vault_format::seal(metadata, &plain, key.expose());
    plain.zeroize();
    Ok(sealed?)
}

/// Authenticate, decrypt and deserialize the entry set in `bytes`.
///
/// # Errors
///
/// Returns `CryptoError::IntegrityFailure` (wrapped) for a wrong key or a
/// tampered file, `VaultFormat` for a structurally invalid one.
pub fn open_entries(bytes: &[u8], key: &VaultKey) -> Result<Vec<Entry>, VaultError> {
    let plain = vault_format::open(bytes, key.expose())?;
    Ok(serde_json::from_slice(plain.expose())?)
}

/// Temp file in the target's directory, fsync, rename over the target.
/// Owner-only permissions on Unix.
///
/// # Errors
///
/// Returns the underlying I/O error; the target is never partially written.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600))?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
