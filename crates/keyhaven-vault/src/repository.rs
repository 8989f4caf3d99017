//! Vault repository: lock state machine, entry CRUD, queries, import/export.
//!
//! The repository owns the only in-memory copy of the decrypted entry set.
//! State is an explicit [`VaultState`] behind an `RwLock`: queries share a
//! read guard and see a consistent snapshot, mutations hold the write guard
//! for the whole read-modify-persist cycle so they run one at a time.
//!
//! Every mutation works on a staged copy of the entry set. The copy is
//! sealed and persisted first and only then swapped in, so a failed write
//! leaves both the file and the in-memory state exactly as they were.

use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use keyhaven_crypto_core::biometric::{self, BiometricToken};
use keyhaven_crypto_core::keys::{self, VaultKey};
use keyhaven_crypto_core::vault_format::{self, VaultMetadata};
use keyhaven_crypto_core::CryptoError;
use zeroize::{Zeroize, Zeroizing};

use crate::breach::{BreachCandidate, BreachChecker, BreachReport};
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::entries::{Category, Entry, EntryDraft};
use crate::error::VaultError;
use crate::export;
use crate::health::{self, HealthPolicy, HealthReport};
use crate::import::{self, CsvImportSummary, ImportSummary};
use crate::query::{EntryFilter, EntryQuery};
use crate::store::{self, VaultStore};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Decrypted session material. Dropping it wipes the key and every entry.
struct UnlockedVault {
    key: VaultKey,
    metadata: VaultMetadata,
    entries: Zeroizing<Vec<Entry>>,
}

enum VaultState {
    Locked,
    Unlocked(UnlockedVault),
}

/// The vault in one data directory.
pub struct VaultRepository {
    store: VaultStore,
    config: VaultConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<VaultState>,
    /// Bumped on every unlock and lock; a deferred lock only fires if the
    /// epoch it captured is still current.
    epoch: AtomicU64,
}

impl fmt::Debug for VaultRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultRepository")
            .field("dir", &self.store.dir())
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}

impl VaultRepository {
    /// Open the repository for `data_dir` with the config file found there
    /// and the system clock. Starts `Locked`; nothing is read from the
    /// vault file yet.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the loaded config is unusable.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let dir = data_dir.into();
        let config = VaultConfig::load(&dir);
        Self::with_config(dir, config, Arc::new(SystemClock))
    }

    /// Open with an explicit config and clock.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `config` fails validation.
    pub fn with_config(
        data_dir: impl Into<PathBuf>,
        config: VaultConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            store: VaultStore::new(data_dir),
            config,
            clock,
            state: RwLock::new(VaultState::Locked),
            epoch: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.store.dir()
    }

    // -----------------------------------------------------------------------
    // Lock state machine
    // -----------------------------------------------------------------------

    /// Whether a vault file exists in the data directory.
    #[must_use]
    pub fn is_master_password_set(&self) -> bool {
        self.store.exists()
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        matches!(*self.read(), VaultState::Unlocked(_))
    }

    /// Create the vault, persist an empty entry set and move to `Unlocked`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Validation`] if `password` is shorter than the
    ///   configured minimum (in characters)
    /// - [`VaultError::VaultAlreadyExists`] if a vault is already set up
    /// - [`VaultError::Io`] / [`VaultError::Crypto`] if creation fails
    pub fn setup_master_password(&self, password: &str) -> Result<(), VaultError> {
        self.check_password_length(password)?;

        let mut guard = self.write();
        if self.store.exists() {
            return Err(VaultError::VaultAlreadyExists(
                self.store.path().display().to_string(),
            ));
        }

        let (mut metadata, key) = keys::setup(password.as_bytes(), &self.config.kdf)?;
        metadata.auto_lock_ms = self.config.default_auto_lock_ms;
        self.store.create(&metadata, &[], &key)?;

        *guard = VaultState::Unlocked(UnlockedVault {
            key,
            metadata,
            entries: Zeroizing::new(Vec::new()),
        });
        self.bump_epoch();
        tracing::info!(dir = %self.store.dir().display(), "vault created");
        Ok(())
    }

    /// Verify `password` against the stored verifier, decrypt the entry set
    /// and move to `Unlocked`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyUnlocked`] if a session is open
    /// - [`VaultError::NotFound`] if no vault exists
    /// - [`VaultError::Authentication`] on a wrong password
    /// - [`VaultError::Crypto`] with `IntegrityFailure` if the file is
    ///   corrupt or tampered
    ///
    /// On any error the vault stays `Locked`.
    pub fn verify_and_unlock(&self, password: &str) -> Result<(), VaultError> {
        let mut guard = self.write();
        if matches!(*guard, VaultState::Unlocked(_)) {
            return Err(VaultError::AlreadyUnlocked);
        }

        let bytes = self.store.read_bytes()?;
        let metadata = vault_format::parse_metadata(&bytes)?;
        let key = match keys::derive_and_verify(password.as_bytes(), &metadata) {
            Ok(key) => key,
            Err(CryptoError::VerifierMismatch) => {
                tracing::warn!("unlock rejected: wrong master password");
                return Err(VaultError::Authentication);
            }
            Err(e) => return Err(e.into()),
        };

        self.open_session(&mut guard, &bytes, metadata, key, "master password")
    }

    /// Unlock with a fast-unlock token issued by
    /// [`enable_biometric_unlock`](Self::enable_biometric_unlock).
    ///
    /// Same contract as [`verify_and_unlock`](Self::verify_and_unlock); a
    /// token that does not unseal the stored key, or a vault without an
    /// enrollment, is an [`VaultError::Authentication`] failure.
    ///
    /// # Errors
    ///
    /// See [`verify_and_unlock`](Self::verify_and_unlock).
    pub fn unlock_with_biometric(&self, token: &BiometricToken) -> Result<(), VaultError> {
        let mut guard = self.write();
        if matches!(*guard, VaultState::Unlocked(_)) {
            return Err(VaultError::AlreadyUnlocked);
        }

        let bytes = self.store.read_bytes()?;
        let metadata = vault_format::parse_metadata(&bytes)?;
        let Some(sealed) = metadata
            .biometric_sealed_key
            .as_ref()
            .filter(|_| metadata.biometric_enabled)
        else {
            tracing::warn!("fast unlock rejected: not enrolled");
            return Err(VaultError::Authentication);
        };

        let key = match biometric::unseal_vault_key(sealed, token) {
            Ok(key) => key,
            Err(CryptoError::IntegrityFailure) => {
                tracing::warn!("fast unlock rejected: token does not match");
                return Err(VaultError::Authentication);
            }
            Err(e) => return Err(e.into()),
        };

        self.open_session(&mut guard, &bytes, metadata, key, "fast unlock")
    }

    fn open_session(
        &self,
        guard: &mut VaultState,
        bytes: &[u8],
        metadata: VaultMetadata,
        key: VaultKey,
        method: &'static str,
    ) -> Result<(), VaultError> {
        let entries = match store::open_entries(bytes, &key) {
            Ok(entries) => Zeroizing::new(entries),
            Err(e) => {
                if e.is_integrity_failure() {
                    tracing::warn!(method, "vault integrity check failed; staying locked");
                }
                return Err(e);
            }
        };

        let count = entries.len();
        *guard = VaultState::Unlocked(UnlockedVault {
            key,
            metadata,
            entries,
        });
        self.bump_epoch();
        tracing::info!(method, entries = count, "vault unlocked");
        Ok(())
    }

    /// Discard the key and decrypted entries. Idempotent.
    pub fn lock(&self) {
        let mut guard = self.write();
        let was_unlocked = matches!(*guard, VaultState::Unlocked(_));
        *guard = VaultState::Locked;
        self.bump_epoch();
        if was_unlocked {
            tracing::info!("vault locked");
        }
    }

    /// Lock only if no unlock or lock has happened since `epoch` was read
    /// from [`session_epoch`](Self::session_epoch). Returns whether this call
    /// locked the vault.
    pub fn lock_if_epoch(&self, epoch: u64) -> bool {
        let mut guard = self.write();
        if self.session_epoch() != epoch || !matches!(*guard, VaultState::Unlocked(_)) {
            return false;
        }
        *guard = VaultState::Locked;
        self.bump_epoch();
        true
    }

    /// Counter identifying the current lock/unlock session.
    #[must_use]
    pub fn session_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Re-key the vault under `new_password`.
    ///
    /// `old_password` is re-verified first. A fresh salt, key and verifier
    /// are derived and the whole entry set is re-encrypted and written in a
    /// single atomic replace, so the file holds either the old or the new
    /// form, never both. A fast-unlock enrollment is invalidated.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Locked`] if no session is open
    /// - [`VaultError::Validation`] if `new_password` is too short
    /// - [`VaultError::Authentication`] if `old_password` does not match
    /// - [`VaultError::Io`] if the write fails (nothing changes)
    pub fn change_master_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), VaultError> {
        let mut guard = self.write();
        let VaultState::Unlocked(vault) = &mut *guard else {
            return Err(VaultError::Locked);
        };
        self.check_password_length(new_password)?;

        match keys::derive_and_verify(old_password.as_bytes(), &vault.metadata) {
            Ok(_) => {}
            Err(CryptoError::VerifierMismatch) => {
                tracing::warn!("password change rejected: wrong current password");
                return Err(VaultError::Authentication);
            }
            Err(e) => return Err(e.into()),
        }

        let (mut metadata, key) = keys::setup(new_password.as_bytes(), &self.config.kdf)?;
        metadata.auto_lock_ms = vault.metadata.auto_lock_ms;
        self.store.save(&metadata, &vault.entries, &key)?;

        vault.metadata = metadata;
        vault.key = key;
        tracing::info!("master password changed");
        Ok(())
    }

    /// Enroll fast unlock. The returned token is the only way to use it;
    /// the caller keeps it in the platform keystore.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open, or an I/O or
    /// crypto error if the enrollment cannot be stored.
    pub fn enable_biometric_unlock(&self) -> Result<BiometricToken, VaultError> {
        let mut guard = self.write();
        let VaultState::Unlocked(vault) = &mut *guard else {
            return Err(VaultError::Locked);
        };

        let token = biometric::generate_token()?;
        let sealed = biometric::seal_vault_key(&vault.key, &token)?;
        let mut metadata = vault.metadata.clone();
        metadata.biometric_enabled = true;
        metadata.biometric_sealed_key = Some(sealed);
        self.store.save_metadata(&metadata)?;

        vault.metadata = metadata;
        tracing::info!("fast unlock enrolled");
        Ok(token)
    }

    /// Remove the fast-unlock enrollment. Works locked or unlocked.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] without a vault, or an I/O error.
    pub fn disable_biometric_unlock(&self) -> Result<(), VaultError> {
        self.update_metadata(|m| {
            m.biometric_enabled = false;
            m.biometric_sealed_key = None;
        })?;
        tracing::info!("fast unlock removed");
        Ok(())
    }

    #[must_use]
    pub fn is_biometric_enabled(&self) -> bool {
        match &*self.read() {
            VaultState::Unlocked(vault) => vault.metadata.biometric_enabled,
            VaultState::Locked => self
                .store
                .read_metadata()
                .is_ok_and(|m| m.biometric_enabled),
        }
    }

    /// Inactivity timeout for this vault; 0 means auto-lock is off.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if no vault exists.
    pub fn auto_lock_ms(&self) -> Result<u64, VaultError> {
        match &*self.read() {
            VaultState::Unlocked(vault) => Ok(vault.metadata.auto_lock_ms),
            VaultState::Locked => Ok(self.store.read_metadata()?.auto_lock_ms),
        }
    }

    /// Store a new inactivity timeout (0 disables).
    ///
    /// The timeout is authenticated with the entry set, so the vault is
    /// resealed and a session must be open.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] without a session, or an I/O error.
    pub fn set_auto_lock_ms(&self, ms: u64) -> Result<(), VaultError> {
        let mut guard = self.write();
        let VaultState::Unlocked(vault) = &mut *guard else {
            return Err(VaultError::Locked);
        };
        let mut metadata = vault.metadata.clone();
        metadata.auto_lock_ms = ms;
        self.store.save(&metadata, &vault.entries, &vault.key)?;
        vault.metadata = metadata;
        tracing::debug!(auto_lock_ms = ms, "auto-lock timeout updated");
        Ok(())
    }

    fn update_metadata(&self, apply: impl FnOnce(&mut VaultMetadata)) -> Result<(), VaultError> {
        let mut guard = self.write();
        match &mut *guard {
            VaultState::Unlocked(vault) => {
                let mut metadata = vault.metadata.clone();
                apply(&mut metadata);
                self.store.save_metadata(&metadata)?;
                vault.metadata = metadata;
            }
            VaultState::Locked => {
                let mut metadata = self.store.read_metadata()?;
                apply(&mut metadata);
                self.store.save_metadata(&metadata)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Entries matching `query`, never including the trash.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn query(&self, query: &EntryQuery) -> Result<Vec<Entry>, VaultError> {
        self.with_entries(|entries| query.apply(entries))
    }

    /// All active entries, most recently modified first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn active_entries(&self) -> Result<Vec<Entry>, VaultError> {
        self.query(&EntryQuery::default())
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn favourites(&self) -> Result<Vec<Entry>, VaultError> {
        self.query(&EntryQuery::new(EntryFilter::Favourites))
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn secure_notes(&self) -> Result<Vec<Entry>, VaultError> {
        self.query(&EntryQuery::new(EntryFilter::SecureNotes))
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn by_category(&self, category: Category) -> Result<Vec<Entry>, VaultError> {
        self.query(&EntryQuery::new(EntryFilter::Category(category)))
    }

    /// Case-insensitive match on site name and username.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn search(&self, text: &str) -> Result<Vec<Entry>, VaultError> {
        self.query(&EntryQuery::default().search(text))
    }

    /// One entry by id, trashed or not.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] or [`VaultError::EntryNotFound`].
    pub fn get_entry(&self, id: &str) -> Result<Entry, VaultError> {
        self.with_entries(|entries| entries.iter().find(|e| e.id == id).cloned())?
            .ok_or_else(|| VaultError::EntryNotFound(id.to_owned()))
    }

    /// Trashed entries, most recently deleted first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn trash(&self) -> Result<Vec<Entry>, VaultError> {
        self.with_entries(|entries| {
            let mut trashed: Vec<Entry> =
                entries.iter().filter(|e| e.is_trashed()).cloned().collect();
            trashed.sort_by_key(|e| Reverse(e.deleted_at));
            trashed
        })
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn weak_passwords(&self) -> Result<Vec<Entry>, VaultError> {
        let policy = self.health_policy();
        self.with_entries(|entries| cloned(health::weak_passwords(entries, policy)))
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn reused_passwords(&self) -> Result<Vec<Entry>, VaultError> {
        self.with_entries(|entries| cloned(health::reused_passwords(entries)))
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn old_entries(&self) -> Result<Vec<Entry>, VaultError> {
        let policy = self.health_policy();
        let now = self.clock.now_ms();
        self.with_entries(|entries| cloned(health::old_entries(entries, policy, now)))
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn security_score(&self) -> Result<u8, VaultError> {
        Ok(self.health_report()?.security_score)
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn health_report(&self) -> Result<HealthReport, VaultError> {
        let policy = self.health_policy();
        let now = self.clock.now_ms();
        self.with_entries(|entries| health::health_report(entries, policy, now))
    }

    /// Owned snapshot of every active credential with a non-empty password,
    /// for a [`BreachChecker`] run.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open.
    pub fn breach_candidates(&self) -> Result<Vec<BreachCandidate>, VaultError> {
        self.with_entries(|entries| {
            entries
                .iter()
                .filter(|e| !e.is_trashed())
                .filter_map(|e| {
                    let password = e.password().filter(|p| !p.is_empty())?;
                    Some(BreachCandidate::new(&e.id, &e.site_name, password))
                })
                .collect()
        })
    }

    /// Snapshot the candidates and run them through `checker`. No lock is
    /// held while the lookups are in flight.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] if no session is open. Network
    /// failures are per-entry and land in the report.
    pub async fn check_breaches(&self, checker: &BreachChecker) -> Result<BreachReport, VaultError> {
        let candidates = self.breach_candidates()?;
        Ok(checker.check(candidates).await)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a new entry with a fresh id and `created = modified = now`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Validation`] for an empty site name
    /// - [`VaultError::Locked`] if no session is open
    /// - [`VaultError::Io`] if persisting fails (nothing is added)
    pub fn add_entry(&self, draft: EntryDraft) -> Result<Entry, VaultError> {
        let draft = draft.normalized()?;
        let entry = self.mutate(|entries, now| {
            let entry = new_entry(draft, now);
            entries.push(entry.clone());
            Ok(entry)
        })?;
        tracing::debug!(entry_id = %entry.id, "entry added");
        Ok(entry)
    }

    /// Replace the content of an existing, non-trashed entry.
    ///
    /// # Errors
    ///
    /// [`VaultError::Validation`], [`VaultError::EntryNotFound`],
    /// [`VaultError::EntryTrashed`], [`VaultError::Locked`] or
    /// [`VaultError::Io`].
    pub fn update_entry(&self, id: &str, draft: EntryDraft) -> Result<Entry, VaultError> {
        let draft = draft.normalized()?;
        self.mutate(|entries, now| {
            let entry = find_active_mut(entries, id)?;
            entry.site_name = draft.site_name;
            entry.kind = draft.kind;
            entry.notes = draft.notes;
            entry.category = draft.category;
            entry.is_favourite = draft.is_favourite;
            entry.modified_at = now.max(entry.modified_at);
            Ok(entry.clone())
        })
    }

    /// Flip the favourite flag; returns the new value.
    ///
    /// # Errors
    ///
    /// As [`update_entry`](Self::update_entry).
    pub fn toggle_favourite(&self, id: &str) -> Result<bool, VaultError> {
        self.mutate(|entries, now| {
            let entry = find_active_mut(entries, id)?;
            entry.is_favourite = !entry.is_favourite;
            entry.modified_at = now.max(entry.modified_at);
            Ok(entry.is_favourite)
        })
    }

    /// Record a use. Touches `lastUsedAt` only.
    ///
    /// # Errors
    ///
    /// As [`update_entry`](Self::update_entry).
    pub fn mark_used(&self, id: &str) -> Result<(), VaultError> {
        self.mutate(|entries, now| {
            let entry = find_active_mut(entries, id)?;
            entry.last_used_at = Some(now.max(entry.created_at));
            Ok(())
        })
    }

    /// Move an entry to the trash.
    ///
    /// # Errors
    ///
    /// [`VaultError::EntryNotFound`], [`VaultError::EntryTrashed`] if it is
    /// already there, [`VaultError::Locked`] or [`VaultError::Io`].
    pub fn soft_delete(&self, id: &str) -> Result<(), VaultError> {
        self.mutate(|entries, now| {
            let entry = find_active_mut(entries, id)?;
            entry.deleted_at = Some(now.max(entry.created_at));
            Ok(())
        })?;
        tracing::debug!(entry_id = %id, "entry moved to trash");
        Ok(())
    }

    /// Bring a trashed entry back.
    ///
    /// # Errors
    ///
    /// [`VaultError::EntryNotFound`], [`VaultError::Validation`] if the entry
    /// is not in the trash, [`VaultError::Locked`] or [`VaultError::Io`].
    pub fn restore_from_trash(&self, id: &str) -> Result<(), VaultError> {
        self.mutate(|entries, _| {
            let entry = find_mut(entries, id)?;
            if !entry.is_trashed() {
                return Err(VaultError::Validation(format!("entry is not in the trash: {id}")));
            }
            entry.deleted_at = None;
            Ok(())
        })?;
        tracing::debug!(entry_id = %id, "entry restored");
        Ok(())
    }

    /// Remove an entry for good, trashed or not.
    ///
    /// # Errors
    ///
    /// [`VaultError::EntryNotFound`], [`VaultError::Locked`] or
    /// [`VaultError::Io`].
    pub fn permanent_delete(&self, id: &str) -> Result<(), VaultError> {
        self.mutate(|entries, _| {
            let index = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| VaultError::EntryNotFound(id.to_owned()))?;
            entries.remove(index).zeroize();
            Ok(())
        })?;
        tracing::debug!(entry_id = %id, "entry deleted permanently");
        Ok(())
    }

    /// Delete every entry, trash included. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`VaultError::Locked`] or [`VaultError::Io`].
    pub fn clear_vault(&self) -> Result<usize, VaultError> {
        let removed = self.mutate(|entries, _| {
            let count = entries.len();
            entries.zeroize();
            entries.clear();
            Ok(count)
        })?;
        tracing::info!(removed, "vault cleared");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Import / export
    // -----------------------------------------------------------------------

    /// Encrypted backup of the full entry set under the current key.
    ///
    /// # Errors
    ///
    /// [`VaultError::Locked`], [`VaultError::Export`] or
    /// [`VaultError::Crypto`].
    pub fn export_to_encrypted_json(&self) -> Result<String, VaultError> {
        let now = self.clock.now_ms();
        let guard = self.read();
        let VaultState::Unlocked(vault) = &*guard else {
            return Err(VaultError::Locked);
        };
        let json = export::encrypted_json::export(&vault.entries, &vault.metadata, &vault.key, now)?;
        tracing::info!(entries = vault.entries.len(), "encrypted backup exported");
        Ok(json)
    }

    /// Merge a backup produced by
    /// [`export_to_encrypted_json`](Self::export_to_encrypted_json).
    /// Entries whose id is already present are skipped.
    ///
    /// # Errors
    ///
    /// [`VaultError::Locked`], [`VaultError::Import`] for a malformed
    /// document, [`VaultError::Authentication`] if `master_password` does not
    /// open it, or [`VaultError::Io`] (nothing is merged).
    pub fn import_from_encrypted_json(
        &self,
        json: &str,
        master_password: &str,
    ) -> Result<ImportSummary, VaultError> {
        self.ensure_unlocked()?;
        let mut incoming = Zeroizing::new(import::encrypted_json::decrypt(
            json,
            master_password.as_bytes(),
        )?);

        let summary = self.mutate(|entries, _| {
            let mut summary = ImportSummary::default();
            for mut entry in incoming.drain(..) {
                if entries.iter().any(|e| e.id == entry.id) {
                    entry.zeroize();
                    summary.skipped = summary.skipped.saturating_add(1);
                } else {
                    summary.imported_ids.push(entry.id.clone());
                    entries.push(entry);
                    summary.imported = summary.imported.saturating_add(1);
                }
            }
            Ok(summary)
        })?;
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "encrypted backup imported"
        );
        Ok(summary)
    }

    /// Active credentials as CSV.
    ///
    /// # Errors
    ///
    /// [`VaultError::Locked`] or [`VaultError::Export`].
    pub fn export_to_csv(&self) -> Result<String, VaultError> {
        let csv = self.with_entries(export::csv::export)??;
        tracing::info!("CSV exported");
        Ok(csv)
    }

    /// Add every valid CSV row as a new credential in one commit.
    ///
    /// # Errors
    ///
    /// [`VaultError::Locked`] or [`VaultError::Io`] (nothing is added).
    pub fn import_from_csv(&self, data: &str) -> Result<CsvImportSummary, VaultError> {
        let parsed = import::csv::parse(data);
        let skipped = parsed.skipped;

        let summary = self.mutate(|entries, now| {
            let mut summary = CsvImportSummary {
                skipped,
                ..CsvImportSummary::default()
            };
            for draft in parsed.drafts {
                let entry = new_entry(draft, now);
                summary.imported_ids.push(entry.id.clone());
                entries.push(entry);
                summary.imported = summary.imported.saturating_add(1);
            }
            Ok(summary)
        })?;
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "CSV imported"
        );
        Ok(summary)
    }

    /// [`export_to_encrypted_json`](Self::export_to_encrypted_json) into a file.
    ///
    /// # Errors
    ///
    /// As the in-memory variant, plus [`VaultError::Io`].
    pub fn export_encrypted_json_file(&self, path: &Path) -> Result<(), VaultError> {
        export::write_file(path, &self.export_to_encrypted_json()?)
    }

    /// [`export_to_csv`](Self::export_to_csv) into a file.
    ///
    /// # Errors
    ///
    /// As the in-memory variant, plus [`VaultError::Io`].
    pub fn export_csv_file(&self, path: &Path) -> Result<(), VaultError> {
        let csv = Zeroizing::new(self.export_to_csv()?);
        export::write_file(path, &csv)
    }

    /// [`import_from_encrypted_json`](Self::import_from_encrypted_json) from
    /// a file.
    ///
    /// # Errors
    ///
    /// As the in-memory variant, plus [`VaultError::Io`].
    pub fn import_encrypted_json_file(
        &self,
        path: &Path,
        master_password: &str,
    ) -> Result<ImportSummary, VaultError> {
        let json = fs::read_to_string(path)?;
        self.import_from_encrypted_json(&json, master_password)
    }

    /// [`import_from_csv`](Self::import_from_csv) from a file.
    ///
    /// # Errors
    ///
    /// As the in-memory variant, plus [`VaultError::Io`].
    pub fn import_csv_file(&self, path: &Path) -> Result<CsvImportSummary, VaultError> {
        let data = Zeroizing::new(fs::read_to_string(path)?);
        self.import_from_csv(&data)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, VaultState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VaultState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn check_password_length(&self, password: &str) -> Result<(), VaultError> {
        let min = self.config.min_master_password_length;
        if password.chars().count() < min {
            return Err(VaultError::Validation(format!(
                "master password must be at least {min} characters"
            )));
        }
        Ok(())
    }

    fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            weak_threshold: self.config.weak_threshold,
            old_entry_days: self.config.old_entry_days,
        }
    }

    fn ensure_unlocked(&self) -> Result<(), VaultError> {
        if self.is_unlocked() {
            Ok(())
        } else {
            Err(VaultError::Locked)
        }
    }

    fn with_entries<T>(&self, f: impl FnOnce(&[Entry]) -> T) -> Result<T, VaultError> {
        match &*self.read() {
            VaultState::Unlocked(vault) => Ok(f(&vault.entries)),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// Apply `change` to a staged copy, persist it, then swap it in.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<Entry>, i64) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut guard = self.write();
        let VaultState::Unlocked(vault) = &mut *guard else {
            return Err(VaultError::Locked);
        };

        let mut staged = Zeroizing::new(vault.entries.to_vec());
        let out = change(&mut staged, self.clock.now_ms())?;
        if let Err(e) = self.store.save(&vault.metadata, &staged, &vault.key) {
            tracing::warn!(error = %e, "persist failed; change rolled back");
            return Err(e);
        }
        vault.entries = staged;
        Ok(out)
    }
}

fn new_entry(draft: EntryDraft, now: i64) -> Entry {
    Entry {
        id: uuid::Uuid::new_v4().to_string(),
        site_name: draft.site_name,
        kind: draft.kind,
        notes: draft.notes,
        category: draft.category,
        is_favourite: draft.is_favourite,
        created_at: now,
        modified_at: now,
        last_used_at: None,
        deleted_at: None,
    }
}

fn find_mut<'a>(entries: &'a mut [Entry], id: &str) -> Result<&'a mut Entry, VaultError> {
    entries
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| VaultError::EntryNotFound(id.to_owned()))
}

fn find_active_mut<'a>(entries: &'a mut [Entry], id: &str) -> Result<&'a mut Entry, VaultError> {
    let entry = find_mut(entries, id)?;
    if entry.is_trashed() {
        return Err(VaultError::EntryTrashed(id.to_owned()));
    }
    Ok(entry)
}

fn cloned(entries: Vec<&Entry>) -> Vec<Entry> {
    entries.into_iter().cloned().collect()
}
