//! Non-sensitive vault settings: stored as plain JSON next to the vault.
//!
//! Readable before unlock. Per-vault settings that must survive a
//! reinstall (auto-lock timeout, fast-unlock enrollment) live in the vault
//! metadata instead.

use std::fs;
use std::path::Path;

use keyhaven_crypto_core::kdf::{Argon2idParams, KdfPreset};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::store;

const CONFIG_FILE: &str = "keyhaven.json";

// ── Top-level config ───────────────────────────────────────────────

/// Vault policy knobs. Every field has a default, so a partial file loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Shortest accepted master password, in characters.
    #[serde(default = "default_min_master_password_length")]
    pub min_master_password_length: usize,

    /// Argon2id cost for newly created vaults and password changes.
    #[serde(default)]
    pub kdf: Argon2idParams,

    /// Strength scores below this are reported as weak.
    #[serde(default = "default_weak_threshold")]
    pub weak_threshold: u8,

    /// Credentials unmodified for this many days are reported as old.
    #[serde(default = "default_old_entry_days")]
    pub old_entry_days: u32,

    /// Auto-lock timeout applied to new vaults (0 disables).
    #[serde(default = "default_auto_lock_ms")]
    pub default_auto_lock_ms: u64,

    /// Shorter timeout used while the app is in the background.
    #[serde(default = "default_background_lock_ms")]
    pub background_lock_ms: u64,

    #[serde(default)]
    pub breach: BreachConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            min_master_password_length: default_min_master_password_length(),
            kdf: KdfPreset::Balanced.params(),
            weak_threshold: default_weak_threshold(),
            old_entry_days: default_old_entry_days(),
            default_auto_lock_ms: default_auto_lock_ms(),
            background_lock_ms: default_background_lock_ms(),
            breach: BreachConfig::default(),
        }
    }
}

const fn default_min_master_password_length() -> usize {
    8
}
const fn default_weak_threshold() -> u8 {
    40
}
const fn default_old_entry_days() -> u32 {
    182
}
const fn default_auto_lock_ms() -> u64 {
    300_000
}
const fn default_background_lock_ms() -> u64 {
    5_000
}

// ── Breach lookup ──────────────────────────────────────────────────

/// Breach-database endpoint and pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreachConfig {
    /// Range endpoint; the 5-character prefix is appended.
    #[serde(default = "default_breach_base_url")]
    pub base_url: String,

    /// Pause between consecutive lookups.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            base_url: default_breach_base_url(),
            request_delay_ms: default_request_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_breach_base_url() -> String {
    "https://api.pwnedpasswords.com/range/".into()
}
const fn default_request_delay_ms() -> u64 {
    1_600
}
const fn default_timeout_ms() -> u64 {
    10_000
}

// ── File I/O ───────────────────────────────────────────────────────

impl VaultConfig {
    /// Load from `{data_dir}/keyhaven.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or contains
    /// invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist to `{data_dir}/keyhaven.json` via temp file + rename,
    /// owner-only on Unix.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the file
    /// system rejects the write.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        store::atomic_write(&data_dir.join(CONFIG_FILE), &json)
    }

    /// Reject settings no vault can operate under.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.min_master_password_length == 0 {
            return Err(VaultError::Config(
                "minMasterPasswordLength must be at least 1".into(),
            ));
        }
        if self.weak_threshold > 100 {
            return Err(VaultError::Config(format!(
                "weakThreshold must be 0..=100, got {}",
                self.weak_threshold
            )));
        }
        if self.breach.base_url.is_empty() {
            return Err(VaultError::Config("breach.baseUrl is empty".into()));
        }
        if self.breach.timeout_ms == 0 {
            return Err(VaultError::Config("breach.timeoutMs must be positive".into()));
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
