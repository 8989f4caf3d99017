//! Shared fixtures for the vault integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use keyhaven_crypto_core::kdf::Argon2idParams;
use keyhaven_vault::clock::{ManualClock, DAY_MS};
use keyhaven_vault::{VaultConfig, VaultRepository};

pub const MASTER: &str = "correct-horse-1";

/// 2023-11-14, well clear of zero so age arithmetic never underflows.
pub const T0: i64 = 1_700_000_000_000;

pub const DAY: i64 = DAY_MS;

/// Default config with Argon2id turned down to test size.
pub fn test_config() -> VaultConfig {
    VaultConfig {
        kdf: Argon2idParams {
            m_cost: 32,
            t_cost: 1,
            p_cost: 1,
        },
        ..VaultConfig::default()
    }
}

pub fn open_repo(dir: &Path) -> (VaultRepository, Arc<ManualClock>) {
    open_repo_with(dir, test_config())
}

pub fn open_repo_with(dir: &Path, config: VaultConfig) -> (VaultRepository, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let repo = VaultRepository::with_config(dir, config, clock.clone()).unwrap();
    (repo, clock)
}

/// A freshly set up, unlocked vault.
pub fn unlocked_repo(dir: &Path) -> (VaultRepository, Arc<ManualClock>) {
    let (repo, clock) = open_repo(dir);
    repo.setup_master_password(MASTER).unwrap();
    (repo, clock)
}

pub fn ids(entries: &[keyhaven_vault::Entry]) -> Vec<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}
