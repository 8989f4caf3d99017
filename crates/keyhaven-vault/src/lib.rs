//! `keyhaven-vault`: vault business logic for Keyhaven.
//!
//! Encrypted single-file storage, the lock/unlock state machine, entry CRUD
//! and queries, password health, CSV and encrypted-JSON transfer, breach
//! checks and inactivity auto-lock.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod clock;
pub mod config;
pub mod error;

pub mod entries;
pub mod query;
pub mod store;

pub mod health;
pub mod repository;

pub mod export;
pub mod import;

pub mod autolock;
pub mod breach;

pub use autolock::AutoLock;
pub use breach::{BreachCandidate, BreachChecker, BreachReport, BreachedEntry, NetworkError, NotChecked};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreachConfig, VaultConfig};
pub use entries::{Category, Entry, EntryDraft, EntryKind};
pub use error::VaultError;
pub use health::{CredentialRef, HealthReport, OldCredential, ReusedGroup, WeakCredential};
pub use import::{CsvImportSummary, ImportSummary};
pub use keyhaven_crypto_core::{BiometricToken, StrengthTier};
pub use query::{EntryFilter, EntryQuery, SortOrder};
pub use repository::VaultRepository;

use keyhaven_crypto_core::password::{self, CharsetConfig};
use keyhaven_crypto_core::strength;

/// Strength score in `0..=100`.
#[must_use]
pub fn calculate_strength(password: &str) -> u8 {
    strength::strength(password)
}

/// Tier label for a score ("Weak", "Fair", "Good", "Strong").
#[must_use]
pub const fn strength_label(score: u8) -> &'static str {
    strength::strength_label(score)
}

/// Tier colour for a score, as `#RRGGBB`.
#[must_use]
pub const fn strength_color(score: u8) -> &'static str {
    strength::strength_color(score)
}

/// Random password with at least one character from each enabled class.
///
/// # Errors
///
/// Returns [`VaultError::Validation`] if `length` is outside `8..=64` or no
/// class is enabled.
pub fn generate_password(
    length: usize,
    uppercase: bool,
    lowercase: bool,
    digits: bool,
    symbols: bool,
) -> Result<String, VaultError> {
    let charset = CharsetConfig {
        uppercase,
        lowercase,
        digits,
        symbols,
    };
    password::generate_password(length, &charset).map_err(|e| VaultError::Validation(e.to_string()))
}
