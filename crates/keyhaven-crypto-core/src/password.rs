//! Random password generation.
//!
//! Every enabled character class contributes at least one character; the
//! rest are drawn from the union pool and the result is shuffled, all with
//! `OsRng`.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Minimum allowed password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum allowed password length.
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Default password length.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

pub const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &[u8] = b"0123456789";
pub const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?/~";

/// Which character classes the generator may use.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharsetConfig {
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for CharsetConfig {
    fn default() -> Self {
        Self {
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl CharsetConfig {
    /// Character sets of the enabled classes, in a fixed order.
    #[must_use]
    pub fn enabled_sets(&self) -> Vec<&'static [u8]> {
        [
            (self.uppercase, UPPERCASE),
            (self.lowercase, LOWERCASE),
            (self.digits, DIGITS),
            (self.symbols, SYMBOLS),
        ]
        .into_iter()
        .filter_map(|(on, set)| on.then_some(set))
        .collect()
    }
}

/// Generate a password of `length` characters from the enabled classes.
///
/// # Errors
///
/// Returns [`CryptoError::PasswordGeneration`] if `length` is outside
/// [`MIN_PASSWORD_LENGTH`]..=[`MAX_PASSWORD_LENGTH`] or no class is enabled.
pub fn generate_password(length: usize, charsets: &CharsetConfig) -> Result<String, CryptoError> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(CryptoError::PasswordGeneration(format!(
            "length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }

    let sets = charsets.enabled_sets();
    if sets.is_empty() {
        return Err(CryptoError::PasswordGeneration(
            "at least one character class must be enabled".into(),
        ));
    }

    let mut rng = OsRng;
    let pool: Vec<u8> = sets.concat();

    // One from each class, then fill from the whole pool.
    let mut chars: Vec<u8> = sets
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();
    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    Ok(chars.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(upper: bool, lower: bool, digits: bool, symbols: bool) -> CharsetConfig {
        CharsetConfig {
            uppercase: upper,
            lowercase: lower,
            digits,
            symbols,
        }
    }

    #[test]
    fn default_config_covers_every_class() {
        let pw = generate_password(DEFAULT_PASSWORD_LENGTH, &CharsetConfig::default())
            .expect("generate");
        assert_eq!(pw.len(), DEFAULT_PASSWORD_LENGTH);
        assert!(pw.bytes().any(|b| UPPERCASE.contains(&b)));
        assert!(pw.bytes().any(|b| LOWERCASE.contains(&b)));
        assert!(pw.bytes().any(|b| DIGITS.contains(&b)));
        assert!(pw.bytes().any(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn digits_only() {
        let pw = generate_password(12, &only(false, false, true, false)).expect("generate");
        assert!(pw.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn rejects_out_of_range_length() {
        let cfg = CharsetConfig::default();
        assert!(generate_password(MIN_PASSWORD_LENGTH - 1, &cfg).is_err());
        assert!(generate_password(MAX_PASSWORD_LENGTH + 1, &cfg).is_err());
        assert!(generate_password(MIN_PASSWORD_LENGTH, &cfg).is_ok());
        assert!(generate_password(MAX_PASSWORD_LENGTH, &cfg).is_ok());
    }

    #[test]
    fn rejects_no_classes() {
        let err = generate_password(16, &only(false, false, false, false))
            .expect_err("no classes");
        assert!(matches!(err, CryptoError::PasswordGeneration(_)));
    }

    #[test]
    fn consecutive_outputs_differ() {
        let cfg = CharsetConfig::default();
        let a = generate_password(32, &cfg).expect("generate");
        let b = generate_password(32, &cfg).expect("generate");
        assert_ne!(a, b);
    }
}
