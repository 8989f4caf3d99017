//! k-anonymity hash split for breach lookups.
//!
//! The password is hashed with SHA-1 (the breach database's key format),
//! hex-encoded uppercase, and split into a 5-character prefix sent to the
//! service and a 35-character suffix matched locally.

use ring::digest;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Characters of the hash sent to the service.
pub const PREFIX_LEN: usize = 5;

/// Characters of the hash kept for local matching.
pub const SUFFIX_LEN: usize = 35;

/// Prefix/suffix pair. Both halves are wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BreachHash {
    prefix: String,
    suffix: String,
}

impl BreachHash {
    /// The routing prefix (5 uppercase hex characters).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The local suffix (35 uppercase hex characters).
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Case-insensitive comparison against a suffix returned by the service.
    #[must_use]
    pub fn matches_suffix(&self, candidate: &str) -> bool {
        self.suffix.eq_ignore_ascii_case(candidate.trim())
    }
}

impl std::fmt::Debug for BreachHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BreachHash(***)")
    }
}

/// Hash `password` and split it into routing prefix and local suffix.
#[must_use]
pub fn breach_hash_split(password: &str) -> BreachHash {
    let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, password.as_bytes());
    let mut hex = data_encoding::HEXUPPER.encode(hash.as_ref());
    let suffix = hex.split_off(PREFIX_LEN);
    BreachHash {
        prefix: hex,
        suffix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA-1("password") = 5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8
        let split = breach_hash_split("password");
        assert_eq!(split.prefix(), "5BAA6");
        assert_eq!(split.suffix(), "1E4C9B93F3F0682250B6CF8331B7EE68FD8");
    }

    #[test]
    fn split_is_stable_and_sized() {
        let a = breach_hash_split("password123");
        let b = breach_hash_split("password123");
        assert_eq!(a, b);
        assert_eq!(a.prefix().len(), PREFIX_LEN);
        assert_eq!(a.suffix().len(), SUFFIX_LEN);
        assert_ne!(a, breach_hash_split("password124"));
    }

    #[test]
    fn suffix_match_ignores_case() {
        let split = breach_hash_split("password");
        assert!(split.matches_suffix("1e4c9b93f3f0682250b6cf8331b7ee68fd8"));
        assert!(!split.matches_suffix("0000000000000000000000000000000000"));
    }

    #[test]
    fn debug_is_masked() {
        assert_eq!(format!("{:?}", breach_hash_split("x")), "BreachHash(***)");
    }
}
