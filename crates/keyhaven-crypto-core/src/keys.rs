//! Master-password key hierarchy.
//!
//! ```text
//! master password ──► Argon2id(salt, params) ──► root key
//!                                                 ├─ HKDF "vault-encryption-key" ──► encryption key
//!                                                 └─ HKDF "master-password-verifier" ──► verifier
//! ```
//!
//! The verifier is stored in [`VaultMetadata`]; the encryption key never is.
//! Knowing the verifier does not reveal the encryption key (independent HKDF
//! outputs), and checking a password never requires decrypting the vault.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::hkdf;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::kdf::{self, Argon2idParams, SALT_LEN};
use crate::memory::SecretBytes;
use crate::symmetric::KEY_LEN;
use crate::vault_format::{VaultMetadata, FORMAT_VERSION};

/// Verifier length in bytes.
pub const VERIFIER_LEN: usize = 32;

const HKDF_SALT: &[u8] = b"keyhaven-master-key-v1";
const INFO_ENCRYPTION: &[u8] = b"vault-encryption-key";
const INFO_VERIFIER: &[u8] = b"master-password-verifier";

/// The resident vault encryption key.
pub type VaultKey = SecretBytes<KEY_LEN>;

struct Okm32;

impl hkdf::KeyType for Okm32 {
    fn len(&self) -> usize {
        KEY_LEN
    }
}

/// Create fresh metadata and the matching encryption key for a new vault.
///
/// Generates a random salt, runs Argon2id with `params`, and derives the
/// encryption key and the verifier. `auto_lock_ms` starts at 0 (disabled);
/// the vault layer applies its configured default.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the entropy source fails and
/// `CryptoError::KeyDerivation` if Argon2id rejects `params`.
pub fn setup(
    master_password: &[u8],
    params: &Argon2idParams,
) -> Result<(VaultMetadata, VaultKey), CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;

    let (key, verifier) = derive_pair(master_password, &salt, params)?;

    let metadata = VaultMetadata {
        version: FORMAT_VERSION,
        salt: salt.to_vec(),
        kdf_params: params.clone(),
        verifier: verifier.expose().to_vec(),
        auto_lock_ms: 0,
        biometric_enabled: false,
        biometric_sealed_key: None,
    };
    Ok((metadata, key))
}

/// Re-derive the key for an existing vault, returning it only if the
/// password reproduces the stored verifier.
///
/// The comparison touches every byte regardless of where the first
/// difference is.
///
/// # Errors
///
/// Returns `CryptoError::VerifierMismatch` for a wrong password and
/// `CryptoError::KeyDerivation` if the stored salt or params are unusable.
pub fn derive_and_verify(
    master_password: &[u8],
    metadata: &VaultMetadata,
) -> Result<VaultKey, CryptoError> {
    let (key, verifier) = derive_pair(master_password, &metadata.salt, &metadata.kdf_params)?;
    if constant_time_eq(verifier.expose(), &metadata.verifier) {
        Ok(key)
    } else {
        Err(CryptoError::VerifierMismatch)
    }
}

/// Derive the encryption key without consulting a verifier.
///
/// Used for encrypted backups, which carry salt and params but no verifier;
/// a wrong password surfaces there as an AEAD integrity failure.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the salt or params are unusable.
pub fn derive_key(
    master_password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<VaultKey, CryptoError> {
    derive_pair(master_password, salt, params).map(|(key, _)| key)
}

fn derive_pair(
    master_password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<(VaultKey, SecretBytes<VERIFIER_LEN>), CryptoError> {
    let root = kdf::derive(master_password, salt, params)?;
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(root.expose());
    let key = expand(&prk, INFO_ENCRYPTION)?;
    let verifier = expand(&prk, INFO_VERIFIER)?;
    Ok((key, verifier))
}

fn expand(prk: &hkdf::Prk, info: &[u8]) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let info = [info];
    let okm = prk
        .expand(&info, Okm32)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".into()))?;
    let mut out = [0u8; KEY_LEN];
    okm.fill(&mut out)
        .map_err(|_| CryptoError::KeyDerivation("HKDF fill failed".into()))?;
    let secret = SecretBytes::new(out);
    out.zeroize();
    Ok(secret)
}

/// Length-then-content comparison with no early exit on content.
///
/// The verifier length is public (fixed at 32), so only the content is
/// protected.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PARAMS: Argon2idParams = Argon2idParams {
        m_cost: 32,
        t_cost: 1,
        p_cost: 1,
    };

    #[test]
    fn setup_then_verify_returns_same_key() {
        let (meta, key) = setup(b"correct-horse-1", &TEST_PARAMS).expect("setup");
        let again = derive_and_verify(b"correct-horse-1", &meta).expect("verify");
        assert_eq!(key.expose(), again.expose());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (meta, _) = setup(b"correct-horse-1", &TEST_PARAMS).expect("setup");
        assert!(matches!(
            derive_and_verify(b"correct-horse-2", &meta),
            Err(CryptoError::VerifierMismatch)
        ));
    }

    #[test]
    fn verifier_is_not_the_encryption_key() {
        let (meta, key) = setup(b"pw-12345678", &TEST_PARAMS).expect("setup");
        assert_eq!(meta.verifier.len(), VERIFIER_LEN);
        assert_ne!(meta.verifier.as_slice(), key.expose().as_slice());
    }

    #[test]
    fn setup_uses_fresh_salt() {
        let (a, key_a) = setup(b"same", &TEST_PARAMS).expect("setup");
        let (b, key_b) = setup(b"same", &TEST_PARAMS).expect("setup");
        assert_eq!(a.salt.len(), SALT_LEN);
        assert_ne!(a.salt, b.salt);
        assert_ne!(key_a.expose(), key_b.expose());
    }

    #[test]
    fn derive_key_matches_verified_key() {
        let (meta, key) = setup(b"backup-pw", &TEST_PARAMS).expect("setup");
        let derived = derive_key(b"backup-pw", &meta.salt, &meta.kdf_params).expect("derive");
        assert_eq!(key.expose(), derived.expose());
    }

    #[test]
    fn truncated_verifier_never_matches() {
        let (mut meta, _) = setup(b"pw", &TEST_PARAMS).expect("setup");
        meta.verifier.truncate(16);
        assert!(derive_and_verify(b"pw", &meta).is_err());
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
