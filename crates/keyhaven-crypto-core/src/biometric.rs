//! Fast-unlock key wrapping.
//!
//! The collaborator keeps a random token in its OS keystore. The vault key is
//! sealed under a wrapping key derived from that token and the sealed blob is
//! stored in vault metadata. The master password is never cached.
//!
//! ```text
//! Token (32 B, OsRng) ──► HKDF-SHA256 ──► Wrapping Key ──► AES-256-GCM ──► sealed vault key
//! ```
//!
//! HKDF rather than Argon2id: the token is already full-entropy, and the OS
//! rate-limits biometric prompts.

use ring::hkdf;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use crate::symmetric::{self, SealedData, KEY_LEN};

/// Length of a fast-unlock token in bytes.
pub const TOKEN_LEN: usize = 32;

const HKDF_SALT: &[u8] = b"keyhaven-biometric-v1";
const HKDF_INFO: &[u8] = b"vault-key-wrapping";
const SEAL_AAD: &[u8] = b"keyhaven-biometric-sealed-key";

/// Token handed to the collaborator's keystore.
pub type BiometricToken = SecretBytes<TOKEN_LEN>;

struct WrappingKeyType;

impl hkdf::KeyType for WrappingKeyType {
    fn len(&self) -> usize {
        KEY_LEN
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate a fresh enrollment token from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the entropy source fails.
pub fn generate_token() -> Result<BiometricToken, CryptoError> {
    SecretBytes::random()
}

/// Derive the 256-bit wrapping key for `token`.
///
/// # Errors
///
/// Returns [`CryptoError::Biometric`] if HKDF fails.
pub fn derive_wrapping_key(token: &BiometricToken) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(token.expose());
    let okm = prk
        .expand(&[HKDF_INFO], WrappingKeyType)
        .map_err(|_| CryptoError::Biometric("HKDF expand failed".into()))?;

    let mut key_bytes = [0u8; KEY_LEN];
    okm.fill(&mut key_bytes)
        .map_err(|_| CryptoError::Biometric("HKDF fill failed".into()))?;
    let key = SecretBytes::new(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Seal `vault_key` under the wrapping key derived from `token`.
///
/// # Errors
///
/// Returns [`CryptoError::Biometric`] or [`CryptoError::Encryption`] on failure.
pub fn seal_vault_key(
    vault_key: &SecretBytes<KEY_LEN>,
    token: &BiometricToken,
) -> Result<SealedData, CryptoError> {
    let wrapping = derive_wrapping_key(token)?;
    symmetric::encrypt(vault_key.expose(), wrapping.expose(), SEAL_AAD)
}

/// Recover the vault key sealed by [`seal_vault_key`].
///
/// # Errors
///
/// Returns [`CryptoError::IntegrityFailure`] for a wrong or stale token, and
/// [`CryptoError::InvalidKeyMaterial`] if the unsealed blob is not 32 bytes.
pub fn unseal_vault_key(
    sealed: &SealedData,
    token: &BiometricToken,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    let wrapping = derive_wrapping_key(token)?;
    let opened = symmetric::decrypt(sealed, wrapping.expose(), SEAL_AAD)?;
    SecretBytes::from_slice(opened.expose())
}
