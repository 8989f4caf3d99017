//! AES-256-GCM authenticated encryption.
//!
//! - [`encrypt`]: seal plaintext under a fresh random nonce, returning [`SealedData`]
//! - [`decrypt`]: authenticate and open [`SealedData`], returning [`SecretBuffer`]
//!
//! Seals the serialized entry set, encrypted backups and the fast-unlock
//! key. A failed tag check returns [`CryptoError::IntegrityFailure`] and
//! never any plaintext.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Nonce + ciphertext + tag.
///
/// Byte form: `nonce (12) || ciphertext (n) || tag (16)`.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedData {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Concatenate into `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(MIN_SEALED_LEN.saturating_add(self.ciphertext.len()));
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Split `nonce || ciphertext || tag` back into its parts.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if `bytes` is shorter than nonce + tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Some(ct_end) = bytes.len().checked_sub(TAG_LEN) else {
            return Err(too_short(bytes.len()));
        };
        if ct_end < NONCE_LEN {
            return Err(too_short(bytes.len()));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[ct_end..]);

        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..ct_end].to_vec(),
            tag,
        })
    }

    /// Byte form encoded as standard base64 (used by the JSON backup format).
    #[must_use]
    pub fn to_base64(&self) -> String {
        data_encoding::BASE64.encode(&self.to_bytes())
    }

    /// Inverse of [`SealedData::to_base64`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` for invalid base64 or a truncated blob.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = data_encoding::BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("invalid base64 ciphertext: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

fn too_short(len: usize) -> CryptoError {
    CryptoError::Encryption(format!(
        "sealed data too short: {len} bytes (minimum {MIN_SEALED_LEN})"
    ))
}

fn aes_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

/// Seal `plaintext` under `key` with a fresh `OsRng` nonce.
///
/// `aad` is bound to the ciphertext without being encrypted. [`decrypt`]
/// needs the identical bytes.
///
/// # Errors
///
/// `CryptoError::Encryption` for a key that is not [`KEY_LEN`] bytes or a
/// failed seal.
pub fn encrypt(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let key = aes_key(key)?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut body = Zeroizing::new(plaintext.to_vec());
    let tag = key
        .seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::from(aad),
            &mut body[..],
        )
        .map_err(|_| CryptoError::Encryption("AES-256-GCM seal failed".into()))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());
    Ok(SealedData {
        nonce,
        ciphertext: std::mem::take(&mut *body),
        tag: tag_bytes,
    })
}

/// Verify and open `sealed` under `key`.
///
/// # Errors
///
/// `CryptoError::Encryption` for a key that is not [`KEY_LEN`] bytes.
/// `CryptoError::IntegrityFailure` when the tag does not verify, whether
/// from tampering, the wrong key, or different `aad`.
pub fn decrypt(sealed: &SealedData, key: &[u8], aad: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let key = aes_key(key)?;

    let mut joined = Zeroizing::new(sealed.to_bytes().split_off(NONCE_LEN));
    let plaintext = key
        .open_in_place(
            aead::Nonce::assume_unique_for_key(sealed.nonce),
            aead::Aad::from(aad),
            &mut joined[..],
        )
        .map_err(|_| CryptoError::IntegrityFailure)?;
    SecretBuffer::new(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_LEN] = [0x5C; KEY_LEN];

    fn seal(plaintext: &[u8], aad: &[u8]) -> SealedData {
        encrypt(plaintext, &KEY, aad).unwrap()
    }

    fn is_integrity_failure(result: Result<SecretBuffer, CryptoError>) -> bool {
        matches!(result, Err(CryptoError::IntegrityFailure))
    }

    #[test]
    fn opens_what_it_sealed() {
        for plaintext in [&b""[..], &b"x"[..], &b"{\"entries\":[]}"[..]] {
            let sealed = seal(plaintext, b"ctx");
            assert_eq!(sealed.ciphertext.len(), plaintext.len());
            let opened = decrypt(&sealed, &KEY, b"ctx").unwrap();
            assert_eq!(opened.expose(), plaintext);
        }
    }

    #[test]
    fn any_flipped_bit_is_detected() {
        let sealed = seal(b"entry set", &[]);
        let bytes = sealed.to_bytes();
        for index in [0, NONCE_LEN, NONCE_LEN + 4, bytes.len() - 1] {
            let mut damaged = bytes.clone();
            damaged[index] ^= 0x10;
            let damaged = SealedData::from_bytes(&damaged).unwrap();
            assert!(is_integrity_failure(decrypt(&damaged, &KEY, &[])), "byte {index}");
        }
    }

    #[test]
    fn key_and_aad_must_both_match() {
        let sealed = seal(b"entry set", b"vault-v1");
        assert!(is_integrity_failure(decrypt(&sealed, &[0x5D; KEY_LEN], b"vault-v1")));
        assert!(is_integrity_failure(decrypt(&sealed, &KEY, b"backup-v1")));
        assert!(decrypt(&sealed, &KEY, b"vault-v1").is_ok());
    }

    #[test]
    fn key_length_is_checked_before_use() {
        assert!(matches!(
            encrypt(b"x", &KEY[..KEY_LEN - 1], &[]),
            Err(CryptoError::Encryption(_))
        ));
        let sealed = seal(b"x", &[]);
        assert!(matches!(
            decrypt(&sealed, &[0u8; 16], &[]),
            Err(CryptoError::Encryption(_))
        ));
    }

    #[test]
    fn every_seal_draws_a_new_nonce() {
        assert_ne!(seal(b"same", &[]).nonce, seal(b"same", &[]).nonce);
    }

    #[test]
    fn base64_form_is_lossless_and_length_checked() {
        let sealed = seal(b"backup", &[]);
        assert_eq!(SealedData::from_base64(&sealed.to_base64()).unwrap(), sealed);
        assert_eq!(sealed.to_bytes().len(), MIN_SEALED_LEN + 6);

        assert!(SealedData::from_bytes(&[0u8; MIN_SEALED_LEN]).is_ok());
        assert!(SealedData::from_bytes(&[0u8; MIN_SEALED_LEN - 1]).is_err());
        assert!(SealedData::from_base64("%%%").is_err());
    }
}
