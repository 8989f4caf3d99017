//! On-disk vault container: metadata header, sealed entry set, padding.
//!
//! - [`seal`]: produce container bytes from metadata + plaintext payload
//! - [`open`]: authenticate and decrypt the payload of a container
//! - [`parse_metadata`]: read the header without any key
//! - [`rewrite_metadata`]: replace the header, keep the sealed payload as-is
//!
//! # File Layout
//!
//! ```text
//! Magic (4 B) | Meta Len (u32 LE) | Meta JSON | Sealed Len (u32 LE) | Sealed bytes | Padding
//! ```
//!
//! - **Magic**: `b"KHV1"`
//! - **Meta**: JSON [`VaultMetadata`]: salt, KDF params, verifier, vault settings
//! - **Sealed**: `nonce || ciphertext || tag` of the serialized entry set
//! - **Padding**: random bytes up to the next [`PADDING_BOUNDARY`], so the
//!   file size only reveals the entry count coarsely
//!
//! The payload AAD binds the header fields that only change with the vault
//! key (version, salt, KDF params, verifier) together with `autoLockMs`, so
//! editing any of them in the file makes the payload fail authentication.
//! The fast-unlock fields stay unbound: the sealed key authenticates itself.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::kdf::Argon2idParams;
use crate::memory::SecretBuffer;
use crate::symmetric::{self, SealedData, KEY_LEN};

/// Magic bytes identifying a vault file.
pub const MAGIC: &[u8; 4] = b"KHV1";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// File size padding boundary in bytes.
pub const PADDING_BOUNDARY: usize = 4096;

const MAGIC_LEN: usize = 4;
const LEN_PREFIX: usize = 4;
const PAYLOAD_AAD: &[u8] = b"keyhaven-vault-payload-v1";
const MIN_FILE_SIZE: usize = MAGIC_LEN + LEN_PREFIX + LEN_PREFIX;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-vault metadata, stored unencrypted in the container header.
///
/// Holds nothing that identifies entries: no names, no counts, no timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    pub version: u8,
    /// Argon2id salt.
    pub salt: Vec<u8>,
    pub kdf_params: Argon2idParams,
    /// HKDF-derived password verifier (independent of the encryption key).
    pub verifier: Vec<u8>,
    /// Inactivity auto-lock in milliseconds; 0 disables it.
    #[serde(default)]
    pub auto_lock_ms: u64,
    /// Whether the cached-credential fast unlock is enrolled.
    #[serde(default)]
    pub biometric_enabled: bool,
    /// Vault key sealed under the fast-unlock wrapping key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometric_sealed_key: Option<SealedData>,
}

/// Header fields covered by the payload AAD.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BoundHeader<'a> {
    version: u8,
    salt: &'a [u8],
    kdf_params: &'a Argon2idParams,
    verifier: &'a [u8],
    auto_lock_ms: u64,
}

impl<'a> From<&'a VaultMetadata> for BoundHeader<'a> {
    fn from(m: &'a VaultMetadata) -> Self {
        Self {
            version: m.version,
            salt: &m.salt,
            kdf_params: &m.kdf_params,
            verifier: &m.verifier,
            auto_lock_ms: m.auto_lock_ms,
        }
    }
}

/// Container sections located by [`split`], all borrowed from the input.
struct Sections<'a> {
    metadata: &'a [u8],
    sealed: &'a [u8],
}

// ---------------------------------------------------------------------------
// Sealing
// ---------------------------------------------------------------------------

/// Build container bytes: encrypts `payload` under `key`, prepends `metadata`.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] if the key is not 32 bytes,
/// [`CryptoError::Encryption`] if sealing fails, and
/// [`CryptoError::VaultFormat`] if the metadata cannot be serialized.
pub fn seal(
    metadata: &VaultMetadata,
    payload: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid vault key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let sealed = symmetric::encrypt(payload, key, &payload_aad(metadata)?)?;
    assemble(metadata, &sealed.to_bytes())
}

/// Decrypt the payload of a container.
///
/// # Errors
///
/// Returns [`CryptoError::VaultFormat`] for structural problems and
/// [`CryptoError::IntegrityFailure`] for a wrong key, tampered payload bytes
/// or an edited bound header field.
pub fn open(data: &[u8], key: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let sections = split(data)?;
    let metadata = decode_metadata(sections.metadata)?;
    let sealed = SealedData::from_bytes(sections.sealed)
        .map_err(|e| CryptoError::VaultFormat(format!("invalid sealed payload: {e}")))?;
    symmetric::decrypt(&sealed, key, &payload_aad(&metadata)?)
}

/// Read the metadata header only.
///
/// # Errors
///
/// Returns [`CryptoError::VaultFormat`] for bad magic, truncation, invalid
/// JSON, or a version newer than [`FORMAT_VERSION`].
pub fn parse_metadata(data: &[u8]) -> Result<VaultMetadata, CryptoError> {
    let sections = split(data)?;
    decode_metadata(sections.metadata)
}

/// Swap the metadata header, keeping the sealed payload byte-for-byte.
///
/// Only the unbound fast-unlock fields may differ, so this works while the
/// vault is locked. Anything else needs a fresh [`seal`].
///
/// # Errors
///
/// Returns [`CryptoError::VaultFormat`] if `original` is not a valid container
/// or `metadata` changes a field bound into the payload AAD.
pub fn rewrite_metadata(original: &[u8], metadata: &VaultMetadata) -> Result<Vec<u8>, CryptoError> {
    let sections = split(original)?;
    let current = decode_metadata(sections.metadata)?;
    if payload_aad(&current)? != payload_aad(metadata)? {
        return Err(CryptoError::VaultFormat(
            "bound header fields can only change with a reseal".into(),
        ));
    }
    assemble(metadata, sections.sealed)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn decode_metadata(bytes: &[u8]) -> Result<VaultMetadata, CryptoError> {
    let metadata: VaultMetadata = serde_json::from_slice(bytes)
        .map_err(|e| CryptoError::VaultFormat(format!("invalid metadata: {e}")))?;
    if metadata.version > FORMAT_VERSION {
        return Err(CryptoError::VaultFormat(format!(
            "vault format version {} is newer than supported version {FORMAT_VERSION}",
            metadata.version
        )));
    }
    Ok(metadata)
}

fn payload_aad(metadata: &VaultMetadata) -> Result<Vec<u8>, CryptoError> {
    let header = serde_json::to_vec(&BoundHeader::from(metadata))
        .map_err(|e| CryptoError::VaultFormat(format!("header serialization failed: {e}")))?;
    let mut aad = Vec::with_capacity(PAYLOAD_AAD.len().saturating_add(header.len()));
    aad.extend_from_slice(PAYLOAD_AAD);
    aad.extend_from_slice(&header);
    Ok(aad)
}

fn assemble(metadata: &VaultMetadata, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let meta_json = serde_json::to_vec(metadata)
        .map_err(|e| CryptoError::VaultFormat(format!("metadata serialization failed: {e}")))?;
    let meta_len = u32::try_from(meta_json.len())
        .map_err(|_| CryptoError::VaultFormat("metadata too large for u32 length".into()))?;
    let sealed_len = u32::try_from(sealed.len())
        .map_err(|_| CryptoError::VaultFormat("payload too large for u32 length".into()))?;

    let content_size = MIN_FILE_SIZE
        .checked_add(meta_json.len())
        .and_then(|s| s.checked_add(sealed.len()))
        .ok_or_else(|| CryptoError::VaultFormat("content size overflow".into()))?;
    let padding = padding_for(content_size);

    let mut out = Vec::with_capacity(content_size.saturating_add(padding.len()));
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&meta_len.to_le_bytes());
    out.extend_from_slice(&meta_json);
    out.extend_from_slice(&sealed_len.to_le_bytes());
    out.extend_from_slice(sealed);
    out.extend_from_slice(&padding);
    Ok(out)
}

fn split(data: &[u8]) -> Result<Sections<'_>, CryptoError> {
    if data.len() < MIN_FILE_SIZE {
        return Err(CryptoError::VaultFormat(format!(
            "file too short: {} bytes (minimum {MIN_FILE_SIZE})",
            data.len()
        )));
    }
    if &data[..MAGIC_LEN] != MAGIC.as_slice() {
        return Err(CryptoError::VaultFormat("invalid magic bytes".into()));
    }

    let mut cursor = MAGIC_LEN;
    let metadata = read_section(data, &mut cursor, "metadata")?;
    let sealed = read_section(data, &mut cursor, "sealed payload")?;
    Ok(Sections { metadata, sealed })
}

/// Read a u32-LE length prefix at `cursor`, then that many bytes.
fn read_section<'a>(
    data: &'a [u8],
    cursor: &mut usize,
    what: &str,
) -> Result<&'a [u8], CryptoError> {
    let start = cursor
        .checked_add(LEN_PREFIX)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| CryptoError::VaultFormat(format!("truncated {what} length")))?;
    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(&data[*cursor..start]);
    let len = usize::try_from(u32::from_le_bytes(len_bytes))
        .map_err(|_| CryptoError::VaultFormat("length exceeds platform usize".into()))?;

    let end = start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| CryptoError::VaultFormat(format!("{what} extends beyond file")))?;
    *cursor = end;
    Ok(&data[start..end])
}

/// Random bytes up to the next boundary; a full block when already aligned.
fn padding_for(content_size: usize) -> Vec<u8> {
    let remainder = content_size % PADDING_BOUNDARY;
    let needed = PADDING_BOUNDARY.saturating_sub(remainder);
    let mut padding = vec![0u8; needed];
    OsRng.fill_bytes(&mut padding);
    padding
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_LEN] = [0x11; KEY_LEN];

    fn metadata() -> VaultMetadata {
        VaultMetadata {
            version: FORMAT_VERSION,
            salt: vec![7; 16],
            kdf_params: Argon2idParams {
                m_cost: 32,
                t_cost: 1,
                p_cost: 1,
            },
            verifier: vec![9; 32],
            auto_lock_ms: 60_000,
            biometric_enabled: false,
            biometric_sealed_key: None,
        }
    }

    #[test]
    fn seal_open_roundtrip() {
        let bytes = seal(&metadata(), b"[]", &KEY).expect("seal");
        assert_eq!(bytes.len() % PADDING_BOUNDARY, 0);
        assert_eq!(open(&bytes, &KEY).expect("open").expose(), b"[]");
        assert_eq!(parse_metadata(&bytes).expect("parse"), metadata());
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let bytes = seal(&metadata(), b"entries", &KEY).expect("seal");
        assert!(matches!(
            open(&bytes, &[0x22; KEY_LEN]),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn flipped_payload_byte_fails_integrity() {
        let mut bytes = seal(&metadata(), b"entries", &KEY).expect("seal");
        let meta_len = serde_json::to_vec(&metadata()).expect("json").len();
        let payload_start = MIN_FILE_SIZE + meta_len;
        bytes[payload_start + 3] ^= 0xFF;
        assert!(matches!(open(&bytes, &KEY), Err(CryptoError::IntegrityFailure)));
    }

    #[test]
    fn bad_magic_and_truncation_are_format_errors() {
        let mut bytes = seal(&metadata(), b"x", &KEY).expect("seal");
        assert!(matches!(
            parse_metadata(&bytes[..6]),
            Err(CryptoError::VaultFormat(_))
        ));
        bytes[0] = b'X';
        assert!(matches!(
            parse_metadata(&bytes),
            Err(CryptoError::VaultFormat(_))
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut meta = metadata();
        meta.version = FORMAT_VERSION + 1;
        let bytes = seal(&meta, b"x", &KEY).expect("seal");
        let err = parse_metadata(&bytes).expect_err("newer version");
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn rewrite_metadata_keeps_payload() {
        let bytes = seal(&metadata(), b"payload", &KEY).expect("seal");
        let mut updated = metadata();
        updated.biometric_enabled = true;
        let rewritten = rewrite_metadata(&bytes, &updated).expect("rewrite");
        assert!(parse_metadata(&rewritten).expect("parse").biometric_enabled);
        assert_eq!(open(&rewritten, &KEY).expect("open").expose(), b"payload");
    }

    #[test]
    fn rewrite_metadata_refuses_bound_fields() {
        let bytes = seal(&metadata(), b"payload", &KEY).expect("seal");
        let mut updated = metadata();
        updated.auto_lock_ms = 0;
        assert!(matches!(
            rewrite_metadata(&bytes, &updated),
            Err(CryptoError::VaultFormat(_))
        ));
    }

    #[test]
    fn edited_auto_lock_in_header_fails_integrity() {
        let bytes = seal(&metadata(), b"payload", &KEY).expect("seal");
        let mut edited = metadata();
        edited.auto_lock_ms = 0;
        // Splice a forged header in front of the original sealed payload.
        let sealed = split(&bytes).expect("split").sealed.to_vec();
        let forged = assemble(&edited, &sealed).expect("assemble");
        assert_eq!(parse_metadata(&forged).expect("parse").auto_lock_ms, 0);
        assert!(matches!(open(&forged, &KEY), Err(CryptoError::IntegrityFailure)));
    }

    #[test]
    fn resealing_with_new_settings_opens() {
        let mut updated = metadata();
        updated.auto_lock_ms = 0;
        let bytes = seal(&updated, b"payload", &KEY).expect("seal");
        assert_eq!(open(&bytes, &KEY).expect("open").expose(), b"payload");
    }
}
