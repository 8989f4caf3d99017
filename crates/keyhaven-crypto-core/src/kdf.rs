//! Argon2id key derivation.
//!
//! - [`derive`]: stretch a master password + salt into 32 bytes of key material
//! - [`Argon2idParams`]: serializable cost parameters (stored in vault metadata)
//! - [`KdfPreset`]: Fast / Balanced / Maximum selector
//!
//! The salt and cost parameters travel with every vault and every encrypted
//! backup, so a vault created with one preset keeps unlocking after the
//! default changes.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Output length of the KDF in bytes (256 bits).
pub const OUTPUT_LEN: usize = 32;

/// Minimum salt length in bytes. Stricter than argon2's own minimum of 8.
pub const MIN_SALT_LEN: usize = 16;

/// Salt length generated for new vaults.
pub const SALT_LEN: usize = 16;

const MEMORY_32MB: u32 = 32_768;
const MEMORY_64MB: u32 = 65_536;
const MEMORY_256MB: u32 = 262_144;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Argon2id cost parameters.
///
/// `m_cost` is in KiB (the `argon2` crate convention), `t_cost` is the
/// iteration count and `p_cost` the lane count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2idParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Argon2idParams {
    fn default() -> Self {
        KdfPreset::Balanced.params()
    }
}

/// KDF preset selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KdfPreset {
    /// Low-end devices.
    Fast,
    /// Default for new vaults.
    Balanced,
    /// Desktop-class hardware.
    Maximum,
}

impl KdfPreset {
    #[must_use]
    pub const fn params(self) -> Argon2idParams {
        match self {
            Self::Fast => Argon2idParams {
                m_cost: MEMORY_32MB,
                t_cost: 3,
                p_cost: 4,
            },
            Self::Balanced => Argon2idParams {
                m_cost: MEMORY_64MB,
                t_cost: 3,
                p_cost: 4,
            },
            Self::Maximum => Argon2idParams {
                m_cost: MEMORY_256MB,
                t_cost: 4,
                p_cost: 4,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

impl Argon2idParams {
    fn hasher(&self) -> Result<argon2::Argon2<'static>, CryptoError> {
        let cost = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(OUTPUT_LEN))
            .map_err(|e| CryptoError::KeyDerivation(format!("rejected cost parameters: {e}")))?;
        Ok(argon2::Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            cost,
        ))
    }
}

/// Stretch `password` with `salt` into [`OUTPUT_LEN`] bytes of key material.
///
/// The password may be empty. Length policy belongs to the vault layer.
///
/// # Errors
///
/// `CryptoError::KeyDerivation` for a salt under [`MIN_SALT_LEN`] bytes,
/// cost parameters argon2 refuses, or a failed run.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<SecretBuffer, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} of {MIN_SALT_LEN} bytes",
            salt.len()
        )));
    }

    let mut okm = Zeroizing::new([0u8; OUTPUT_LEN]);
    params
        .hasher()?
        .hash_password_into(password, salt, &mut okm[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2id: {e}")))?;
    SecretBuffer::new(&okm[..])
}
