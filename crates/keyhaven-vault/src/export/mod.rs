//! Export codecs.
//!
//! - [`csv`]: plaintext CSV of active credentials
//! - [`encrypted_json`]: full-fidelity encrypted backup

pub mod csv;
pub mod encrypted_json;

use std::path::Path;

use crate::error::VaultError;

/// Write export output to `path` atomically.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the file cannot be written.
pub fn write_file(path: &Path, contents: &str) -> Result<(), VaultError> {
    crate::store::atomic_write(path, contents.as_bytes())?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "export written");
    Ok(())
}
