//! Import codecs.
//!
//! - [`csv`]: plaintext CSV in the export column order
//! - [`encrypted_json`]: encrypted backups produced by
//!   [`export::encrypted_json`](crate::export::encrypted_json)
//!
//! Parsers only decode. The repository commits the decoded entries in a
//! single persist.

pub mod csv;
pub mod encrypted_json;

use serde::{Deserialize, Serialize};

/// Summary of a completed import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Entries added to the vault.
    pub imported: usize,
    /// Rows or entries not added (malformed rows, ids already present).
    pub skipped: usize,
    /// Ids of the added entries.
    pub imported_ids: Vec<String>,
}

/// CSV import result.
pub type CsvImportSummary = ImportSummary;
