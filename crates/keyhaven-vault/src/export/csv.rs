//! Plaintext CSV export.
//!
//! Columns: `site,url,username,password,category,notes`, preceded by a
//! header row. Only active credentials are written, most recently modified
//! first; secure notes stay out of plaintext exports. A credential's own
//! `notes` field is included.

use crate::entries::Entry;
use crate::error::VaultError;
use crate::query::{self, SortOrder};

/// Column order shared with the CSV importer.
pub const COLUMNS: [&str; 6] = ["site", "url", "username", "password", "category", "notes"];

/// Render active credentials in `entries` as CSV, quoting as needed.
///
/// # Errors
///
/// Returns [`VaultError::Export`] if the writer fails.
pub fn export(entries: &[Entry]) -> Result<String, VaultError> {
    let mut writer = ::csv::WriterBuilder::new()
        .terminator(::csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(export_err)?;

    let mut rows: Vec<Entry> = entries
        .iter()
        .filter(|e| e.is_credential() && !e.is_trashed())
        .cloned()
        .collect();
    query::sort_entries(&mut rows, SortOrder::Recent);

    let mut written = 0usize;
    for entry in &rows {
        writer
            .write_record([
                entry.site_name.as_str(),
                entry.url().unwrap_or_default(),
                entry.username().unwrap_or_default(),
                entry.password().unwrap_or_default(),
                entry.category.label(),
                entry.notes.as_deref().unwrap_or_default(),
            ])
            .map_err(export_err)?;
        written = written.saturating_add(1);
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| VaultError::Export(format!("CSV flush failed: {e}")))?;
    tracing::debug!(rows = written, "CSV export rendered");
    String::from_utf8(bytes).map_err(|e| VaultError::Export(format!("CSV is not UTF-8: {e}")))
}

fn export_err(e: ::csv::Error) -> VaultError {
    VaultError::Export(format!("CSV write failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{Category, EntryKind};

    fn entry(id: &str, kind: EntryKind) -> Entry {
        Entry {
            id: id.into(),
            site_name: "Acme, Inc.".into(),
            kind,
            notes: Some("says \"hi\"".into()),
            category: Category::SocialMedia,
            is_favourite: false,
            created_at: 0,
            modified_at: 0,
            last_used_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn header_then_quoted_rows() {
        let cred = entry(
            "1",
            EntryKind::Credential {
                username: Some("dev".into()),
                password: "p,w".into(),
                url: Some("https://acme.test".into()),
            },
        );
        let out = export(&[cred]).unwrap();
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(lines[0], "site,url,username,password,category,notes");
        assert_eq!(
            lines[1],
            r#""Acme, Inc.",https://acme.test,dev,"p,w",Social Media,"says ""hi""""#
        );
    }

    #[test]
    fn skips_notes_and_trash() {
        let note = entry("n", EntryKind::SecureNote);
        let mut trashed = entry(
            "t",
            EntryKind::Credential {
                username: None,
                password: "x".into(),
                url: None,
            },
        );
        trashed.deleted_at = Some(1);
        let out = export(&[note, trashed]).unwrap();
        assert_eq!(out.trim_end(), "site,url,username,password,category,notes");
    }

    #[test]
    fn rows_follow_most_recent_first() {
        let cred = |id: &str, site: &str, modified_at: i64| {
            let mut e = entry(
                id,
                EntryKind::Credential {
                    username: None,
                    password: "pw".into(),
                    url: None,
                },
            );
            e.site_name = site.into();
            e.notes = None;
            e.modified_at = modified_at;
            e
        };
        let out = export(&[cred("1", "old", 10), cred("2", "new", 30), cred("3", "mid", 20)]).unwrap();
        let sites: Vec<&str> = out
            .split("\r\n")
            .skip(1)
            .filter(|l| !l.is_empty())
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(sites, ["new", "mid", "old"]);
    }
}
