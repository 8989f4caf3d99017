//! CSV import: `site,url,username,password,category,notes`.
//!
//! A leading header row is recognised and skipped. A row needs at least the
//! first four columns and a non-empty site; category and notes are optional.
//! Unknown categories fall back to `Others`. Rows that fail these checks, or
//! fail to parse as CSV at all, are counted as skipped.

use crate::entries::{Category, EntryDraft};
use crate::export::csv::COLUMNS;

const MIN_FIELDS: usize = 4;

/// Decoded rows plus the count of rejected ones.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub drafts: Vec<EntryDraft>,
    pub skipped: usize,
}

/// Decode `data`. Never fails as a whole; bad rows are skipped.
#[must_use]
pub fn parse(data: &str) -> ParsedCsv {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut parsed = ParsedCsv::default();
    for (index, record) in reader.records().enumerate() {
        let Ok(record) = record else {
            parsed.skipped = parsed.skipped.saturating_add(1);
            continue;
        };
        if index == 0 && is_header(&record) {
            continue;
        }
        match row_to_draft(&record) {
            Some(draft) => parsed.drafts.push(draft),
            None => parsed.skipped = parsed.skipped.saturating_add(1),
        }
    }
    parsed
}

fn is_header(record: &::csv::StringRecord) -> bool {
    record.len() >= MIN_FIELDS
        && record
            .iter()
            .zip(COLUMNS)
            .take(MIN_FIELDS)
            .all(|(field, name)| field.trim().eq_ignore_ascii_case(name))
}

fn row_to_draft(record: &::csv::StringRecord) -> Option<EntryDraft> {
    if !(MIN_FIELDS..=COLUMNS.len()).contains(&record.len()) {
        return None;
    }
    let field = |i: usize| record.get(i).unwrap_or_default();

    let site = field(0).trim();
    if site.is_empty() {
        return None;
    }
    let category = Category::parse(field(4)).unwrap_or_default();

    let mut draft = EntryDraft::credential(site, field(2), field(3))
        .with_url(field(1))
        .with_category(category);
    if !field(5).is_empty() {
        draft = draft.with_notes(field(5));
    }
    draft.normalized().ok()
}
