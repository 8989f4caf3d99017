//! Filter / search / sort parameters for listing entries.
//!
//! Queries never see trashed entries; the trash has its own listing.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::entries::{Category, Entry};

/// Which active entries to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "filter", content = "category")]
pub enum EntryFilter {
    #[default]
    Active,
    Favourites,
    SecureNotes,
    Credentials,
    Category(Category),
}

impl EntryFilter {
    #[must_use]
    pub fn matches(self, entry: &Entry) -> bool {
        if entry.is_trashed() {
            return false;
        }
        match self {
            Self::Active => true,
            Self::Favourites => entry.is_favourite,
            Self::SecureNotes => entry.is_secure_note(),
            Self::Credentials => entry.is_credential(),
            Self::Category(c) => entry.category == c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Most recently modified first.
    #[default]
    Recent,
    NameAsc,
    NameDesc,
    /// Newest first.
    Created,
    /// Most recently used first; never-used entries last.
    LastUsed,
}

/// A listing request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    #[serde(default)]
    pub filter: EntryFilter,
    /// Case-insensitive substring matched against site name and username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl EntryQuery {
    #[must_use]
    pub fn new(filter: EntryFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    #[must_use]
    pub const fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Whether `entry` passes the filter and the search text.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.filter.matches(entry) {
            return false;
        }
        let Some(needle) = self.search.as_deref().map(str::trim) else {
            return true;
        };
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        entry.site_name.to_lowercase().contains(&needle)
            || entry
                .username()
                .is_some_and(|u| u.to_lowercase().contains(&needle))
    }

    /// Select and order matching entries.
    #[must_use]
    pub fn apply(&self, entries: &[Entry]) -> Vec<Entry> {
        let mut out: Vec<Entry> = entries.iter().filter(|e| self.matches(e)).cloned().collect();
        sort_entries(&mut out, self.sort);
        out
    }
}

/// Stable sort; ties keep their stored order.
pub fn sort_entries(entries: &mut [Entry], order: SortOrder) {
    match order {
        SortOrder::Recent => entries.sort_by_key(|e| Reverse(e.modified_at)),
        SortOrder::NameAsc => entries.sort_by_cached_key(|e| e.site_name.to_lowercase()),
        SortOrder::NameDesc => {
            entries.sort_by_cached_key(|e| Reverse(e.site_name.to_lowercase()));
        }
        SortOrder::Created => entries.sort_by_key(|e| Reverse(e.created_at)),
        SortOrder::LastUsed => entries.sort_by_key(|e| Reverse(e.last_used_at)),
    }
}
