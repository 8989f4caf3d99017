//! Vault entries: credentials and secure notes.
//!
//! Entries live only inside the sealed entry set; this module defines their
//! shape and the caller-facing draft used for add/update. The repository
//! owns ids and timestamps.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Fixed set of entry categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SocialMedia,
    Banking,
    Work,
    Shopping,
    Email,
    Gaming,
    Streaming,
    Education,
    Entertainment,
    #[default]
    Others,
}

impl Category {
    pub const ALL: [Self; 10] = [
        Self::SocialMedia,
        Self::Banking,
        Self::Work,
        Self::Shopping,
        Self::Email,
        Self::Gaming,
        Self::Streaming,
        Self::Education,
        Self::Entertainment,
        Self::Others,
    ];

    /// Display label, also used in CSV.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SocialMedia => "Social Media",
            Self::Banking => "Banking",
            Self::Work => "Work",
            Self::Shopping => "Shopping",
            Self::Email => "Email",
            Self::Gaming => "Gaming",
            Self::Streaming => "Streaming",
            Self::Education => "Education",
            Self::Entertainment => "Entertainment",
            Self::Others => "Others",
        }
    }

    /// Lenient parse: ignores case, spaces, `_` and `-`.
    /// `"Social Media"`, `"social_media"` and `"SOCIALMEDIA"` all match.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = normalize(s);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|c| normalize(c.label()) == wanted)
            .or_else(|| (wanted == "other").then_some(Self::Others))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Kind-specific fields. A secure note has no username, password or URL by
/// construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    Credential {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// May be empty.
        #[serde(default)]
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    SecureNote,
}

impl Zeroize for EntryKind {
    fn zeroize(&mut self) {
        if let Self::Credential {
            username,
            password,
            url,
        } = self
        {
            username.zeroize();
            password.zeroize();
            url.zeroize();
        }
    }
}

impl fmt::Debug for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential { username, url, .. } => f
                .debug_struct("Credential")
                .field("username", username)
                .field("password", &"***")
                .field("url", url)
                .finish(),
            Self::SecureNote => f.write_str("SecureNote"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single vault item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// UUID v4, unique across the whole set including the trash.
    pub id: String,
    pub site_name: String,
    #[serde(flatten)]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub is_favourite: bool,
    pub created_at: i64,
    pub modified_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
    /// Set while the entry is in the trash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Entry {
    #[must_use]
    pub const fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[must_use]
    pub const fn is_credential(&self) -> bool {
        matches!(self.kind, EntryKind::Credential { .. })
    }

    #[must_use]
    pub const fn is_secure_note(&self) -> bool {
        matches!(self.kind, EntryKind::SecureNote)
    }

    /// Credential password; `None` for secure notes.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Credential { password, .. } => Some(password),
            EntryKind::SecureNote => None,
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Credential { username, .. } => username.as_deref(),
            EntryKind::SecureNote => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Credential { url, .. } => url.as_deref(),
            EntryKind::SecureNote => None,
        }
    }
}

impl Zeroize for Entry {
    fn zeroize(&mut self) {
        self.site_name.zeroize();
        self.kind.zeroize();
        self.notes.zeroize();
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Caller-supplied content for [`add_entry`] / [`update_entry`].
///
/// [`add_entry`]: crate::repository::VaultRepository::add_entry
/// [`update_entry`]: crate::repository::VaultRepository::update_entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub site_name: String,
    pub kind: EntryKind,
    pub notes: Option<String>,
    pub category: Category,
    pub is_favourite: bool,
}

impl EntryDraft {
    #[must_use]
    pub fn credential(
        site_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            kind: EntryKind::Credential {
                username: Some(username.into()),
                password: password.into(),
                url: None,
            },
            notes: None,
            category: Category::Others,
            is_favourite: false,
        }
    }

    #[must_use]
    pub fn secure_note(site_name: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            kind: EntryKind::SecureNote,
            notes: Some(notes.into()),
            category: Category::Others,
            is_favourite: false,
        }
    }

    /// Set the URL. No effect on secure notes.
    #[must_use]
    pub fn with_url(mut self, new_url: impl Into<String>) -> Self {
        if let EntryKind::Credential { url, .. } = &mut self.kind {
            *url = Some(new_url.into());
        }
        self
    }

    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub const fn favourite(mut self, is_favourite: bool) -> Self {
        self.is_favourite = is_favourite;
        self
    }

    /// Trim the site name, turn blank optional fields into `None`, and reject
    /// an empty site name.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] if the site name is blank.
    pub fn normalized(mut self) -> Result<Self, VaultError> {
        let trimmed = self.site_name.trim();
        if trimmed.is_empty() {
            return Err(VaultError::Validation("site name is required".into()));
        }
        self.site_name = trimmed.to_owned();
        blank_to_none(&mut self.notes);
        if let EntryKind::Credential { username, url, .. } = &mut self.kind {
            blank_to_none(username);
            blank_to_none(url);
        }
        Ok(self)
    }
}

fn blank_to_none(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
        *field = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EntryKind) -> Entry {
        Entry {
            id: "id-1".into(),
            site_name: "github.com".into(),
            kind,
            notes: None,
            category: Category::Work,
            is_favourite: false,
            created_at: 1,
            modified_at: 1,
            last_used_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn category_parse_is_lenient() {
        assert_eq!(Category::parse("Social Media"), Some(Category::SocialMedia));
        assert_eq!(Category::parse("social_media"), Some(Category::SocialMedia));
        assert_eq!(Category::parse("BANKING"), Some(Category::Banking));
        assert_eq!(Category::parse("other"), Some(Category::Others));
        assert_eq!(Category::parse("spaceships"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn category_labels_roundtrip() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.label()), Some(c));
        }
    }

    #[test]
    fn credential_serializes_flat_with_kind_tag() {
        let e = entry(EntryKind::Credential {
            username: Some("dev".into()),
            password: "p@ss1234".into(),
            url: None,
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "credential");
        assert_eq!(json["siteName"], "github.com");
        assert_eq!(json["password"], "p@ss1234");
        assert!(json.get("url").is_none());

        let back: Entry = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn secure_note_has_no_credential_fields() {
        let e = entry(EntryKind::SecureNote);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "secure_note");
        assert!(json.get("password").is_none());
        assert_eq!(e.password(), None);
        assert_eq!(e.username(), None);
    }

    #[test]
    fn debug_masks_password() {
        let e = entry(EntryKind::Credential {
            username: None,
            password: "hunter2".into(),
            url: None,
        });
        assert!(!format!("{e:?}").contains("hunter2"));
    }

    #[test]
    fn zeroize_clears_secrets() {
        let mut e = entry(EntryKind::Credential {
            username: Some("dev".into()),
            password: "hunter2".into(),
            url: None,
        });
        e.notes = Some("recovery codes".into());
        e.zeroize();
        assert_eq!(e.password(), Some(""));
        assert_eq!(e.username(), None);
        assert!(e.notes.is_none());
        assert!(e.site_name.is_empty());
    }

    #[test]
    fn draft_normalization() {
        let draft = EntryDraft::credential("  github.com ", "", "pw")
            .with_url("   ")
            .with_notes("");
        let n = draft.normalized().unwrap();
        assert_eq!(n.site_name, "github.com");
        assert_eq!(n.notes, None);
        assert_eq!(
            n.kind,
            EntryKind::Credential {
                username: None,
                password: "pw".into(),
                url: None
            }
        );
    }

    #[test]
    fn draft_requires_site_name() {
        let err = EntryDraft::secure_note("   ", "body").normalized().unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }
}
