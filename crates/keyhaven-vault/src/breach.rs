//! Breach check against a k-anonymity range API.
//!
//! For each candidate only the 5-character hash prefix leaves the process.
//! The response lists every known suffix under that prefix as
//! `SUFFIX:COUNT` lines and the match happens locally.
//!
//! Lookups are sequential with a fixed pause between them. A failed lookup
//! is recorded as not checked and the run continues; a run never fails as a
//! whole.

use std::time::Duration;

use keyhaven_crypto_core::breach::{breach_hash_split, BreachHash};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::BreachConfig;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One credential to check. Owned so the run never touches live vault state.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BreachCandidate {
    entry_id: String,
    site_name: String,
    password: String,
}

impl BreachCandidate {
    #[must_use]
    pub fn new(entry_id: &str, site_name: &str, password: &str) -> Self {
        Self {
            entry_id: entry_id.to_owned(),
            site_name: site_name.to_owned(),
            password: password.to_owned(),
        }
    }

    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    #[must_use]
    pub fn site_name(&self) -> &str {
        &self.site_name
    }
}

impl std::fmt::Debug for BreachCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreachCandidate")
            .field("entry_id", &self.entry_id)
            .field("site_name", &self.site_name)
            .field("password", &"***")
            .finish()
    }
}

/// A credential found in the breach corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachedEntry {
    pub entry_id: String,
    pub site_name: String,
    /// Times the password appears in the corpus.
    pub count: u64,
}

/// A credential whose lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotChecked {
    pub entry_id: String,
    pub site_name: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: NetworkError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachReport {
    pub breached: Vec<BreachedEntry>,
    pub not_checked: Vec<NotChecked>,
    /// Lookups that completed, breached or not.
    pub checked: usize,
}

/// Transport failure for a single lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            // The URL carries the hash prefix.
            Self::Transport(err.without_url().to_string())
        }
    }
}

fn serialize_display<S: serde::Serializer>(err: &NetworkError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BreachChecker {
    client: reqwest::Client,
    base_url: String,
    delay: Duration,
}

impl BreachChecker {
    /// Build a checker with the configured endpoint, pacing and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &BreachConfig) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("keyhaven/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VaultError::Config(format!("breach client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    /// Check every candidate, one request at a time.
    pub async fn check(&self, candidates: Vec<BreachCandidate>) -> BreachReport {
        let mut report = BreachReport::default();

        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.delay).await;
            }

            let hash = breach_hash_split(&candidate.password);
            match self.lookup(&hash).await {
                Ok(body) => {
                    report.checked = report.checked.saturating_add(1);
                    if let Some(count) = parse_range_response(&body, &hash) {
                        report.breached.push(BreachedEntry {
                            entry_id: candidate.entry_id.clone(),
                            site_name: candidate.site_name.clone(),
                            count,
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(entry_id = %candidate.entry_id, %error, "breach lookup failed");
                    report.not_checked.push(NotChecked {
                        entry_id: candidate.entry_id.clone(),
                        site_name: candidate.site_name.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            breached = report.breached.len(),
            not_checked = report.not_checked.len(),
            "breach check finished"
        );
        report
    }

    /// Run [`check`](Self::check) on a background tokio task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(self, candidates: Vec<BreachCandidate>) -> JoinHandle<BreachReport> {
        tokio::spawn(async move { self.check(candidates).await })
    }

    async fn lookup(&self, hash: &BreachHash) -> Result<String, NetworkError> {
        let url = format!("{}{}", self.base_url, hash.prefix());
        let response = self
            .client
            .get(url)
            .header("Add-Padding", "true")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Count for `hash` in a range response, if listed with a non-zero count.
/// Zero-count lines are padding.
#[must_use]
pub fn parse_range_response(body: &str, hash: &BreachHash) -> Option<u64> {
    body.lines().find_map(|line| {
        let (suffix, count) = line.split_once(':')?;
        if !hash.matches_suffix(suffix) {
            return None;
        }
        count.trim().parse::<u64>().ok().filter(|&c| c > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-1("password123") = CBFDAC6008F9CAB4083784CBD1874F76618D2A97
    const PW: &str = "password123";
    const SUFFIX: &str = "C6008F9CAB4083784CBD1874F76618D2A97";

    #[test]
    fn finds_matching_suffix_case_insensitively() {
        let hash = breach_hash_split(PW);
        let body = format!(
            "0018A45C4D1DEF81644B54AB7F969B88D65:3\r\n{}:241\r\nFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF:0\r\n",
            SUFFIX.to_lowercase()
        );
        assert_eq!(parse_range_response(&body, &hash), Some(241));
    }

    #[test]
    fn absent_or_padded_suffix_is_none() {
        let hash = breach_hash_split(PW);
        assert_eq!(parse_range_response("ABC:1\n", &hash), None);
        assert_eq!(parse_range_response(&format!("{SUFFIX}:0\n"), &hash), None);
        assert_eq!(parse_range_response("", &hash), None);
    }

    #[test]
    fn candidate_debug_masks_password() {
        let c = BreachCandidate::new("id", "site", "hunter2");
        assert!(!format!("{c:?}").contains("hunter2"));
    }
}
