//! Password health analysis: weak, reused and old credentials.
//!
//! Works over active credentials only. Reports carry entry ids and site names,
//! never passwords.

use std::collections::HashMap;

use keyhaven_crypto_core::strength::{self, StrengthTier};
use serde::{Deserialize, Serialize};

use crate::clock::DAY_MS;
use crate::entries::Entry;

/// An entry reference safe to hand to the UI (no secrets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRef {
    pub id: String,
    pub site_name: String,
}

impl From<&Entry> for CredentialRef {
    fn from(e: &Entry) -> Self {
        Self {
            id: e.id.clone(),
            site_name: e.site_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakCredential {
    pub id: String,
    pub site_name: String,
    pub score: u8,
    pub tier: StrengthTier,
}

/// Credentials sharing one password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReusedGroup {
    pub credentials: Vec<CredentialRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldCredential {
    pub id: String,
    pub site_name: String,
    pub days_since_change: i64,
}

/// Complete health analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Active credentials with a non-empty password.
    pub total_credentials: usize,
    pub weak: Vec<WeakCredential>,
    pub reused_groups: Vec<ReusedGroup>,
    /// Members across all reused groups.
    pub reused_count: usize,
    pub old: Vec<OldCredential>,
    /// 0–100; see [`security_score`].
    pub security_score: u8,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Thresholds for classifying credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Strength scores below this are weak.
    pub weak_threshold: u8,
    /// Credentials unmodified for longer than this are old.
    pub old_entry_days: u32,
}

impl HealthPolicy {
    fn max_age_ms(self) -> i64 {
        i64::from(self.old_entry_days).saturating_mul(DAY_MS)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

fn active_credentials(entries: &[Entry]) -> impl Iterator<Item = &Entry> {
    entries
        .iter()
        .filter(|e| !e.is_trashed() && e.is_credential())
}

fn assessed(entries: &[Entry]) -> impl Iterator<Item = (&Entry, &str)> {
    active_credentials(entries)
        .filter_map(|e| e.password().filter(|p| !p.is_empty()).map(|p| (e, p)))
}

/// Active credentials whose password scores below the weak threshold.
/// Empty passwords are not assessed.
#[must_use]
pub fn weak_passwords(entries: &[Entry], policy: HealthPolicy) -> Vec<&Entry> {
    assessed(entries)
        .filter(|(_, pw)| strength::strength(pw) < policy.weak_threshold)
        .map(|(e, _)| e)
        .collect()
}

/// Group active credentials by password (BLAKE3 digest), keeping groups of
/// two or more. Groups and members keep the order of `entries`.
#[must_use]
pub fn reused_groups(entries: &[Entry]) -> Vec<Vec<&Entry>> {
    let mut index: HashMap<[u8; 32], usize> = HashMap::new();
    let mut groups: Vec<Vec<&Entry>> = Vec::new();

    for (entry, password) in assessed(entries) {
        let digest: [u8; 32] = blake3::hash(password.as_bytes()).into();
        if let Some(&slot) = index.get(&digest) {
            groups[slot].push(entry);
        } else {
            index.insert(digest, groups.len());
            groups.push(vec![entry]);
        }
    }

    groups.retain(|g| g.len() >= 2);
    groups
}

/// Every member of every reused group, in the order of `entries`.
#[must_use]
pub fn reused_passwords(entries: &[Entry]) -> Vec<&Entry> {
    let reused: Vec<&str> = reused_groups(entries)
        .into_iter()
        .flatten()
        .map(|e| e.id.as_str())
        .collect();
    entries
        .iter()
        .filter(|e| reused.contains(&e.id.as_str()))
        .collect()
}

/// Active credentials not modified within the policy's age window.
#[must_use]
pub fn old_entries(entries: &[Entry], policy: HealthPolicy, now_ms: i64) -> Vec<&Entry> {
    let cutoff = now_ms.saturating_sub(policy.max_age_ms());
    active_credentials(entries)
        .filter(|e| e.modified_at < cutoff)
        .collect()
}

/// `100 - floor(100 * issues / (3 * credentials))`, or 100 with no credentials.
///
/// Each credential can contribute one issue per category (weak, reused, old),
/// so more issues never raise the score.
#[must_use]
pub fn security_score(weak: usize, reused: usize, old: usize, credentials: usize) -> u8 {
    let checks = credentials.saturating_mul(3);
    if checks == 0 {
        return 100;
    }
    let issues = weak.saturating_add(reused).saturating_add(old).min(checks);
    let penalty = issues.saturating_mul(100).checked_div(checks).unwrap_or(0);
    u8::try_from(100usize.saturating_sub(penalty)).unwrap_or(0)
}

/// Full analysis of the active credentials in `entries`.
#[must_use]
pub fn health_report(entries: &[Entry], policy: HealthPolicy, now_ms: i64) -> HealthReport {
    let total_credentials = assessed(entries).count();

    let weak: Vec<WeakCredential> = weak_passwords(entries, policy)
        .into_iter()
        .filter_map(|e| {
            let score = strength::strength(e.password()?);
            Some(WeakCredential {
                id: e.id.clone(),
                site_name: e.site_name.clone(),
                score,
                tier: StrengthTier::from_score(score),
            })
        })
        .collect();

    let reused_groups: Vec<ReusedGroup> = reused_groups(entries)
        .into_iter()
        .map(|g| ReusedGroup {
            credentials: g.into_iter().map(CredentialRef::from).collect(),
        })
        .collect();
    let reused_count = reused_groups.iter().map(|g| g.credentials.len()).sum();

    let old: Vec<OldCredential> = old_entries(entries, policy, now_ms)
        .into_iter()
        .map(|e| OldCredential {
            id: e.id.clone(),
            site_name: e.site_name.clone(),
            days_since_change: now_ms
                .saturating_sub(e.modified_at)
                .checked_div(DAY_MS)
                .unwrap_or(0),
        })
        .collect();

    // Score only over credentials that carry a password.
    let old_assessed = old
        .iter()
        .filter(|o| {
            entries
                .iter()
                .any(|e| e.id == o.id && e.password().is_some_and(|p| !p.is_empty()))
        })
        .count();
    let security_score = security_score(weak.len(), reused_count, old_assessed, total_credentials);

    HealthReport {
        total_credentials,
        weak,
        reused_groups,
        reused_count,
        old,
        security_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{Category, EntryKind};

    const POLICY: HealthPolicy = HealthPolicy {
        weak_threshold: 40,
        old_entry_days: 182,
    };
    const NOW: i64 = 1_000 * DAY_MS;

    fn cred(id: &str, password: &str) -> Entry {
        Entry {
            id: id.into(),
            site_name: format!("{id}.example"),
            kind: EntryKind::Credential {
                username: None,
                password: password.into(),
                url: None,
            },
            notes: None,
            category: Category::Others,
            is_favourite: false,
            created_at: NOW,
            modified_at: NOW,
            last_used_at: None,
            deleted_at: None,
        }
    }

    fn ids(entries: &[&Entry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn reused_returns_exactly_the_shared_pair() {
        let entries = vec![
            cred("1", "Tq7#mZ2!vK9$"),
            cred("2", "Tq7#mZ2!vK9$"),
            cred("3", "bB8*uu-Lp0&x"),
            cred("4", "Zz1!yY2@xX3#"),
        ];
        assert_eq!(ids(&reused_passwords(&entries)), ["1", "2"]);
        assert_eq!(reused_groups(&entries).len(), 1);
    }

    #[test]
    fn reused_ignores_trash_notes_and_empty() {
        let mut trashed = cred("t", "same-pw-123");
        trashed.deleted_at = Some(NOW);
        let entries = vec![cred("a", "same-pw-123"), trashed, cred("e1", ""), cred("e2", "")];
        assert!(reused_passwords(&entries).is_empty());
    }

    #[test]
    fn weak_uses_threshold_and_skips_empty() {
        let entries = vec![cred("w", "password"), cred("s", "Tq7#mZ2!vK9$rW4@"), cred("e", "")];
        assert_eq!(ids(&weak_passwords(&entries, POLICY)), ["w"]);
    }

    #[test]
    fn old_is_strictly_older_than_window() {
        let mut old = cred("o", "x");
        old.modified_at = NOW - 183 * DAY_MS;
        let mut edge = cred("edge", "x");
        edge.modified_at = NOW - 182 * DAY_MS;
        let entries = vec![old, edge, cred("fresh", "x")];
        assert_eq!(ids(&old_entries(&entries, POLICY, NOW)), ["o"]);
    }

    #[test]
    fn security_score_bounds_and_monotonicity() {
        assert_eq!(security_score(0, 0, 0, 0), 100);
        assert_eq!(security_score(0, 0, 0, 4), 100);
        assert_eq!(security_score(4, 4, 4, 4), 0);
        assert_eq!(security_score(1, 0, 0, 1), 67);
        let mut last = 100;
        for issues in 0..=12 {
            let s = security_score(issues, 0, 0, 4);
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn report_aggregates_everything() {
        let mut old = cred("old", "Tq7#mZ2!vK9$rW4@");
        old.modified_at = NOW - 400 * DAY_MS;
        let entries = vec![
            cred("weak", "password"),
            cred("r1", "Zz1!yY2@xX3#"),
            cred("r2", "Zz1!yY2@xX3#"),
            old,
        ];
        let report = health_report(&entries, POLICY, NOW);
        assert_eq!(report.total_credentials, 4);
        assert_eq!(report.weak.len(), 1);
        assert_eq!(report.weak[0].tier, StrengthTier::Weak);
        assert_eq!(report.reused_count, 2);
        assert_eq!(report.old.len(), 1);
        assert_eq!(report.old[0].days_since_change, 400);
        // 4 issues over 12 checks
        assert_eq!(report.security_score, 67);
    }

    mod props {
        use super::super::security_score;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn extra_issue_never_raises_score(
                credentials in 0usize..200,
                weak in 0usize..200,
                reused in 0usize..200,
                old in 0usize..200,
            ) {
                let base = security_score(weak, reused, old, credentials);
                prop_assert!(base <= 100);
                prop_assert!(security_score(weak + 1, reused, old, credentials) <= base);
                prop_assert!(security_score(weak, reused + 1, old, credentials) <= base);
                prop_assert!(security_score(weak, reused, old + 1, credentials) <= base);
            }
        }
    }
}
