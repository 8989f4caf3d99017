//! Password strength scoring.
//!
//! - [`strength`]: deterministic 0..=100 score
//! - [`analyze`]: the same score with its inputs, for UI feedback
//! - [`StrengthTier`]: Weak / Fair / Good / Strong bucket with label and colour
//!
//! # Scoring
//!
//! A character is *penalised* when it repeats the previous character, extends
//! an ascending or descending run of letters or digits (`abc`, `987`), or
//! continues a common dictionary word past its first two characters (`pas`
//! already matches the start of `password`, so its `s` is penalised).
//!
//! ```text
//! effective = length - penalised
//! score     = min(3 * effective, 48) + 13 * classes_present      (clamped to 100)
//! ```
//!
//! Whether a character is penalised depends only on the characters before
//! it, so appending a character never lowers the score.

use serde::{Deserialize, Serialize};

const LENGTH_WEIGHT: usize = 3;
const LENGTH_CAP: usize = 48;
const CLASS_WEIGHT: usize = 13;
const MAX_SCORE: usize = 100;
/// Characters of a dictionary word that count before the rest is penalised.
const WORD_GRACE: usize = 2;

/// Common passwords and fragments, lowercase. Letters-only or digits-only so
/// a match never spans a class boundary.
const DICTIONARY: &[&str] = &[
    "password", "qwerty", "asdf", "zxcv", "letmein", "admin", "welcome", "login",
    "monkey", "dragon", "master", "shadow", "sunshine", "princess", "football",
    "baseball", "superman", "batman", "iloveyou", "secret", "hello", "freedom",
    "whatever", "trustno", "starwars", "0000", "1111", "1234", "12345678", "2020",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Strength bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrengthTier {
    Weak,
    Fair,
    Good,
    Strong,
}

impl StrengthTier {
    /// Bucket a score: <30 Weak, 30..60 Fair, 60..80 Good, 80+ Strong.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=29 => Self::Weak,
            30..=59 => Self::Fair,
            60..=79 => Self::Good,
            _ => Self::Strong,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Weak => "Weak",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Strong => "Strong",
        }
    }

    /// Fixed display colour as `#RRGGBB`.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Weak => "#F44336",
            Self::Fair => "#FF9800",
            Self::Good => "#2196F3",
            Self::Strong => "#4CAF50",
        }
    }
}

/// Score plus the quantities it was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthAnalysis {
    pub score: u8,
    pub length: usize,
    pub penalised: usize,
    pub classes: usize,
    /// Dictionary word occurrences found (overlaps counted separately).
    pub dictionary_hits: usize,
}

impl StrengthAnalysis {
    #[must_use]
    pub const fn tier(&self) -> StrengthTier {
        StrengthTier::from_score(self.score)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Strength score in `0..=100`. Pure and deterministic.
#[must_use]
pub fn strength(password: &str) -> u8 {
    analyze(password).score
}

/// Tier label for a score.
#[must_use]
pub const fn strength_label(score: u8) -> &'static str {
    StrengthTier::from_score(score).label()
}

/// Tier colour for a score.
#[must_use]
pub const fn strength_color(score: u8) -> &'static str {
    StrengthTier::from_score(score).color()
}

/// Full breakdown of the score for `password`.
#[must_use]
pub fn analyze(password: &str) -> StrengthAnalysis {
    let chars: Vec<char> = password.chars().map(|c| c.to_ascii_lowercase()).collect();
    let mut penalised = vec![false; chars.len()];

    for (i, pair) in chars.windows(2).enumerate() {
        if pair[0] == pair[1] || is_run_step(pair[0], pair[1]) {
            penalised[i.saturating_add(1)] = true;
        }
    }
    let dictionary_hits = mark_dictionary_words(&chars, &mut penalised);

    let length = chars.len();
    let penalised_count = penalised.iter().filter(|&&p| p).count();
    let effective = length.saturating_sub(penalised_count);
    let classes = class_count(password);

    let raw = effective
        .saturating_mul(LENGTH_WEIGHT)
        .min(LENGTH_CAP)
        .saturating_add(classes.saturating_mul(CLASS_WEIGHT))
        .min(MAX_SCORE);

    StrengthAnalysis {
        score: u8::try_from(raw).unwrap_or(u8::MAX),
        length,
        penalised: penalised_count,
        classes,
        dictionary_hits,
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn is_run_step(prev: char, next: char) -> bool {
    let same_kind = (prev.is_ascii_alphabetic() && next.is_ascii_alphabetic())
        || (prev.is_ascii_digit() && next.is_ascii_digit());
    same_kind && (u32::from(prev)).abs_diff(u32::from(next)) == 1
}

/// Penalise every character that extends a dictionary-word prefix beyond
/// [`WORD_GRACE`] characters. Returns the number of complete words found.
fn mark_dictionary_words(chars: &[char], penalised: &mut [bool]) -> usize {
    let mut hits = 0usize;
    for word in DICTIONARY {
        let word: Vec<char> = word.chars().collect();
        for start in 0..chars.len() {
            let matched = chars[start..]
                .iter()
                .zip(&word)
                .take_while(|(c, w)| c == w)
                .count();
            if matched <= WORD_GRACE {
                continue;
            }
            if matched == word.len() {
                hits = hits.saturating_add(1);
            }
            let from = start.saturating_add(WORD_GRACE);
            let to = start.saturating_add(matched);
            for flag in &mut penalised[from..to] {
                *flag = true;
            }
        }
    }
    hits
}

fn class_count(password: &str) -> usize {
    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut symbol = false;
    for c in password.chars() {
        if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else if !c.is_whitespace() {
            symbol = true;
        }
    }
    [lower, upper, digit, symbol].iter().filter(|&&b| b).count()
}
