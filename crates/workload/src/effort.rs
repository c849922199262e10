//! Effort-label classification.
//!
//! Free-form labels such as `"XL — more than 10 hrs/week"` or `"L - 5-10 hrs/wk"` are mapped
//! onto the five canonical sizes. Matching is anchored: a size token must start the label
//! and be followed by a non-alphanumeric character (or the end), tried longest token first.
//! Numeric range phrases are a secondary signal, consulted only when no token anchors.

use crate::model::EffortSize;

/// Anchored prefix tokens, longest first so `XL`/`XS` win over `L`/`S`.
const ANCHORS: &[(&str, EffortSize)] = &[
    ("EXTRA LARGE", EffortSize::XL),
    ("EXTRA SMALL", EffortSize::XS),
    ("MEDIUM", EffortSize::M),
    ("LARGE", EffortSize::L),
    ("SMALL", EffortSize::S),
    ("XL", EffortSize::XL),
    ("XS", EffortSize::XS),
    ("L", EffortSize::L),
    ("M", EffortSize::M),
    ("S", EffortSize::S),
];

/// Range phrases, checked in order after dashes and spacing are normalized.
const RANGES: &[(&str, EffortSize)] = &[
    ("MORE THAN 10", EffortSize::XL),
    ("10+", EffortSize::XL),
    ("LESS THAN 1", EffortSize::XS),
    ("<1", EffortSize::XS),
    ("5-10", EffortSize::L),
    ("2-5", EffortSize::M),
    ("1-2", EffortSize::S),
];

/// Classify an effort label. `None` means unclassified; there is no default size.
pub fn classify_effort(label: Option<&str>) -> Option<EffortSize> {
    let label = label?.trim();
    if label.is_empty() {
        return None;
    }
    let norm = normalize(label);
    anchored(&norm).or_else(|| ranged(&norm))
}

impl EffortSize {
    /// Nearest bucket for an hours-per-week figure.
    pub fn from_hours(hours: f64) -> Self {
        if hours <= 1.0 {
            Self::XS
        } else if hours <= 2.5 {
            Self::S
        } else if hours <= 5.5 {
            Self::M
        } else if hours <= 11.0 {
            Self::L
        } else {
            Self::XL
        }
    }
}

/// Upper-case, fold unicode dashes to `-`, collapse whitespace, drop spaces around `-`.
fn normalize(label: &str) -> String {
    let folded: String = label
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" - ", "-")
        .replace(" -", "-")
        .replace("- ", "-")
}

fn anchored(norm: &str) -> Option<EffortSize> {
    ANCHORS.iter().find_map(|(token, size)| {
        let rest = norm.strip_prefix(token)?;
        match rest.chars().next() {
            None => Some(*size),
            Some(c) if !c.is_alphanumeric() => Some(*size),
            Some(_) => None,
        }
    })
}

fn ranged(norm: &str) -> Option<EffortSize> {
    RANGES
        .iter()
        .find(|(phrase, _)| contains_bounded(norm, phrase))
        .map(|(_, size)| *size)
}

/// `phrase` occurs in `haystack` without a digit glued to either side.
fn contains_bounded(haystack: &str, phrase: &str) -> bool {
    let is_num = |c: char| c.is_ascii_digit() || c == '.';
    haystack.match_indices(phrase).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + phrase.len()..].chars().next();
        !before.is_some_and(is_num) && !after.is_some_and(is_num)
    })
}
