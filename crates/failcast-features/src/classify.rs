//! Failure reason classification
//!
//! Maps free-text failure reasons onto assessment dimensions by keyword.
//! Keywords match whole words of the reason, so `iam` does not fire on
//! "diamond" nor `403` on "4030"; a trailing `*` lets a keyword match as a
//! word prefix (`oomkill*` covers "OOMKilled").
//!
//! Rules are tried in order. Scheduling comes before memory so that
//! "Insufficient memory" (a placement failure) is not mistaken for an OOM
//! kill, and permissions come before storage so that a mount refused for
//! lack of access counts as a permissions failure.

use failcast_model::Dimension;

const RULES: [(Dimension, &[&str]); 5] = [
    (
        Dimension::Scheduling,
        &[
            "insufficient cpu",
            "insufficient memory",
            "unschedulable",
            "failedscheduling",
            "no nodes available",
            "preempt*",
            "pod pending",
        ],
    ),
    (
        Dimension::Memory,
        &[
            "oomkill*",
            "oom kill*",
            "out of memory",
            "memory limit*",
            "exit code 137",
        ],
    ),
    (
        Dimension::Permissions,
        &[
            "access denied",
            "accessdenied",
            "forbidden",
            "unauthori*",
            "not authori*",
            "permission*",
            "iam",
            "irsa",
            "403",
        ],
    ),
    (
        Dimension::StorageMount,
        &[
            "failed to mount",
            "mount failed",
            "mount timeout",
            "mountvolume*",
            "efs",
            "nfs",
            "no space left",
            "disk full",
        ],
    ),
    (
        Dimension::DataQuality,
        &[
            "duplicate*",
            "unique constraint",
            "constraint violation",
            "schema mismatch",
            "malformed",
            "null value*",
            "data quality",
        ],
    ),
];

/// Dimension a failure reason belongs to, if any keyword matches
#[must_use]
pub fn classify_failure(reason: &str) -> Option<Dimension> {
    let words = normalize(reason);
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| matches_keyword(&words, k)))
        .map(|(dimension, _)| *dimension)
}

/// Lowercase words separated and surrounded by single spaces
fn normalize(reason: &str) -> String {
    let mut out = String::with_capacity(reason.len() + 2);
    out.push(' ');
    for word in reason
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        out.push_str(word);
        out.push(' ');
    }
    out
}

fn matches_keyword(words: &str, keyword: &str) -> bool {
    let (stem, prefix) = match keyword.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (keyword, false),
    };
    let needle = format!(" {stem}");
    words
        .match_indices(&needle)
        .any(|(at, _)| prefix || words[at + needle.len()..].starts_with(' '))
}
