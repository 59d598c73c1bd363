//! Free-text lab results recognised by the parser and read by the
//! interpreter. A `<name>: <text>` line only becomes a biomarker when its
//! text is one of these terms.

/// Results that indicate a finding.
pub const POSITIVE_TERMS: &[&str] = &["positive", "detected", "present"];

/// Results that indicate the expected (absent) finding.
pub const NEGATIVE_TERMS: &[&str] = &["negative", "not detected", "absent"];

/// Recognised results with no fixed reading. Stored, then interpreted as
/// needing manual review.
pub const REVIEW_TERMS: &[&str] = &[
    "reactive",
    "non-reactive",
    "nonreactive",
    "weakly reactive",
    "trace",
    "equivocal",
    "indeterminate",
    "inconclusive",
    "borderline",
    "no growth",
    "growth detected",
];

/// How the interpreter reads a free-text result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermReading {
    Positive,
    Negative,
    NeedsReview,
}

/// Lowercase, collapse inner whitespace, drop trailing punctuation.
pub fn normalize_term(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_string()
}

/// Reading of `value` when it is a recognised term.
pub fn classify_term(value: &str) -> Option<TermReading> {
    let term = normalize_term(value);
    let term = term.as_str();
    if POSITIVE_TERMS.contains(&term) {
        Some(TermReading::Positive)
    } else if NEGATIVE_TERMS.contains(&term) {
        Some(TermReading::Negative)
    } else if REVIEW_TERMS.contains(&term) {
        Some(TermReading::NeedsReview)
    } else {
        None
    }
}
