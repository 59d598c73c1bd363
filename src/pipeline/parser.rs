//! Heuristic biomarker recognition over extracted report text.
//!
//! Each line is tried against an ordered table of compiled matchers, most
//! specific first. The first match wins and yields one candidate; lines that
//! match nothing are skipped. Parsing never fails.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::models::result_terms::classify_term;
use crate::models::CandidateBiomarker;

/// Which line shape produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineShape {
    /// `Glucose 95 mg/dL 70-100`
    ValueUnitRange,
    /// `Cholesterol: 180 mg/dL`
    ColonValueUnit,
    /// `HIV: Negative`. The text must be a known result term.
    ColonQualitative,
}

/// A compiled line matcher.
struct LinePattern {
    regex: Regex,
    shape: LineShape,
}

fn pattern(re: &str, shape: LineShape) -> LinePattern {
    LinePattern {
        regex: Regex::new(re).expect("valid regex"),
        shape,
    }
}

/// Ordered, most-specific-first. Order is significant.
static LINE_PATTERNS: LazyLock<Vec<LinePattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)^(?P<name>\p{L}[\p{L}\p{N}()%,.'/+-]*(?:\s+[\p{L}\p{N}()%,.'/+-]+)*?)\s*:?\s+(?P<value>-?\d+(?:\.\d+)?)\s+(?P<unit>\S+)\s+\(?(?P<low>-?\d+(?:\.\d+)?)\s*[-\u{2013}]\s*(?P<high>-?\d+(?:\.\d+)?)\)?$",
            LineShape::ValueUnitRange,
        ),
        pattern(
            r"(?i)^(?P<name>\p{L}[^:]*?)\s*:\s*(?P<value>-?\d+(?:\.\d+)?)(?:\s+(?P<unit>\S+))?$",
            LineShape::ColonValueUnit,
        ),
        pattern(
            r"(?i)^(?P<name>\p{L}[^:]*?)\s*:\s*(?P<value>\p{L}[\p{L}\s-]*?)\.?$",
            LineShape::ColonQualitative,
        ),
    ]
});

/// Report-level date lines such as `Collection Date: 2024-03-01`.
static DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:collection|report|sample|specimen|test|result)\s+)?(?:date(?:\s+collected)?|collected|reported)\s*:\s*(?P<date>[0-9./-]+)",
    )
    .expect("valid regex")
});

/// Accepted date spellings, tried in order. Slash dates are month first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse extracted text into candidate biomarkers, one at most per line, in
/// line order. Pure: identical input always yields identical output.
pub fn parse(text: &str) -> Vec<CandidateBiomarker> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(line, (i + 1) as u32))
        .collect()
}

/// Recognise a single line. `line_number` is 1-based.
fn parse_line(line: &str, line_number: u32) -> Option<CandidateBiomarker> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    LINE_PATTERNS.iter().find_map(|p| {
        p.regex
            .captures(line)
            .filter(|caps| p.shape != LineShape::ColonQualitative || is_result_term(caps))
            .map(|caps| candidate_from(&caps, p.shape, line_number))
    })
}

fn is_result_term(caps: &Captures<'_>) -> bool {
    caps.name("value")
        .is_some_and(|m| classify_term(m.as_str()).is_some())
}

fn candidate_from(caps: &Captures<'_>, shape: LineShape, line_number: u32) -> CandidateBiomarker {
    let group = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let (reference_low, reference_high) = match shape {
        LineShape::ValueUnitRange => (group("low"), group("high")),
        LineShape::ColonValueUnit | LineShape::ColonQualitative => (None, None),
    };

    CandidateBiomarker {
        test_name: group("name").unwrap_or_default(),
        value: group("value").unwrap_or_default(),
        unit: group("unit"),
        reference_low,
        reference_high,
        line_number,
    }
}

/// First report-level date found in `text`, if any.
pub fn find_report_date(text: &str) -> Option<NaiveDate> {
    text.lines().find_map(|line| {
        let caps = DATE_LINE.captures(line.trim())?;
        let raw = caps.name("date")?.as_str();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    })
}
