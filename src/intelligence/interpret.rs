use crate::models::enums::{InsightPriority, InsightStatus};
use crate::models::result_terms::{classify_term, TermReading};
use crate::models::{Biomarker, Insight};

use super::messages::RecommendationTemplates;

/// Interpret one biomarker. Total: every input yields exactly one Insight.
pub fn interpret(biomarker: &Biomarker) -> Insight {
    let test_name = biomarker.test_name.trim();
    let value = biomarker.value.trim();

    let (status, priority, recommendation) = match numeric_range(biomarker) {
        Some((v, low, high)) => {
            let low_text = biomarker.reference_range_low.as_deref().unwrap_or_default().trim();
            let high_text = biomarker.reference_range_high.as_deref().unwrap_or_default().trim();
            if v < low {
                (
                    InsightStatus::Low,
                    InsightPriority::Medium,
                    RecommendationTemplates::below_range(test_name, low_text, high_text),
                )
            } else if v > high {
                (
                    InsightStatus::High,
                    InsightPriority::Medium,
                    RecommendationTemplates::above_range(test_name, low_text, high_text),
                )
            } else {
                (
                    InsightStatus::Normal,
                    InsightPriority::Low,
                    RecommendationTemplates::within_range(test_name),
                )
            }
        }
        None => match classify_term(value) {
            Some(TermReading::Positive) => (
                InsightStatus::Abnormal,
                InsightPriority::High,
                RecommendationTemplates::positive_finding(test_name, value),
            ),
            Some(TermReading::Negative) => (
                InsightStatus::Normal,
                InsightPriority::Low,
                RecommendationTemplates::negative_finding(test_name, value),
            ),
            Some(TermReading::NeedsReview) | None => (
                InsightStatus::Unknown,
                InsightPriority::Medium,
                RecommendationTemplates::needs_review(test_name),
            ),
        },
    };

    Insight {
        test_name: test_name.to_string(),
        display_value: display_value(value, biomarker.unit.as_deref()),
        status,
        recommendation,
        priority,
    }
}

/// `"<value> <unit>"`, unit omitted when absent or blank.
pub fn display_value(value: &str, unit: Option<&str>) -> String {
    match unit.map(str::trim).filter(|u| !u.is_empty()) {
        Some(unit) => format!("{} {}", value.trim(), unit).trim().to_string(),
        None => value.trim().to_string(),
    }
}

/// Value and both bounds, when all three are finite numbers.
fn numeric_range(biomarker: &Biomarker) -> Option<(f64, f64, f64)> {
    let value = parse_finite(&biomarker.value)?;
    let low = parse_finite(biomarker.reference_range_low.as_deref()?)?;
    let high = parse_finite(biomarker.reference_range_high.as_deref()?)?;
    Some((value, low, high))
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
