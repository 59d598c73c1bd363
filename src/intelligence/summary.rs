use crate::models::enums::InsightStatus;
use crate::models::{Biomarker, InsightSummary};

use super::interpret::interpret;

/// Maximum insights carried by a summary.
pub const MAX_SUMMARY_INSIGHTS: usize = 10;

/// Aggregate the insights of one report's biomarkers.
///
/// `total` and `abnormal_count` cover every biomarker; `insights` is
/// stable-sorted by priority (high first) and truncated.
pub fn summarize(biomarkers: &[Biomarker]) -> InsightSummary {
    let mut insights: Vec<_> = biomarkers.iter().map(interpret).collect();

    let total = insights.len();
    let abnormal_count = insights
        .iter()
        .filter(|i| i.status != InsightStatus::Normal)
        .count();

    // sort_by_key is stable: equal priorities keep line order
    insights.sort_by_key(|i| i.priority.rank());
    insights.truncate(MAX_SUMMARY_INSIGHTS);

    InsightSummary {
        total,
        abnormal_count,
        insights,
    }
}
