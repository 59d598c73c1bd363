use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{InsightPriority, InsightStatus};

/// Derived interpretation of one Biomarker. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub test_name: String,
    pub display_value: String,
    pub status: InsightStatus,
    pub recommendation: String,
    pub priority: InsightPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total: usize,
    pub abnormal_count: usize,
    pub insights: Vec<Insight>,
}

/// One point of a biomarker's history across reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: String,
    pub unit: Option<String>,
    pub reference_low: Option<String>,
    pub reference_high: Option<String>,
}
