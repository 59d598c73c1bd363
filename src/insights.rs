//! Read-side insight queries: summary, per-report interpretation, and
//! biomarker trends. Nothing here writes.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db::repository;
use crate::error::ServiceError;
use crate::intelligence::{interpret, summarize};
use crate::models::{Caller, Insight, InsightSummary, TrendPoint};

const TREND_DATE_FORMAT: &str = "%Y-%m-%d";

/// Summary of the caller's most recent completed report.
/// A caller without one gets the empty summary.
pub fn get_insights_summary(core: &CoreState, caller: &Caller) -> Result<InsightSummary, ServiceError> {
    let conn = core.open_db()?;
    let Some(report) = repository::get_latest_completed_report(&conn, caller)? else {
        return Ok(InsightSummary::default());
    };
    let biomarkers = repository::get_biomarkers_for_report(&conn, &report.id)?;
    Ok(summarize(&biomarkers))
}

/// One insight per biomarker of the report, in source-line order.
pub fn get_insights_for_report(
    core: &CoreState,
    caller: &Caller,
    report_id: &Uuid,
) -> Result<Vec<Insight>, ServiceError> {
    let conn = core.open_db()?;
    if repository::get_lab_report_for(&conn, caller, report_id)?.is_none() {
        return Err(ServiceError::report_not_found(report_id));
    }
    let biomarkers = repository::get_biomarkers_for_report(&conn, report_id)?;
    Ok(biomarkers.iter().map(interpret).collect())
}

/// History of one test across the caller's reports, oldest upload first.
///
/// The point date is the biomarker's test date, else the report's upload
/// date. `from` and `to` (`YYYY-MM-DD`, inclusive) filter on that date.
pub fn get_biomarker_trend(
    core: &CoreState,
    caller: &Caller,
    test_name: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<TrendPoint>, ServiceError> {
    let test_name = test_name.trim();
    if test_name.is_empty() {
        return Err(ServiceError::Validation("test_name is required".into()));
    }
    let from = parse_trend_date("from", from)?;
    let to = parse_trend_date("to", to)?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ServiceError::Validation(format!(
                "from ({from}) is after to ({to})"
            )));
        }
    }

    let conn = core.open_db()?;
    let history = repository::get_biomarker_history(&conn, caller, test_name)?;

    Ok(history
        .into_iter()
        .map(|(b, uploaded_at)| TrendPoint {
            date: b.test_date.unwrap_or_else(|| uploaded_at.date()),
            value: b.value,
            unit: b.unit,
            reference_low: b.reference_range_low,
            reference_high: b.reference_range_high,
        })
        .filter(|p| from.map_or(true, |f| p.date >= f) && to.map_or(true, |t| p.date <= t))
        .collect())
}

fn parse_trend_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ServiceError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, TREND_DATE_FORMAT)
            .map(Some)
            .map_err(|_| ServiceError::Validation(format!("{field} must be YYYY-MM-DD, got {s:?}"))),
    }
}
