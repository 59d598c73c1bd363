//! Repository layer: entity-scoped database operations.
//!
//! All public functions are re-exported here.

mod biomarker;
mod lab_report;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;

pub use biomarker::*;
pub use lab_report::*;

/// Fixed-width timestamp format so TEXT ordering matches chronological ordering.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {s}: {e}")))
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

/// Current UTC time truncated to the stored precision.
pub fn now_utc() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    parse_datetime(&format_datetime(&now)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_format_round_trips() {
        let now = now_utc();
        let parsed = parse_datetime(&format_datetime(&now)).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn datetime_text_orders_chronologically() {
        let early = NaiveDateTime::parse_from_str("2024-01-15 09:59:59", "%Y-%m-%d %H:%M:%S").unwrap();
        let late = NaiveDateTime::parse_from_str("2024-01-15 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(format_datetime(&early) < format_datetime(&late));
    }

    #[test]
    fn invalid_uuid_is_constraint_violation() {
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }
}
