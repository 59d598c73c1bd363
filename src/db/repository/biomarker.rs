use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_uuid, DATE_FORMAT};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_biomarker(conn: &Connection, biomarker: &Biomarker) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO biomarkers (id, lab_report_id, test_name, value, unit,
         reference_range_low, reference_range_high, test_date, notes, line_number, created_at,
         test_name_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            biomarker.id.to_string(),
            biomarker.lab_report_id.to_string(),
            biomarker.test_name,
            biomarker.value,
            biomarker.unit,
            biomarker.reference_range_low,
            biomarker.reference_range_high,
            biomarker.test_date.map(|d| d.format(DATE_FORMAT).to_string()),
            biomarker.notes,
            biomarker.line_number,
            format_datetime(&biomarker.created_at),
            test_name_key(&biomarker.test_name),
        ],
    )?;
    Ok(())
}

/// Biomarkers of one report in source-line order.
pub fn get_biomarkers_for_report(
    conn: &Connection,
    lab_report_id: &Uuid,
) -> Result<Vec<Biomarker>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, lab_report_id, test_name, value, unit,
         reference_range_low, reference_range_high, test_date, notes, line_number, created_at
         FROM biomarkers WHERE lab_report_id = ?1
         ORDER BY line_number ASC",
    )?;

    let rows = stmt.query_map(params![lab_report_id.to_string()], biomarker_row_from_rusqlite)?;

    let mut biomarkers = Vec::new();
    for row in rows {
        biomarkers.push(biomarker_from_row(row?)?);
    }
    Ok(biomarkers)
}

#[cfg(test)]
pub fn count_biomarkers_for_report(
    conn: &Connection,
    lab_report_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM biomarkers WHERE lab_report_id = ?1",
        params![lab_report_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Lookup key for a test name: trimmed, Unicode lowercase.
pub fn test_name_key(test_name: &str) -> String {
    test_name.trim().to_lowercase()
}

/// Every biomarker named `test_name` (case-insensitive) across the caller's
/// reports, paired with the owning report's upload time, oldest upload first.
pub fn get_biomarker_history(
    conn: &Connection,
    caller: &Caller,
    test_name: &str,
) -> Result<Vec<(Biomarker, NaiveDateTime)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.lab_report_id, b.test_name, b.value, b.unit,
         b.reference_range_low, b.reference_range_high, b.test_date, b.notes, b.line_number,
         b.created_at, r.uploaded_at
         FROM biomarkers b
         JOIN lab_reports r ON r.id = b.lab_report_id
         WHERE r.owner_id = ?1 AND r.tenant_id = ?2
           AND b.test_name_key = ?3
         ORDER BY r.uploaded_at ASC, b.line_number ASC",
    )?;

    let rows = stmt.query_map(
        params![
            caller.owner_id.to_string(),
            caller.tenant_id.to_string(),
            test_name_key(test_name)
        ],
        |row| {
            let biomarker = biomarker_row_from_rusqlite(row)?;
            let uploaded_at: String = row.get(11)?;
            Ok((biomarker, uploaded_at))
        },
    )?;

    let mut history = Vec::new();
    for row in rows {
        let (biomarker, uploaded_at) = row?;
        history.push((biomarker_from_row(biomarker)?, parse_datetime(&uploaded_at)?));
    }
    Ok(history)
}

// Internal row type for Biomarker mapping
struct BiomarkerRow {
    id: String,
    lab_report_id: String,
    test_name: String,
    value: String,
    unit: Option<String>,
    reference_range_low: Option<String>,
    reference_range_high: Option<String>,
    test_date: Option<String>,
    notes: Option<String>,
    line_number: u32,
    created_at: String,
}

fn biomarker_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<BiomarkerRow, rusqlite::Error> {
    Ok(BiomarkerRow {
        id: row.get(0)?,
        lab_report_id: row.get(1)?,
        test_name: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        reference_range_low: row.get(5)?,
        reference_range_high: row.get(6)?,
        test_date: row.get(7)?,
        notes: row.get(8)?,
        line_number: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn biomarker_from_row(row: BiomarkerRow) -> Result<Biomarker, DatabaseError> {
    Ok(Biomarker {
        id: parse_uuid(&row.id)?,
        lab_report_id: parse_uuid(&row.lab_report_id)?,
        test_name: row.test_name,
        value: row.value,
        unit: row.unit,
        reference_range_low: row.reference_range_low,
        reference_range_high: row.reference_range_high,
        test_date: row.test_date.as_deref().and_then(parse_date),
        notes: row.notes,
        line_number: row.line_number,
        created_at: parse_datetime(&row.created_at)?,
    })
}
