use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, now_utc, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ProcessingStatus;
use crate::models::*;

const LAB_REPORT_COLUMNS: &str = "id, owner_id, tenant_id, filename, storage_locator, mime_type,
         file_size, uploaded_at, processing_status, raw_extracted_text, created_at, updated_at";

pub fn insert_lab_report(conn: &Connection, report: &LabReport) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_reports (id, owner_id, tenant_id, filename, storage_locator, mime_type,
         file_size, uploaded_at, processing_status, raw_extracted_text, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            report.id.to_string(),
            report.owner_id.to_string(),
            report.tenant_id.to_string(),
            report.filename,
            report.storage_locator,
            report.mime_type,
            report.file_size as i64,
            format_datetime(&report.uploaded_at),
            report.processing_status.as_str(),
            report.raw_extracted_text,
            format_datetime(&report.created_at),
            format_datetime(&report.updated_at),
        ],
    )?;
    Ok(())
}

/// Unscoped lookup, used by the pipeline job which acts for no caller.
pub fn get_lab_report(conn: &Connection, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
    let sql = format!("SELECT {LAB_REPORT_COLUMNS} FROM lab_reports WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], lab_report_row_from_rusqlite)
        .optional()?;
    row.map(lab_report_from_row).transpose()
}

/// Tenant-scoped lookup. A report owned by someone else reads as absent.
pub fn get_lab_report_for(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Option<LabReport>, DatabaseError> {
    let sql = format!(
        "SELECT {LAB_REPORT_COLUMNS} FROM lab_reports
         WHERE id = ?1 AND owner_id = ?2 AND tenant_id = ?3"
    );
    let row = conn
        .query_row(
            &sql,
            params![
                id.to_string(),
                caller.owner_id.to_string(),
                caller.tenant_id.to_string()
            ],
            lab_report_row_from_rusqlite,
        )
        .optional()?;
    row.map(lab_report_from_row).transpose()
}

/// All reports of the caller, newest upload first.
pub fn list_lab_reports(conn: &Connection, caller: &Caller) -> Result<Vec<LabReport>, DatabaseError> {
    let sql = format!(
        "SELECT {LAB_REPORT_COLUMNS} FROM lab_reports
         WHERE owner_id = ?1 AND tenant_id = ?2
         ORDER BY uploaded_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![caller.owner_id.to_string(), caller.tenant_id.to_string()],
        lab_report_row_from_rusqlite,
    )?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(lab_report_from_row(row?)?);
    }
    Ok(reports)
}

/// The caller's most recent completed report, by upload time.
pub fn get_latest_completed_report(
    conn: &Connection,
    caller: &Caller,
) -> Result<Option<LabReport>, DatabaseError> {
    let sql = format!(
        "SELECT {LAB_REPORT_COLUMNS} FROM lab_reports
         WHERE owner_id = ?1 AND tenant_id = ?2 AND processing_status = 'completed'
         ORDER BY uploaded_at DESC, id DESC
         LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![caller.owner_id.to_string(), caller.tenant_id.to_string()],
            lab_report_row_from_rusqlite,
        )
        .optional()?;
    row.map(lab_report_from_row).transpose()
}

/// Ids of every report currently in `status`, oldest upload first.
pub fn list_report_ids_by_status(
    conn: &Connection,
    status: ProcessingStatus,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM lab_reports WHERE processing_status = ?1 ORDER BY uploaded_at ASC",
    )?;
    let rows = stmt.query_map(params![status.as_str()], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

/// Compare-and-set status update. Refuses transitions outside the pipeline table
/// and transitions from a status the row is not actually in.
pub fn transition_status(
    conn: &Connection,
    id: &Uuid,
    from: ProcessingStatus,
    to: ProcessingStatus,
) -> Result<(), DatabaseError> {
    if !from.can_transition_to(to) {
        return Err(invalid_transition(id, from.as_str(), to));
    }
    let rows = conn.execute(
        "UPDATE lab_reports SET processing_status = ?3, updated_at = ?4
         WHERE id = ?1 AND processing_status = ?2",
        params![
            id.to_string(),
            from.as_str(),
            to.as_str(),
            format_datetime(&now_utc())
        ],
    )?;
    if rows == 0 {
        return Err(rejected_transition(conn, id, to)?);
    }
    Ok(())
}

/// `pending -> processing`. Returns `None` when the report is missing or was
/// already claimed, so a redelivered job becomes a no-op.
pub fn claim_lab_report(conn: &Connection, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
    match transition_status(conn, id, ProcessingStatus::Pending, ProcessingStatus::Processing) {
        Ok(()) => get_lab_report(conn, id),
        Err(DatabaseError::InvalidTransition { .. }) | Err(DatabaseError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// `processing -> parsing`, storing the extracted text in the same statement.
/// The text column is write-once.
pub fn record_extracted_text(
    conn: &Connection,
    id: &Uuid,
    text: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE lab_reports
         SET processing_status = 'parsing', raw_extracted_text = ?2, updated_at = ?3
         WHERE id = ?1 AND processing_status = 'processing' AND raw_extracted_text IS NULL",
        params![id.to_string(), text, format_datetime(&now_utc())],
    )?;
    if rows == 0 {
        return Err(rejected_transition(conn, id, ProcessingStatus::Parsing)?);
    }
    Ok(())
}

/// `parsing -> completed`: insert every biomarker and flip the status inside one
/// transaction. On any error nothing is committed.
pub fn complete_with_biomarkers(
    conn: &Connection,
    id: &Uuid,
    biomarkers: &[Biomarker],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    for biomarker in biomarkers {
        if biomarker.lab_report_id != *id {
            return Err(DatabaseError::ConstraintViolation(format!(
                "biomarker {} belongs to report {}, not {id}",
                biomarker.id, biomarker.lab_report_id
            )));
        }
        super::insert_biomarker(&tx, biomarker)?;
    }
    transition_status(&tx, id, ProcessingStatus::Parsing, ProcessingStatus::Completed)?;

    tx.commit()?;
    Ok(())
}

/// Move a non-terminal, already-claimed report to `failed`.
/// Returns false when the report was not in `processing` or `parsing`.
pub fn mark_report_failed(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE lab_reports SET processing_status = 'failed', updated_at = ?2
         WHERE id = ?1 AND processing_status IN ('processing', 'parsing')",
        params![id.to_string(), format_datetime(&now_utc())],
    )?;
    Ok(rows > 0)
}

/// Fail every report left mid-pipeline, e.g. by a crash. Returns how many moved.
pub fn fail_interrupted_reports(conn: &Connection) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "UPDATE lab_reports SET processing_status = 'failed', updated_at = ?1
         WHERE processing_status IN ('processing', 'parsing')",
        params![format_datetime(&now_utc())],
    )?;
    Ok(rows)
}

/// Delete a caller's report. Biomarkers go with it via ON DELETE CASCADE.
/// Returns the deleted row, or `None` if the caller cannot see it.
pub fn delete_lab_report(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Option<LabReport>, DatabaseError> {
    let Some(report) = get_lab_report_for(conn, caller, id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM lab_reports WHERE id = ?1", params![id.to_string()])?;
    Ok(Some(report))
}

fn invalid_transition(id: &Uuid, from: &str, to: ProcessingStatus) -> DatabaseError {
    DatabaseError::InvalidTransition {
        id: id.to_string(),
        from: from.to_string(),
        to: to.as_str().to_string(),
    }
}

/// Explain why a compare-and-set update touched no row.
fn rejected_transition(
    conn: &Connection,
    id: &Uuid,
    to: ProcessingStatus,
) -> Result<DatabaseError, DatabaseError> {
    let current: Option<String> = conn
        .query_row(
            "SELECT processing_status FROM lab_reports WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match current {
        None => DatabaseError::NotFound {
            entity_type: "LabReport".into(),
            id: id.to_string(),
        },
        Some(status) => invalid_transition(id, &status, to),
    })
}

// Internal row type for LabReport mapping
struct LabReportRow {
    id: String,
    owner_id: String,
    tenant_id: String,
    filename: String,
    storage_locator: String,
    mime_type: String,
    file_size: i64,
    uploaded_at: String,
    processing_status: String,
    raw_extracted_text: Option<String>,
    created_at: String,
    updated_at: String,
}

fn lab_report_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LabReportRow, rusqlite::Error> {
    Ok(LabReportRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        tenant_id: row.get(2)?,
        filename: row.get(3)?,
        storage_locator: row.get(4)?,
        mime_type: row.get(5)?,
        file_size: row.get(6)?,
        uploaded_at: row.get(7)?,
        processing_status: row.get(8)?,
        raw_extracted_text: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn lab_report_from_row(row: LabReportRow) -> Result<LabReport, DatabaseError> {
    Ok(LabReport {
        id: parse_uuid(&row.id)?,
        owner_id: parse_uuid(&row.owner_id)?,
        tenant_id: parse_uuid(&row.tenant_id)?,
        filename: row.filename,
        storage_locator: row.storage_locator,
        mime_type: row.mime_type,
        file_size: row.file_size.max(0) as u64,
        uploaded_at: parse_datetime(&row.uploaded_at)?,
        processing_status: ProcessingStatus::from_str(&row.processing_status)?,
        raw_extracted_text: row.raw_extracted_text,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}
