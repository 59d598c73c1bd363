//! Lab report upload, lookup, and deletion.
//!
//! Every read is scoped to the caller's owner and tenant; a report outside
//! that scope is reported as not found.

use std::path::Path;

use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::{Biomarker, Caller, LabReport};
use crate::pipeline::extraction::is_supported_mime;
use crate::pipeline::QueueError;

/// Store an uploaded file, record it as `pending`, and queue it.
///
/// Returns as soon as the row is committed; processing is asynchronous.
pub fn create_lab_report(
    core: &CoreState,
    caller: &Caller,
    bytes: &[u8],
    filename: &str,
) -> Result<LabReport, ServiceError> {
    let filename = clean_filename(filename)?;
    if bytes.is_empty() {
        return Err(ServiceError::Validation("Uploaded file is empty".into()));
    }
    let max = core.config().max_upload_bytes;
    if bytes.len() > max {
        return Err(ServiceError::Validation(format!(
            "Uploaded file exceeds {max} bytes ({} bytes)",
            bytes.len()
        )));
    }
    let mime_type = detect_mime(&filename)?;

    let locator = core.store().put(bytes, &filename)?;
    let report = LabReport::new_pending(
        caller,
        &filename,
        &locator,
        &mime_type,
        bytes.len() as u64,
        repository::now_utc(),
    );

    let inserted = core
        .open_db()
        .and_then(|conn| repository::insert_lab_report(&conn, &report));
    if let Err(e) = inserted {
        if let Err(cleanup) = core.store().delete(&locator) {
            tracing::warn!(locator = %locator, error = %cleanup, "Orphaned object after failed insert");
        }
        return Err(e.into());
    }

    tracing::info!(
        report_id = %report.id,
        owner_id = %caller.owner_id,
        mime_type = %mime_type,
        file_size = report.file_size,
        "Lab report uploaded"
    );

    match core.queue().enqueue(report.id) {
        Ok(_) => {}
        // Row stays pending; startup recovery picks it up.
        Err(QueueError::Closed) => {
            tracing::warn!(report_id = %report.id, "Job queue closed, report left pending");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(report)
}

pub fn get_lab_report(core: &CoreState, caller: &Caller, id: &Uuid) -> Result<LabReport, ServiceError> {
    let conn = core.open_db()?;
    repository::get_lab_report_for(&conn, caller, id)?
        .ok_or_else(|| ServiceError::report_not_found(id))
}

/// The caller's reports, newest upload first.
pub fn list_lab_reports(core: &CoreState, caller: &Caller) -> Result<Vec<LabReport>, ServiceError> {
    let conn = core.open_db()?;
    Ok(repository::list_lab_reports(&conn, caller)?)
}

/// Biomarkers of one report in source-line order.
pub fn get_biomarkers(
    core: &CoreState,
    caller: &Caller,
    report_id: &Uuid,
) -> Result<Vec<Biomarker>, ServiceError> {
    let conn = core.open_db()?;
    if repository::get_lab_report_for(&conn, caller, report_id)?.is_none() {
        return Err(ServiceError::report_not_found(report_id));
    }
    Ok(repository::get_biomarkers_for_report(&conn, report_id)?)
}

/// Delete a report, its biomarkers, and its stored file.
///
/// The row goes first. A file that cannot be removed afterwards is logged
/// and left behind.
pub fn delete_lab_report(core: &CoreState, caller: &Caller, id: &Uuid) -> Result<LabReport, ServiceError> {
    let conn = core.open_db()?;
    let report = repository::delete_lab_report(&conn, caller, id)?
        .ok_or_else(|| ServiceError::report_not_found(id))?;

    if let Err(e) = core.store().delete(&report.storage_locator) {
        tracing::warn!(
            report_id = %report.id,
            locator = %report.storage_locator,
            error = %e,
            "Stored file not removed for deleted report"
        );
    }
    tracing::info!(report_id = %report.id, status = %report.processing_status, "Lab report deleted");
    Ok(report)
}

/// Last path component, trimmed. Browsers may send full client paths.
fn clean_filename(filename: &str) -> Result<String, ServiceError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("Filename is required".into()));
    }
    Ok(name.to_string())
}

fn detect_mime(filename: &str) -> Result<String, ServiceError> {
    let mime = mime_guess::from_path(Path::new(filename))
        .first()
        .map(|m| m.essence_str().to_string());
    match mime {
        Some(m) if is_supported_mime(&m) => Ok(m),
        Some(m) => Err(ServiceError::Validation(format!("Unsupported file type: {m}"))),
        None => Err(ServiceError::Validation(format!(
            "Unsupported file type: {filename}"
        ))),
    }
}
