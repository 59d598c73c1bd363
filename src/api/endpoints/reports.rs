//! Lab report endpoints.
//!
//! `POST /api/reports`: multipart upload, field `file`.
//! `GET /api/reports`, `GET|DELETE /api/reports/:id`,
//! `GET /api/reports/:id/biomarkers`.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{parse_report_id, ApiContext, LabReportView};
use crate::models::{Biomarker, Caller};
use crate::reports;

const FILE_FIELD: &str = "file";

/// `POST /api/reports`: store the file and queue it. Answers 202 with the
/// `pending` report; processing continues in the background.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<LabReportView>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {e}")))?;

        let core = ctx.core.clone();
        let report = tokio::task::spawn_blocking(move || {
            reports::create_lab_report(&core, &caller, &bytes, &filename)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Upload task failed: {e}")))??;

        return Ok((StatusCode::ACCEPTED, Json(LabReportView::detail(report))));
    }

    Err(ApiError::BadRequest(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}

/// `GET /api/reports`: the caller's reports, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<LabReportView>>, ApiError> {
    let reports = reports::list_lab_reports(&ctx.core, &caller)?;
    Ok(Json(reports.into_iter().map(LabReportView::summary).collect()))
}

/// `GET /api/reports/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<LabReportView>, ApiError> {
    let id = parse_report_id(&id)?;
    let report = reports::get_lab_report(&ctx.core, &caller, &id)?;
    Ok(Json(LabReportView::detail(report)))
}

/// `DELETE /api/reports/:id`: removes the report, its biomarkers and file.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_report_id(&id)?;
    reports::delete_lab_report(&ctx.core, &caller, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/reports/:id/biomarkers`
pub async fn biomarkers(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Biomarker>>, ApiError> {
    let id = parse_report_id(&id)?;
    Ok(Json(reports::get_biomarkers(&ctx.core, &caller, &id)?))
}
