//! Shared types for the HTTP layer.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::enums::ProcessingStatus;
use crate::models::LabReport;

pub const OWNER_HEADER: &str = "X-Owner-Id";
pub const TENANT_HEADER: &str = "X-Tenant-Id";

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Report as returned over HTTP. The storage locator stays internal.
#[derive(Debug, Serialize)]
pub struct LabReportView {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub file_size: u64,
    pub uploaded_at: NaiveDateTime,
    pub processing_status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_extracted_text: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl LabReportView {
    /// Detail view, with extracted text when there is any.
    pub fn detail(report: LabReport) -> Self {
        Self {
            id: report.id,
            filename: report.filename,
            mime_type: report.mime_type,
            file_size: report.file_size,
            uploaded_at: report.uploaded_at,
            processing_status: report.processing_status,
            raw_extracted_text: report.raw_extracted_text,
            updated_at: report.updated_at,
        }
    }

    /// Listing view, without extracted text.
    pub fn summary(report: LabReport) -> Self {
        Self {
            raw_extracted_text: None,
            ..Self::detail(report)
        }
    }
}

/// Parse a path segment as a report id.
pub fn parse_report_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid report id: {raw}")))
}
