use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcessingStatus;

/// One uploaded lab-test document plus its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabReport {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub filename: String,
    pub storage_locator: String,
    pub mime_type: String,
    pub file_size: u64,
    pub uploaded_at: NaiveDateTime,
    pub processing_status: ProcessingStatus,
    /// NULL until the report reaches `parsing`; written once.
    pub raw_extracted_text: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LabReport {
    /// A freshly uploaded report: `pending`, no extracted text yet.
    pub fn new_pending(
        caller: &Caller,
        filename: &str,
        storage_locator: &str,
        mime_type: &str,
        file_size: u64,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: caller.owner_id,
            tenant_id: caller.tenant_id,
            filename: filename.to_string(),
            storage_locator: storage_locator.to_string(),
            mime_type: mime_type.to_string(),
            file_size,
            uploaded_at: now,
            processing_status: ProcessingStatus::Pending,
            raw_extracted_text: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Identity a request acts for. Reports outside this pair are invisible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
}

impl Caller {
    pub fn new(owner_id: Uuid, tenant_id: Uuid) -> Self {
        Self { owner_id, tenant_id }
    }

    pub fn owns(&self, report: &LabReport) -> bool {
        report.owner_id == self.owner_id && report.tenant_id == self.tenant_id
    }
}
