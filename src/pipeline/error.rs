use std::time::Duration;

use thiserror::Error;

use super::extraction::ExtractionError;
use crate::db::DatabaseError;
use crate::storage::StorageError;

/// Step of a report job, carried in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Claim,
    Fetch,
    Extract,
    RecordText,
    Parse,
    MarkFailed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::RecordText => "record_text",
            Self::Parse => "parse",
            Self::MarkFailed => "mark_failed",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job-internal failures. Never returned to a caller: the job logs them and
/// writes `failed`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Failed to commit parsed biomarkers: {0}")]
    Parse(DatabaseError),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job task panicked during {0}")]
    Panicked(JobStage),

    #[error("Job task aborted during {stage}: {reason}")]
    Aborted { stage: JobStage, reason: String },
}
