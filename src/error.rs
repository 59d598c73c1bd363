use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::QueueError;
use crate::storage::StorageError;

/// Errors surfaced by the upload and read operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Absent, or owned by another caller. The two are indistinguishable.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ServiceError {
    pub(crate) fn report_not_found(id: &uuid::Uuid) -> Self {
        ServiceError::NotFound(format!("Lab report {id}"))
    }
}
