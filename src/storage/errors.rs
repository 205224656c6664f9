use thiserror::Error;

use crate::types::{RecordId, Version};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Transaction [{0}] was not found")]
    NotFound(RecordId),
    #[error("Transaction [{id}] was modified concurrently: expected version [{expected:?}] but found [{actual}]")]
    VersionConflict {
        id: RecordId,
        expected: Option<Version>,
        actual: Version
    },
    #[error("Stored transaction is corrupt: {0}")]
    Corrupt(String),
    #[error("Storage lock was poisoned")]
    Poisoned,
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error)
}

impl StoreError {
    /// Whether the failure is caused by the record being written rather than by the store itself.
    pub fn is_record_level(&self) -> bool {
        matches!(self, StoreError::Constraint(_))
    }
}
