use thiserror::Error;

use crate::storage::StoreError;
use crate::types::RecordId;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid description: {0}")]
    InvalidDescription(String),
    #[error("Invalid page size [{size}]: must be between 1 and {max}")]
    InvalidPageSize {
        size: usize,
        max: usize
    },
    #[error("Transaction not found with id [{0}]")]
    NotFound(RecordId),
    #[error("Conflict occurred: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError)
}
