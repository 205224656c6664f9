use thiserror::Error;

use crate::models::SkipStage;
use crate::storage::StoreError;

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Skip limit of [{limit}] exceeded")]
    SkipLimitExceeded {
        limit: usize
    },
    #[error("Failure at [{stage}] stage is not skippable: {cause}")]
    NotSkippable {
        stage: SkipStage,
        cause: String
    },
    #[error("Store failure: {0}")]
    Store(#[from] StoreError)
}
