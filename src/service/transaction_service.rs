use std::sync::Arc;
use tracing::info;

use crate::models::{TransactionRecord, MAX_DESCRIPTION_LENGTH};
use crate::service::ServiceError;
use crate::storage::{Page, PageRequest, StoreError, TransactionFilter, TransactionStore, MAX_PAGE_SIZE};
use crate::types::{RecordId, Version};

/// Read and update access to persisted transactions.
pub struct TransactionService<S: TransactionStore> {
    store: Arc<S>
}

impl<S: TransactionStore> TransactionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn list(&self, filter: &TransactionFilter, request: PageRequest) -> Result<Page<TransactionRecord>, ServiceError> {
        if request.size == 0 || request.size > MAX_PAGE_SIZE {
            return Err(ServiceError::InvalidPageSize { size: request.size, max: MAX_PAGE_SIZE });
        }

        Ok(self.store.find_page(filter, &request)?)
    }

    /// Replaces the description of a persisted transaction and bumps its version by one.
    ///
    /// When `expected_version` is given, the update is refused unless it matches the stored version.
    pub fn update_description(
        &self,
        id: RecordId,
        description: &str,
        expected_version: Option<Version>
    ) -> Result<TransactionRecord, ServiceError> {
        check_description(description)?;

        let mut record = self.store.find_by_id(id)?.ok_or(ServiceError::NotFound(id))?;

        if let Some(expected) = expected_version {
            if record.version != Some(expected) {
                return Err(ServiceError::Conflict(format!(
                    "transaction [{id}] is at version [{:?}], not [{expected}]",
                    record.version
                )));
            }
        }

        record.description = description.to_string();

        match self.store.update(&record) {
            Ok(updated) => {
                info!("Updated description of transaction [{id}] to version [{:?}]", updated.version);
                Ok(updated)
            }
            Err(StoreError::NotFound(id)) => Err(ServiceError::NotFound(id)),
            Err(error @ (StoreError::VersionConflict { .. } | StoreError::Constraint(_))) => {
                Err(ServiceError::Conflict(error.to_string()))
            }
            Err(error) => Err(ServiceError::Store(error))
        }
    }
}

fn check_description(description: &str) -> Result<(), ServiceError> {
    if description.trim().is_empty() {
        return Err(ServiceError::InvalidDescription("description is required".to_string()));
    }

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ServiceError::InvalidDescription(format!(
            "description is longer than {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }

    Ok(())
}
