use dashmap::DashSet;
use std::sync::Arc;

use crate::models::{NaturalKey, TransactionRecord};
use crate::storage::{StoreError, TransactionStore};

/// Result of the two duplicate checks for one record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Admission {
    Accepted,
    DuplicateInRun,
    AlreadyPersisted
}

/// Run-scoped duplicate filter.
///
/// Keys seen earlier in the run are rejected from memory; the rest are checked against the store.
/// Shared by every chunk worker of a run and dropped with it.
pub struct Deduplicator<S: TransactionStore> {
    seen: DashSet<NaturalKey>,
    store: Arc<S>
}

impl<S: TransactionStore> Deduplicator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            seen: DashSet::new(),
            store
        }
    }

    pub fn admit(&self, record: &TransactionRecord) -> Result<Admission, StoreError> {
        let key = record.natural_key();

        //NOTE: `insert` is the membership check, so two workers can never both admit the same key
        if !self.seen.insert(key.clone()) {
            return Ok(Admission::DuplicateInRun);
        }

        if self.store.exists(&key)? {
            return Ok(Admission::AlreadyPersisted);
        }

        Ok(Admission::Accepted)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
