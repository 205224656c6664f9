use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::models::{NaturalKey, TransactionRecord, MAX_DESCRIPTION_LENGTH};
use crate::storage::{Page, PageRequest, StoreError, TransactionFilter, TransactionStore};
use crate::types::RecordId;

/// Process-local store. Every operation runs under a single lock, which makes `save_all` atomic.
pub struct MemoryStore {
    state: Mutex<MemoryState>
}

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<RecordId, TransactionRecord>,
    keys: HashMap<NaturalKey, RecordId>,
    last_id: RecordId
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default())
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.rows.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for MemoryStore {
    fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        Ok(self.lock()?.keys.contains_key(key))
    }

    fn save_all(&self, records: &[TransactionRecord]) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut state = self.lock()?;
        let mut batch_keys = HashSet::with_capacity(records.len());

        for record in records {
            check_description(record)?;

            let key = record.natural_key();

            if state.keys.contains_key(&key) || !batch_keys.insert(key) {
                return Err(duplicate_key(record));
            }
        }

        let mut saved = Vec::with_capacity(records.len());

        for record in records {
            let id = state.last_id + 1;
            state.last_id = id;

            let mut persisted = record.clone();
            persisted.id = Some(id);
            persisted.version = Some(0);

            state.keys.insert(persisted.natural_key(), id);
            state.rows.insert(id, persisted.clone());
            saved.push(persisted);
        }

        Ok(saved)
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    fn find_page(&self, filter: &TransactionFilter, request: &PageRequest) -> Result<Page<TransactionRecord>, StoreError> {
        let state = self.lock()?;
        let matching: Vec<&TransactionRecord> = state.rows.values()
            .filter(|record| filter.matches(record))
            .collect();

        let content = matching.iter()
            .skip(request.offset())
            .take(request.size)
            .map(|record| (*record).clone())
            .collect();

        Ok(Page::new(content, request, matching.len()))
    }

    fn update(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        let id = record.id
            .ok_or_else(|| StoreError::Constraint("cannot update a transaction that was never persisted".to_string()))?;

        let mut state = self.lock()?;

        let current = state.rows.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let actual = current.version.unwrap_or_default();

        if record.version != Some(actual) {
            return Err(StoreError::VersionConflict { id, expected: record.version, actual });
        }

        check_description(record)?;

        let old_key = current.natural_key();
        let new_key = record.natural_key();

        if new_key != old_key && state.keys.contains_key(&new_key) {
            return Err(duplicate_key(record));
        }

        let mut updated = record.clone();
        updated.version = Some(actual + 1);

        state.keys.remove(&old_key);
        state.keys.insert(new_key, id);
        state.rows.insert(id, updated.clone());

        Ok(updated)
    }
}

fn check_description(record: &TransactionRecord) -> Result<(), StoreError> {
    let length = record.description.chars().count();

    if length > MAX_DESCRIPTION_LENGTH {
        return Err(StoreError::Constraint(format!(
            "description of {length} characters exceeds the limit of {MAX_DESCRIPTION_LENGTH}"
        )));
    }

    Ok(())
}

fn duplicate_key(record: &TransactionRecord) -> StoreError {
    StoreError::Constraint(format!("natural key [{}] already exists", record.natural_key()))
}
