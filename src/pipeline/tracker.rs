use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error};

use crate::models::{ParseError, SkipRecord, SkipStage, TransactionRecord, ValidationError};
use crate::pipeline::Admission;
use crate::storage::StoreError;

/// Observer for skipped lines and records.
///
/// Implementations must not panic or block: they are called inline from the reader and from
/// chunk workers and cannot influence what happens next.
pub trait SkipListener: Send + Sync {
    fn on_skip_in_read(&self, error: &ParseError);

    fn on_skip_in_process(&self, record: &TransactionRecord, error: &ValidationError);

    fn on_skip_in_write(&self, record: &TransactionRecord, error: &StoreError);

    /// Duplicates are expected input, not failures.
    fn on_duplicate(&self, record: &TransactionRecord, admission: Admission) {
        debug!("Skipping duplicate transaction {record} ({admission:?})");
    }
}

/// Entries kept by [`SkipTracker::new`]. Skips past this are still logged and counted.
pub const DEFAULT_TRAIL_CAPACITY: usize = 1000;

/// Logs every skip, counts them per stage, and keeps the first `capacity` entries for the run report.
#[derive(Debug)]
pub struct SkipTracker {
    entries: Mutex<Vec<SkipRecord>>,
    capacity: usize,
    counts: [AtomicUsize; 3]
}

impl SkipTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRAIL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity,
            counts: Default::default()
        }
    }

    /// The retained trail, oldest first. At most `capacity` entries.
    pub fn entries(&self) -> Vec<SkipRecord> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every skip seen at `stage`, including those no longer in the trail.
    pub fn count(&self, stage: SkipStage) -> usize {
        self.counts[slot(stage)].load(Ordering::Relaxed)
    }

    fn push(&self, entry: SkipRecord) {
        self.counts[slot(entry.stage)].fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if entries.len() < self.capacity {
            entries.push(entry);
        }
    }
}

impl Default for SkipTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(stage: SkipStage) -> usize {
    match stage {
        SkipStage::Read => 0,
        SkipStage::Process => 1,
        SkipStage::Write => 2
    }
}

impl SkipListener for SkipTracker {
    fn on_skip_in_read(&self, error: &ParseError) {
        error!("Skipping malformed record: \"{}\". Error: {error}", error.input());

        self.push(SkipRecord {
            stage: SkipStage::Read,
            line_number: Some(error.line_number()),
            input: error.input().to_string(),
            cause: error.to_string()
        });
    }

    fn on_skip_in_process(&self, record: &TransactionRecord, error: &ValidationError) {
        error!("Skipping invalid transaction {record} due to error: {error}");

        self.push(SkipRecord {
            stage: SkipStage::Process,
            line_number: None,
            input: record.to_string(),
            cause: error.to_string()
        });
    }

    fn on_skip_in_write(&self, record: &TransactionRecord, error: &StoreError) {
        error!("Failed to write transaction {record}. Error: {error}");

        self.push(SkipRecord {
            stage: SkipStage::Write,
            line_number: None,
            input: record.to_string(),
            cause: error.to_string()
        });
    }
}
