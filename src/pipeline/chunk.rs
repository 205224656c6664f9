use std::slice;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::TransactionRecord;
use crate::pipeline::{Admission, Deduplicator, PipelineError, RecordValidator, SkipListener, SkipPolicy, StageError};
use crate::storage::TransactionStore;

/// Successfully read records, in file order, committed as one unit.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub sequence: usize,
    pub records: Vec<TransactionRecord>
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct ChunkReport {
    pub items: usize,
    pub process_skips: usize,
    pub duplicates_in_run: usize,
    pub duplicates_persisted: usize,
    pub written: usize,
    pub write_skips: usize,
    pub commits: usize,
    pub rollbacks: usize
}

/// Validates, deduplicates and commits one chunk at a time.
///
/// The write set of a chunk is saved in one store transaction. If the store rejects a record,
/// that transaction rolls back and the write set is retried one record per transaction, so every
/// acceptable record still lands and each rejected one is reported as a write skip.
pub struct ChunkProcessor<S: TransactionStore> {
    store: Arc<S>,
    validator: RecordValidator,
    deduplicator: Arc<Deduplicator<S>>,
    listener: Arc<dyn SkipListener>,
    policy: Arc<SkipPolicy>
}

impl<S: TransactionStore> ChunkProcessor<S> {
    pub fn new(
        store: Arc<S>,
        deduplicator: Arc<Deduplicator<S>>,
        listener: Arc<dyn SkipListener>,
        policy: Arc<SkipPolicy>
    ) -> Self {
        Self {
            store,
            validator: RecordValidator::new(),
            deduplicator,
            listener,
            policy
        }
    }

    pub fn process(&self, chunk: Chunk) -> Result<ChunkReport, PipelineError> {
        let mut report = ChunkReport {
            items: chunk.records.len(),
            ..ChunkReport::default()
        };
        let mut write_set = Vec::with_capacity(chunk.records.len());

        for mut record in chunk.records {
            if let Err(error) = self.validator.validate(&mut record) {
                self.listener.on_skip_in_process(&record, &error);
                self.policy.admit_skip(StageError::Validation(&error))?;
                report.process_skips += 1;
                continue;
            }

            match self.deduplicator.admit(&record)? {
                Admission::Accepted => write_set.push(record),
                admission @ Admission::DuplicateInRun => {
                    self.listener.on_duplicate(&record, admission);
                    report.duplicates_in_run += 1;
                }
                admission @ Admission::AlreadyPersisted => {
                    self.listener.on_duplicate(&record, admission);
                    report.duplicates_persisted += 1;
                }
            }
        }

        if !write_set.is_empty() {
            self.write(chunk.sequence, &write_set, &mut report)?;
        }

        Ok(report)
    }

    fn write(&self, sequence: usize, write_set: &[TransactionRecord], report: &mut ChunkReport) -> Result<(), PipelineError> {
        match self.store.save_all(write_set) {
            Ok(saved) => {
                debug!("Chunk [{sequence}] committed [{}] transactions", saved.len());
                report.written += saved.len();
                report.commits += 1;
                Ok(())
            }
            Err(error) if error.is_record_level() => {
                warn!("Chunk [{sequence}] rolled back ({error}), retrying [{}] transactions individually", write_set.len());
                report.rollbacks += 1;

                for record in write_set {
                    self.write_single(record, report)?;
                }

                Ok(())
            }
            Err(error) => {
                report.rollbacks += 1;
                Err(PipelineError::Store(error))
            }
        }
    }

    fn write_single(&self, record: &TransactionRecord, report: &mut ChunkReport) -> Result<(), PipelineError> {
        match self.store.save_all(slice::from_ref(record)) {
            Ok(_) => {
                report.written += 1;
                report.commits += 1;
                Ok(())
            }
            Err(error) => {
                report.rollbacks += 1;

                if !error.is_record_level() {
                    return Err(PipelineError::Store(error));
                }

                self.listener.on_skip_in_write(record, &error);
                self.policy.admit_skip(StageError::Write(&error))?;
                report.write_skips += 1;

                Ok(())
            }
        }
    }
}
