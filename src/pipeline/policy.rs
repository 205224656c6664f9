use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{ParseError, SkipStage, ValidationError};
use crate::pipeline::PipelineError;
use crate::storage::StoreError;

/// A per-line or per-record failure at one of the pipeline stages.
#[derive(Debug, Clone, Copy)]
pub enum StageError<'a> {
    Parse(&'a ParseError),
    Validation(&'a ValidationError),
    Write(&'a StoreError)
}

impl StageError<'_> {
    pub fn stage(&self) -> SkipStage {
        match self {
            StageError::Parse(_) => SkipStage::Read,
            StageError::Validation(_) => SkipStage::Process,
            StageError::Write(_) => SkipStage::Write
        }
    }
}

impl Display for StageError<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Parse(error) => error.fmt(formatter),
            StageError::Validation(error) => error.fmt(formatter),
            StageError::Write(error) => error.fmt(formatter)
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Disposition {
    Skip,
    Fail
}

/// Parse and validation failures are always skippable. Store failures are skippable only when the
/// record itself was rejected.
pub fn classify(error: &StageError<'_>) -> Disposition {
    match error {
        StageError::Parse(_) | StageError::Validation(_) => Disposition::Skip,
        StageError::Write(error) if error.is_record_level() => Disposition::Skip,
        StageError::Write(_) => Disposition::Fail
    }
}

/// Counts skips across every worker of a run and enforces the optional cap.
#[derive(Debug)]
pub struct SkipPolicy {
    limit: Option<usize>,
    skipped: AtomicUsize
}

impl SkipPolicy {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            skipped: AtomicUsize::new(0)
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn admit_skip(&self, error: StageError<'_>) -> Result<(), PipelineError> {
        if classify(&error) == Disposition::Fail {
            return Err(PipelineError::NotSkippable {
                stage: error.stage(),
                cause: error.to_string()
            });
        }

        let skipped = self.skipped.fetch_add(1, Ordering::SeqCst) + 1;

        match self.limit {
            Some(limit) if skipped > limit => Err(PipelineError::SkipLimitExceeded { limit }),
            _ => Ok(())
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }
}
