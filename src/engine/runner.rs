use std::fmt;
use std::fmt::{Display, Formatter};
use tracing::{error, info};

use crate::engine::IngestEngine;
use crate::pipeline::RunSummary;
use crate::storage::TransactionStore;
use crate::types::RunId;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RunStatus {
    Completed,
    /// Started, then stopped on a fatal error.
    Failed {
        cause: String
    },
    NotLaunched {
        cause: String
    }
}

impl Display for RunStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => formatter.write_str("COMPLETED"),
            RunStatus::Failed { cause } => write!(formatter, "FAILED ({cause})"),
            RunStatus::NotLaunched { cause } => write!(formatter, "NOT LAUNCHED ({cause})")
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Absent when the run never started.
    pub summary: Option<RunSummary>
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn was_launched(&self) -> bool {
        !matches!(self.status, RunStatus::NotLaunched { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Completed => None,
            RunStatus::Failed { cause } | RunStatus::NotLaunched { cause } => Some(cause)
        }
    }
}

/// Starts one ingestion run per call under a fresh [`RunId`] and reports how it went.
///
/// Never returns an error: a run that cannot be launched is logged and reported in the outcome.
pub struct RunDriver<S: TransactionStore> {
    engine: IngestEngine<S>
}

impl<S: TransactionStore> RunDriver<S> {
    pub fn new(engine: IngestEngine<S>) -> Self {
        Self { engine }
    }

    pub async fn launch(&self) -> RunOutcome {
        let run_id = RunId::next();

        info!("Starting ingestion run [{run_id}]");

        match self.engine.run(run_id).await {
            Ok(report) => {
                let status = match report.failure {
                    None => {
                        info!("Ingestion run [{run_id}] completed: {}", report.summary);
                        RunStatus::Completed
                    }
                    Some(failure) => {
                        error!("Ingestion run [{run_id}] failed: {failure} ({})", report.summary);
                        RunStatus::Failed { cause: failure.to_string() }
                    }
                };

                RunOutcome { run_id, status, summary: Some(report.summary) }
            }
            Err(error) => {
                error!("Ingestion run [{run_id}] could not be launched: {error}");

                RunOutcome {
                    run_id,
                    status: RunStatus::NotLaunched { cause: error.to_string() },
                    summary: None
                }
            }
        }
    }
}
