mod errors;
mod ingest_engine;
mod runner;

pub use errors::{RunFailure, RunLaunchError};
pub use ingest_engine::{IngestEngine, RunReport};
pub use runner::{RunDriver, RunOutcome, RunStatus};
