use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::PipelineError;

/// The run could not start at all.
#[derive(Debug, Error)]
pub enum RunLaunchError {
    #[error("Input file [{}] could not be opened: {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        source: io::Error
    },
    #[error(transparent)]
    Config(#[from] ConfigError)
}

/// The run started but stopped before reaching the end of its input.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Input could not be read: {0}")]
    Input(String),
    #[error("Chunk worker failed: {0}")]
    Worker(String)
}
