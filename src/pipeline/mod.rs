mod chunk;
mod dedup;
mod errors;
mod parser;
mod policy;
mod summary;
#[cfg(test)]
mod tests;
mod tracker;
mod validator;

pub use chunk::{Chunk, ChunkProcessor, ChunkReport};
pub use dedup::{Admission, Deduplicator};
pub use errors::PipelineError;
pub use parser::{RecordParser, FIELD_NAMES};
pub use policy::{classify, Disposition, SkipPolicy, StageError};
pub use summary::RunSummary;
pub use tracker::{SkipListener, SkipTracker, DEFAULT_TRAIL_CAPACITY};
pub use validator::RecordValidator;
