mod errors;
mod skip;
mod transaction;

pub use errors::{ParseError, ValidationError};
pub use skip::{SkipRecord, SkipStage};
pub use transaction::{NaturalKey, TransactionRecord};

/// Longest description the store accepts, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// Storage and natural-key form of a timestamp. Sub-second digits appear only when non-zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
