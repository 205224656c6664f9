mod errors;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub use errors::ConfigError;

pub const DEFAULT_DELIMITER: u8 = b'|';
pub const DEFAULT_LINES_TO_SKIP: usize = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub const ENV_CHUNK_SIZE: &str = "INGEST_CHUNK_SIZE";
pub const ENV_CONCURRENCY: &str = "INGEST_CONCURRENCY";
pub const ENV_LINES_TO_SKIP: &str = "INGEST_LINES_TO_SKIP";
pub const ENV_SKIP_LIMIT: &str = "INGEST_SKIP_LIMIT";
pub const ENV_DATABASE: &str = "INGEST_DATABASE";

/// Tuning for a single ingestion run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IngestConfig {
    pub input_path: PathBuf,
    pub delimiter: u8,
    /// Leading lines dropped before parsing starts (the header).
    pub lines_to_skip: usize,
    pub chunk_size: usize,
    /// Maximum number of chunks in flight at once.
    pub concurrency: usize,
    /// Bound on parsed lines queued between the reader and the chunk dispatcher.
    pub channel_capacity: usize,
    /// `None` allows any number of skips.
    pub skip_limit: Option<usize>
}

impl IngestConfig {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            delimiter: DEFAULT_DELIMITER,
            lines_to_skip: DEFAULT_LINES_TO_SKIP,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            skip_limit: None
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_lines_to_skip(mut self, lines_to_skip: usize) -> Self {
        self.lines_to_skip = lines_to_skip;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    pub fn with_skip_limit(mut self, skip_limit: Option<usize>) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter);
        }

        if self.chunk_size == 0 {
            return Err(ConfigError::MustBePositive { key: ENV_CHUNK_SIZE });
        }

        if self.concurrency == 0 {
            return Err(ConfigError::MustBePositive { key: ENV_CONCURRENCY });
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::MustBePositive { key: "channel_capacity" });
        }

        Ok(())
    }
}

/// Process-level configuration: engine tuning plus where records are persisted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub ingest: IngestConfig,
    /// SQLite database file. `None` keeps records in memory for the life of the process.
    pub database: Option<PathBuf>
}

impl Settings {
    pub fn from_env(input_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup(input_path, |key| env::var(key).ok())
    }

    /// Builds settings from defaults, overridden by whatever `lookup` returns for each key.
    pub fn from_lookup<F>(input_path: impl Into<PathBuf>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ingest = IngestConfig::new(input_path);

        if let Some(chunk_size) = parse_value(&lookup, ENV_CHUNK_SIZE)? {
            ingest = ingest.with_chunk_size(chunk_size);
        }

        if let Some(concurrency) = parse_value(&lookup, ENV_CONCURRENCY)? {
            ingest = ingest.with_concurrency(concurrency);
        }

        if let Some(lines_to_skip) = parse_value(&lookup, ENV_LINES_TO_SKIP)? {
            ingest = ingest.with_lines_to_skip(lines_to_skip);
        }

        if let Some(skip_limit) = parse_value(&lookup, ENV_SKIP_LIMIT)? {
            ingest = ingest.with_skip_limit(Some(skip_limit));
        }

        ingest.validate()?;

        let database = lookup(ENV_DATABASE)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Ok(Self { ingest, database })
    }
}

fn parse_value<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None)
    }
}
