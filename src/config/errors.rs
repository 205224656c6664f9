use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("Configuration error: [{key}] has an invalid value '{value}'")]
    InvalidValue {
        key: &'static str,
        value: String
    },
    #[error("Configuration error: [{key}] must be greater than zero")]
    MustBePositive {
        key: &'static str
    },
    #[error("Configuration error: delimiter must be a single ASCII character")]
    InvalidDelimiter
}
