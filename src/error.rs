//! Library error type.

use cdm_gen::ConfigError;
use thiserror::Error;

/// Errors surfaced by generation, loading and querying.
///
/// `generate` only ever returns `InvalidArgument` (before any work starts) or
/// `Storage` (store creation or a table write failed).
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("storage failure: {0}")]
    Storage(#[from] duckdb::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
