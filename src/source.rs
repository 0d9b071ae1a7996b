//! Where a CDM store comes from.
//!
//! Commands that read a CDM take a `CdmSource` instead of deciding for
//! themselves. Providers that need network access or extra tooling would be
//! further implementations of the trait; a missing provider then fails when
//! the source is built, not halfway through a command.

use crate::error::{Error, Result};
use crate::store::CdmStore;
use cdm_gen::CdmConfig;
use std::path::PathBuf;

pub trait CdmSource {
    /// Human-readable description for status messages
    fn describe(&self) -> String;

    /// Produce a store the caller owns
    fn open(&self) -> Result<CdmStore>;
}

/// Generates a fresh synthetic CDM on every `open`
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    config: CdmConfig,
}

impl SyntheticSource {
    /// Fails early on parameters `generate` would reject
    pub fn new(config: CdmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl CdmSource for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "synthetic CDM ({} patients, seed {})",
            self.config.n_patients, self.config.seed
        )
    }

    fn open(&self) -> Result<CdmStore> {
        crate::generate(&self.config)
    }
}

/// A DuckDB file written earlier, e.g. by `generate --output`
#[derive(Debug, Clone)]
pub struct DuckDbFileSource {
    path: PathBuf,
}

impl DuckDbFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::InvalidArgument(format!(
                "database file does not exist: {}",
                path.display()
            )));
        }
        Ok(Self { path })
    }
}

impl CdmSource for DuckDbFileSource {
    fn describe(&self) -> String {
        format!("DuckDB file {}", self.path.display())
    }

    fn open(&self) -> Result<CdmStore> {
        CdmStore::open(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_source_rejects_bad_config() {
        let err = SyntheticSource::new(CdmConfig {
            n_patients: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_file_source_requires_existing_file() {
        let err = DuckDbFileSource::new("/definitely/not/here.duckdb").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_synthetic_source_describe() {
        let source = SyntheticSource::new(CdmConfig {
            n_patients: 5,
            verbose: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(source.describe(), "synthetic CDM (5 patients, seed 123)");
        let store = source.open().unwrap();
        assert_eq!(store.row_count("person").unwrap(), 5);
    }
}
