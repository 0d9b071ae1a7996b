//! Synthetic OMOP CDM databases for tests and demos.
//!
//! `generate` draws the person, observation_period, visit_occurrence,
//! condition_occurrence and drug_exposure tables from a seeded RNG and loads
//! them into a fresh in-memory DuckDB database.
//!
//! ```ignore
//! use omop_synth::{generate, CdmConfig};
//!
//! let store = generate(&CdmConfig { n_patients: 10, seed: 123, ..Default::default() })?;
//! assert_eq!(store.row_count("person")?, 10);
//! ```

pub mod config;
pub mod error;
pub mod explore;
pub mod source;
pub mod store;

pub use cdm_gen::{CdmConfig, CdmData, VisitLinkage};
pub use error::{Error, Result};
pub use source::{CdmSource, DuckDbFileSource, SyntheticSource};
pub use store::CdmStore;

use cdm_gen::Generator;
use tracing::info;

/// Generate a synthetic CDM and load it into a new in-memory store.
///
/// Parameters are validated before anything is drawn or created. The returned
/// store is owned by the caller; dropping it discards the database.
pub fn generate(config: &CdmConfig) -> Result<CdmStore> {
    let generator = Generator::new(config)?;
    let data = generator.generate();

    let mut store = CdmStore::open_in_memory()?;
    let stats = store.load(&data)?;
    if config.verbose {
        info!(
            patients = config.n_patients,
            seed = config.seed,
            rows = stats.rows_inserted,
            "synthetic CDM ready: {}",
            stats
        );
    }
    Ok(store)
}
