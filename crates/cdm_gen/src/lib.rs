//! Deterministic synthetic OMOP CDM generator.
//!
//! Produces the person, observation_period, visit_occurrence,
//! condition_occurrence and drug_exposure tables as typed rows. Persistence
//! lives in the `omop-synth` crate; this crate performs no I/O.
//!
//! # Example
//!
//! ```rust
//! use cdm_gen::{CdmConfig, Generator};
//!
//! let config = CdmConfig {
//!     n_patients: 10,
//!     verbose: false,
//!     ..Default::default()
//! };
//! let data = Generator::new(&config).unwrap().generate();
//!
//! assert_eq!(data.person.len(), 10);
//! assert_eq!(data.visit_occurrence.len(), 30);
//! ```

pub mod concepts;
pub mod config;
pub mod generator;
pub mod records;
pub mod sampler;

pub use concepts::{concept_name, Concept, Domain};
pub use config::{scaled_count, CdmConfig, ConfigError, VisitLinkage};
pub use generator::{generate, Generator};
pub use records::{
    CdmData, ConditionOccurrence, DrugExposure, ObservationPeriod, Person, VisitOccurrence,
};
