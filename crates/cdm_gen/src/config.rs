//! Generation parameters and their validation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Birth years outside this range are refused.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// How condition and drug rows pick their `visit_occurrence_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisitLinkage {
    /// Person and visit are drawn independently, so a row may point at a
    /// visit that belongs to someone else.
    #[default]
    Independent,
    /// The visit is drawn first and the row inherits its person.
    SamePerson,
}

impl std::str::FromStr for VisitLinkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "independent" => Ok(VisitLinkage::Independent),
            "same_person" | "person" => Ok(VisitLinkage::SamePerson),
            _ => Err(format!(
                "Unknown visit linkage: {}. Valid options: independent, same_person",
                s
            )),
        }
    }
}

impl std::fmt::Display for VisitLinkage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitLinkage::Independent => write!(f, "independent"),
            VisitLinkage::SamePerson => write!(f, "same_person"),
        }
    }
}

/// Parameters for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CdmConfig {
    /// Number of persons (and observation periods) to create
    pub n_patients: i64,
    /// Seed for the single random generator used by the run. Negative
    /// values are accepted and reinterpreted bit for bit.
    pub seed: i64,
    /// Earliest year of birth (inclusive)
    pub start_year: i32,
    /// Latest year of birth (inclusive)
    pub end_year: i32,
    /// Visit rows per person, on average
    pub avg_visits_per_patient: f64,
    /// Condition rows per person, on average
    pub avg_conditions_per_patient: f64,
    /// Drug exposure rows per person, on average
    pub avg_drugs_per_patient: f64,
    /// Emit progress messages while generating
    pub verbose: bool,
    /// Visit selection for condition and drug rows
    pub visit_linkage: VisitLinkage,
}

impl Default for CdmConfig {
    fn default() -> Self {
        Self {
            n_patients: 1000,
            seed: 123,
            start_year: 1920,
            end_year: 2005,
            avg_visits_per_patient: 3.0,
            avg_conditions_per_patient: 2.0,
            avg_drugs_per_patient: 4.0,
            verbose: true,
            visit_linkage: VisitLinkage::Independent,
        }
    }
}

/// Rejected generation parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("n_patients must be a positive integer (got {0})")]
    NonPositivePatients(i64),
    #[error("start_year must be less than end_year (got {start_year} >= {end_year})")]
    InvertedYears { start_year: i32, end_year: i32 },
    #[error("start_year and end_year must be within {min}..={max} (got {start_year}..={end_year})")]
    YearOutOfRange {
        start_year: i32,
        end_year: i32,
        min: i32,
        max: i32,
    },
    #[error("{field} must be a finite number (got {value})")]
    NonFiniteAverage { field: &'static str, value: f64 },
}

impl CdmConfig {
    /// Check the parameters before any rows are drawn.
    ///
    /// Averages that are zero or negative are accepted and produce empty
    /// tables; only NaN and infinities are refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_patients < 1 {
            return Err(ConfigError::NonPositivePatients(self.n_patients));
        }
        if self.start_year >= self.end_year {
            return Err(ConfigError::InvertedYears {
                start_year: self.start_year,
                end_year: self.end_year,
            });
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.start_year)
            || !(MIN_YEAR..=MAX_YEAR).contains(&self.end_year)
        {
            return Err(ConfigError::YearOutOfRange {
                start_year: self.start_year,
                end_year: self.end_year,
                min: MIN_YEAR,
                max: MAX_YEAR,
            });
        }
        for (field, value) in [
            ("avg_visits_per_patient", self.avg_visits_per_patient),
            ("avg_conditions_per_patient", self.avg_conditions_per_patient),
            ("avg_drugs_per_patient", self.avg_drugs_per_patient),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteAverage { field, value });
            }
        }
        Ok(())
    }

    pub fn visit_count(&self) -> usize {
        scaled_count(self.n_patients, self.avg_visits_per_patient)
    }

    pub fn condition_count(&self) -> usize {
        scaled_count(self.n_patients, self.avg_conditions_per_patient)
    }

    pub fn drug_count(&self) -> usize {
        scaled_count(self.n_patients, self.avg_drugs_per_patient)
    }
}

/// `round(n * avg)` with ties to even, clamped at zero.
pub fn scaled_count(n_patients: i64, avg_per_patient: f64) -> usize {
    let rows = (n_patients.max(0) as f64 * avg_per_patient).round_ties_even();
    if rows.is_finite() && rows > 0.0 {
        rows as usize
    } else {
        0
    }
}
