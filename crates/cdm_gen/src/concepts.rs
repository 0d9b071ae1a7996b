//! Concept ids used by the generator, with an illustrative name lookup.
//!
//! The lookup only labels the handful of codes this crate emits. It is not a
//! vocabulary and nothing is validated against it.

use std::fmt;

pub const MALE: i64 = 8507;
pub const FEMALE: i64 = 8532;

pub const GENDERS: &[i64] = &[MALE, FEMALE];

pub const RACES: &[i64] = &[8527, 8516, 8515, 8657];

pub const ETHNICITIES: &[i64] = &[38003563, 38003564];

pub const VISITS: &[i64] = &[9201, 9202, 9203, 262];

pub const CONDITIONS: &[i64] = &[320128, 201826, 4329847, 255573];

pub const DRUGS: &[i64] = &[1503297, 1308216, 1539403, 1125315];

/// Period covering healthcare encounters
pub const OBSERVATION_PERIOD_TYPE: i64 = 44814724;
/// Visit derived from encounter on claim
pub const VISIT_TYPE: i64 = 44818517;
/// EHR encounter diagnosis
pub const CONDITION_TYPE: i64 = 32020;
/// Prescription written
pub const DRUG_TYPE: i64 = 38000177;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Gender,
    Race,
    Ethnicity,
    Visit,
    Condition,
    Drug,
    Type,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Gender => "Gender",
            Domain::Race => "Race",
            Domain::Ethnicity => "Ethnicity",
            Domain::Visit => "Visit",
            Domain::Condition => "Condition",
            Domain::Drug => "Drug",
            Domain::Type => "Type Concept",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concept {
    pub id: i64,
    pub name: &'static str,
    pub domain: Domain,
}

const fn concept(id: i64, name: &'static str, domain: Domain) -> Concept {
    Concept { id, name, domain }
}

pub const CONCEPTS: &[Concept] = &[
    concept(MALE, "MALE", Domain::Gender),
    concept(FEMALE, "FEMALE", Domain::Gender),
    concept(8527, "White", Domain::Race),
    concept(8516, "Black or African American", Domain::Race),
    concept(8515, "Asian", Domain::Race),
    concept(8657, "American Indian or Alaska Native", Domain::Race),
    concept(38003563, "Hispanic or Latino", Domain::Ethnicity),
    concept(38003564, "Not Hispanic or Latino", Domain::Ethnicity),
    concept(9201, "Inpatient Visit", Domain::Visit),
    concept(9202, "Outpatient Visit", Domain::Visit),
    concept(9203, "Emergency Room Visit", Domain::Visit),
    concept(262, "Emergency Room and Inpatient Visit", Domain::Visit),
    concept(320128, "Essential hypertension", Domain::Condition),
    concept(201826, "Type 2 diabetes mellitus", Domain::Condition),
    concept(4329847, "Myocardial infarction", Domain::Condition),
    concept(255573, "Chronic obstructive lung disease", Domain::Condition),
    concept(1503297, "metformin", Domain::Drug),
    concept(1308216, "lisinopril", Domain::Drug),
    concept(1539403, "simvastatin", Domain::Drug),
    concept(1125315, "acetaminophen", Domain::Drug),
    concept(
        OBSERVATION_PERIOD_TYPE,
        "Period covering healthcare encounters",
        Domain::Type,
    ),
    concept(VISIT_TYPE, "Visit derived from encounter on claim", Domain::Type),
    concept(CONDITION_TYPE, "EHR encounter diagnosis", Domain::Type),
    concept(DRUG_TYPE, "Prescription written", Domain::Type),
];

pub fn lookup(id: i64) -> Option<&'static Concept> {
    CONCEPTS.iter().find(|c| c.id == id)
}

/// Name for a concept id, if it is one the generator emits.
pub fn concept_name(id: i64) -> Option<&'static str> {
    lookup(id).map(|c| c.name)
}

/// Short source value for a gender concept ("M"/"F").
pub fn gender_source_value(id: i64) -> &'static str {
    match id {
        MALE => "M",
        FEMALE => "F",
        _ => "U",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_emitted_concept_has_a_name() {
        let emitted = GENDERS
            .iter()
            .chain(RACES)
            .chain(ETHNICITIES)
            .chain(VISITS)
            .chain(CONDITIONS)
            .chain(DRUGS);
        for id in emitted {
            assert!(concept_name(*id).is_some(), "no name for {}", id);
        }
    }

    #[test]
    fn test_domains() {
        assert_eq!(lookup(9203).unwrap().domain, Domain::Visit);
        assert_eq!(lookup(DRUG_TYPE).unwrap().domain, Domain::Type);
        assert!(lookup(42).is_none());
    }

    #[test]
    fn test_gender_source_value() {
        assert_eq!(gender_source_value(MALE), "M");
        assert_eq!(gender_source_value(FEMALE), "F");
        assert_eq!(gender_source_value(0), "U");
    }
}
