//! Row types for the five generated CDM tables.

use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub person_id: i64,
    pub gender_concept_id: i64,
    pub year_of_birth: i32,
    pub month_of_birth: u32,
    pub day_of_birth: u32,
    pub birth_datetime: NaiveDateTime,
    pub race_concept_id: i64,
    pub ethnicity_concept_id: i64,
    pub location_id: i64,
    pub provider_id: i64,
    pub care_site_id: i64,
    pub person_source_value: String,
    pub gender_source_value: String,
    pub race_source_value: String,
    pub ethnicity_source_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPeriod {
    pub observation_period_id: i64,
    pub person_id: i64,
    pub observation_period_start_date: NaiveDate,
    pub observation_period_end_date: NaiveDate,
    pub period_type_concept_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisitOccurrence {
    pub visit_occurrence_id: i64,
    pub person_id: i64,
    pub visit_concept_id: i64,
    pub visit_start_date: NaiveDate,
    pub visit_start_datetime: NaiveDateTime,
    pub visit_end_date: NaiveDate,
    pub visit_end_datetime: NaiveDateTime,
    pub visit_type_concept_id: i64,
    pub provider_id: i64,
    pub care_site_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOccurrence {
    pub condition_occurrence_id: i64,
    pub person_id: i64,
    pub condition_concept_id: i64,
    pub condition_start_date: NaiveDate,
    pub condition_start_datetime: NaiveDateTime,
    pub condition_end_date: NaiveDate,
    pub condition_end_datetime: NaiveDateTime,
    pub condition_type_concept_id: i64,
    /// `None` only when the run produced no visits
    pub visit_occurrence_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrugExposure {
    pub drug_exposure_id: i64,
    pub person_id: i64,
    pub drug_concept_id: i64,
    pub drug_exposure_start_date: NaiveDate,
    pub drug_exposure_start_datetime: NaiveDateTime,
    pub drug_exposure_end_date: NaiveDate,
    pub drug_exposure_end_datetime: NaiveDateTime,
    pub drug_type_concept_id: i64,
    pub refills: i32,
    pub quantity: f64,
    pub days_supply: i32,
    /// `None` only when the run produced no visits
    pub visit_occurrence_id: Option<i64>,
}

/// All rows produced by one generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdmData {
    pub person: Vec<Person>,
    pub observation_period: Vec<ObservationPeriod>,
    pub visit_occurrence: Vec<VisitOccurrence>,
    pub condition_occurrence: Vec<ConditionOccurrence>,
    pub drug_exposure: Vec<DrugExposure>,
}

impl CdmData {
    /// `(table name, row count)` in load order
    pub fn row_counts(&self) -> [(&'static str, usize); 5] {
        [
            ("person", self.person.len()),
            ("observation_period", self.observation_period.len()),
            ("visit_occurrence", self.visit_occurrence.len()),
            ("condition_occurrence", self.condition_occurrence.len()),
            ("drug_exposure", self.drug_exposure.len()),
        ]
    }

    pub fn total_rows(&self) -> usize {
        self.row_counts().iter().map(|(_, n)| n).sum()
    }
}
