//! Data generator that produces rows for the five CDM tables.
//!
//! One `Generator` owns one seeded RNG and produces exactly one `CdmData`.
//! Tables are drawn strictly in load order (person, observation_period,
//! visit_occurrence, condition_occurrence, drug_exposure) so the same seed and
//! parameters always reproduce the same rows.

use crate::concepts;
use crate::config::{CdmConfig, ConfigError, VisitLinkage};
use crate::records::{
    CdmData, ConditionOccurrence, DrugExposure, ObservationPeriod, Person, VisitOccurrence,
};
use crate::sampler::Sampler;
use chrono::{NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Upper bounds of the id pools shared by person and visit rows
pub const LOCATION_POOL: i64 = 100;
pub const PROVIDER_POOL: i64 = 50;
pub const CARE_SITE_POOL: i64 = 20;

/// Maximum days an observation period starts after its epoch
pub const OBSERVATION_START_SPREAD_DAYS: u64 = 365;

pub fn observation_epoch() -> NaiveDate {
    ymd(2000, 1, 1)
}

pub fn observation_end() -> NaiveDate {
    ymd(2099, 12, 31)
}

/// First day of the 13-year event window
pub fn event_epoch() -> NaiveDate {
    ymd(2010, 1, 1)
}

/// Last day of the 13-year event window
pub fn event_window_end() -> NaiveDate {
    ymd(2022, 12, 31)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Start and end of a clinical event. The two dates are drawn independently,
/// so `end` may precede `start`.
struct EventDates {
    start: NaiveDate,
    end: NaiveDate,
}

/// Main data generator
pub struct Generator {
    config: CdmConfig,
    sampler: Sampler<ChaCha8Rng>,
    event_window_days: u64,
}

impl Generator {
    /// Validate `config` and seed the RNG. Nothing is drawn until `generate`.
    pub fn new(config: &CdmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let event_window_days = (event_window_end() - event_epoch()).num_days().max(0) as u64;
        Ok(Self {
            config: config.clone(),
            sampler: Sampler::new(ChaCha8Rng::seed_from_u64(config.seed as u64)),
            event_window_days,
        })
    }

    /// Generate all five tables, consuming the generator
    pub fn generate(mut self) -> CdmData {
        let n_patients = self.config.n_patients as usize;

        let person = self.generate_person(n_patients);
        self.report("person", person.len());

        let observation_period = self.generate_observation_period(&person);
        self.report("observation_period", observation_period.len());

        let visit_occurrence = self.generate_visit_occurrence(n_patients);
        self.report("visit_occurrence", visit_occurrence.len());

        let condition_occurrence = self.generate_condition_occurrence(n_patients, &visit_occurrence);
        self.report("condition_occurrence", condition_occurrence.len());

        let drug_exposure = self.generate_drug_exposure(n_patients, &visit_occurrence);
        self.report("drug_exposure", drug_exposure.len());

        CdmData {
            person,
            observation_period,
            visit_occurrence,
            condition_occurrence,
            drug_exposure,
        }
    }

    fn report(&self, table: &str, rows: usize) {
        if self.config.verbose {
            info!(table, rows, "generated table");
        }
    }

    fn generate_person(&mut self, n_patients: usize) -> Vec<Person> {
        (1..=n_patients as i64)
            .map(|person_id| {
                let gender = self.sampler.pick(concepts::GENDERS);
                let (year, month, day) = self
                    .sampler
                    .birth_date_parts(self.config.start_year, self.config.end_year);
                let race = self.sampler.pick(concepts::RACES);
                let ethnicity = self.sampler.pick(concepts::ETHNICITIES);
                let location_id = self.sampler.int_range(1, LOCATION_POOL);
                let provider_id = self.sampler.int_range(1, PROVIDER_POOL);
                let care_site_id = self.sampler.int_range(1, CARE_SITE_POOL);

                Person {
                    person_id,
                    gender_concept_id: gender,
                    year_of_birth: year,
                    month_of_birth: month,
                    day_of_birth: day,
                    birth_datetime: midnight(ymd(year, month, day)),
                    race_concept_id: race,
                    ethnicity_concept_id: ethnicity,
                    location_id,
                    provider_id,
                    care_site_id,
                    person_source_value: format!("{:06}", person_id),
                    gender_source_value: concepts::gender_source_value(gender).to_string(),
                    race_source_value: race.to_string(),
                    ethnicity_source_value: ethnicity.to_string(),
                }
            })
            .collect()
    }

    fn generate_observation_period(&mut self, person: &[Person]) -> Vec<ObservationPeriod> {
        person
            .iter()
            .map(|p| ObservationPeriod {
                observation_period_id: p.person_id,
                person_id: p.person_id,
                observation_period_start_date: self
                    .sampler
                    .date_after(observation_epoch(), OBSERVATION_START_SPREAD_DAYS),
                observation_period_end_date: observation_end(),
                period_type_concept_id: concepts::OBSERVATION_PERIOD_TYPE,
            })
            .collect()
    }

    fn generate_visit_occurrence(&mut self, n_patients: usize) -> Vec<VisitOccurrence> {
        let count = self.config.visit_count();
        (1..=count as i64)
            .map(|visit_occurrence_id| {
                let person_id = self.sampler.id(n_patients);
                let visit_concept_id = self.sampler.pick(concepts::VISITS);
                let dates = self.event_dates();
                let provider_id = self.sampler.int_range(1, PROVIDER_POOL);
                let care_site_id = self.sampler.int_range(1, CARE_SITE_POOL);

                VisitOccurrence {
                    visit_occurrence_id,
                    person_id,
                    visit_concept_id,
                    visit_start_date: dates.start,
                    visit_start_datetime: midnight(dates.start),
                    visit_end_date: dates.end,
                    visit_end_datetime: midnight(dates.end),
                    visit_type_concept_id: concepts::VISIT_TYPE,
                    provider_id,
                    care_site_id,
                }
            })
            .collect()
    }

    fn generate_condition_occurrence(
        &mut self,
        n_patients: usize,
        visits: &[VisitOccurrence],
    ) -> Vec<ConditionOccurrence> {
        let count = self.config.condition_count();
        (1..=count as i64)
            .map(|condition_occurrence_id| {
                let (person_id, visit_occurrence_id) = self.event_owner(n_patients, visits);
                let condition_concept_id = self.sampler.pick(concepts::CONDITIONS);
                let dates = self.event_dates();

                ConditionOccurrence {
                    condition_occurrence_id,
                    person_id,
                    condition_concept_id,
                    condition_start_date: dates.start,
                    condition_start_datetime: midnight(dates.start),
                    condition_end_date: dates.end,
                    condition_end_datetime: midnight(dates.end),
                    condition_type_concept_id: concepts::CONDITION_TYPE,
                    visit_occurrence_id,
                }
            })
            .collect()
    }

    fn generate_drug_exposure(
        &mut self,
        n_patients: usize,
        visits: &[VisitOccurrence],
    ) -> Vec<DrugExposure> {
        let count = self.config.drug_count();
        (1..=count as i64)
            .map(|drug_exposure_id| {
                let (person_id, visit_occurrence_id) = self.event_owner(n_patients, visits);
                let drug_concept_id = self.sampler.pick(concepts::DRUGS);
                let dates = self.event_dates();
                let refills = self.sampler.int_range(0, 5) as i32;
                let quantity = self.sampler.int_range(30, 90) as f64;
                let days_supply = self.sampler.int_range(30, 90) as i32;

                DrugExposure {
                    drug_exposure_id,
                    person_id,
                    drug_concept_id,
                    drug_exposure_start_date: dates.start,
                    drug_exposure_start_datetime: midnight(dates.start),
                    drug_exposure_end_date: dates.end,
                    drug_exposure_end_datetime: midnight(dates.end),
                    drug_type_concept_id: concepts::DRUG_TYPE,
                    refills,
                    quantity,
                    days_supply,
                    visit_occurrence_id,
                }
            })
            .collect()
    }

    /// Person and visit for a condition or drug row.
    ///
    /// With independent linkage the person is drawn before the visit and the
    /// two are unrelated. With same-person linkage only the visit is drawn and
    /// the person comes from it.
    fn event_owner(&mut self, n_patients: usize, visits: &[VisitOccurrence]) -> (i64, Option<i64>) {
        match self.config.visit_linkage {
            VisitLinkage::SamePerson if !visits.is_empty() => {
                let visit = &visits[self.sampler.id(visits.len()) as usize - 1];
                (visit.person_id, Some(visit.visit_occurrence_id))
            }
            _ => {
                let person_id = self.sampler.id(n_patients);
                let visit_id = if visits.is_empty() {
                    None
                } else {
                    Some(self.sampler.id(visits.len()))
                };
                (person_id, visit_id)
            }
        }
    }

    fn event_dates(&mut self) -> EventDates {
        let start = self.sampler.date_after(event_epoch(), self.event_window_days);
        let end = self.sampler.date_after(event_epoch(), self.event_window_days);
        EventDates { start, end }
    }
}

/// Validate `config` and generate one dataset
pub fn generate(config: &CdmConfig) -> Result<CdmData, ConfigError> {
    Ok(Generator::new(config)?.generate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(n_patients: i64) -> CdmConfig {
        CdmConfig {
            n_patients,
            verbose: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_generator_deterministic() {
        let data1 = generate(&config(50)).unwrap();
        let data2 = generate(&config(50)).unwrap();
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_different_seeds_differ() {
        let data1 = generate(&config(50)).unwrap();
        let data2 = generate(&CdmConfig {
            seed: 124,
            ..config(50)
        })
        .unwrap();
        assert_ne!(data1.person, data2.person);
    }

    #[test]
    fn test_negative_seed_is_deterministic() {
        let negative = CdmConfig {
            seed: -1,
            ..config(30)
        };
        let data1 = generate(&negative).unwrap();
        let data2 = generate(&negative).unwrap();
        assert_eq!(data1, data2);
        assert_ne!(data1.person, generate(&config(30)).unwrap().person);
    }

    #[test]
    fn test_person_ids_dense() {
        let data = generate(&config(25)).unwrap();
        let ids: Vec<i64> = data.person.iter().map(|p| p.person_id).collect();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
        assert_eq!(data.person[0].person_source_value, "000001");
    }

    #[test]
    fn test_observation_period_one_per_person() {
        let data = generate(&config(40)).unwrap();
        assert_eq!(data.observation_period.len(), 40);
        let persons: HashSet<i64> = data.observation_period.iter().map(|o| o.person_id).collect();
        assert_eq!(persons.len(), 40);
        for op in &data.observation_period {
            assert!(op.observation_period_start_date >= observation_epoch());
            assert!(op.observation_period_start_date <= ymd(2000, 12, 31));
            assert_eq!(op.observation_period_end_date, observation_end());
            assert_eq!(op.period_type_concept_id, concepts::OBSERVATION_PERIOD_TYPE);
        }
    }

    #[test]
    fn test_row_counts() {
        for n in [1, 10, 100, 1000] {
            let data = generate(&config(n)).unwrap();
            assert_eq!(data.person.len(), n as usize);
            assert_eq!(data.visit_occurrence.len(), 3 * n as usize);
            assert_eq!(data.condition_occurrence.len(), 2 * n as usize);
            assert_eq!(data.drug_exposure.len(), 4 * n as usize);
        }
    }

    #[test]
    fn test_fractional_averages_round() {
        let data = generate(&CdmConfig {
            avg_visits_per_patient: 1.25,
            avg_conditions_per_patient: 0.5,
            avg_drugs_per_patient: 0.0,
            ..config(10)
        })
        .unwrap();
        assert_eq!(data.visit_occurrence.len(), 12); // 12.5 -> 12
        assert_eq!(data.condition_occurrence.len(), 5);
        assert!(data.drug_exposure.is_empty());
    }

    #[test]
    fn test_child_person_ids_in_range() {
        let data = generate(&config(30)).unwrap();
        let in_range = |id: i64| (1..=30).contains(&id);
        assert!(data.visit_occurrence.iter().all(|v| in_range(v.person_id)));
        assert!(data.condition_occurrence.iter().all(|c| in_range(c.person_id)));
        assert!(data.drug_exposure.iter().all(|d| in_range(d.person_id)));

        let visits = data.visit_occurrence.len() as i64;
        for c in &data.condition_occurrence {
            let visit = c.visit_occurrence_id.unwrap();
            assert!((1..=visits).contains(&visit));
        }
    }

    #[test]
    fn test_value_domains() {
        let data = generate(&CdmConfig {
            start_year: 1950,
            end_year: 1960,
            ..config(200)
        })
        .unwrap();

        for p in &data.person {
            assert!(concepts::GENDERS.contains(&p.gender_concept_id));
            assert!(concepts::RACES.contains(&p.race_concept_id));
            assert!(concepts::ETHNICITIES.contains(&p.ethnicity_concept_id));
            assert!((1950..=1960).contains(&p.year_of_birth));
            assert!((1..=12).contains(&p.month_of_birth));
            assert!((1..=28).contains(&p.day_of_birth));
            assert_eq!(p.birth_datetime.date(), ymd(p.year_of_birth, p.month_of_birth, p.day_of_birth));
            assert!((1..=LOCATION_POOL).contains(&p.location_id));
            assert!((1..=PROVIDER_POOL).contains(&p.provider_id));
            assert!((1..=CARE_SITE_POOL).contains(&p.care_site_id));
        }

        for v in &data.visit_occurrence {
            assert!(concepts::VISITS.contains(&v.visit_concept_id));
            for date in [v.visit_start_date, v.visit_end_date] {
                assert!(date >= event_epoch() && date <= event_window_end());
            }
        }

        for d in &data.drug_exposure {
            assert!(concepts::DRUGS.contains(&d.drug_concept_id));
            assert!((0..=5).contains(&d.refills));
            assert!((30.0..=90.0).contains(&d.quantity));
            assert!((30..=90).contains(&d.days_supply));
        }
    }

    #[test]
    fn test_both_genders_drawn() {
        let data = generate(&config(100)).unwrap();
        let genders: HashSet<i64> = data.person.iter().map(|p| p.gender_concept_id).collect();
        assert_eq!(genders.len(), 2);
    }

    #[test]
    fn test_end_may_precede_start() {
        let data = generate(&config(200)).unwrap();
        assert!(data
            .visit_occurrence
            .iter()
            .any(|v| v.visit_end_date < v.visit_start_date));
    }

    #[test]
    fn test_same_person_linkage() {
        let data = generate(&CdmConfig {
            visit_linkage: VisitLinkage::SamePerson,
            ..config(50)
        })
        .unwrap();

        let owner = |visit_id: i64| data.visit_occurrence[visit_id as usize - 1].person_id;
        for c in &data.condition_occurrence {
            assert_eq!(owner(c.visit_occurrence_id.unwrap()), c.person_id);
        }
        for d in &data.drug_exposure {
            assert_eq!(owner(d.visit_occurrence_id.unwrap()), d.person_id);
        }
    }

    #[test]
    fn test_no_visits_leaves_visit_id_empty() {
        let data = generate(&CdmConfig {
            avg_visits_per_patient: 0.0,
            visit_linkage: VisitLinkage::SamePerson,
            ..config(10)
        })
        .unwrap();
        assert!(data.visit_occurrence.is_empty());
        assert_eq!(data.condition_occurrence.len(), 20);
        assert!(data
            .condition_occurrence
            .iter()
            .all(|c| c.visit_occurrence_id.is_none() && (1..=10).contains(&c.person_id)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Generator::new(&config(0)).is_err());
        assert!(generate(&CdmConfig {
            start_year: 2000,
            end_year: 1990,
            ..config(10)
        })
        .is_err());
    }
}
