//! Writes generated rows into DuckDB.
//!
//! Each table is created with `CREATE OR REPLACE TABLE` and filled through
//! DuckDB's Appender inside its own transaction. There is no transaction spanning tables: if a later table
//! fails, earlier ones stay written and the store should be discarded.

use super::ddl::{self, TableDef};
use super::LoadStats;
use crate::error::Result;
use cdm_gen::{
    CdmData, ConditionOccurrence, DrugExposure, ObservationPeriod, Person, VisitOccurrence,
};
use duckdb::{params, Appender, Connection};
use std::time::Instant;
use tracing::debug;

/// A record type that maps onto one CDM table
pub trait CdmRow {
    fn table() -> &'static TableDef;

    /// Append this row in the table's column order
    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()>;
}

impl CdmRow for Person {
    fn table() -> &'static TableDef {
        &ddl::PERSON
    }

    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()> {
        appender.append_row(params![
            self.person_id,
            self.gender_concept_id,
            self.year_of_birth,
            self.month_of_birth,
            self.day_of_birth,
            self.birth_datetime,
            self.race_concept_id,
            self.ethnicity_concept_id,
            self.location_id,
            self.provider_id,
            self.care_site_id,
            self.person_source_value,
            self.gender_source_value,
            self.race_source_value,
            self.ethnicity_source_value,
        ])
    }
}

impl CdmRow for ObservationPeriod {
    fn table() -> &'static TableDef {
        &ddl::OBSERVATION_PERIOD
    }

    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()> {
        appender.append_row(params![
            self.observation_period_id,
            self.person_id,
            self.observation_period_start_date,
            self.observation_period_end_date,
            self.period_type_concept_id,
        ])
    }
}

impl CdmRow for VisitOccurrence {
    fn table() -> &'static TableDef {
        &ddl::VISIT_OCCURRENCE
    }

    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()> {
        appender.append_row(params![
            self.visit_occurrence_id,
            self.person_id,
            self.visit_concept_id,
            self.visit_start_date,
            self.visit_start_datetime,
            self.visit_end_date,
            self.visit_end_datetime,
            self.visit_type_concept_id,
            self.provider_id,
            self.care_site_id,
        ])
    }
}

impl CdmRow for ConditionOccurrence {
    fn table() -> &'static TableDef {
        &ddl::CONDITION_OCCURRENCE
    }

    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()> {
        appender.append_row(params![
            self.condition_occurrence_id,
            self.person_id,
            self.condition_concept_id,
            self.condition_start_date,
            self.condition_start_datetime,
            self.condition_end_date,
            self.condition_end_datetime,
            self.condition_type_concept_id,
            self.visit_occurrence_id,
        ])
    }
}

impl CdmRow for DrugExposure {
    fn table() -> &'static TableDef {
        &ddl::DRUG_EXPOSURE
    }

    fn append(&self, appender: &mut Appender<'_>) -> duckdb::Result<()> {
        appender.append_row(params![
            self.drug_exposure_id,
            self.person_id,
            self.drug_concept_id,
            self.drug_exposure_start_date,
            self.drug_exposure_start_datetime,
            self.drug_exposure_end_date,
            self.drug_exposure_end_datetime,
            self.drug_type_concept_id,
            self.refills,
            self.quantity,
            self.days_supply,
            self.visit_occurrence_id,
        ])
    }
}

/// Loads a `CdmData` into a connection
pub struct CdmLoader<'a> {
    conn: &'a mut Connection,
}

impl<'a> CdmLoader<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Write all five tables in load order
    pub fn load(&mut self, data: &CdmData) -> Result<LoadStats> {
        let start = Instant::now();
        let mut stats = LoadStats::default();

        stats.record(Person::table().name, self.write_table(&data.person)?);
        stats.record(
            ObservationPeriod::table().name,
            self.write_table(&data.observation_period)?,
        );
        stats.record(
            VisitOccurrence::table().name,
            self.write_table(&data.visit_occurrence)?,
        );
        stats.record(
            ConditionOccurrence::table().name,
            self.write_table(&data.condition_occurrence)?,
        );
        stats.record(
            DrugExposure::table().name,
            self.write_table(&data.drug_exposure)?,
        );

        stats.duration_secs = start.elapsed().as_secs_f64();
        Ok(stats)
    }

    /// Replace one table with `rows`, returning the number written
    pub fn write_table<R: CdmRow>(&mut self, rows: &[R]) -> Result<usize> {
        let table = R::table();
        self.conn.execute_batch(&table.create_sql())?;

        let tx = self.conn.transaction()?;
        {
            let mut appender = tx.appender(table.name)?;
            for row in rows {
                row.append(&mut appender)?;
            }
            appender.flush()?;
        }
        tx.commit()?;

        debug!(table = table.name, rows = rows.len(), "table written");
        Ok(rows.len())
    }
}
