//! Descriptive statistics over the CDM tables of a store.
//!
//! Everything here is plain SQL against the five tables, so it works the same
//! for a freshly generated store and for a DuckDB file produced elsewhere.

use crate::error::{Error, Result};
use crate::store::{ddl, quote_ident, CdmStore};
use cdm_gen::concept_name;
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;

/// Tables carrying clinical events with a concept and a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventTable {
    Visit,
    Condition,
    Drug,
}

impl EventTable {
    pub const ALL: [EventTable; 3] = [EventTable::Visit, EventTable::Condition, EventTable::Drug];

    pub fn table_name(self) -> &'static str {
        match self {
            EventTable::Visit => "visit_occurrence",
            EventTable::Condition => "condition_occurrence",
            EventTable::Drug => "drug_exposure",
        }
    }

    fn concept_column(self) -> &'static str {
        match self {
            EventTable::Visit => "visit_concept_id",
            EventTable::Condition => "condition_concept_id",
            EventTable::Drug => "drug_concept_id",
        }
    }

    fn date_columns(self) -> (&'static str, &'static str) {
        match self {
            EventTable::Visit => ("visit_start_date", "visit_end_date"),
            EventTable::Condition => ("condition_start_date", "condition_end_date"),
            EventTable::Drug => ("drug_exposure_start_date", "drug_exposure_end_date"),
        }
    }
}

impl fmt::Display for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl std::str::FromStr for EventTable {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visit" | "visit_occurrence" => Ok(EventTable::Visit),
            "condition" | "condition_occurrence" => Ok(EventTable::Condition),
            "drug" | "drug_exposure" => Ok(EventTable::Drug),
            _ => Err(format!(
                "Unknown event table: {}. Valid: visit, condition, drug",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ConceptCount {
    pub concept_id: i64,
    /// Label from the built-in lookup, when the id is one it knows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_name: Option<String>,
    pub count: i64,
}

impl ConceptCount {
    fn new(concept_id: i64, count: i64) -> Self {
        Self {
            concept_id,
            concept_name: concept_name(concept_id).map(str::to_string),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct HistogramBin {
    /// First year in the bin, inclusive
    pub start: i64,
    /// Last year in the bin, inclusive
    pub end: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Histogram {
    pub bin_width: u32,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn total(&self) -> i64 {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Events per person, over persons with at least one event
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct EventsPerPerson {
    pub table: EventTable,
    pub persons_with_events: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

/// Referential checks across the CDM tables.
///
/// With independent visit linkage, `visit_person_mismatches` is expected to be
/// non-zero; every other count should be zero for generated data.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct IntegrityReport {
    /// Rows whose person_id has no person row
    pub orphan_person_rows: Vec<TableCount>,
    pub persons_without_observation_period: i64,
    /// Condition/drug rows whose visit belongs to another person
    pub visit_person_mismatches: Vec<TableCount>,
    /// Condition/drug rows pointing at a visit that does not exist
    pub dangling_visit_references: Vec<TableCount>,
    /// Events whose end date precedes the start date
    pub end_before_start: Vec<TableCount>,
}

impl IntegrityReport {
    /// True when every person_id resolves and every person has a period
    pub fn person_links_ok(&self) -> bool {
        self.persons_without_observation_period == 0
            && self.orphan_person_rows.iter().all(|t| t.rows == 0)
            && self.dangling_visit_references.iter().all(|t| t.rows == 0)
    }

    pub fn total_visit_person_mismatches(&self) -> i64 {
        self.visit_person_mismatches.iter().map(|t| t.rows).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CdmSummary {
    pub tables: Vec<TableCount>,
    pub total_rows: i64,
    pub gender: Vec<ConceptCount>,
    pub year_of_birth: Histogram,
    pub top_visits: Vec<ConceptCount>,
    pub top_conditions: Vec<ConceptCount>,
    pub top_drugs: Vec<ConceptCount>,
    pub events_per_person: Vec<EventsPerPerson>,
    pub integrity: IntegrityReport,
}

/// Fail with a readable message if the store lacks any CDM table
pub fn require_cdm_tables(store: &CdmStore) -> Result<()> {
    let present = store.list_tables()?;
    let missing: Vec<&str> = ddl::table_names()
        .into_iter()
        .filter(|name| !present.iter().any(|t| t == name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "not a CDM database, missing tables: {}",
            missing.join(", ")
        )))
    }
}

pub fn table_counts(store: &CdmStore) -> Result<Vec<TableCount>> {
    ddl::table_names()
        .into_iter()
        .map(|table| {
            Ok(TableCount {
                table: table.to_string(),
                rows: store.row_count(table)?,
            })
        })
        .collect()
}

pub fn gender_distribution(store: &CdmStore) -> Result<Vec<ConceptCount>> {
    concept_counts(
        store,
        "SELECT CAST(gender_concept_id AS BIGINT), COUNT(*) FROM person \
         GROUP BY 1 ORDER BY 1",
    )
}

/// Persons per birth-year bin; bins are aligned to multiples of `bin_width`
pub fn year_of_birth_histogram(store: &CdmStore, bin_width: u32) -> Result<Histogram> {
    if bin_width == 0 {
        return Err(Error::InvalidArgument(
            "bin_width must be at least 1".to_string(),
        ));
    }
    let width = i64::from(bin_width);
    let sql = format!(
        "SELECT CAST(floor(year_of_birth / {w}) AS BIGINT) * {w} AS bin_start, COUNT(*) \
         FROM person GROUP BY 1 ORDER BY 1",
        w = width
    );
    let mut stmt = store.connection().prepare(&sql)?;
    let bins = stmt
        .query_map([], |row| {
            let start: i64 = row.get(0)?;
            Ok(HistogramBin {
                start,
                end: start + width - 1,
                count: row.get(1)?,
            })
        })?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(Histogram { bin_width, bins })
}

/// Most frequent concepts in an event table, ties broken by concept id
pub fn top_concepts(store: &CdmStore, table: EventTable, limit: usize) -> Result<Vec<ConceptCount>> {
    let sql = format!(
        "SELECT CAST({col} AS BIGINT), COUNT(*) AS n FROM {table} \
         GROUP BY 1 ORDER BY n DESC, 1 LIMIT {limit}",
        col = table.concept_column(),
        table = quote_ident(table.table_name()),
        limit = limit
    );
    concept_counts(store, &sql)
}

pub fn events_per_person(store: &CdmStore, table: EventTable) -> Result<EventsPerPerson> {
    let sql = format!(
        "SELECT COUNT(*), MIN(n), AVG(n), MAX(n) FROM \
         (SELECT person_id, COUNT(*) AS n FROM {} GROUP BY person_id)",
        quote_ident(table.table_name())
    );
    let (persons_with_events, min, mean, max) = store.connection().query_row(&sql, [], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<i64>>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<i64>>(3)?,
        ))
    })?;
    Ok(EventsPerPerson {
        table,
        persons_with_events,
        min,
        mean,
        max,
    })
}

pub fn integrity_report(store: &CdmStore) -> Result<IntegrityReport> {
    let child_tables = ddl::table_names().into_iter().filter(|t| *t != "person");
    let orphan_person_rows = child_tables
        .map(|table| {
            count_where(
                store,
                table,
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE person_id NOT IN (SELECT person_id FROM person)",
                    quote_ident(table)
                ),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let persons_without_observation_period = store.query_scalar(
        "SELECT COUNT(*) FROM person p WHERE NOT EXISTS \
         (SELECT 1 FROM observation_period o WHERE o.person_id = p.person_id)",
    )?;

    let visit_linked = [EventTable::Condition, EventTable::Drug];
    let visit_person_mismatches = visit_linked
        .iter()
        .map(|t| {
            let table = t.table_name();
            count_where(
                store,
                table,
                &format!(
                    "SELECT COUNT(*) FROM {} e JOIN visit_occurrence v \
                     ON e.visit_occurrence_id = v.visit_occurrence_id \
                     WHERE e.person_id <> v.person_id",
                    quote_ident(table)
                ),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let dangling_visit_references = visit_linked
        .iter()
        .map(|t| {
            let table = t.table_name();
            count_where(
                store,
                table,
                &format!(
                    "SELECT COUNT(*) FROM {} e WHERE e.visit_occurrence_id IS NOT NULL \
                     AND NOT EXISTS (SELECT 1 FROM visit_occurrence v \
                     WHERE v.visit_occurrence_id = e.visit_occurrence_id)",
                    quote_ident(table)
                ),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let end_before_start = EventTable::ALL
        .iter()
        .map(|t| {
            let (start, end) = t.date_columns();
            count_where(
                store,
                t.table_name(),
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} < {}",
                    quote_ident(t.table_name()),
                    end,
                    start
                ),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(IntegrityReport {
        orphan_person_rows,
        persons_without_observation_period,
        visit_person_mismatches,
        dangling_visit_references,
        end_before_start,
    })
}

/// Everything above in one serializable value
pub fn summarize(store: &CdmStore, top: usize, bin_width: u32) -> Result<CdmSummary> {
    require_cdm_tables(store)?;

    let tables = table_counts(store)?;
    let total_rows = tables.iter().map(|t| t.rows).sum();
    let events_per_person = EventTable::ALL
        .iter()
        .map(|t| events_per_person(store, *t))
        .collect::<Result<Vec<_>>>()?;

    Ok(CdmSummary {
        tables,
        total_rows,
        gender: gender_distribution(store)?,
        year_of_birth: year_of_birth_histogram(store, bin_width)?,
        top_visits: top_concepts(store, EventTable::Visit, top)?,
        top_conditions: top_concepts(store, EventTable::Condition, top)?,
        top_drugs: top_concepts(store, EventTable::Drug, top)?,
        events_per_person,
        integrity: integrity_report(store)?,
    })
}

fn concept_counts(store: &CdmStore, sql: &str) -> Result<Vec<ConceptCount>> {
    let mut stmt = store.connection().prepare(sql)?;
    let counts = stmt
        .query_map([], |row| Ok(ConceptCount::new(row.get(0)?, row.get(1)?)))?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(counts)
}

fn count_where(store: &CdmStore, table: &str, sql: &str) -> Result<TableCount> {
    Ok(TableCount {
        table: table.to_string(),
        rows: store.query_scalar(sql)?,
    })
}
