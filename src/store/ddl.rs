//! Table definitions for the five CDM tables.
//!
//! Column order here is the binding order used by the loader.

/// Column definition
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
}

/// Table definition
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
}

const fn req(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        not_null: true,
    }
}

const fn opt(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        not_null: false,
    }
}

pub const PERSON: TableDef = TableDef {
    name: "person",
    primary_key: "person_id",
    columns: &[
        req("person_id", "BIGINT"),
        req("gender_concept_id", "INTEGER"),
        req("year_of_birth", "INTEGER"),
        opt("month_of_birth", "INTEGER"),
        opt("day_of_birth", "INTEGER"),
        opt("birth_datetime", "TIMESTAMP"),
        req("race_concept_id", "INTEGER"),
        req("ethnicity_concept_id", "INTEGER"),
        opt("location_id", "BIGINT"),
        opt("provider_id", "BIGINT"),
        opt("care_site_id", "BIGINT"),
        opt("person_source_value", "VARCHAR"),
        opt("gender_source_value", "VARCHAR"),
        opt("race_source_value", "VARCHAR"),
        opt("ethnicity_source_value", "VARCHAR"),
    ],
};

pub const OBSERVATION_PERIOD: TableDef = TableDef {
    name: "observation_period",
    primary_key: "observation_period_id",
    columns: &[
        req("observation_period_id", "BIGINT"),
        req("person_id", "BIGINT"),
        req("observation_period_start_date", "DATE"),
        req("observation_period_end_date", "DATE"),
        req("period_type_concept_id", "INTEGER"),
    ],
};

pub const VISIT_OCCURRENCE: TableDef = TableDef {
    name: "visit_occurrence",
    primary_key: "visit_occurrence_id",
    columns: &[
        req("visit_occurrence_id", "BIGINT"),
        req("person_id", "BIGINT"),
        req("visit_concept_id", "INTEGER"),
        req("visit_start_date", "DATE"),
        opt("visit_start_datetime", "TIMESTAMP"),
        req("visit_end_date", "DATE"),
        opt("visit_end_datetime", "TIMESTAMP"),
        req("visit_type_concept_id", "INTEGER"),
        opt("provider_id", "BIGINT"),
        opt("care_site_id", "BIGINT"),
    ],
};

pub const CONDITION_OCCURRENCE: TableDef = TableDef {
    name: "condition_occurrence",
    primary_key: "condition_occurrence_id",
    columns: &[
        req("condition_occurrence_id", "BIGINT"),
        req("person_id", "BIGINT"),
        req("condition_concept_id", "INTEGER"),
        req("condition_start_date", "DATE"),
        opt("condition_start_datetime", "TIMESTAMP"),
        opt("condition_end_date", "DATE"),
        opt("condition_end_datetime", "TIMESTAMP"),
        req("condition_type_concept_id", "INTEGER"),
        opt("visit_occurrence_id", "BIGINT"),
    ],
};

pub const DRUG_EXPOSURE: TableDef = TableDef {
    name: "drug_exposure",
    primary_key: "drug_exposure_id",
    columns: &[
        req("drug_exposure_id", "BIGINT"),
        req("person_id", "BIGINT"),
        req("drug_concept_id", "INTEGER"),
        req("drug_exposure_start_date", "DATE"),
        opt("drug_exposure_start_datetime", "TIMESTAMP"),
        req("drug_exposure_end_date", "DATE"),
        opt("drug_exposure_end_datetime", "TIMESTAMP"),
        req("drug_type_concept_id", "INTEGER"),
        opt("refills", "INTEGER"),
        opt("quantity", "DOUBLE"),
        opt("days_supply", "INTEGER"),
        opt("visit_occurrence_id", "BIGINT"),
    ],
};

/// The CDM tables in load order
pub const CDM_TABLES: [&TableDef; 5] = [
    &PERSON,
    &OBSERVATION_PERIOD,
    &VISIT_OCCURRENCE,
    &CONDITION_OCCURRENCE,
    &DRUG_EXPOSURE,
];

/// Names of the CDM tables in load order
pub fn table_names() -> Vec<&'static str> {
    CDM_TABLES.iter().map(|t| t.name).collect()
}

/// Find a table definition by name (case-insensitive)
pub fn table(name: &str) -> Option<&'static TableDef> {
    CDM_TABLES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

impl TableDef {
    /// `CREATE OR REPLACE TABLE` statement; replaces any previous contents
    pub fn create_sql(&self) -> String {
        let mut sql = format!("CREATE OR REPLACE TABLE \"{}\" (\n", self.name);
        for col in self.columns {
            sql.push_str(&format!("    \"{}\" {}", col.name, col.sql_type));
            if col.not_null {
                sql.push_str(" NOT NULL");
            }
            sql.push_str(",\n");
        }
        sql.push_str(&format!("    PRIMARY KEY (\"{}\")\n)", self.primary_key));
        sql
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}
