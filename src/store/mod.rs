//! DuckDB-backed store for generated CDM tables.
//!
//! A `CdmStore` owns one DuckDB connection. `generate` hands back a store over
//! a fresh in-memory database; `CdmStore::open` attaches to an existing file.
//!
//! # Example
//!
//! ```ignore
//! use omop_synth::store::{OutputFormat, QueryResultFormatter};
//! use omop_synth::{generate, CdmConfig};
//!
//! let store = generate(&CdmConfig { n_patients: 10, ..Default::default() }).unwrap();
//! let result = store.query("SELECT COUNT(*) FROM person").unwrap();
//! println!("{}", QueryResultFormatter::format(&result, OutputFormat::Table));
//! ```

pub mod ddl;
mod loader;
mod output;

pub use loader::{CdmLoader, CdmRow};
pub use output::{OutputFormat, QueryResultFormatter};

use crate::error::{Error, Result};
use cdm_gen::CdmData;
use duckdb::types::ValueRef;
use duckdb::Connection;
use std::path::Path;

/// Statistics from loading generated rows
#[derive(Debug, Default, Clone)]
pub struct LoadStats {
    /// `(table, rows)` in load order
    pub tables: Vec<(String, usize)>,
    /// Total rows inserted
    pub rows_inserted: u64,
    /// Load duration in seconds
    pub duration_secs: f64,
}

impl LoadStats {
    fn record(&mut self, table: &str, rows: usize) {
        self.tables.push((table.to_string(), rows));
        self.rows_inserted += rows as u64;
    }

    pub fn rows_for(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tables, {} rows loaded in {:.2}s",
            self.tables.len(),
            self.rows_inserted,
            self.duration_secs
        )
    }
}

/// Result of a query execution
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Column types (as strings)
    pub column_types: Vec<String>,
    /// Rows of data, each value rendered as text
    pub rows: Vec<Vec<String>>,
    /// Query execution time in seconds
    pub execution_time_secs: f64,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Handle to a relational store holding CDM tables
pub struct CdmStore {
    conn: Connection,
    load_stats: Option<LoadStats>,
}

impl CdmStore {
    /// Create an empty in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            load_stats: None,
        })
    }

    /// Open an existing DuckDB database file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidArgument(format!(
                "database file does not exist: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            load_stats: None,
        })
    }

    /// Write all generated tables, replacing any tables of the same name
    pub fn load(&mut self, data: &CdmData) -> Result<&LoadStats> {
        let stats = CdmLoader::new(&mut self.conn).load(data)?;
        Ok(self.load_stats.insert(stats))
    }

    /// Statistics from the last `load`, if any
    pub fn load_stats(&self) -> Option<&LoadStats> {
        self.load_stats.as_ref()
    }

    /// Execute a query and return the results
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let start = std::time::Instant::now();

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows_result = stmt.query([])?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut column_count = 0;

        while let Some(row) = rows_result.next()? {
            if column_count == 0 {
                column_count = row.as_ref().column_count();
            }
            let values = (0..column_count)
                .map(|i| match row.get_ref(i) {
                    Ok(value) => render_value(value),
                    Err(_) => "ERROR".to_string(),
                })
                .collect();
            rows.push(values);
        }

        // Column metadata is only available once the result has been consumed
        drop(rows_result);

        let column_count = stmt.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();
        let column_types: Vec<String> = (0..column_count)
            .map(|i| format!("{:?}", stmt.column_type(i)))
            .collect();

        Ok(QueryResult {
            columns,
            column_types,
            rows,
            execution_time_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Execute a statement that returns no rows
    pub fn execute(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Run a query expected to return a single integer
    pub fn query_scalar(&self, sql: &str) -> Result<i64> {
        Ok(self.conn.query_row(sql, [], |row| row.get::<_, i64>(0))?)
    }

    /// Tables in the main schema, sorted by name
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let result = self.query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        Ok(result.rows.into_iter().map(|r| r[0].clone()).collect())
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.list_tables()?.iter().any(|t| t == table))
    }

    /// Column names and types of a table
    pub fn describe_table(&self, table: &str) -> Result<QueryResult> {
        self.query(&format!("DESCRIBE {}", quote_ident(table)))
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        self.query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
    }

    /// Get the underlying DuckDB connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Copy every table into a new DuckDB database file.
    ///
    /// Refuses to touch an existing file.
    pub fn save_to_file(&self, path: &Path) -> Result<usize> {
        if path.exists() {
            return Err(Error::InvalidArgument(format!(
                "output file already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let target = path.display().to_string().replace('\'', "''");
        self.conn
            .execute_batch(&format!("ATTACH '{}' AS export_db", target))?;

        let tables = self.list_tables()?;
        let copied = tables.iter().try_for_each(|table| {
            self.conn.execute_batch(&format!(
                "CREATE TABLE export_db.{0} AS SELECT * FROM main.{0}",
                quote_ident(table)
            ))
        });
        let detached = self.conn.execute_batch("DETACH export_db");
        copied?;
        detached?;

        Ok(tables.len())
    }

    /// Close the connection, surfacing any error DuckDB reports
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| Error::Storage(err))
    }
}

/// Double-quote an identifier for DuckDB
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a DuckDB value as display text
fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Boolean(b) => b.to_string(),
        ValueRef::TinyInt(n) => n.to_string(),
        ValueRef::SmallInt(n) => n.to_string(),
        ValueRef::Int(n) => n.to_string(),
        ValueRef::BigInt(n) => n.to_string(),
        ValueRef::HugeInt(n) => n.to_string(),
        ValueRef::UTinyInt(n) => n.to_string(),
        ValueRef::USmallInt(n) => n.to_string(),
        ValueRef::UInt(n) => n.to_string(),
        ValueRef::UBigInt(n) => n.to_string(),
        ValueRef::Float(f) => f.to_string(),
        ValueRef::Double(f) => f.to_string(),
        ValueRef::Decimal(d) => d.to_string(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).to_string(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
        // TIMESTAMP columns are stored as microseconds since the epoch
        ValueRef::Timestamp(_, micros) => {
            let secs = micros.div_euclid(1_000_000);
            let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
            chrono::DateTime::from_timestamp(secs, nanos)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| micros.to_string())
        }
        // Days since 1970-01-01; 719163 is that date's day number from 0001-01-01
        ValueRef::Date32(days) => chrono::NaiveDate::from_num_days_from_ce_opt(719_163 + days)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| days.to_string()),
        other => format!("{:?}", other),
    }
}
