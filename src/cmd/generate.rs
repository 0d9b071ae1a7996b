use crate::progress;
use anyhow::Context;
use omop_synth::CdmConfig;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// JSON output for the generate command
#[derive(Serialize, JsonSchema)]
pub(crate) struct GenerateJsonOutput {
    n_patients: i64,
    seed: i64,
    start_year: i32,
    end_year: i32,
    visit_linkage: String,
    tables: Vec<GeneratedTable>,
    total_rows: u64,
    /// DuckDB file the tables were saved to
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    elapsed_secs: f64,
}

#[derive(Serialize, JsonSchema)]
pub(crate) struct GeneratedTable {
    table: String,
    rows: usize,
}

pub fn run(
    config: CdmConfig,
    output: Option<PathBuf>,
    force: bool,
    show_progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(path) = &output {
        check_output(path, force)?;
    }

    let start_time = Instant::now();
    let pb = progress::spinner(
        show_progress && !json,
        &format!("Generating {} patients", config.n_patients),
    );

    let store = omop_synth::generate(&config)?;
    let stats = store.load_stats().cloned().unwrap_or_default();

    let staged = match &output {
        Some(path) => {
            pb.set_message(format!("Saving {}", path.display()));
            let staged = staging_path(path);
            remove_db_file(&staged)?;
            if let Err(err) = store.save_to_file(&staged) {
                let _ = remove_db_file(&staged);
                return Err(err)
                    .with_context(|| format!("Failed to save database: {}", path.display()));
            }
            Some(staged)
        }
        None => None,
    };
    store.close()?;

    if let (Some(staged), Some(path)) = (&staged, &output) {
        replace_output(staged, path)?;
    }
    pb.finish_and_clear();

    let elapsed = start_time.elapsed();

    if json {
        let out = GenerateJsonOutput {
            n_patients: config.n_patients,
            seed: config.seed,
            start_year: config.start_year,
            end_year: config.end_year,
            visit_linkage: config.visit_linkage.to_string(),
            tables: stats
                .tables
                .iter()
                .map(|(table, rows)| GeneratedTable {
                    table: table.clone(),
                    rows: *rows,
                })
                .collect(),
            total_rows: stats.rows_inserted,
            output: output.as_ref().map(|p| p.display().to_string()),
            elapsed_secs: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "✓ Generated synthetic CDM in {:.3?} ({} patients, seed {}, visit linkage: {})\n",
        elapsed, config.n_patients, config.seed, config.visit_linkage
    );
    println!("{:<28} {:>12}", "Table", "Rows");
    println!("{}", "─".repeat(41));
    for (table, rows) in &stats.tables {
        println!("{:<28} {:>12}", table, rows);
    }
    println!("{}", "─".repeat(41));
    println!("{:<28} {:>12}", "TOTAL", stats.rows_inserted);
    println!();

    match &output {
        Some(path) => println!("Saved to {}", path.display()),
        None => println!("Database was in-memory only; pass -o FILE to keep it."),
    }

    Ok(())
}

/// Refuse to clobber an existing file unless `--force` was given.
/// Nothing is removed here; the old file is only replaced once the new
/// database has been written in full.
fn check_output(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "output file already exists: {} (use --force to replace it)",
            path.display()
        );
    }
    Ok(())
}

/// Hidden sibling the database is written to before it replaces `path`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cdm.duckdb".to_string());
    path.with_file_name(format!(".{}.partial", name))
}

/// DuckDB keeps a write-ahead log next to the database
fn wal_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.wal", path.display()))
}

/// Remove a database file and its write-ahead log, if present
fn remove_db_file(path: &Path) -> anyhow::Result<()> {
    for file in [path.to_path_buf(), wal_path(path)] {
        if file.exists() {
            std::fs::remove_file(&file)
                .with_context(|| format!("Failed to remove file: {}", file.display()))?;
        }
    }
    Ok(())
}

/// Move a fully written staging file over the output path
fn replace_output(staged: &Path, path: &Path) -> anyhow::Result<()> {
    let wal = wal_path(path);
    if wal.exists() {
        std::fs::remove_file(&wal)
            .with_context(|| format!("Failed to remove file: {}", wal.display()))?;
    }
    std::fs::rename(staged, path)
        .with_context(|| format!("Failed to replace output file: {}", path.display()))?;
    let staged_wal = wal_path(staged);
    if staged_wal.exists() {
        std::fs::rename(&staged_wal, &wal)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_output_requires_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdm.duckdb");
        std::fs::write(&path, b"x").unwrap();

        let err = check_output(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        check_output(&path, true).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }

    #[test]
    fn test_check_output_missing_file_is_fine() {
        let dir = TempDir::new().unwrap();
        check_output(&dir.path().join("new.duckdb"), false).unwrap();
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        let staged = staging_path(Path::new("/data/out/cdm.duckdb"));
        assert_eq!(staged, PathBuf::from("/data/out/.cdm.duckdb.partial"));
    }

    #[test]
    fn test_replace_output_swaps_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdm.duckdb");
        let staged = staging_path(&path);
        std::fs::write(&path, b"old").unwrap();
        std::fs::write(wal_path(&path), b"stale log").unwrap();
        std::fs::write(&staged, b"new").unwrap();

        replace_output(&staged, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(!staged.exists());
        assert!(!wal_path(&path).exists());
    }

    #[test]
    fn test_invalid_config_keeps_existing_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdm.duckdb");
        std::fs::write(&path, b"keep me").unwrap();

        let config = CdmConfig {
            n_patients: 0,
            verbose: false,
            ..Default::default()
        };
        let err = run(config, Some(path.clone()), true, false, true).unwrap_err();
        assert!(err.to_string().contains("n_patients"));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
        assert!(!staging_path(&path).exists());
    }
}
