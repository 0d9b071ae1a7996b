//! Query command for running SQL against a CDM in DuckDB.

use super::{resolve_source, GenerationArgs};
use anyhow::{Context, Result};
use clap::Args;
use omop_synth::store::{quote_ident, OutputFormat, QueryResultFormatter};
use omop_synth::CdmStore;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Query a synthetic CDM with DuckDB SQL
#[derive(Args, Debug)]
#[command(after_help = "Examples:
  omop-synth query \"SELECT gender_concept_id, COUNT(*) FROM person GROUP BY 1\"
  omop-synth query -n 100 --seed 7 \"SELECT * FROM drug_exposure LIMIT 5\" -f json
  omop-synth query --db cdm.duckdb \"SELECT * FROM visit_occurrence\" -o visits.csv
  omop-synth query --db cdm.duckdb --interactive")]
pub struct QueryArgs {
    /// SQL query to execute (omit for --interactive mode)
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Query a saved DuckDB file instead of generating
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(flatten)]
    pub gen: GenerationArgs,

    /// Output format: table, json, jsonl, csv, tsv
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Write output to file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Start interactive query session (REPL)
    #[arg(short, long)]
    pub interactive: bool,

    /// Show query execution time
    #[arg(long)]
    pub timing: bool,
}

/// Run the query command
pub fn run(args: QueryArgs, quiet: bool) -> Result<()> {
    if !args.interactive && args.query.is_none() {
        anyhow::bail!("Query is required (or use --interactive mode)");
    }

    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let source = resolve_source(args.db, &args.gen, quiet)?;
    if !quiet {
        eprintln!("Opening {}...", source.describe());
    }
    let store = source.open()?;

    if args.interactive {
        return run_repl(&store, output_format, args.timing);
    }

    let query = args.query.unwrap_or_default();
    let result = store.query(&query)?;

    if let Some(output_path) = args.output {
        // An explicit -f wins; otherwise the extension decides
        let format = if args.format == "table" {
            OutputFormat::from_extension(&output_path.to_string_lossy()).unwrap_or(output_format)
        } else {
            output_format
        };
        let file = File::create(&output_path)
            .with_context(|| format!("Cannot create output file: {}", output_path.display()))?;
        let mut writer = BufWriter::new(file);
        QueryResultFormatter::write(&result, format, &mut writer)?;
        writer.flush()?;
        eprintln!(
            "Wrote {} rows to {}",
            result.row_count(),
            output_path.display()
        );
    } else {
        print!("{}", QueryResultFormatter::format(&result, output_format));
    }

    if args.timing {
        eprintln!("Query executed in {:.3}s", result.execution_time_secs);
    }

    Ok(())
}

/// Run the interactive REPL
fn run_repl(store: &CdmStore, default_format: OutputFormat, timing: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let history_path = dirs::cache_dir()
        .map(|d| d.join("omop-synth").join("query_history"))
        .unwrap_or_else(|| PathBuf::from(".omop_synth_history"));

    let _ = rl.load_history(&history_path);

    println!("omop-synth query REPL");
    println!("Type .help for available commands, .exit to quit");
    println!();

    let mut current_format = default_format;

    loop {
        match rl.readline("cdm> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                if trimmed.starts_with('.') {
                    if handle_meta_command(trimmed, store, &mut current_format)? {
                        break;
                    }
                    continue;
                }

                match store.query(trimmed) {
                    Ok(result) => {
                        print!("{}", QueryResultFormatter::format(&result, current_format));
                        if timing {
                            eprintln!("({:.3}s)", result.execution_time_secs);
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Handle REPL meta-commands. Returns true if REPL should exit.
fn handle_meta_command(command: &str, store: &CdmStore, format: &mut OutputFormat) -> Result<bool> {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let cmd = parts.first().copied().unwrap_or("");

    match cmd {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return Ok(true);
        }
        ".help" | ".h" | ".?" => {
            println!("Available commands:");
            println!("  .tables              List all tables");
            println!("  .schema [table]      Show schema (all tables or specific table)");
            println!("  .format <fmt>        Set output format (table, json, jsonl, csv, tsv)");
            println!("  .count <table>       Count rows in a table");
            println!("  .sample <table> [n]  Show sample rows from a table (default: 10)");
            println!("  .exit, .quit, .q     Exit the REPL");
            println!();
        }
        ".tables" => {
            for table in store.list_tables()? {
                println!("  {}", table);
            }
        }
        ".schema" => match parts.get(1) {
            Some(table) => match store.describe_table(table) {
                Ok(result) => print!(
                    "{}",
                    QueryResultFormatter::format(&result, OutputFormat::Table)
                ),
                Err(e) => eprintln!("Error: {}", e),
            },
            None => {
                for table in store.list_tables()? {
                    println!("{}:", table);
                    if let Ok(result) = store.describe_table(&table) {
                        for row in result.rows.iter().filter(|r| r.len() >= 2) {
                            println!("  {} {}", row[0], row[1]);
                        }
                    }
                    println!();
                }
            }
        },
        ".format" => match parts.get(1) {
            None => {
                println!("Current format: {}", format);
                println!("Usage: .format <table|json|jsonl|csv|tsv>");
            }
            Some(name) => match name.parse::<OutputFormat>() {
                Ok(new_format) => {
                    *format = new_format;
                    println!("Output format set to: {}", format);
                }
                Err(e) => eprintln!("Error: {}", e),
            },
        },
        ".count" => match parts.get(1) {
            None => eprintln!("Usage: .count <table>"),
            Some(table) => match store.row_count(table) {
                Ok(count) => println!("{}", count),
                Err(e) => eprintln!("Error: {}", e),
            },
        },
        ".sample" => match parts.get(1) {
            None => eprintln!("Usage: .sample <table> [n]"),
            Some(table) => {
                let limit: usize = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
                let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), limit);
                match store.query(&sql) {
                    Ok(result) => print!("{}", QueryResultFormatter::format(&result, *format)),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        },
        _ => {
            eprintln!(
                "Unknown command: {}. Type .help for available commands.",
                cmd
            );
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omop_synth::CdmConfig;

    fn store() -> CdmStore {
        omop_synth::generate(&CdmConfig {
            n_patients: 5,
            verbose: false,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_exit_commands() {
        let store = store();
        let mut format = OutputFormat::Table;
        assert!(handle_meta_command(".exit", &store, &mut format).unwrap());
        assert!(handle_meta_command(".q", &store, &mut format).unwrap());
        assert!(!handle_meta_command(".tables", &store, &mut format).unwrap());
    }

    #[test]
    fn test_format_switch() {
        let store = store();
        let mut format = OutputFormat::Table;
        handle_meta_command(".format csv", &store, &mut format).unwrap();
        assert_eq!(format, OutputFormat::Csv);
        handle_meta_command(".format nope", &store, &mut format).unwrap();
        assert_eq!(format, OutputFormat::Csv);
    }

    #[test]
    fn test_bad_table_does_not_end_session() {
        let store = store();
        let mut format = OutputFormat::Table;
        assert!(!handle_meta_command(".count missing", &store, &mut format).unwrap());
        assert!(!handle_meta_command(".sample missing 3", &store, &mut format).unwrap());
    }
}
