//! Integration tests for the omop-synth binary.
//!
//! JSON output of every command is checked against the schema the binary
//! itself publishes through `omop-synth schema`.

use jsonschema::Validator;
use serde_json::Value;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn omop_synth_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_omop-synth"))
}

fn run(args: &[&str]) -> Output {
    omop_synth_bin()
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn load_schema(name: &str) -> Validator {
    let output = run(&["schema", name]);
    assert!(output.status.success(), "schema {} not available", name);
    let schema: Value = serde_json::from_slice(&output.stdout).expect("Invalid schema JSON");
    Validator::new(&schema).expect("Failed to compile schema")
}

fn validate_json_output(output: &Output, schema_name: &str) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "Command failed with stderr: {}",
        stderr
    );

    let json: Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Invalid JSON output: {}\nOutput: {}", e, stdout));

    let schema = load_schema(schema_name);
    if let Err(error) = schema.validate(&json) {
        panic!(
            "JSON output doesn't match {} schema:\n  - {}: {}\n\nOutput was:\n{}",
            schema_name,
            error.instance_path,
            error,
            serde_json::to_string_pretty(&json).unwrap()
        );
    }
    json
}

// =============================================================================
// Generate Command
// =============================================================================

#[test]
fn test_generate_json_matches_schema() {
    let output = run(&["generate", "-n", "10", "--json", "--quiet"]);
    let json = validate_json_output(&output, "generate");

    assert_eq!(json["n_patients"], 10);
    assert_eq!(json["seed"], 123);
    assert_eq!(json["total_rows"], 10 + 10 + 30 + 20 + 40);
    assert_eq!(json["tables"].as_array().unwrap().len(), 5);
    assert!(json.get("output").is_none());
}

#[test]
fn test_generate_saves_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cdm.duckdb");
    let db_arg = db.to_str().unwrap();

    let output = run(&["generate", "-n", "8", "-o", db_arg, "--json", "-q"]);
    let json = validate_json_output(&output, "generate");
    assert_eq!(json["output"], db_arg);
    assert!(db.exists());

    // Second run needs --force
    let again = run(&["generate", "-n", "8", "-o", db_arg, "-q"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("--force"));

    let forced = run(&["generate", "-n", "4", "-o", db_arg, "--force", "-q"]);
    assert!(forced.status.success());

    let count = run(&[
        "query",
        "--db",
        db_arg,
        "SELECT COUNT(*) AS n FROM person",
        "-f",
        "csv",
        "-q",
    ]);
    assert!(count.status.success());
    assert_eq!(String::from_utf8_lossy(&count.stdout), "n\n4\n");
}

#[test]
fn test_failed_forced_generate_keeps_existing_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("cdm.duckdb");
    let db_arg = db.to_str().unwrap();

    let first = run(&["generate", "-n", "5", "-o", db_arg, "-q"]);
    assert!(first.status.success());
    let before = fs::read(&db).unwrap();

    let invalid = run(&["generate", "-n", "0", "-o", db_arg, "--force", "-q"]);
    assert!(!invalid.status.success());
    assert!(String::from_utf8_lossy(&invalid.stderr).contains("n_patients"));
    assert_eq!(fs::read(&db).unwrap(), before);
    assert!(!dir.path().join(".cdm.duckdb.partial").exists());

    let count = run(&[
        "query",
        "--db",
        db_arg,
        "SELECT COUNT(*) AS n FROM person",
        "-f",
        "csv",
        "-q",
    ]);
    assert!(count.status.success());
    assert_eq!(String::from_utf8_lossy(&count.stdout), "n\n5\n");
}

#[test]
fn test_generate_negative_seed() {
    let output = run(&["generate", "-n", "3", "--seed", "-1", "--json", "-q"]);
    let json = validate_json_output(&output, "generate");
    assert_eq!(json["seed"], -1);
}

#[test]
fn test_generate_rejects_zero_patients() {
    let output = run(&["generate", "-n", "0", "-q"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("n_patients"));
}

#[test]
fn test_generate_rejects_inverted_years() {
    let output = run(&[
        "generate",
        "--start-year",
        "2000",
        "--end-year",
        "1990",
        "-q",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("start_year"));
}

#[test]
fn test_generate_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cohort.yaml");
    fs::write(&config, "n_patients: 6\navg_drugs_per_patient: 1.0\nseed: 9\n").unwrap();

    // Flags override the file
    let output = run(&[
        "generate",
        "-c",
        config.to_str().unwrap(),
        "--seed",
        "10",
        "--json",
        "-q",
    ]);
    let json = validate_json_output(&output, "generate");
    assert_eq!(json["n_patients"], 6);
    assert_eq!(json["seed"], 10);
    let drugs = json["tables"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["table"] == "drug_exposure")
        .unwrap();
    assert_eq!(drugs["rows"], 6);
}

// =============================================================================
// Query Command
// =============================================================================

#[test]
fn test_query_generated_json() {
    let output = run(&[
        "query",
        "-n",
        "5",
        "SELECT person_id FROM person ORDER BY person_id",
        "-f",
        "json",
        "-q",
    ]);
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<i64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["person_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_query_output_file_uses_extension() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("persons.tsv");
    let output = run(&[
        "query",
        "-n",
        "3",
        "SELECT person_id, person_source_value FROM person ORDER BY 1",
        "-o",
        out.to_str().unwrap(),
        "-q",
    ]);
    assert!(output.status.success());
    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(
        content,
        "person_id\tperson_source_value\n1\t000001\n2\t000002\n3\t000003\n"
    );
}

#[test]
fn test_query_requires_sql_or_interactive() {
    let output = run(&["query", "-n", "3", "-q"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Query is required"));
}

#[test]
fn test_query_missing_db() {
    let output = run(&["query", "--db", "/no/such/cdm.duckdb", "SELECT 1", "-q"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

// =============================================================================
// Summary Command
// =============================================================================

#[test]
fn test_summary_json_matches_schema() {
    let output = run(&["summary", "-n", "50", "--json", "-q"]);
    let json = validate_json_output(&output, "summary");
    assert_eq!(json["tables"][0]["table"], "person");
    assert_eq!(json["tables"][0]["rows"], 50);
    assert_eq!(json["integrity"]["persons_without_observation_period"], 0);
}

#[test]
fn test_summary_linked_visits_have_no_mismatches() {
    let output = run(&[
        "summary",
        "-n",
        "50",
        "--link-visits-to-person",
        "--json",
        "-q",
    ]);
    let json = validate_json_output(&output, "summary");
    for entry in json["integrity"]["visit_person_mismatches"]
        .as_array()
        .unwrap()
    {
        assert_eq!(entry["rows"], 0);
    }
}

#[test]
fn test_summary_text_output() {
    let output = run(&["summary", "-n", "20", "--top", "2", "-q"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TOTAL"));
    assert!(stdout.contains("Year of birth"));
    assert!(stdout.contains("every person_id resolves"));
}

// =============================================================================
// Schema and completions
// =============================================================================

#[test]
fn test_schema_lists_names() {
    let output = run(&["schema"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "generate\nsummary\n");
}

#[test]
fn test_schema_unknown_name() {
    let output = run(&["schema", "split"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown schema"));
}

#[test]
fn test_completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("omop-synth"));
}
