//! JSON Schema generation for CLI output types.
//!
//! Every command with `--json` output has a schema here, exported through the
//! `schema` subcommand.

use schemars::{schema_for, Schema};
use std::collections::BTreeMap;

/// Returns all JSON schemas for commands that support --json output.
/// BTreeMap keeps the ordering deterministic.
pub fn all_schemas() -> BTreeMap<&'static str, Schema> {
    let mut schemas = BTreeMap::new();

    schemas.insert(
        "generate",
        schema_for!(crate::cmd::generate::GenerateJsonOutput),
    );

    // summary prints the library summary value as-is
    schemas.insert("summary", schema_for!(omop_synth::explore::CdmSummary));

    schemas
}

/// Generate a single schema by command name.
pub fn get_schema(command: &str) -> Option<Schema> {
    all_schemas().remove(command)
}

/// List all available schema names.
pub fn schema_names() -> Vec<&'static str> {
    all_schemas().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names() {
        assert_eq!(schema_names(), vec!["generate", "summary"]);
    }

    #[test]
    fn test_summary_schema_lists_tables() {
        let schema = get_schema("summary").unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["properties"]["tables"].is_object());
        assert!(get_schema("split").is_none());
    }
}
