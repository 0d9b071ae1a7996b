//! YAML configuration for generation runs.
//!
//! A config file holds any subset of the `CdmConfig` fields; missing fields
//! keep their defaults and command-line flags override the file.
//!
//! ```yaml
//! n_patients: 500
//! seed: 42
//! start_year: 1930
//! end_year: 2000
//! avg_visits_per_patient: 2.5
//! visit_linkage: same_person
//! ```

use cdm_gen::CdmConfig;
use std::fs;
use std::path::Path;

/// Load generation parameters from a YAML file
pub fn load(path: &Path) -> anyhow::Result<CdmConfig> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> anyhow::Result<CdmConfig> {
    if content.trim().is_empty() {
        return Ok(CdmConfig::default());
    }
    let config: CdmConfig = serde_yaml_ng::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdm_gen::VisitLinkage;

    #[test]
    fn test_parse_partial() {
        let config = parse("n_patients: 500\nseed: 42\n").unwrap();
        assert_eq!(config.n_patients, 500);
        assert_eq!(config.seed, 42);
        assert_eq!(config.end_year, 2005);
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(parse("  \n").unwrap(), CdmConfig::default());
    }

    #[test]
    fn test_unknown_linkage_is_an_error() {
        assert!(parse("visit_linkage: sometimes\n").is_err());
    }

    #[test]
    fn test_parse_linkage_and_negative_seed() {
        let config = parse("n_patients: 7\nseed: -5\nvisit_linkage: same_person\n").unwrap();
        assert_eq!(config.n_patients, 7);
        assert_eq!(config.seed, -5);
        assert_eq!(config.visit_linkage, VisitLinkage::SamePerson);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load(Path::new("/no/such/config.yaml")).is_err());
    }
}
