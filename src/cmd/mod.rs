pub(crate) mod generate;
mod query;
mod summary;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate as generate_completions, Shell};
use omop_synth::{CdmConfig, CdmSource, DuckDbFileSource, SyntheticSource, VisitLinkage};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "omop-synth")]
#[command(version)]
#[command(about = "Generate and explore synthetic OMOP CDM databases", long_about = None)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Parameters for a generation run. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerationArgs {
    /// YAML file with generation parameters
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of persons to generate [default: 1000]
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub patients: Option<i64>,

    /// RNG seed [default: 123]
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// Earliest birth year [default: 1920]
    #[arg(long, allow_negative_numbers = true)]
    pub start_year: Option<i32>,

    /// Latest birth year [default: 2005]
    #[arg(long, allow_negative_numbers = true)]
    pub end_year: Option<i32>,

    /// Visits per person on average [default: 3.0]
    #[arg(long, allow_negative_numbers = true)]
    pub avg_visits: Option<f64>,

    /// Conditions per person on average [default: 2.0]
    #[arg(long, allow_negative_numbers = true)]
    pub avg_conditions: Option<f64>,

    /// Drug exposures per person on average [default: 4.0]
    #[arg(long, allow_negative_numbers = true)]
    pub avg_drugs: Option<f64>,

    /// Attach conditions and drugs to one of the person's own visits
    #[arg(long)]
    pub link_visits_to_person: bool,
}

impl GenerationArgs {
    /// Defaults, then the config file, then flags
    pub fn resolve(&self, quiet: bool) -> anyhow::Result<CdmConfig> {
        let mut config = match &self.config {
            Some(path) => omop_synth::config::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => CdmConfig::default(),
        };

        if let Some(n) = self.patients {
            config.n_patients = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(year) = self.start_year {
            config.start_year = year;
        }
        if let Some(year) = self.end_year {
            config.end_year = year;
        }
        if let Some(avg) = self.avg_visits {
            config.avg_visits_per_patient = avg;
        }
        if let Some(avg) = self.avg_conditions {
            config.avg_conditions_per_patient = avg;
        }
        if let Some(avg) = self.avg_drugs {
            config.avg_drugs_per_patient = avg;
        }
        if self.link_visits_to_person {
            config.visit_linkage = VisitLinkage::SamePerson;
        }
        if quiet {
            config.verbose = false;
        }
        Ok(config)
    }

    /// True when any generation parameter was given
    fn is_set(&self) -> bool {
        self.config.is_some()
            || self.patients.is_some()
            || self.seed.is_some()
            || self.start_year.is_some()
            || self.end_year.is_some()
            || self.avg_visits.is_some()
            || self.avg_conditions.is_some()
            || self.avg_drugs.is_some()
            || self.link_visits_to_person
    }
}

/// Pick where a command reads its CDM from: a saved file or a fresh run
pub(crate) fn resolve_source(
    db: Option<PathBuf>,
    gen: &GenerationArgs,
    quiet: bool,
) -> anyhow::Result<Box<dyn CdmSource>> {
    match db {
        Some(path) => {
            if gen.is_set() {
                anyhow::bail!("--db cannot be combined with generation options");
            }
            Ok(Box::new(DuckDbFileSource::new(path)?))
        }
        None => Ok(Box::new(SyntheticSource::new(gen.resolve(quiet)?)?)),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic CDM, optionally saving it to a DuckDB file
    #[command(after_help = "Examples:
  omop-synth generate -n 100 --seed 42
  omop-synth generate -c cohort.yaml -o cdm.duckdb
  omop-synth generate -n 500 --link-visits-to-person --json")]
    Generate {
        #[command(flatten)]
        gen: GenerationArgs,

        /// Save the generated tables to a new DuckDB file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Replace the output file if it exists
        #[arg(long, requires = "output")]
        force: bool,

        /// Show a spinner while generating
        #[arg(short, long)]
        progress: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run SQL against a generated or saved CDM
    Query(query::QueryArgs),

    /// Summarize counts, distributions and referential checks
    Summary {
        /// Summarize a saved DuckDB file instead of generating
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,

        #[command(flatten)]
        gen: GenerationArgs,

        /// Concepts listed per event table
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Years per birth-year histogram bin
        #[arg(long, default_value_t = 10)]
        bin_width: u32,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print JSON schemas for --json outputs
    Schema {
        /// Command name (omit to list available schemas)
        name: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Generate {
            gen,
            output,
            force,
            progress,
            json,
        } => generate::run(gen.resolve(quiet)?, output, force, progress, json),
        Commands::Query(args) => query::run(args, quiet),
        Commands::Summary {
            db,
            gen,
            top,
            bin_width,
            json,
        } => {
            let source = resolve_source(db, &gen, quiet)?;
            summary::run(&*source, top, bin_width, json, quiet)
        }
        Commands::Schema { name } => run_schema(name),
        Commands::Completions { shell } => {
            generate_completions(shell, &mut Cli::command(), "omop-synth", &mut io::stdout());
            Ok(())
        }
    }
}

fn run_schema(name: Option<String>) -> anyhow::Result<()> {
    match name {
        Some(name) => {
            let schema = crate::json_schema::get_schema(&name).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown schema: {}. Available: {}",
                    name,
                    crate::json_schema::schema_names().join(", ")
                )
            })?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        None => {
            for name in crate::json_schema::schema_names() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
