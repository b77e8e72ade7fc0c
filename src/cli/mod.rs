//! CLI command definitions and handlers

mod catalog;
mod evaluate;
mod list;

use anyhow::{Context, Result};
use archqual::config::{load_engine_config, EngineConfig};
use archqual::quality_model::QualityModelInstance;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// archqual - Quality evaluation for cloud-native architectures
#[derive(Parser, Debug)]
#[command(name = "archqual")]
#[command(
    version,
    about = "Graph-powered quality evaluation for cloud-native architectures",
    long_about = "archqual evaluates an architecture model (components, links, infrastructure, \
deployments, request traces) against a quality model of product factors and quality aspects.\n\n\
About 100 measures are computed per scope, normalized, and propagated along signed impacts \
to rate each quality aspect Low, Moderate or High.",
    after_help = "\
Examples:
  archqual evaluate system.json                          Evaluate the whole system
  archqual evaluate system.json -s component --id orders Evaluate one component
  archqual evaluate system.json -s component --all -f json
  archqual evaluate system.json -a availability -a modularity
  archqual list system.json                              List evaluable entities
  archqual catalog                                       Show the quality model"
)]
pub struct Cli {
    /// Engine config file (default: archqual.toml or .archqualrc.json in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Custom quality-model catalog (TOML)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Evaluation scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    System,
    Component,
    Infrastructure,
    Trace,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an architecture document
    #[command(after_help = "\
Activation falls back to [evaluation] in the config file, then to every quality aspect.

Examples:
  archqual evaluate system.json
  archqual evaluate system.json -s trace --id checkout --factor secureCommunication
  archqual evaluate system.json -s infrastructure --all --format json")]
    Evaluate {
        /// Architecture document (JSON)
        document: PathBuf,

        /// Scope to evaluate
        #[arg(long, short = 's', value_enum, default_value_t = Scope::System)]
        scope: Scope,

        /// Entity id within the scope (not needed for system)
        #[arg(long)]
        id: Option<String>,

        /// Active quality aspect (repeatable)
        #[arg(long = "aspect", short = 'a')]
        aspects: Vec<String>,

        /// Active product factor (repeatable)
        #[arg(long = "factor")]
        factors: Vec<String>,

        /// Evaluate every entity of the scope
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Output format (default: [output] format in config, else text)
        #[arg(long, short = 'f', value_parser = ["text", "json"])]
        format: Option<String>,
    },

    /// List the entities available per scope
    List {
        /// Architecture document (JSON)
        document: PathBuf,

        /// Output format
        #[arg(long, short = 'f', value_parser = ["text", "json"])]
        format: Option<String>,
    },

    /// Print the quality model: aspects, factors, measures and impacts
    Catalog {
        /// Output format
        #[arg(long, short = 'f', value_parser = ["text", "json"])]
        format: Option<String>,
    },
}

/// Configuration and quality model shared by every command
pub(crate) struct Session {
    pub config: EngineConfig,
    pub quality_model: Arc<QualityModelInstance>,
}

impl Session {
    fn load(config_path: Option<&Path>, catalog_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::from_file(path)?,
            None => load_engine_config(&std::env::current_dir()?),
        };
        config.validate().context("Invalid engine configuration")?;

        let quality_model = match catalog_path {
            Some(path) => QualityModelInstance::from_file(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None => QualityModelInstance::builtin().context("Failed to load built-in catalog")?,
        };
        let quality_model = config
            .apply_measure_overrides(quality_model)
            .context("Failed to apply [measures] overrides")?;
        debug!(
            "Session ready: config {:?}, {} measures",
            config.source,
            quality_model.measures().len()
        );

        Ok(Self {
            config,
            quality_model: Arc::new(quality_model),
        })
    }

    /// Explicit format, else the configured one
    fn format(&self, format: Option<&str>) -> Result<archqual::reporters::OutputFormat> {
        match format {
            Some(f) => f.parse(),
            None => Ok(self.config.output.format),
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let session = Session::load(cli.config.as_deref(), cli.catalog.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            document,
            scope,
            id,
            aspects,
            factors,
            all,
            format,
        } => {
            let format = session.format(format.as_deref())?;
            evaluate::run(
                &session,
                &document,
                scope,
                id.as_deref(),
                aspects,
                factors,
                all,
                format,
            )
        }

        Commands::List { document, format } => {
            let format = session.format(format.as_deref())?;
            list::run(&session, &document, format)
        }

        Commands::Catalog { format } => {
            let format = session.format(format.as_deref())?;
            catalog::run(&session, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_evaluate_args() {
        let cli = Cli::try_parse_from([
            "archqual", "evaluate", "sys.json", "-s", "component", "--id", "orders", "-a",
            "availability", "-a", "modularity", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate {
                scope,
                id,
                aspects,
                format,
                ..
            } => {
                assert_eq!(scope, Scope::Component);
                assert_eq!(id.as_deref(), Some("orders"));
                assert_eq!(aspects, vec!["availability", "modularity"]);
                assert_eq!(format.as_deref(), Some("json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_all_conflicts_with_id() {
        assert!(Cli::try_parse_from([
            "archqual", "evaluate", "sys.json", "-s", "component", "--id", "a", "--all",
        ])
        .is_err());
    }
}
