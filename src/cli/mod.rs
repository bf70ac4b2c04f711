//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::{Config, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Hierarchical state chart tool
#[derive(Parser, Debug)]
#[command(name = "statechart")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "STATECHART_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a chart and report reachability and terminal states
    Validate {
        /// Chart file (TOML or JSON); defaults to [chart] path
        file: Option<PathBuf>,
    },

    /// Describe every state, or one state, of a chart
    Describe {
        /// Chart file (TOML or JSON); defaults to [chart] path
        file: Option<PathBuf>,

        /// Only describe this state (name or alias)
        #[arg(short, long)]
        state: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Export a chart as a Graphviz graph or a flat JSON state list
    Export {
        /// Chart file (TOML or JSON); defaults to [chart] path
        file: Option<PathBuf>,

        /// Export format
        #[arg(short, long, value_enum, default_value = "dot")]
        format: ExportFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Drive a chart interactively or from a script of actions
    Run {
        /// Chart file (TOML or JSON); defaults to [chart] path
        file: Option<PathBuf>,

        /// Comma-separated actions to perform instead of reading stdin
        #[arg(short, long, value_delimiter = ',')]
        script: Option<Vec<String>>,

        /// Service name (overrides config)
        #[arg(long)]
        service: Option<String>,
    },
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// DOT format (Graphviz)
    Dot,
    /// Flat JSON state list
    Json,
}

/// Execute the CLI command
pub async fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Validate { file } => commands::validate::execute(config.chart_path(file)?),
        Commands::Describe {
            file,
            state,
            output,
        } => commands::describe::execute(config.chart_path(file)?, state, output),
        Commands::Export { file, format, out } => {
            commands::export::execute(config.chart_path(file)?, format, out)
        }
        Commands::Run {
            file,
            script,
            service,
        } => {
            let path = config.chart_path(file)?;
            commands::run::execute(path, script, service, &config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["statechart", "describe", "chart.toml", "-o", "json"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["statechart", "run", "chart.toml", "--script", "run,done"])
            .unwrap();
        match cli.command {
            Commands::Run { script, .. } => {
                assert_eq!(script, Some(vec!["run".to_string(), "done".to_string()]));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_file_is_optional() {
        let cli = Cli::try_parse_from(["statechart", "-c", "statechart.toml", "validate"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("statechart.toml")));
        assert!(matches!(cli.command, Commands::Validate { file: None }));
    }
}
