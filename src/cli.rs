//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the crew runner.

use clap::{Parser, Subcommand};

use crate::config::Provider;

/// Crew Runner - sequential multi-agent task runner
///
/// Runs an ordered list of tasks, each handled by an agent persona through
/// an OpenAI-compatible text generation endpoint, and writes the results.
#[derive(Parser, Debug)]
#[command(name = "crew-runner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the crew once and write its output files
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "CREW_CONFIG")]
        config: Option<String>,

        /// Directory for output files (overrides output.dir)
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Text generation provider (openai, mock)
        #[arg(long)]
        provider: Option<Provider>,

        /// Run only the named tasks, in configured order
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Exit with an error when any task does not succeed
        #[arg(long)]
        strict: bool,

        /// Also write a JSON report of the run
        #[arg(long)]
        report: bool,
    },

    /// Display version and build information
    Version,

    /// Crew inspection
    Crew {
        #[command(subcommand)]
        subcommand: CrewSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Crew subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CrewSubcommand {
    /// List the agents and tasks of the effective crew
    List {
        /// Path to configuration file
        #[arg(short, long, env = "CREW_CONFIG")]
        config: Option<String>,
    },

    /// List the crews bundled with the binary
    Bundled,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
