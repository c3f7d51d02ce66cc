//! Crew Runner - sequential multi-agent task runner
//!
//! This is the main entry point for the crew-runner binary.
//! It loads a crew (agents plus ordered tasks), runs every task once through
//! a text generation client, and writes the aggregated and per-task output.

mod cli;
mod client;
mod config;
mod crew;
mod error;
mod logging;
mod output;
mod runner;
mod version;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, ConfigSubcommand, CrewSubcommand};
use crate::config::{CrewConfig, Provider};
use crate::crew::CrewRegistry;
use crate::error::{Error, Result};
use crate::output::{OutputWriter, WrittenFiles};
use crate::runner::{RunResult, SequentialAgentRunner};

/// Options of the `run` command after parsing
struct RunOptions {
    config: Option<String>,
    output_dir: Option<String>,
    provider: Option<Provider>,
    only: Vec<String>,
    strict: bool,
    report: bool,
}

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        tracing::debug!(error = %e.format_for_log(), "Command failed");
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Crew { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_crew_command(subcommand)
        }
        Commands::Run {
            config,
            output_dir,
            provider,
            only,
            strict,
            report,
        } => run_crew(
            RunOptions {
                config,
                output_dir,
                provider,
                only,
                strict,
                report,
            },
            cli.verbose,
            cli.quiet,
        ),
    }
}

/// Load the configuration, run the crew once and persist the result
fn run_crew(options: RunOptions, verbose: u8, quiet: bool) -> Result<()> {
    let mut config = CrewConfig::load(options.config.as_deref())?;

    // CLI flags take precedence over file and environment
    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    if let Some(dir) = options.output_dir {
        config.output.dir = dir;
    }
    if options.report {
        config.output.write_report = true;
    }
    config.validate()?;

    // The guards must be kept alive until the run output is flushed
    let _log_guards = logging::init_logging(&config.logging, verbose, quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Starting crew-runner"
    );

    let items = config.crew()?.select(&options.only)?.work_items()?;
    let total = items.len();

    // Credentials are checked here, before any request goes out
    let client = client::build_client(&config.llm)?;

    let mut runner = SequentialAgentRunner::new(client);
    runner.configure(items)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let result = runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                let _ = cancel_tx.send(true);
            }
        });
        runner.run_with_cancel(cancel_rx).await
    })?;

    let written = OutputWriter::new(&config.output).write(&result)?;

    if !quiet {
        print_summary(&result, &written);
    }

    let failed = result.failed_count();
    // A cancelled run is always incomplete; unattempted items count as failed
    if result.cancelled || (options.strict && failed > 0) {
        return Err(Error::RunIncomplete {
            failed: total - result.succeeded_count(),
            total,
        });
    }

    Ok(())
}

fn print_summary(result: &RunResult, written: &WrittenFiles) {
    println!(
        "Run {} {}: {} succeeded, {} did not succeed",
        result.run_id,
        if result.cancelled { "cancelled" } else { "finished" },
        result.succeeded_count(),
        result.failed_count()
    );

    for item in &result.results {
        match item.status.reason() {
            Some(reason) => println!("  {:<12} {} ({})", item.id, item.status.label(), reason),
            None => println!("  {:<12} {}", item.id, item.status.label()),
        }
    }

    println!();
    println!("Aggregated output: {}", written.aggregate.display());
    for path in &written.items {
        println!("Task output:       {}", path.display());
    }
    if let Some(ref report) = written.report {
        println!("Run report:        {}", report.display());
    }
}

/// Handle crew subcommands
fn handle_crew_command(subcommand: CrewSubcommand) -> Result<()> {
    match subcommand {
        CrewSubcommand::List { config } => {
            let cfg = CrewConfig::load(config.as_deref())?;
            let crew = cfg.crew()?;

            println!("Agents:");
            for agent in &crew.agents {
                println!("  {:<20} {}", agent.name, agent.role);
            }

            println!("Tasks:");
            for (position, task) in crew.tasks.iter().enumerate() {
                if task.context.is_empty() {
                    println!("  {}. {:<16} agent: {}", position + 1, task.name, task.agent);
                } else {
                    println!(
                        "  {}. {:<16} agent: {}, after: {}",
                        position + 1,
                        task.name,
                        task.agent,
                        task.context.join(", ")
                    );
                }
            }
        }
        CrewSubcommand::Bundled => {
            let registry = CrewRegistry::new();
            for name in registry.available() {
                let crew = registry.load(name)?;
                println!("{} ({} agents, {} tasks)", name, crew.agents.len(), crew.tasks.len());
            }
        }
    }

    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let mut cfg = CrewConfig::load(config.as_deref())?;
            if cfg.llm.api_key.is_some() {
                cfg.llm.api_key = Some("********".to_string());
            }
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            CrewConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
