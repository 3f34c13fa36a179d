//! Solvermesh CLI - Command-line interface
//!
//! This binary runs one optimisation-solver endpoint.
//!
//! # Architecture
//!
//! The CLI is organized into:
//! - `Cli` / `Commands`: Argument parsing (clap)
//! - `CliRunner`: Common setup (logging, endpoint creation)
//! - `CliError`: Centralized error handling with user-friendly messages

mod error;
mod runner;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use runner::CliRunner;
use solvermesh::config::{
    BrokerSettings, ConfigFile, SolverSettings, DEFAULT_BACKEND_SOLVER, DEFAULT_BROKER_PORT,
    DEFAULT_WORKER_COUNT,
};
use std::path::PathBuf;
use tracing::info;

// ============================================================================
// CLI Argument Definitions
// ============================================================================

#[derive(Parser)]
#[command(name = "solvermesh")]
#[command(version = solvermesh::VERSION)]
#[command(about = "Optimisation-solver endpoint for adaptive cloud applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the solver endpoint until a stop message or Ctrl-C
    Run(RunArgs),

    /// Print the effective configuration and exit
    Config(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// AMPL installation directory (default: resolve from PATH)
    #[arg(long, default_value = "")]
    engine_dir: PathBuf,

    /// Directory problem and data files are stored under
    #[arg(long)]
    problem_dir: Option<PathBuf>,

    /// Back-end solver algorithm name
    #[arg(long, default_value = DEFAULT_BACKEND_SOLVER)]
    solver: String,

    /// Number of solver workers
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,

    /// Messaging-broker host
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// Messaging-broker port
    #[arg(long, default_value_t = DEFAULT_BROKER_PORT)]
    broker_port: u16,

    /// Messaging-broker user
    #[arg(long, default_value = "admin")]
    broker_user: String,

    /// Messaging-broker password
    #[arg(long, default_value = "admin")]
    broker_password: String,

    /// Endpoint name used to scope subscriptions
    #[arg(long, default_value = "solver")]
    endpoint: String,
}

impl RunArgs {
    fn into_config(self) -> ConfigFile {
        let defaults = SolverSettings::default();
        ConfigFile {
            broker: BrokerSettings {
                host: self.broker_host,
                port: self.broker_port,
                user: self.broker_user,
                password: self.broker_password,
                endpoint: self.endpoint,
            },
            solver: SolverSettings {
                engine_dir: self.engine_dir,
                problem_dir: self.problem_dir.unwrap_or(defaults.problem_dir),
                backend: self.solver,
                workers: self.workers.max(1),
                worker_root_name: defaults.worker_root_name,
            },
            ..ConfigFile::default()
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run_endpoint(args.into_config()),
        Commands::Config(args) => print_config(args.into_config()),
    };

    if let Err(error) = result {
        error.exit();
    }
}

/// Runs the endpoint until it is stopped.
fn run_endpoint(config: ConfigFile) -> Result<(), CliError> {
    let runner = CliRunner::new(config)?;
    runner.log_startup("run");

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("could not start async runtime: {}", e)))?;

    runtime.block_on(async {
        let handle = runner.start_endpoint()?;

        let stopper = handle.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received; requesting stop");
                stopper.request_stop();
            }
        });

        handle.wait_stopped().await;
        Ok(())
    })
}

/// Prints the effective configuration without starting anything.
fn print_config(config: ConfigFile) -> Result<(), CliError> {
    println!("broker:   {}:{}", config.broker.host, config.broker.port);
    println!("user:     {}", config.broker.user);
    println!("endpoint: {}", config.broker.endpoint);
    println!("backend:  {}", config.solver.backend);
    println!("workers:  {}", config.solver.workers);
    println!("engine:   {}", config.solver.engine_dir.display());
    println!("problems: {}", config.solver.problem_dir.display());
    println!("topics:");
    println!("  metric list:   {}", config.topics.metric_list);
    println!("  metric values: {}*", config.topics.metric_value_prefix);
    println!("  lifecycle:     {}", config.topics.lifecycle);
    println!("  slo violation: {}", config.topics.slo_violation);
    println!("  problem:       {}", config.topics.problem_definition);
    println!("  data:          {}", config.topics.data_file);
    println!("  context:       {}", config.topics.exec_context);
    println!("  solution:      {}", config.topics.solution);
    println!("  status:        {}", config.topics.status);
    println!("  stop:          {}", config.topics.stop);
    Ok(())
}
