//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `simulate`: Run a simulated extraction session against the task manager
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write the default configuration to a file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Simulate(SimulateConfig),
    ShowConfig,
    InitConfig(PathBuf),
}

/// Options of a simulation run; `None` keeps the configured value
#[derive(Debug, Default)]
pub struct SimulateConfig {
    pub config_override: Option<PathBuf>,
    pub workers: Option<usize>,
    pub tasks: Option<usize>,
    pub crash_rate: Option<f64>,
    pub seed: Option<u64>,
    pub json: bool,
}

#[derive(Debug, Parser)]
#[command(name = "exco")]
#[command(author = "Extraction Coordinator Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Task lifecycle coordinator for multi-process artifact extraction")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a simulated extraction session until all work is merged
    Simulate {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Number of simulated workers
        #[arg(short = 'w', long = "workers")]
        workers: Option<usize>,
        /// Number of tasks to create
        #[arg(short = 't', long = "tasks")]
        tasks: Option<usize>,
        /// Probability that a worker silently loses a task
        #[arg(long = "crash-rate")]
        crash_rate: Option<f64>,
        /// Random seed for a reproducible run
        #[arg(long = "seed")]
        seed: Option<u64>,
        /// Print the report as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Simulate {
                config,
                workers,
                tasks,
                crash_rate,
                seed,
                json,
            }) => Ok(ExecutionMode::Simulate(SimulateConfig {
                config_override: config.clone(),
                workers: *workers,
                tasks: *tasks,
                crash_rate: *crash_rate,
                seed: *seed,
                json: *json,
            })),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig { path }) => Ok(ExecutionMode::InitConfig(path.clone())),
            None => {
                Err("No command specified. Use 'exco --help' to see available commands.".to_string())
            }
        }
    }
}

impl SimulateConfig {
    /// Apply command line overrides on top of a loaded configuration
    pub fn apply_to(&self, simulation: &mut super::simulate::SimulationConfig) {
        if let Some(workers) = self.workers {
            simulation.workers = workers;
        }
        if let Some(tasks) = self.tasks {
            simulation.tasks = tasks;
        }
        if let Some(crash_rate) = self.crash_rate {
            simulation.crash_rate = crash_rate;
        }
        if self.seed.is_some() {
            simulation.seed = self.seed;
        }
    }
}
