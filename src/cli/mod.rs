//! CLI-specific functionality for the extraction coordinator
//!
//! This module contains argument parsing, configuration discovery and the
//! simulated extraction session used to exercise the task manager.

pub mod args;
pub mod config;
pub mod simulate;

pub use args::{Args, Commands, ExecutionMode, SimulateConfig};
pub use config::{ConfigDiscovery, CoordinatorConfig};
pub use simulate::{SimulationConfig, SimulationReport, run_simulation};
