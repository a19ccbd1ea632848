//! Environment constants and path utilities for the extraction coordinator.
//!
//! Centralizes the defaults and file locations shared by the task manager,
//! the configuration loader and the command line interface.

use std::path::{Path, PathBuf};

/// Seconds without worker activity after which a task is presumed lost
pub const DEFAULT_TASK_INACTIVE_TIMEOUT_SECS: u64 = 5 * 60;

/// Application directory name (hidden directory like .git)
pub const EXCO_DIR_NAME: &str = ".exco";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "exco.toml";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "exco=info";

/// Simulation defaults
pub mod simulation {
    /// Session identifier used for simulated runs
    pub const SESSION_ID: &str = "simulated-session";

    /// Path prefix of simulated file entries
    pub const PATH_PREFIX: &str = "/evidence/image.raw";
}

/// Build the application directory path under a root
pub fn exco_dir_path(root: &Path) -> PathBuf {
    root.join(EXCO_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    exco_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the config file paths checked in the current directory
pub fn local_config_file_paths(current_dir: &Path) -> [PathBuf; 2] {
    [
        current_dir.join(LOCAL_CONFIG_FILE_NAME),
        exco_dir_path(current_dir).join(CONFIG_FILE_NAME),
    ]
}
