//! # Extraction Coordinator
//!
//! Task lifecycle coordination for forensic artifact extraction that fans work
//! out to worker processes and merges their results into a session store.
//!
//! ## Architecture Overview
//!
//! - **[`task`]**: The task entity, the pending-merge heap and the
//!   [`TaskManager`] that tracks every task through its lifecycle
//! - **[`cli`]**: Configuration discovery, argument parsing and a simulated
//!   extraction session driving the task manager
//! - **[`env`]**: Shared defaults and file locations
//!
//! ## Task Lifecycle
//!
//! ```text
//! create ──> queued ──> processing ──> pending merge ──> merging ──> completed
//!              │            │   ▲
//!              └────────────┴─> abandoned ──> retry task (new, queued)
//! ```
//!
//! Workers that stop reporting are detected lazily: every call to
//! [`TaskManager::has_pending_tasks`] abandons tasks without activity for the
//! configured inactive timeout. Abandoned tasks are replaced through
//! [`TaskManager::create_retry_task`].
//!
//! ## Quick Start
//!
//! ```rust
//! use exco::{TaskManager, TaskManagerConfig};
//!
//! let manager = TaskManager::new(TaskManagerConfig::default());
//!
//! let task = manager.create_task("session-1");
//! manager.update_task_as_processing_by_identifier(task.identifier())?;
//!
//! let mut finished = task.clone();
//! finished.storage_file_size = Some(4096);
//! manager.update_task_as_pending_merge(&finished)?;
//!
//! if let Some(merging) = manager.get_task_pending_merge(None) {
//!     manager.complete_task(&merging)?;
//! }
//! assert!(!manager.has_pending_tasks());
//! # Ok::<(), exco::TaskManagerError>(())
//! ```

/// Task entity, merge ordering and lifecycle coordination.
pub mod task;

/// Command line interface, configuration and simulation.
pub mod cli;

/// Environment constants and path utilities.
pub mod env;

pub use task::{
    Clock, FileEntryType, ManualClock, PendingMergeHeap, StorageFormat, SystemClock, Task,
    TaskId, TaskManager, TaskManagerConfig, TaskManagerError, TaskProfiler, TaskSampleStatus,
    TasksStatus,
};

pub use cli::{CoordinatorConfig, SimulationConfig, SimulationReport, run_simulation};
