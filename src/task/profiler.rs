use crate::task::types::{Task, TaskId, now_micros};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Lifecycle events reported to a task profiler
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskSampleStatus {
    Created,
    Processing,
    PendingMerge,
    Merging,
    Completed,
    Abandoned,
    RetryCreated,
    Removed,
}

impl TaskSampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSampleStatus::Created => "created",
            TaskSampleStatus::Processing => "processing",
            TaskSampleStatus::PendingMerge => "pending_merge",
            TaskSampleStatus::Merging => "merging",
            TaskSampleStatus::Completed => "completed",
            TaskSampleStatus::Abandoned => "abandoned",
            TaskSampleStatus::RetryCreated => "retry_created",
            TaskSampleStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for TaskSampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives a sample on every task state transition.
///
/// Called while the task manager holds its lock, so implementations must not
/// call back into the manager.
pub trait TaskProfiler: Send + Sync {
    fn sample(&self, task: &Task, status: TaskSampleStatus);
}

/// Emits every sample as a `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTaskProfiler;

impl TaskProfiler for TracingTaskProfiler {
    fn sample(&self, task: &Task, status: TaskSampleStatus) {
        debug!(
            target: "exco::task_profiler",
            task_id = task.identifier(),
            session_id = %task.session_identifier,
            status = status.as_str(),
            "task sample"
        );
    }
}

/// A single recorded sample
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskSample {
    pub timestamp: i64,
    pub task_id: TaskId,
    pub status: TaskSampleStatus,
}

/// Keeps all samples in memory
#[derive(Debug, Default)]
pub struct RecordingTaskProfiler {
    samples: Mutex<Vec<TaskSample>>,
}

impl RecordingTaskProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<TaskSample> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Statuses sampled for one task, in order
    pub fn history(&self, task_id: &str) -> Vec<TaskSampleStatus> {
        self.samples()
            .into_iter()
            .filter(|sample| sample.task_id == task_id)
            .map(|sample| sample.status)
            .collect()
    }

    pub fn counts(&self) -> HashMap<TaskSampleStatus, usize> {
        let mut counts = HashMap::new();
        for sample in self.samples() {
            *counts.entry(sample.status).or_insert(0) += 1;
        }
        counts
    }
}

impl TaskProfiler for RecordingTaskProfiler {
    fn sample(&self, task: &Task, status: TaskSampleStatus) {
        let sample = TaskSample {
            timestamp: now_micros(),
            task_id: task.identifier().to_string(),
            status,
        };
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sample);
    }
}
