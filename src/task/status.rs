use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time task counts per state
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TasksStatus {
    pub number_of_abandoned_tasks: usize,
    pub number_of_queued_tasks: usize,
    pub number_of_tasks_pending_merge: usize,
    pub number_of_tasks_processing: usize,
    pub number_of_tasks_merging: usize,
    /// Tasks created over the lifetime of the manager, retries included
    pub total_number_of_tasks: u64,
}

impl TasksStatus {
    /// Number of tasks currently tracked in any state
    pub fn number_of_tracked_tasks(&self) -> usize {
        self.number_of_abandoned_tasks
            + self.number_of_queued_tasks
            + self.number_of_tasks_pending_merge
            + self.number_of_tasks_processing
            + self.number_of_tasks_merging
    }
}

impl fmt::Display for TasksStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={} processing={} pending_merge={} merging={} abandoned={} total={}",
            self.number_of_queued_tasks,
            self.number_of_tasks_processing,
            self.number_of_tasks_pending_merge,
            self.number_of_tasks_merging,
            self.number_of_abandoned_tasks,
            self.total_number_of_tasks
        )
    }
}
