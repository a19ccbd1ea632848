use crate::env;
use crate::task::clock::{Clock, SystemClock};
use crate::task::error::{Result, TaskManagerError};
use crate::task::heap::PendingMergeHeap;
use crate::task::profiler::{TaskProfiler, TaskSampleStatus, TracingTaskProfiler};
use crate::task::status::TasksStatus;
use crate::task::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Central task lifecycle coordinator.
///
/// Owns every live task in exactly one of five collections: queued,
/// processing, pending merge, merging and abandoned. All operations take the
/// same lock for their whole duration, so transitions are atomic with respect
/// to each other.
pub struct TaskManager {
    config: TaskManagerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<TaskManagerState>,
}

/// Configuration for task manager
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskManagerConfig {
    /// Seconds without worker activity after which a task is presumed lost
    pub inactive_timeout_secs: u64,
    /// Storage format stamped onto created tasks
    pub storage_format: StorageFormat,
    /// Attach a tracing-backed profiler at construction
    pub enable_task_profiling: bool,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self {
            inactive_timeout_secs: env::DEFAULT_TASK_INACTIVE_TIMEOUT_SECS,
            storage_format: StorageFormat::default(),
            enable_task_profiling: false,
        }
    }
}

impl TaskManagerConfig {
    pub fn inactive_timeout(&self) -> Duration {
        Duration::from_secs(self.inactive_timeout_secs)
    }
}

/// Tasks keyed by identifier that iterate in insertion order
#[derive(Default)]
struct TaskCollection {
    tasks: HashMap<TaskId, (u64, Task)>,
    order: BTreeMap<u64, TaskId>,
    next_sequence: u64,
}

impl TaskCollection {
    fn insert(&mut self, task: Task) {
        let task_id = task.identifier().to_string();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some((previous, _)) = self.tasks.insert(task_id.clone(), (sequence, task)) {
            self.order.remove(&previous);
        }
        self.order.insert(sequence, task_id);
    }

    fn remove(&mut self, task_id: &str) -> Option<Task> {
        let (sequence, task) = self.tasks.remove(task_id)?;
        self.order.remove(&sequence);
        Some(task)
    }

    fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id).map(|(_, task)| task)
    }

    fn get_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(task_id).map(|(_, task)| task)
    }

    fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn values(&self) -> impl Iterator<Item = &Task> {
        self.order
            .values()
            .filter_map(|task_id| self.get(task_id))
    }

    fn drain(&mut self) -> Vec<Task> {
        let order = std::mem::take(&mut self.order);
        let mut tasks = std::mem::take(&mut self.tasks);
        order
            .into_values()
            .filter_map(|task_id| tasks.remove(&task_id).map(|(_, task)| task))
            .collect()
    }
}

struct TaskManagerState {
    queued: TaskCollection,
    processing: TaskCollection,
    pending_merge: PendingMergeHeap,
    merging: HashMap<TaskId, Task>,
    abandoned: TaskCollection,
    /// Most recent worker activity seen on any task
    latest_processing_time: i64,
    total_number_of_tasks: u64,
    profiler: Option<Arc<dyn TaskProfiler>>,
}

impl TaskManagerState {
    fn sample(&self, task: &Task, status: TaskSampleStatus) {
        if let Some(profiler) = &self.profiler {
            profiler.sample(task, status);
        }
    }

    fn record_activity(&mut self, timestamp: i64) {
        self.latest_processing_time = self.latest_processing_time.max(timestamp);
    }

    fn start_processing(&mut self, mut task: Task, now: i64) {
        task.update_processing_time_to(now);
        self.record_activity(now);
        let sampled = task.clone();
        self.processing.insert(task);
        self.sample(&sampled, TaskSampleStatus::Processing);
    }

    /// Move tasks to abandoned, sampling only once all of them are tracked
    fn abandon(&mut self, tasks: Vec<Task>) {
        for task in &tasks {
            self.abandoned.insert(task.clone());
        }
        for task in &tasks {
            self.sample(task, TaskSampleStatus::Abandoned);
        }
    }

    fn has_tasks_pending_retry(&self) -> bool {
        self.abandoned.values().any(|task| !task.has_retry)
    }

    fn has_pending_tasks(&self) -> bool {
        !self.processing.is_empty()
            || !self.pending_merge.is_empty()
            || self.has_tasks_pending_retry()
            || !self.queued.is_empty()
            || !self.merging.is_empty()
    }

    /// Move processing tasks last seen before `inactive_before` to abandoned
    fn abandon_inactive_processing_tasks(&mut self, inactive_before: i64) -> usize {
        let stale: Vec<TaskId> = self
            .processing
            .values()
            .filter(|task| task.last_processing_time.unwrap_or(task.start_time) < inactive_before)
            .map(|task| task.identifier().to_string())
            .collect();

        let abandoned: Vec<Task> = stale
            .iter()
            .filter_map(|task_id| self.processing.remove(task_id))
            .inspect(|task| warn!("Abandoned inactive processing task {}", task.identifier()))
            .collect();
        let count = abandoned.len();
        self.abandon(abandoned);

        count
    }

    /// Move every queued task to abandoned, in creation order
    fn abandon_queued_tasks(&mut self) -> usize {
        let queued = self.queued.drain();
        let count = queued.len();

        for task in &queued {
            debug!("Abandoned queued task {}", task.identifier());
        }
        self.abandon(queued);

        count
    }

    fn status(&self) -> TasksStatus {
        TasksStatus {
            number_of_abandoned_tasks: self.abandoned.len(),
            number_of_queued_tasks: self.queued.len(),
            number_of_tasks_pending_merge: self.pending_merge.len(),
            number_of_tasks_processing: self.processing.len(),
            number_of_tasks_merging: self.merging.len(),
            total_number_of_tasks: self.total_number_of_tasks,
        }
    }
}

impl TaskManager {
    /// Create a new task manager using the system clock
    pub fn new(config: TaskManagerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new task manager reading time from `clock`
    pub fn with_clock(config: TaskManagerConfig, clock: Arc<dyn Clock>) -> Self {
        let profiler: Option<Arc<dyn TaskProfiler>> = if config.enable_task_profiling {
            Some(Arc::new(TracingTaskProfiler))
        } else {
            None
        };

        let state = TaskManagerState {
            queued: TaskCollection::default(),
            processing: TaskCollection::default(),
            pending_merge: PendingMergeHeap::new(),
            merging: HashMap::new(),
            abandoned: TaskCollection::default(),
            // a fresh backlog gets a full timeout before it counts as orphaned
            latest_processing_time: clock.now_micros(),
            total_number_of_tasks: 0,
            profiler,
        };

        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &TaskManagerConfig {
        &self.config
    }

    // Every operation finishes its mutation before sampling, so a lock
    // poisoned by a panicking profiler still guards consistent state.
    fn lock_state(&self) -> MutexGuard<'_, TaskManagerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn inactive_before(&self, now: i64) -> i64 {
        let timeout = i64::try_from(self.config.inactive_timeout().as_micros()).unwrap_or(i64::MAX);
        now.saturating_sub(timeout)
    }

    /// Attach a profiler that is sampled on every state transition
    pub fn start_profiling(&self, profiler: Arc<dyn TaskProfiler>) {
        self.lock_state().profiler = Some(profiler);
        debug!("Task profiling started");
    }

    pub fn stop_profiling(&self) {
        self.lock_state().profiler = None;
        debug!("Task profiling stopped");
    }

    /// Report a sample for a task to the attached profiler, if any
    pub fn sample_task_status(&self, task: &Task, status: TaskSampleStatus) {
        self.lock_state().sample(task, status);
    }

    /// Create a new queued task
    pub fn create_task(&self, session_identifier: impl Into<SessionId>) -> Task {
        self.create_file_entry_task(session_identifier, None, None)
    }

    /// Create a new queued task for a specific file entry
    pub fn create_file_entry_task(
        &self,
        session_identifier: impl Into<SessionId>,
        path_spec: Option<String>,
        file_entry_type: Option<FileEntryType>,
    ) -> Task {
        let mut task = Task::new(session_identifier)
            .with_storage_format(self.config.storage_format)
            .with_start_time(self.clock.now_micros());
        task.path_spec = path_spec;
        task.file_entry_type = file_entry_type;

        let mut state = self.lock_state();
        state.total_number_of_tasks += 1;
        state.queued.insert(task.clone());
        state.sample(&task, TaskSampleStatus::Created);

        debug!("Created task {}", task.identifier());
        task
    }

    /// Create a retry for the first abandoned task that has none yet
    pub fn create_retry_task(&self) -> Option<Task> {
        let now = self.clock.now_micros();
        let mut state = self.lock_state();

        let original_id = state
            .abandoned
            .values()
            .find(|task| !task.has_retry)
            .map(|task| task.identifier().to_string())?;

        let retry = state
            .abandoned
            .get_mut(&original_id)?
            .create_retry_task()
            .with_start_time(now);

        state.total_number_of_tasks += 1;
        state.queued.insert(retry.clone());
        state.sample(&retry, TaskSampleStatus::RetryCreated);

        info!(
            "Created retry task {} for abandoned task {}",
            retry.identifier(),
            original_id
        );
        Some(retry)
    }

    /// Record worker activity on a task.
    ///
    /// Queued and abandoned tasks move to processing. Tasks already pending
    /// merge are left untouched.
    pub fn update_task_as_processing_by_identifier(&self, task_id: &str) -> Result<()> {
        let now = self.clock.now_micros();
        let mut state = self.lock_state();

        if let Some(task) = state.processing.get_mut(task_id) {
            task.update_processing_time_to(now);
            state.record_activity(now);
            return Ok(());
        }

        if let Some(task) = state.queued.remove(task_id) {
            debug!("Task {} is processing", task_id);
            state.start_processing(task, now);
            return Ok(());
        }

        if let Some(task) = state.abandoned.remove(task_id) {
            debug!("Task {} was abandoned but is processing again", task_id);
            state.start_processing(task, now);
            return Ok(());
        }

        if state.pending_merge.contains(task_id) {
            return Ok(());
        }

        Err(TaskManagerError::not_found(task_id, "update as processing"))
    }

    /// Move a task whose processing finished onto the pending-merge heap.
    ///
    /// `task` is the worker's copy; its result fields (storage file size,
    /// entry type, completion) are taken over by the tracked record. A
    /// validation failure leaves the task where it was.
    pub fn update_task_as_pending_merge(&self, task: &Task) -> Result<()> {
        let task_id = task.identifier();
        let now = self.clock.now_micros();
        let mut state = self.lock_state();

        let tracked = if let Some(tracked) = state.queued.get(task_id) {
            tracked
        } else if let Some(tracked) = state.processing.get(task_id) {
            tracked
        } else if let Some(tracked) = state.abandoned.get(task_id) {
            if tracked.has_retry {
                return Err(TaskManagerError::invalid_state(
                    task_id,
                    "abandoned task already has a retry and will not be merged",
                ));
            }
            tracked
        } else {
            return Err(TaskManagerError::not_found(task_id, "update as pending merge"));
        };

        let mut pending = tracked.clone();
        pending.absorb_worker_report(task);
        pending.merge_priority = Some(PendingMergeHeap::merge_weight(&pending)?);
        pending.update_processing_time_to(now);

        state.pending_merge.push(pending.clone())?;
        state.queued.remove(task_id);
        state.processing.remove(task_id);
        state.abandoned.remove(task_id);

        state.record_activity(now);
        state.sample(&pending, TaskSampleStatus::PendingMerge);

        debug!("Task {} is pending merge", task_id);
        Ok(())
    }

    /// Pop the next task to merge.
    ///
    /// With `current_task` given, nothing is returned unless the heap top has
    /// a merge priority at least as high (weight at most equal) as the task
    /// being merged.
    pub fn get_task_pending_merge(&self, current_task: Option<&Task>) -> Option<Task> {
        let mut state = self.lock_state();

        let top = state.pending_merge.peek()?;
        if let (Some(current), Some(top_weight)) = (current_task, top.merge_priority)
            && let Some(current_weight) = current.merge_priority
            && top_weight > current_weight
        {
            return None;
        }

        let task = state.pending_merge.pop()?;
        state
            .merging
            .insert(task.identifier().to_string(), task.clone());
        state.sample(&task, TaskSampleStatus::Merging);

        debug!("Task {} is merging", task.identifier());
        Some(task)
    }

    /// Stop tracking a merged task
    pub fn complete_task(&self, task: &Task) -> Result<()> {
        let mut state = self.lock_state();

        let completed = state
            .merging
            .remove(task.identifier())
            .ok_or_else(|| TaskManagerError::not_found(task.identifier(), "complete"))?;
        state.sample(&completed, TaskSampleStatus::Completed);

        debug!("Completed task {}", completed.identifier());
        Ok(())
    }

    /// Whether a processed task should be merged.
    ///
    /// Abandoned tasks that already have a retry should not; their retry
    /// carries the work.
    pub fn check_task_to_merge(&self, task: &Task) -> Result<bool> {
        let task_id = task.identifier();
        let state = self.lock_state();

        if state.queued.contains(task_id) || state.processing.contains(task_id) {
            return Ok(true);
        }

        match state.abandoned.get(task_id) {
            Some(abandoned) => Ok(!abandoned.has_retry),
            None => Err(TaskManagerError::not_found(task_id, "merge check")),
        }
    }

    /// Discard an abandoned task that has been replaced by a retry
    pub fn remove_task(&self, task: &Task) -> Result<()> {
        let task_id = task.identifier();
        let mut state = self.lock_state();

        let abandoned = state
            .abandoned
            .get(task_id)
            .ok_or_else(|| TaskManagerError::not_found(task_id, "remove"))?;
        if !abandoned.has_retry {
            return Err(TaskManagerError::invalid_state(
                task_id,
                "abandoned task has no retry yet",
            ));
        }

        if let Some(removed) = state.abandoned.remove(task_id) {
            state.sample(&removed, TaskSampleStatus::Removed);
        }

        debug!("Removed abandoned task {}", task_id);
        Ok(())
    }

    /// Abandoned tasks that were never retried
    pub fn get_failed_tasks(&self) -> Vec<Task> {
        self.lock_state()
            .abandoned
            .values()
            .filter(|task| !task.has_retry)
            .cloned()
            .collect()
    }

    /// Look up a task that is processing, queued or abandoned
    pub fn get_processed_task_by_identifier(&self, task_id: &str) -> Result<Task> {
        let state = self.lock_state();

        state
            .processing
            .get(task_id)
            .or_else(|| state.queued.get(task_id))
            .or_else(|| state.abandoned.get(task_id))
            .cloned()
            .ok_or_else(|| TaskManagerError::not_found(task_id, "processed task lookup"))
    }

    /// Names of every collection currently holding `task_id`
    #[cfg(test)]
    pub(crate) fn collections_containing(&self, task_id: &str) -> Vec<&'static str> {
        let state = self.lock_state();
        [
            ("queued", state.queued.contains(task_id)),
            ("processing", state.processing.contains(task_id)),
            ("pending_merge", state.pending_merge.contains(task_id)),
            ("merging", state.merging.contains_key(task_id)),
            ("abandoned", state.abandoned.contains(task_id)),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    pub fn get_status_information(&self) -> TasksStatus {
        self.lock_state().status()
    }

    /// Whether any work remains.
    ///
    /// Runs the inactivity sweep first: processing tasks without activity
    /// for the inactive timeout are abandoned, and when no worker has
    /// reported anything for that long the whole queue is abandoned too.
    pub fn has_pending_tasks(&self) -> bool {
        let inactive_before = self.inactive_before(self.clock.now_micros());
        let mut state = self.lock_state();

        state.abandon_inactive_processing_tasks(inactive_before);

        if !state.queued.is_empty() && state.latest_processing_time < inactive_before {
            let count = state.abandon_queued_tasks();
            warn!(
                "No worker activity for {}s, abandoned {} queued tasks",
                self.config.inactive_timeout_secs, count
            );
        }

        state.has_pending_tasks()
    }
}
