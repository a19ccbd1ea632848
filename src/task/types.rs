use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tasks (UUID v4 in simple hex form)
pub type TaskId = String;

/// Identifier of the processing session a task belongs to
pub type SessionId = String;

/// Current time in microseconds since the UNIX epoch
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// Type of the file entry a task extracts from
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileEntryType {
    File,
    Directory,
    Link,
    Device,
    Pipe,
    Socket,
}

/// Storage format of a task's intermediate results.
///
/// The coordinator stamps this onto created tasks and copies it to retries
/// but never interprets it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Sqlite,
    Redis,
}

/// One unit of extraction work tracked by the task manager
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Task {
    identifier: TaskId,
    pub session_identifier: SessionId,
    pub storage_format: StorageFormat,
    /// Size in bytes of the intermediate result, reported once processing finishes
    pub storage_file_size: Option<u64>,
    pub file_entry_type: Option<FileEntryType>,
    /// Location of the source data this task extracts from
    pub path_spec: Option<String>,
    /// Weight assigned when the task enters the pending-merge heap, lower merges first
    pub merge_priority: Option<i64>,
    /// Microseconds since epoch of the last reported worker activity
    pub last_processing_time: Option<i64>,
    pub has_retry: bool,
    pub start_time: i64,
    pub completion_time: Option<i64>,
    pub aborted: bool,
}

/// Marker emitted when a worker starts on a task
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskStart {
    pub identifier: TaskId,
    pub session_identifier: SessionId,
    pub timestamp: i64,
}

/// Marker emitted when a worker finishes (or aborts) a task
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskCompletion {
    pub identifier: TaskId,
    pub session_identifier: SessionId,
    pub timestamp: i64,
    pub aborted: bool,
}

impl Task {
    /// Create a new task for the given session
    pub fn new(session_identifier: impl Into<SessionId>) -> Self {
        Self {
            identifier: Uuid::new_v4().simple().to_string(),
            session_identifier: session_identifier.into(),
            storage_format: StorageFormat::default(),
            storage_file_size: None,
            file_entry_type: None,
            path_spec: None,
            merge_priority: None,
            last_processing_time: None,
            has_retry: false,
            start_time: now_micros(),
            completion_time: None,
            aborted: false,
        }
    }

    /// Set the storage format
    pub fn with_storage_format(mut self, storage_format: StorageFormat) -> Self {
        self.storage_format = storage_format;
        self
    }

    /// Set the start time (microseconds since epoch)
    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = start_time;
        self
    }

    /// Set the source location
    pub fn with_path_spec(mut self, path_spec: impl Into<String>) -> Self {
        self.path_spec = Some(path_spec.into());
        self
    }

    /// Set the file entry type
    pub fn with_file_entry_type(mut self, file_entry_type: FileEntryType) -> Self {
        self.file_entry_type = Some(file_entry_type);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_directory(&self) -> bool {
        self.file_entry_type == Some(FileEntryType::Directory)
    }

    /// Mark the task as seen by a worker right now
    pub fn update_processing_time(&mut self) {
        self.update_processing_time_to(now_micros());
    }

    /// Mark the task as seen by a worker at `timestamp`
    pub fn update_processing_time_to(&mut self, timestamp: i64) {
        self.last_processing_time = Some(timestamp);
    }

    /// Create a task that redoes the work of this one.
    ///
    /// The retry gets a fresh identifier. This task is flagged with
    /// `has_retry` so it is never retried twice.
    pub fn create_retry_task(&mut self) -> Task {
        let mut retry = Task::new(self.session_identifier.clone())
            .with_storage_format(self.storage_format);
        retry.file_entry_type = self.file_entry_type;
        retry.path_spec = self.path_spec.clone();
        retry.storage_file_size = self.storage_file_size;
        retry.merge_priority = self.merge_priority;

        self.has_retry = true;
        retry
    }

    pub fn create_task_start(&self) -> TaskStart {
        TaskStart {
            identifier: self.identifier.clone(),
            session_identifier: self.session_identifier.clone(),
            timestamp: self.start_time,
        }
    }

    /// Create a completion marker, stamping the completion time if unset
    pub fn create_task_completion(&mut self) -> TaskCompletion {
        let timestamp = *self.completion_time.get_or_insert_with(now_micros);
        TaskCompletion {
            identifier: self.identifier.clone(),
            session_identifier: self.session_identifier.clone(),
            timestamp,
            aborted: self.aborted,
        }
    }

    /// Take over the result fields a worker reported on its copy of this task.
    ///
    /// Lifecycle fields (`has_retry`, timestamps, merge priority) stay with the
    /// tracked record.
    pub(crate) fn absorb_worker_report(&mut self, reported: &Task) {
        if reported.storage_file_size.is_some() {
            self.storage_file_size = reported.storage_file_size;
        }
        if reported.file_entry_type.is_some() {
            self.file_entry_type = reported.file_entry_type;
        }
        if reported.completion_time.is_some() {
            self.completion_time = reported.completion_time;
        }
        self.aborted |= reported.aborted;
    }
}
