use crate::task::types::TaskId;

/// Errors returned by task manager operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskManagerError {
    /// The task is not tracked in any collection valid for the operation
    #[error("Task {task_id} is not tracked in a state valid for {operation}")]
    NotFound {
        task_id: TaskId,
        operation: &'static str,
    },

    /// The task is tracked but its state does not allow the transition
    #[error("Task {task_id} cannot transition: {reason}")]
    InvalidState { task_id: TaskId, reason: String },

    /// Data required by the operation is missing from the task
    #[error("Task {task_id} failed validation: {reason}")]
    ValidationFailed { task_id: TaskId, reason: String },
}

impl TaskManagerError {
    pub(crate) fn not_found(task_id: &str, operation: &'static str) -> Self {
        Self::NotFound {
            task_id: task_id.to_string(),
            operation,
        }
    }

    pub(crate) fn invalid_state(task_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            task_id: task_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation_failed(task_id: &str, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            task_id: task_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskManagerError>;
