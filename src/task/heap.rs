use crate::task::error::{Result, TaskManagerError};
use crate::task::types::{Task, TaskId};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Weight given to directory tasks so their metadata is never starved by a
/// backlog of small file tasks.
pub const DIRECTORY_MERGE_PRIORITY: i64 = -1;

/// Heap entry ordered by weight, then by insertion sequence
struct PendingMergeEntry {
    weight: i64,
    sequence: u64,
    task: Task,
}

impl PartialEq for PendingMergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.sequence == other.sequence
    }
}

impl Eq for PendingMergeEntry {}

impl PartialOrd for PendingMergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingMergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            // earlier pushes win for equal weights
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Tasks that finished processing, ordered by merge priority
#[derive(Default)]
pub struct PendingMergeHeap {
    heap: BinaryHeap<Reverse<PendingMergeEntry>>,
    identifiers: HashSet<TaskId>,
    next_sequence: u64,
}

impl PendingMergeHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the merge weight of a task
    pub fn merge_weight(task: &Task) -> Result<i64> {
        let size = task.storage_file_size.ok_or_else(|| {
            TaskManagerError::validation_failed(task.identifier(), "storage file size is not set")
        })?;

        if task.is_directory() {
            Ok(DIRECTORY_MERGE_PRIORITY)
        } else {
            Ok(i64::try_from(size).unwrap_or(i64::MAX))
        }
    }

    /// Push a task, storing its computed weight in `merge_priority`
    pub fn push(&mut self, mut task: Task) -> Result<()> {
        let weight = Self::merge_weight(&task)?;
        task.merge_priority = Some(weight);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.identifiers.insert(task.identifier().to_string());
        self.heap.push(Reverse(PendingMergeEntry {
            weight,
            sequence,
            task,
        }));
        Ok(())
    }

    /// The task that would be popped next
    pub fn peek(&self) -> Option<&Task> {
        self.heap.peek().map(|Reverse(entry)| &entry.task)
    }

    pub fn pop(&mut self) -> Option<Task> {
        let Reverse(entry) = self.heap.pop()?;
        self.identifiers.remove(entry.task.identifier());
        Some(entry.task)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.identifiers.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
