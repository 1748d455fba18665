use crate::error::{Result, TaskflowError};
use crate::types::{Priority, SubtaskStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Subtask
// ---------------------------------------------------------------------------

/// A subtask numbered sequentially within its parent. Rendered ids take the
/// form `<parentId>.<n>` with `n` starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub n: u32,
    pub title: String,
    pub status: SubtaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(n: u32, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            n,
            title: title.into(),
            status: SubtaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn render_id(&self, parent: u32) -> String {
        format!("{}.{}", parent, self.n)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Positive integer, unique within its tag context; contexts hold
    /// exactly ids 1..N with no gaps.
    pub id: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred_reason: Option<String>,
}

impl Task {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            dependencies: BTreeSet::new(),
            subtasks: Vec::new(),
            acceptance_criteria: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            blocked_at: None,
            blocked_reason: None,
            deferred_at: None,
            deferred_reason: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a subtask with the next sequential number.
    pub fn add_subtask(&mut self, title: impl Into<String>) -> u32 {
        let n = self.subtasks.last().map(|s| s.n).unwrap_or(0) + 1;
        self.subtasks.push(Subtask::new(n, title));
        self.touch();
        n
    }

    pub fn subtask(&self, n: u32) -> Result<&Subtask> {
        self.subtasks
            .iter()
            .find(|s| s.n == n)
            .ok_or(TaskflowError::SubtaskNotFound { parent: self.id, n })
    }

    pub fn subtask_mut(&mut self, n: u32) -> Result<&mut Subtask> {
        let parent = self.id;
        self.subtasks
            .iter_mut()
            .find(|s| s.n == n)
            .ok_or(TaskflowError::SubtaskNotFound { parent, n })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtask_numbering_is_sequential() {
        let mut task = Task::new(3, "Parent");
        assert_eq!(task.add_subtask("first"), 1);
        assert_eq!(task.add_subtask("second"), 2);
        assert_eq!(task.add_subtask("third"), 3);
        assert_eq!(task.subtasks[2].render_id(task.id), "3.3");
    }

    #[test]
    fn subtask_lookup() {
        let mut task = Task::new(1, "Parent");
        task.add_subtask("only");
        assert_eq!(task.subtask(1).unwrap().title, "only");
        assert!(matches!(
            task.subtask(9),
            Err(TaskflowError::SubtaskNotFound { parent: 1, n: 9 })
        ));
    }

    #[test]
    fn new_task_defaults() {
        let task = Task::new(1, "T");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.dependencies.is_empty());
        assert!(task.started_at.is_none());
    }
}
