//! Subtask / parent aggregation.
//!
//! Parent completion is never applied automatically: completing the last
//! subtask only emits a signal so the caller can confirm closing the parent.

use crate::error::{Result, TaskflowError};
use crate::task::Task;
use crate::types::SubtaskStatus;
use chrono::Utc;

/// Emitted by subtask mutations so callers can react to parent completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskSignal {
    None,
    /// Every subtask of the parent is now `done`.
    AllSubtasksComplete,
}

/// Reject completing a parent while any subtask is unfinished, unless the
/// caller supplied an explicit force override. A parent with zero subtasks
/// transitions independently.
pub fn ensure_subtasks_done(task: &Task, force: bool) -> Result<()> {
    if task.subtasks.is_empty() || force {
        return Ok(());
    }
    let pending: Vec<String> = task
        .subtasks
        .iter()
        .filter(|s| s.status != SubtaskStatus::Done)
        .map(|s| s.render_id(task.id))
        .collect();
    if pending.is_empty() {
        Ok(())
    } else {
        Err(TaskflowError::IncompleteSubtasks {
            task: task.id,
            pending,
        })
    }
}

/// Set a subtask's status, returning `AllSubtasksComplete` when this was the
/// last unfinished subtask of the parent.
pub fn set_subtask_status(
    task: &mut Task,
    n: u32,
    status: SubtaskStatus,
) -> Result<SubtaskSignal> {
    let subtask = task.subtask_mut(n)?;
    subtask.status = status;
    subtask.updated_at = Utc::now();
    task.touch();

    if status == SubtaskStatus::Done
        && task.subtasks.iter().all(|s| s.status == SubtaskStatus::Done)
    {
        Ok(SubtaskSignal::AllSubtasksComplete)
    } else {
        Ok(SubtaskSignal::None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
