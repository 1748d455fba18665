//! Task status state machine.
//!
//! A `blocked` status records an external/manual block and is independent of
//! dependency satisfaction: the selector treats a blocked task with completed
//! dependencies as selectable without mutating its stored status.

use crate::aggregate;
use crate::error::{Result, TaskflowError};
use crate::task::Task;
use crate::types::TaskStatus;
use chrono::Utc;

/// Legal transitions out of each status.
pub fn allowed_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    match from {
        TaskStatus::Pending => &[
            TaskStatus::InProgress,
            TaskStatus::Deferred,
            TaskStatus::Cancelled,
        ],
        TaskStatus::InProgress => &[
            TaskStatus::Done,
            TaskStatus::Blocked,
            TaskStatus::Deferred,
            TaskStatus::Pending,
            TaskStatus::Cancelled,
        ],
        TaskStatus::Blocked => &[
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Cancelled,
        ],
        TaskStatus::Deferred => &[TaskStatus::Pending, TaskStatus::Cancelled],
        TaskStatus::Done | TaskStatus::Cancelled => &[],
    }
}

/// Transitions out of terminal states permitted only with `force=true`.
pub fn force_transitions(from: TaskStatus) -> &'static [TaskStatus] {
    match from {
        TaskStatus::Done => &[TaskStatus::Pending, TaskStatus::InProgress],
        TaskStatus::Cancelled => &[TaskStatus::Pending],
        _ => &[],
    }
}

/// Attempt a status transition, stamping the status-specific timestamps.
///
/// `note` is required when entering `blocked` (the block reason) and optional
/// when entering `deferred`. `force` permits leaving a terminal state and
/// bypasses the incomplete-subtask check when completing a parent; callers
/// must surface it as an explicit confirmation, never apply it silently.
pub fn apply_transition(
    task: &mut Task,
    to: TaskStatus,
    note: Option<&str>,
    force: bool,
) -> Result<()> {
    let from = task.status;
    let allowed = allowed_transitions(from);

    if !allowed.contains(&to) && !(force && force_transitions(from).contains(&to)) {
        return Err(TaskflowError::InvalidTransition {
            from,
            to,
            allowed: allowed.to_vec(),
        });
    }

    if to == TaskStatus::Blocked && note.map_or(true, |n| n.trim().is_empty()) {
        return Err(TaskflowError::MissingReason);
    }

    if to == TaskStatus::Done {
        aggregate::ensure_subtasks_done(task, force)?;
    }

    let now = Utc::now();
    match to {
        TaskStatus::InProgress => {
            // stamped only on the first entry
            if task.started_at.is_none() {
                task.started_at = Some(now);
            }
        }
        TaskStatus::Done => {
            task.completed_at = Some(now);
        }
        TaskStatus::Blocked => {
            task.blocked_at = Some(now);
            task.blocked_reason = note.map(|n| n.trim().to_string());
        }
        TaskStatus::Deferred => {
            task.deferred_at = Some(now);
            task.deferred_reason = note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
        }
        TaskStatus::Pending | TaskStatus::Cancelled => {}
    }

    task.status = to;
    task.updated_at = now;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
