use crate::selector::BlockedCandidate;
use crate::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskflowError {
    #[error("not initialized: run 'taskflow init'")]
    NotInitialized,

    #[error("invalid tag name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidTagName(String),

    #[error("tag already exists: {0}")]
    DuplicateTag(String),

    #[error("tag '{0}' is protected and cannot be deleted")]
    ProtectedTag(String),

    #[error("tag '{0}' is currently active and cannot be deleted")]
    ActiveTag(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(u32),

    #[error("subtask not found: {parent}.{n}")]
    SubtaskNotFound { parent: u32, n: u32 },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority '{0}': expected high, medium, or low")]
    InvalidPriority(String),

    #[error("invalid task set: {0}")]
    Validation(String),

    #[error("unresolved dependencies: {}", fmt_dangling(.refs))]
    DanglingDependencies { refs: Vec<(u32, u32)> },

    #[error("dependency cycle: {}", fmt_cycle(.path))]
    Cycle { path: Vec<u32> },

    #[error("no entry point: every task has at least one dependency")]
    NoEntryPoint,

    #[error("invalid transition from {from} to {to} (allowed: {})", fmt_statuses(.allowed))]
    InvalidTransition {
        from: TaskStatus,
        to: TaskStatus,
        allowed: Vec<TaskStatus>,
    },

    #[error("a reason is required when blocking a task")]
    MissingReason,

    #[error("task {task} has incomplete subtasks: {}", .pending.join(", "))]
    IncompleteSubtasks { task: u32, pending: Vec<String> },

    /// A terminal report, not a fault: every remaining candidate is waiting
    /// on unmet dependencies (or no candidates remain at all).
    #[error("no actionable task ({} candidates waiting on dependencies)", .blocked.len())]
    NoActionableTask { blocked: Vec<BlockedCandidate> },

    #[error("all candidate tasks have been skipped")]
    ExhaustedSkips,

    #[error("task generation timed out after {0}s")]
    GenerationTimeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaskflowError>;

fn fmt_dangling(refs: &[(u32, u32)]) -> String {
    refs.iter()
        .map(|(task, dep)| format!("task {task} -> {dep}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_cycle(path: &[u32]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn fmt_statuses(statuses: &[TaskStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
