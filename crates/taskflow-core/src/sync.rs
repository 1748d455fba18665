//! External issue-tracker notification seam.
//!
//! Adapters are notified after a status change has committed locally; an
//! adapter failure is surfaced to the caller as a warning and never rolls
//! back the local transition.

use crate::types::TaskStatus;

pub trait TrackerSync {
    fn notify(
        &self,
        tag: &str,
        task_id: u32,
        from: TaskStatus,
        to: TaskStatus,
    ) -> std::result::Result<(), String>;
}

/// Default adapter: no external tracker configured.
pub struct NoopSync;

impl TrackerSync for NoopSync {
    fn notify(
        &self,
        _tag: &str,
        _task_id: u32,
        _from: TaskStatus,
        _to: TaskStatus,
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Outcome of a committed transition plus any post-commit warnings.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub warning: Option<String>,
}

pub fn notify_after_commit(
    sync: &dyn TrackerSync,
    tag: &str,
    task_id: u32,
    from: TaskStatus,
    to: TaskStatus,
) -> SyncOutcome {
    match sync.notify(tag, task_id, from, to) {
        Ok(()) => SyncOutcome::default(),
        Err(reason) => SyncOutcome {
            warning: Some(format!("issue tracker sync failed: {reason}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSync;
    impl TrackerSync for FailingSync {
        fn notify(
            &self,
            _tag: &str,
            _task_id: u32,
            _from: TaskStatus,
            _to: TaskStatus,
        ) -> std::result::Result<(), String> {
            Err("503 from tracker".to_string())
        }
    }

    #[test]
    fn failure_becomes_a_warning() {
        let outcome = notify_after_commit(
            &FailingSync,
            "master",
            1,
            TaskStatus::InProgress,
            TaskStatus::Done,
        );
        assert!(outcome.warning.unwrap().contains("503"));
    }

    #[test]
    fn noop_sync_is_silent() {
        let outcome = notify_after_commit(
            &NoopSync,
            "master",
            1,
            TaskStatus::Pending,
            TaskStatus::InProgress,
        );
        assert!(outcome.warning.is_none());
    }
}
