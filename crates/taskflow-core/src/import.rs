//! Intake for externally generated task lists.
//!
//! Generator output is fully untrusted: it passes a strict parser and then
//! the whole graph validation pipeline before any commit. Structural claims
//! (sequential ids, acyclicity) are always re-checked, and the import is
//! all-or-nothing.

use crate::error::{Result, TaskflowError};
use crate::task::Task;
use crate::types::{Priority, TaskStatus};
use serde::Deserialize;
use std::sync::mpsc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Candidate parsing
// ---------------------------------------------------------------------------

/// A raw candidate task as produced by the generation collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateTask {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// Parse a candidate list from generator JSON. Unknown fields, invalid enum
/// values, and missing required fields are all `Validation` errors.
pub fn parse_candidates(json: &str) -> Result<Vec<CandidateTask>> {
    let candidates: Vec<CandidateTask> = serde_json::from_str(json)
        .map_err(|e| TaskflowError::Validation(format!("malformed task list: {e}")))?;
    for candidate in &candidates {
        if candidate.id == 0 {
            return Err(TaskflowError::Validation(
                "task ids must be positive".to_string(),
            ));
        }
        if candidate.title.trim().is_empty() {
            return Err(TaskflowError::Validation(format!(
                "task {} has an empty title",
                candidate.id
            )));
        }
    }
    Ok(candidates)
}

/// Materialize parsed candidates into engine tasks. Statuses default to
/// pending; the graph-level checks run when the context commits them.
pub fn into_tasks(candidates: Vec<CandidateTask>) -> Vec<Task> {
    candidates
        .into_iter()
        .map(|c| {
            let mut task = Task::new(c.id, c.title);
            task.description = c.description;
            task.priority = c.priority.unwrap_or_default();
            task.dependencies = c.dependencies.into_iter().collect();
            task.acceptance_criteria = c.acceptance_criteria;
            task.status = c.status.unwrap_or(TaskStatus::Pending);
            task
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Generation collaborator
// ---------------------------------------------------------------------------

/// The external natural-language generation service. Implementations return
/// a raw JSON candidate list; the engine never trusts it unvalidated.
pub trait Generator: Send + 'static {
    fn generate(&self, prompt: &str) -> std::result::Result<String, String>;
}

/// Invoke the generator with a caller-supplied timeout. The call runs on a
/// worker thread; expiry fails with `GenerationTimeout` rather than hanging.
pub fn generate_with_timeout<G: Generator>(
    generator: G,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    let (tx, rx) = mpsc::channel();
    let prompt = prompt.to_string();
    std::thread::spawn(move || {
        let _ = tx.send(generator.generate(&prompt));
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(json)) => Ok(json),
        Ok(Err(reason)) => Err(TaskflowError::Validation(format!(
            "generation failed: {reason}"
        ))),
        Err(_) => Err(TaskflowError::GenerationTimeout(timeout.as_secs())),
    }
}

// ---------------------------------------------------------------------------
// Review checkpoint
// ---------------------------------------------------------------------------

/// A synchronous approve/edit/reject checkpoint over a generated proposal.
/// The decision is a plain value returned to the caller; the engine performs
/// no interactive I/O.
#[derive(Debug, Clone)]
pub struct Proposal<T> {
    value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    Accepted(T),
    Rejected,
}

impl<T> Proposal<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn accept(self) -> Decision<T> {
        Decision::Accepted(self.value)
    }

    pub fn edit(mut self, patch: impl FnOnce(&mut T)) -> Proposal<T> {
        patch(&mut self.value);
        self
    }

    pub fn reject(self) -> Decision<T> {
        Decision::Rejected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TagContext;

    const VALID: &str = r#"[
        {"id": 1, "title": "Set up project", "priority": "high"},
        {"id": 2, "title": "Build core", "dependencies": [1],
         "acceptance_criteria": ["compiles", "tests pass"]},
        {"id": 3, "title": "Polish", "dependencies": [2], "priority": "low"}
    ]"#;

    #[test]
    fn parses_and_commits_valid_output() {
        let candidates = parse_candidates(VALID).unwrap();
        let tasks = into_tasks(candidates);
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[1].acceptance_criteria.len(), 2);
        assert_eq!(tasks[2].status, TaskStatus::Pending);

        let mut ctx = TagContext::new("master");
        ctx.import_tasks(tasks, false).unwrap();
        ctx.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"[{"id": 1, "title": "T", "estimate": "3d"}]"#;
        assert!(matches!(
            parse_candidates(json),
            Err(TaskflowError::Validation(_))
        ));
    }

    #[test]
    fn rejects_invalid_enum_values() {
        let json = r#"[{"id": 1, "title": "T", "priority": "urgent"}]"#;
        assert!(parse_candidates(json).is_err());

        let json = r#"[{"id": 1, "title": "T", "status": "doing"}]"#;
        assert!(parse_candidates(json).is_err());
    }

    #[test]
    fn rejects_missing_title_and_zero_id() {
        assert!(parse_candidates(r#"[{"id": 1}]"#).is_err());
        assert!(parse_candidates(r#"[{"id": 1, "title": "  "}]"#).is_err());
        assert!(parse_candidates(r#"[{"id": 0, "title": "T"}]"#).is_err());
    }

    #[test]
    fn structural_claims_are_rechecked_on_commit() {
        // parses fine, but the dependency graph has a cycle
        let json = r#"[
            {"id": 1, "title": "A"},
            {"id": 2, "title": "B", "dependencies": [3]},
            {"id": 3, "title": "C", "dependencies": [2]}
        ]"#;
        let tasks = into_tasks(parse_candidates(json).unwrap());
        let mut ctx = TagContext::new("master");
        let err = ctx.import_tasks(tasks, false).unwrap_err();
        assert!(matches!(err, TaskflowError::Cycle { .. }));
        assert!(ctx.tasks.is_empty());
    }

    struct SlowGenerator;
    impl Generator for SlowGenerator {
        fn generate(&self, _prompt: &str) -> std::result::Result<String, String> {
            std::thread::sleep(Duration::from_secs(5));
            Ok("[]".to_string())
        }
    }

    struct InstantGenerator;
    impl Generator for InstantGenerator {
        fn generate(&self, _prompt: &str) -> std::result::Result<String, String> {
            Ok(r#"[{"id": 1, "title": "T"}]"#.to_string())
        }
    }

    #[test]
    fn generation_times_out_instead_of_hanging() {
        let err = generate_with_timeout(SlowGenerator, "prd", Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, TaskflowError::GenerationTimeout(_)));
    }

    #[test]
    fn generation_within_deadline_succeeds() {
        let json =
            generate_with_timeout(InstantGenerator, "prd", Duration::from_secs(1)).unwrap();
        assert_eq!(parse_candidates(&json).unwrap().len(), 1);
    }

    #[test]
    fn proposal_accept_edit_reject() {
        let proposal = Proposal::new(vec![1, 2, 3]);
        assert_eq!(proposal.clone().accept(), Decision::Accepted(vec![1, 2, 3]));
        assert_eq!(
            proposal.clone().edit(|v| v.push(4)).accept(),
            Decision::Accepted(vec![1, 2, 3, 4])
        );
        assert_eq!(proposal.reject(), Decision::Rejected::<Vec<i32>>);
    }
}
