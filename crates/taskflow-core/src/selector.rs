//! Next-actionable-task selection.
//!
//! Candidates are pending or blocked tasks whose dependencies are all done;
//! a `blocked` status marks an external/manual block and does not disqualify
//! a task once its dependencies complete. Ranking is priority weight, then
//! blocking factor (how many tasks this one unblocks), then id. The order is
//! total, so selection is deterministic for a given task set and skip set.

use crate::context::TagContext;
use crate::error::{Result, TaskflowError};
use crate::graph::{self, DependencyGraph};
use crate::types::{Priority, SubtaskStatus, TaskStatus};
use serde::Serialize;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// The unit of work the selector recommends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkUnit {
    Task { id: u32 },
    Subtask { parent: u32, n: u32 },
}

impl WorkUnit {
    pub fn render_id(&self) -> String {
        match self {
            WorkUnit::Task { id } => id.to_string(),
            WorkUnit::Subtask { parent, n } => format!("{parent}.{n}"),
        }
    }
}

/// One entry of the ranked alternative list.
#[derive(Debug, Clone, Serialize)]
pub struct RankedTask {
    pub id: u32,
    pub title: String,
    pub priority: Priority,
    pub blocking_factor: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub unit: WorkUnit,
    /// All actionable tasks in rank order (the chosen one first).
    pub ranked: Vec<RankedTask>,
    /// The skip set in force, echoed back to support "skip, show next".
    pub skipped: BTreeSet<u32>,
    /// Tasks currently in progress; reported, never silently resolved.
    pub in_progress: Vec<u32>,
}

/// A non-actionable candidate and the unmet dependencies holding it, with
/// their current statuses, for rendering a blocking chain.
#[derive(Debug, Clone, Serialize)]
pub struct BlockedCandidate {
    pub id: u32,
    pub unmet: Vec<(u32, TaskStatus)>,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub fn select_next(ctx: &TagContext, skip: &BTreeSet<u32>) -> Result<Selection> {
    let graph = DependencyGraph::build(&ctx.tasks)?;

    let eligible: Vec<&crate::task::Task> = ctx
        .tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Blocked))
        .collect();

    if !eligible.is_empty() && eligible.iter().all(|t| skip.contains(&t.id)) {
        return Err(TaskflowError::ExhaustedSkips);
    }

    let candidates: Vec<&crate::task::Task> = eligible
        .iter()
        .copied()
        .filter(|t| !skip.contains(&t.id))
        .collect();

    let (actionable, waiting): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|t| graph::is_satisfied(t, |id| ctx.status_of(id)));

    if actionable.is_empty() {
        let blocked = waiting
            .iter()
            .map(|t| BlockedCandidate {
                id: t.id,
                unmet: t
                    .dependencies
                    .iter()
                    .filter_map(|&dep| {
                        ctx.status_of(dep)
                            .filter(|&s| s != TaskStatus::Done)
                            .map(|s| (dep, s))
                    })
                    .collect(),
            })
            .collect();
        return Err(TaskflowError::NoActionableTask { blocked });
    }

    let mut ranked: Vec<RankedTask> = actionable
        .iter()
        .map(|t| RankedTask {
            id: t.id,
            title: t.title.clone(),
            priority: t.priority,
            blocking_factor: graph.blocking_factor(t.id),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then(b.blocking_factor.cmp(&a.blocking_factor))
            .then(a.id.cmp(&b.id))
    });

    // Recurse one level into the top task's subtasks: the first pending one
    // wins; a parent whose subtasks are all past pending is exhausted for
    // selection and the next-ranked task takes over.
    let mut unit = None;
    for entry in &ranked {
        let task = ctx.task(entry.id)?;
        if task.subtasks.is_empty() {
            unit = Some(WorkUnit::Task { id: task.id });
            break;
        }
        if let Some(sub) = task
            .subtasks
            .iter()
            .find(|s| s.status == SubtaskStatus::Pending)
        {
            unit = Some(WorkUnit::Subtask {
                parent: task.id,
                n: sub.n,
            });
            break;
        }
    }

    let unit = match unit {
        Some(u) => u,
        // every actionable parent's subtasks are exhausted
        None => {
            return Err(TaskflowError::NoActionableTask { blocked: vec![] });
        }
    };

    Ok(Selection {
        unit,
        ranked,
        skipped: skip.clone(),
        in_progress: ctx.in_progress_ids(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn ctx_from(tasks: Vec<Task>) -> TagContext {
        let mut ctx = TagContext::new("master");
        ctx.import_tasks(tasks, false).unwrap();
        ctx
    }

    fn task(id: u32, deps: &[u32]) -> Task {
        let mut t = Task::new(id, format!("Task {id}"));
        t.dependencies = deps.iter().copied().collect();
        t
    }

    fn chain() -> TagContext {
        ctx_from(vec![task(1, &[]), task(2, &[1]), task(3, &[2])])
    }

    #[test]
    fn picks_the_entry_point_of_a_chain() {
        let selection = select_next(&chain(), &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 1 });
    }

    #[test]
    fn advances_once_dependency_completes() {
        let mut ctx = chain();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Done, None, false).unwrap();

        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 2 });
        // task 3 still unsatisfied, so it is not in the ranked list
        assert!(selection.ranked.iter().all(|r| r.id != 3));
    }

    #[test]
    fn higher_priority_wins() {
        let mut ctx = chain();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Done, None, false).unwrap();
        ctx.set_status(2, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(2, TaskStatus::Done, None, false).unwrap();
        ctx.set_status(3, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(3, TaskStatus::Done, None, false).unwrap();

        let hi = ctx
            .add_task("urgent", None, Priority::High, BTreeSet::new())
            .unwrap();
        ctx.add_task("routine", None, Priority::Medium, BTreeSet::new())
            .unwrap();

        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: hi });
    }

    #[test]
    fn blocking_factor_breaks_priority_ties() {
        // 1 and 2 both high priority, no deps; 2 unblocks two others
        let mut t1 = task(1, &[]);
        t1.priority = Priority::High;
        let mut t2 = task(2, &[]);
        t2.priority = Priority::High;
        let ctx = ctx_from(vec![t1, t2, task(3, &[2]), task(4, &[2])]);

        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 2 });
        assert_eq!(selection.ranked[0].blocking_factor, 2);
    }

    #[test]
    fn id_is_the_final_tiebreak_and_selection_is_deterministic() {
        let mut t1 = task(1, &[]);
        t1.priority = Priority::High;
        let mut t2 = task(2, &[]);
        t2.priority = Priority::High;
        let ctx = ctx_from(vec![t1, t2]);

        for _ in 0..5 {
            let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
            assert_eq!(selection.unit, WorkUnit::Task { id: 1 });
        }
    }

    #[test]
    fn manual_block_does_not_disqualify_once_deps_complete() {
        let mut ctx = chain();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Done, None, false).unwrap();
        ctx.set_status(2, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(2, TaskStatus::Blocked, Some("waiting on review"), false)
            .unwrap();

        // stored status stays blocked, but it is selectable
        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 2 });
        assert_eq!(ctx.status_of(2), Some(TaskStatus::Blocked));
    }

    #[test]
    fn skip_moves_to_the_next_ranked_task() {
        let mut ctx = chain();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Done, None, false).unwrap();
        ctx.add_task("parallel", None, Priority::Low, BTreeSet::new())
            .unwrap();

        let skip: BTreeSet<u32> = [2].into_iter().collect();
        let selection = select_next(&ctx, &skip).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 4 });
        assert_eq!(selection.skipped, skip);
    }

    #[test]
    fn exhausting_all_candidates_via_skips() {
        let ctx = chain();
        let skip: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        assert!(matches!(
            select_next(&ctx, &skip),
            Err(TaskflowError::ExhaustedSkips)
        ));
    }

    #[test]
    fn no_actionable_task_reports_blocking_chain() {
        let mut ctx = chain();
        let skip: BTreeSet<u32> = [1].into_iter().collect();
        ctx.set_status(1, TaskStatus::Deferred, None, false).unwrap();

        match select_next(&ctx, &skip) {
            Err(TaskflowError::NoActionableTask { blocked }) => {
                assert_eq!(blocked.len(), 2);
                let b2 = blocked.iter().find(|b| b.id == 2).unwrap();
                assert_eq!(b2.unmet, vec![(1, TaskStatus::Deferred)]);
                let b3 = blocked.iter().find(|b| b.id == 3).unwrap();
                assert_eq!(b3.unmet, vec![(2, TaskStatus::Pending)]);
            }
            other => panic!("expected no actionable task, got {other:?}"),
        }
    }

    #[test]
    fn recurses_into_first_pending_subtask() {
        let mut ctx = chain();
        ctx.expand_task(1, &["design".to_string(), "build".to_string()])
            .unwrap();

        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Subtask { parent: 1, n: 1 });
        assert_eq!(selection.unit.render_id(), "1.1");

        ctx.set_subtask_status(1, 1, SubtaskStatus::Done).unwrap();
        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Subtask { parent: 1, n: 2 });
    }

    #[test]
    fn exhausted_parent_falls_back_to_next_ranked() {
        let mut ctx = ctx_from(vec![task(1, &[]), task(2, &[])]);
        ctx.expand_task(1, &["only".to_string()]).unwrap();
        ctx.set_subtask_status(1, 1, SubtaskStatus::InProgress).unwrap();

        // task 1 ranks first but its only subtask is past pending
        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.unit, WorkUnit::Task { id: 2 });
    }

    #[test]
    fn multiple_in_progress_tasks_are_reported() {
        let mut ctx = ctx_from(vec![task(1, &[]), task(2, &[]), task(3, &[])]);
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(2, TaskStatus::InProgress, None, false).unwrap();

        let selection = select_next(&ctx, &BTreeSet::new()).unwrap();
        assert_eq!(selection.in_progress, vec![1, 2]);
    }
}
