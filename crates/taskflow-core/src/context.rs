//! A tag context: one isolated, persisted task collection with its own id
//! space. Contexts are YAML documents under `.taskflow/tags/`.
//!
//! Every bulk mutation (import, append, add, copy) re-runs the full graph
//! validation before committing; mutations that fail leave the in-memory
//! context untouched.

use crate::aggregate::{self, SubtaskSignal};
use crate::error::{Result, TaskflowError};
use crate::graph;
use crate::paths;
use crate::task::Task;
use crate::transition;
use crate::types::{SubtaskStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ---------------------------------------------------------------------------
// TagSummary
// ---------------------------------------------------------------------------

/// Per-tag status counts, recomputed after every committed mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub deferred: usize,
    pub cancelled: usize,
}

// ---------------------------------------------------------------------------
// CopyFilter
// ---------------------------------------------------------------------------

/// Selects which tasks a tag copy carries over. An empty filter matches all.
#[derive(Debug, Clone, Default)]
pub struct CopyFilter {
    pub statuses: Option<Vec<TaskStatus>>,
    pub ids: Option<BTreeSet<u32>>,
}

impl CopyFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&task.id) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// TagContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagContext {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_doc_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TagContext {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            tag_name: name.into(),
            description: None,
            source_doc_ref: None,
            source_branch: None,
            created: now,
            updated: now,
            tasks: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path, name: &str) -> Result<Self> {
        let path = paths::tag_file(root, name);
        if !path.exists() {
            return Err(TaskflowError::TagNotFound(name.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let ctx: TagContext = serde_yaml::from_str(&data)?;
        // a hand-edited or corrupted document fails here, not at first use
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::tag_file(root, &self.tag_name);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------------

    pub fn task(&self, id: u32) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or(TaskflowError::TaskNotFound(id))
    }

    pub fn task_mut(&mut self, id: u32) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskflowError::TaskNotFound(id))
    }

    pub fn status_of(&self, id: u32) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.status)
    }

    fn next_id(&self) -> u32 {
        self.tasks.len() as u32 + 1
    }

    // ---------------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------------

    /// Full pipeline over the owned task set: sequential ids 1..N, dangling
    /// dependencies, acyclicity, entry-point existence.
    pub fn validate(&self) -> Result<graph::DependencyGraph> {
        ensure_sequential_ids(&self.tasks)?;
        graph::validate(&self.tasks)
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    /// Commit a validated candidate set. With `append=false` the context must
    /// be empty; with `append=true` the candidates are renumbered to continue
    /// from the current highest id and their internal dependencies shifted.
    /// The whole import succeeds or the whole import is rejected.
    pub fn import_tasks(&mut self, candidates: Vec<Task>, append: bool) -> Result<()> {
        if !append && !self.tasks.is_empty() {
            return Err(TaskflowError::Validation(format!(
                "tag '{}' already holds {} tasks; use append",
                self.tag_name,
                self.tasks.len()
            )));
        }

        let offset = if append { self.tasks.len() as u32 } else { 0 };
        ensure_sequential_ids(&candidates)?;
        graph::validate(&candidates)?;

        let mut combined = self.tasks.clone();
        for mut task in candidates {
            task.id += offset;
            task.dependencies = task.dependencies.iter().map(|d| d + offset).collect();
            combined.push(task);
        }

        ensure_sequential_ids(&combined)?;
        graph::validate(&combined)?;

        self.tasks = combined;
        self.touch();
        Ok(())
    }

    /// Append a single task with the next sequential id, re-validating the
    /// graph immediately. On failure nothing is committed.
    pub fn add_task(
        &mut self,
        title: impl Into<String>,
        description: Option<String>,
        priority: crate::types::Priority,
        dependencies: BTreeSet<u32>,
    ) -> Result<u32> {
        let id = self.next_id();
        let mut task = Task::new(id, title);
        task.description = description;
        task.priority = priority;
        task.dependencies = dependencies;

        let mut candidate = self.tasks.clone();
        candidate.push(task);
        ensure_sequential_ids(&candidate)?;
        graph::validate(&candidate)?;

        self.tasks = candidate;
        self.touch();
        Ok(id)
    }

    /// Expand a task into subtasks, numbered sequentially after any existing
    /// ones. Subtasks carry no dependency edges of their own (they order only
    /// against the parent's completion), so expansion cannot introduce cycles.
    pub fn expand_task(&mut self, id: u32, titles: &[String]) -> Result<Vec<u32>> {
        let task = self.task_mut(id)?;
        let ns = titles.iter().map(|t| task.add_subtask(t.clone())).collect();
        self.touch();
        Ok(ns)
    }

    /// Run the status state machine against one task.
    pub fn set_status(
        &mut self,
        id: u32,
        to: TaskStatus,
        note: Option<&str>,
        force: bool,
    ) -> Result<()> {
        let task = self.task_mut(id)?;
        transition::apply_transition(task, to, note, force)?;
        self.touch();
        Ok(())
    }

    /// Set a subtask's status; surfaces the aggregation signal to the caller.
    pub fn set_subtask_status(
        &mut self,
        parent: u32,
        n: u32,
        status: SubtaskStatus,
    ) -> Result<SubtaskSignal> {
        let task = self.task_mut(parent)?;
        let signal = aggregate::set_subtask_status(task, n, status)?;
        self.touch();
        Ok(signal)
    }

    // ---------------------------------------------------------------------------
    // Copy
    // ---------------------------------------------------------------------------

    /// Tasks carried over by a tag copy: matching tasks are renumbered
    /// contiguously and their dependencies remapped; dependencies on tasks
    /// the filter excluded are dropped. The source is never modified.
    pub fn copy_tasks(&self, filter: Option<&CopyFilter>) -> Vec<Task> {
        let selected: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| filter.map_or(true, |f| f.matches(t)))
            .collect();
        let remap: BTreeMap<u32, u32> = selected
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i as u32 + 1))
            .collect();
        selected
            .into_iter()
            .map(|t| {
                let mut task = t.clone();
                task.id = remap[&t.id];
                task.dependencies = t
                    .dependencies
                    .iter()
                    .filter_map(|d| remap.get(d).copied())
                    .collect();
                task
            })
            .collect()
    }

    // ---------------------------------------------------------------------------
    // Summary
    // ---------------------------------------------------------------------------

    pub fn summary(&self) -> TagSummary {
        let mut summary = TagSummary {
            total: self.tasks.len(),
            ..TagSummary::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Done => summary.done += 1,
                TaskStatus::Blocked => summary.blocked += 1,
                TaskStatus::Deferred => summary.deferred += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn in_progress_ids(&self) -> Vec<u32> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .map(|t| t.id)
            .collect()
    }

    fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

/// Ids within one context must be exactly 1..N with no gaps or duplicates.
pub fn ensure_sequential_ids(tasks: &[Task]) -> Result<()> {
    for (i, task) in tasks.iter().enumerate() {
        let expected = i as u32 + 1;
        if task.id != expected {
            return Err(TaskflowError::Validation(format!(
                "task ids must be exactly 1..{} in order; found {} at position {}",
                tasks.len(),
                task.id,
                expected
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use tempfile::TempDir;

    fn candidate(id: u32, deps: &[u32]) -> Task {
        let mut t = Task::new(id, format!("Task {id}"));
        t.dependencies = deps.iter().copied().collect();
        t
    }

    fn imported() -> TagContext {
        let mut ctx = TagContext::new("master");
        ctx.import_tasks(
            vec![candidate(1, &[]), candidate(2, &[1]), candidate(3, &[2])],
            false,
        )
        .unwrap();
        ctx
    }

    #[test]
    fn import_commits_valid_set() {
        let ctx = imported();
        assert_eq!(ctx.tasks.len(), 3);
        ctx.validate().unwrap();
    }

    #[test]
    fn import_rejects_cycle_atomically() {
        let mut ctx = TagContext::new("master");
        let err = ctx
            .import_tasks(
                vec![candidate(1, &[]), candidate(2, &[3]), candidate(3, &[2])],
                false,
            )
            .unwrap_err();
        assert!(matches!(err, TaskflowError::Cycle { .. }));
        assert!(ctx.tasks.is_empty(), "nothing may partially commit");
    }

    #[test]
    fn import_rejects_gapped_ids() {
        let mut ctx = TagContext::new("master");
        let err = ctx
            .import_tasks(vec![candidate(1, &[]), candidate(3, &[])], false)
            .unwrap_err();
        assert!(matches!(err, TaskflowError::Validation(_)));
        assert!(ctx.tasks.is_empty());
    }

    #[test]
    fn import_rejects_dangling_deps() {
        let mut ctx = TagContext::new("master");
        let err = ctx
            .import_tasks(vec![candidate(1, &[9])], false)
            .unwrap_err();
        assert!(matches!(
            err,
            TaskflowError::DanglingDependencies { .. }
        ));
    }

    #[test]
    fn import_into_populated_context_requires_append() {
        let mut ctx = imported();
        let err = ctx
            .import_tasks(vec![candidate(1, &[])], false)
            .unwrap_err();
        assert!(matches!(err, TaskflowError::Validation(_)));
        assert_eq!(ctx.tasks.len(), 3);
    }

    #[test]
    fn append_renumbers_and_shifts_deps() {
        let mut ctx = imported();
        ctx.import_tasks(vec![candidate(1, &[]), candidate(2, &[1])], true)
            .unwrap();
        assert_eq!(ctx.tasks.len(), 5);
        assert_eq!(ctx.tasks[3].id, 4);
        assert_eq!(ctx.tasks[4].id, 5);
        assert_eq!(ctx.tasks[4].dependencies, [4].into_iter().collect());
        ctx.validate().unwrap();
    }

    #[test]
    fn add_task_revalidates_and_rolls_back() {
        let mut ctx = imported();
        let id = ctx
            .add_task("New", None, Priority::High, [1].into_iter().collect())
            .unwrap();
        assert_eq!(id, 4);

        let err = ctx
            .add_task("Bad", None, Priority::Low, [99].into_iter().collect())
            .unwrap_err();
        assert!(matches!(
            err,
            TaskflowError::DanglingDependencies { .. }
        ));
        assert_eq!(ctx.tasks.len(), 4, "failed add must not commit");
    }

    #[test]
    fn expand_creates_sequential_subtasks() {
        let mut ctx = imported();
        let ns = ctx
            .expand_task(2, &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(ns, vec![1, 2]);
        let more = ctx.expand_task(2, &["c".to_string()]).unwrap();
        assert_eq!(more, vec![3]);
        assert!(ctx.expand_task(42, &["x".to_string()]).is_err());
    }

    #[test]
    fn save_load_roundtrip_is_lossless() {
        let dir = TempDir::new().unwrap();
        let mut ctx = imported();
        ctx.description = Some("mainline".to_string());
        ctx.source_doc_ref = Some("docs/prd.md".to_string());
        ctx.expand_task(1, &["sub".to_string()]).unwrap();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Blocked, Some("infra down"), false)
            .unwrap();
        ctx.save(dir.path()).unwrap();

        let loaded = TagContext::load(dir.path(), "master").unwrap();
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        assert_eq!(loaded.tasks.len(), ctx.tasks.len());
        assert_eq!(loaded.tasks[0].subtasks.len(), 1);
        assert_eq!(loaded.tasks[0].status, TaskStatus::Blocked);
        assert_eq!(loaded.tasks[0].blocked_reason.as_deref(), Some("infra down"));
        assert_eq!(loaded.tasks[0].started_at, ctx.tasks[0].started_at);
        assert_eq!(loaded.tasks[0].blocked_at, ctx.tasks[0].blocked_at);
        assert_eq!(loaded.created, ctx.created);
        assert_eq!(loaded.source_doc_ref, ctx.source_doc_ref);
    }

    #[test]
    fn load_rejects_corrupted_document() {
        let dir = TempDir::new().unwrap();
        let mut ctx = imported();
        ctx.tasks[1].id = 7; // break the 1..N invariant on disk
        ctx.save(dir.path()).unwrap();

        assert!(matches!(
            TagContext::load(dir.path(), "master"),
            Err(TaskflowError::Validation(_))
        ));
    }

    #[test]
    fn load_missing_tag_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TagContext::load(dir.path(), "ghost"),
            Err(TaskflowError::TagNotFound(_))
        ));
    }

    #[test]
    fn copy_renumbers_and_remaps_deps() {
        let mut ctx = imported();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        ctx.set_status(1, TaskStatus::Done, None, false).unwrap();

        // copy only the unfinished tail
        let filter = CopyFilter {
            statuses: Some(vec![TaskStatus::Pending]),
            ids: None,
        };
        let copied = ctx.copy_tasks(Some(&filter));
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].id, 1); // was task 2
        assert!(copied[0].dependencies.is_empty()); // dep on excluded task 1 dropped
        assert_eq!(copied[1].id, 2); // was task 3
        assert_eq!(copied[1].dependencies, [1].into_iter().collect());

        ensure_sequential_ids(&copied).unwrap();
        graph::validate(&copied).unwrap();
    }

    #[test]
    fn copy_without_filter_is_identity_shape() {
        let ctx = imported();
        let copied = ctx.copy_tasks(None);
        assert_eq!(copied.len(), 3);
        assert_eq!(copied[1].dependencies, [1].into_iter().collect());
    }

    #[test]
    fn summary_counts_by_status() {
        let mut ctx = imported();
        ctx.set_status(1, TaskStatus::InProgress, None, false).unwrap();
        let summary = ctx.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.done, 0);
    }
}
