//! Tag context manager: owns the `.taskflow/` layout, the context index
//! (current tag + per-tag metadata), and the project-level aggregate counts.
//!
//! The engine assumes a single logical writer per tag context; all writes go
//! through tempfile-backed atomic replace so a concurrent reader sees either
//! the previous document or the new one. Copies snapshot the source in
//! memory before the destination is written, so an interruption mid-copy
//! cannot leave a partial destination.

use crate::context::{CopyFilter, TagContext, TagSummary};
use crate::error::{Result, TaskflowError};
use crate::io;
use crate::paths::{self, MASTER_TAG};
use crate::sync::{self, SyncOutcome, TrackerSync};
use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Context index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMeta {
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub summary: TagSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextIndex {
    pub current_tag: String,
    pub last_switched: DateTime<Utc>,
    pub tags: BTreeMap<String, TagMeta>,
}

/// External aggregate record: the six status buckets of the persisted layout.
/// Cancelled tasks count toward `done` here; the per-tag summary keeps them
/// separate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub deferred: usize,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CreateTagOptions {
    pub description: Option<String>,
    pub from_branch: Option<String>,
    pub copy_from: Option<String>,
    pub copy_filter: Option<CopyFilter>,
}

#[derive(Debug, Clone)]
pub struct SwitchOutcome {
    pub previous: String,
    /// In-progress task ids left behind in the outgoing context. A warning,
    /// not a failure.
    pub in_progress: Vec<u32>,
}

pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Initialize `.taskflow/` with an empty master context. Idempotent.
    pub fn init(root: &Path) -> Result<Store> {
        io::ensure_dir(&paths::tags_dir(root))?;

        let store = Store {
            root: root.to_path_buf(),
        };
        if paths::index_path(root).exists() {
            return Ok(store);
        }

        let master = TagContext::new(MASTER_TAG);
        master.save(root)?;

        let mut tags = BTreeMap::new();
        tags.insert(
            MASTER_TAG.to_string(),
            TagMeta {
                created: master.created,
                description: None,
                branch: None,
                summary: TagSummary::default(),
            },
        );
        let index = ContextIndex {
            current_tag: MASTER_TAG.to_string(),
            last_switched: Utc::now(),
            tags,
        };
        store.save_index(&index)?;
        store.write_aggregate(&index)?;
        Ok(store)
    }

    pub fn open(root: &Path) -> Result<Store> {
        if !paths::index_path(root).exists() {
            return Err(TaskflowError::NotInitialized);
        }
        Ok(Store {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ---------------------------------------------------------------------------
    // Index persistence
    // ---------------------------------------------------------------------------

    pub fn index(&self) -> Result<ContextIndex> {
        let data = std::fs::read_to_string(paths::index_path(&self.root))?;
        let index: ContextIndex = serde_yaml::from_str(&data)?;
        Ok(index)
    }

    fn save_index(&self, index: &ContextIndex) -> Result<()> {
        let data = serde_yaml::to_string(index)?;
        io::atomic_write(&paths::index_path(&self.root), data.as_bytes())
    }

    fn write_aggregate(&self, index: &ContextIndex) -> Result<()> {
        let mut agg = AggregateCounts::default();
        for meta in index.tags.values() {
            agg.total += meta.summary.total;
            agg.pending += meta.summary.pending;
            agg.in_progress += meta.summary.in_progress;
            agg.done += meta.summary.done + meta.summary.cancelled;
            agg.blocked += meta.summary.blocked;
            agg.deferred += meta.summary.deferred;
        }
        let data = serde_json::to_string_pretty(&agg)?;
        io::atomic_write(&paths::aggregate_path(&self.root), data.as_bytes())
    }

    pub fn aggregate(&self) -> Result<AggregateCounts> {
        let data = std::fs::read_to_string(paths::aggregate_path(&self.root))?;
        let agg: AggregateCounts = serde_json::from_str(&data)?;
        Ok(agg)
    }

    pub fn current_tag(&self) -> Result<String> {
        Ok(self.index()?.current_tag)
    }

    // ---------------------------------------------------------------------------
    // Context access
    // ---------------------------------------------------------------------------

    pub fn load_context(&self, name: &str) -> Result<TagContext> {
        TagContext::load(&self.root, name)
    }

    /// Persist a mutated context and refresh its summary counts in the index
    /// and the project aggregate.
    pub fn commit(&self, ctx: &mut TagContext) -> Result<()> {
        ctx.updated = Utc::now();
        ctx.save(&self.root)?;

        let mut index = self.index()?;
        if let Some(meta) = index.tags.get_mut(&ctx.tag_name) {
            meta.summary = ctx.summary();
        }
        self.save_index(&index)?;
        self.write_aggregate(&index)
    }

    /// Apply a status transition, commit locally, then notify the tracker
    /// adapter. Adapter failure surfaces as a warning on the outcome.
    pub fn transition(
        &self,
        ctx: &mut TagContext,
        id: u32,
        to: TaskStatus,
        note: Option<&str>,
        force: bool,
        tracker: &dyn TrackerSync,
    ) -> Result<SyncOutcome> {
        let from = ctx.task(id)?.status;
        ctx.set_status(id, to, note, force)?;
        self.commit(ctx)?;
        Ok(sync::notify_after_commit(tracker, &ctx.tag_name, id, from, to))
    }

    // ---------------------------------------------------------------------------
    // Tag lifecycle
    // ---------------------------------------------------------------------------

    pub fn create_tag(&self, name: &str, opts: CreateTagOptions) -> Result<TagContext> {
        paths::validate_tag_name(name)?;

        let mut index = self.index()?;
        if index.tags.contains_key(name) {
            return Err(TaskflowError::DuplicateTag(name.to_string()));
        }

        let mut ctx = TagContext::new(name);
        ctx.description = opts.description.clone();
        ctx.source_branch = opts.from_branch.clone();

        if let Some(source) = &opts.copy_from {
            // full in-memory snapshot of the source before any write
            let snapshot = self.load_context(source)?;
            ctx.tasks = snapshot.copy_tasks(opts.copy_filter.as_ref());
            ctx.source_doc_ref = snapshot.source_doc_ref.clone();
            ctx.validate()?;
        }

        ctx.save(&self.root)?;
        index.tags.insert(
            name.to_string(),
            TagMeta {
                created: ctx.created,
                description: opts.description,
                branch: opts.from_branch,
                summary: ctx.summary(),
            },
        );
        self.save_index(&index)?;
        self.write_aggregate(&index)?;
        Ok(ctx)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        if name == MASTER_TAG {
            return Err(TaskflowError::ProtectedTag(name.to_string()));
        }
        let mut index = self.index()?;
        if index.current_tag == name {
            return Err(TaskflowError::ActiveTag(name.to_string()));
        }
        if index.tags.remove(name).is_none() {
            return Err(TaskflowError::TagNotFound(name.to_string()));
        }

        let path = paths::tag_file(&self.root, name);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.save_index(&index)?;
        self.write_aggregate(&index)
    }

    /// Switch the active tag. Succeeds even if the outgoing context has
    /// in-progress tasks; those are returned as a non-fatal warning.
    pub fn switch_tag(&self, name: &str) -> Result<SwitchOutcome> {
        let mut index = self.index()?;
        if !index.tags.contains_key(name) {
            return Err(TaskflowError::TagNotFound(name.to_string()));
        }

        let previous = index.current_tag.clone();
        let in_progress = match self.load_context(&previous) {
            Ok(ctx) => ctx.in_progress_ids(),
            Err(_) => Vec::new(),
        };

        index.current_tag = name.to_string();
        index.last_switched = Utc::now();
        self.save_index(&index)?;

        Ok(SwitchOutcome {
            previous,
            in_progress,
        })
    }

    pub fn list_tags(&self) -> Result<Vec<(String, TagMeta)>> {
        let index = self.index()?;
        Ok(index.tags.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
