use crate::error::{Result, TaskflowError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const TASKFLOW_DIR: &str = ".taskflow";
pub const TAGS_DIR: &str = ".taskflow/tags";
pub const INDEX_FILE: &str = ".taskflow/index.yaml";
pub const AGGREGATE_FILE: &str = ".taskflow/summary.json";

/// The default tag. It always exists and cannot be deleted.
pub const MASTER_TAG: &str = "master";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn tags_dir(root: &Path) -> PathBuf {
    root.join(TAGS_DIR)
}

pub fn tag_file(root: &Path, name: &str) -> PathBuf {
    tags_dir(root).join(format!("{name}.yaml"))
}

pub fn index_path(root: &Path) -> PathBuf {
    root.join(INDEX_FILE)
}

pub fn aggregate_path(root: &Path) -> PathBuf {
    root.join(AGGREGATE_FILE)
}

// ---------------------------------------------------------------------------
// Tag name validation
// ---------------------------------------------------------------------------

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !tag_re().is_match(name) {
        return Err(TaskflowError::InvalidTagName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
