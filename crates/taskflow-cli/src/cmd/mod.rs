pub mod import;
pub mod init;
pub mod next;
pub mod summary;
pub mod tag;
pub mod task;

use anyhow::Context;
use std::path::Path;
use taskflow_core::context::TagContext;
use taskflow_core::store::Store;

/// Open the store and load the requested (or current) tag context.
pub fn load(root: &Path, tag: Option<&str>) -> anyhow::Result<(Store, TagContext)> {
    let store = Store::open(root).context("taskflow is not initialized here")?;
    let name = match tag {
        Some(t) => t.to_string(),
        None => store.current_tag()?,
    };
    let ctx = store
        .load_context(&name)
        .with_context(|| format!("tag '{name}' not found"))?;
    Ok((store, ctx))
}

/// Parse a comma-separated id list (e.g. "1,3,5").
pub fn parse_ids(s: &str) -> anyhow::Result<Vec<u32>> {
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            p.trim()
                .parse::<u32>()
                .with_context(|| format!("invalid task id: {p}"))
        })
        .collect()
}
