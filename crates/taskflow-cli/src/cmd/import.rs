use crate::cmd::load;
use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use taskflow_core::import;

pub fn run(
    root: &Path,
    tag: Option<&str>,
    file: &Path,
    append: bool,
    json: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let candidates = import::parse_candidates(&raw)?;
    let count = candidates.len();
    let tasks = import::into_tasks(candidates);

    let (store, mut ctx) = load(root, tag)?;
    ctx.import_tasks(tasks, append)?;
    ctx.source_doc_ref = Some(file.display().to_string());
    store.commit(&mut ctx)?;

    if json {
        print_json(&serde_json::json!({
            "tag": ctx.tag_name,
            "imported": count,
            "total": ctx.tasks.len(),
        }))?;
    } else {
        println!(
            "Imported {count} tasks into tag '{}' ({} total)",
            ctx.tag_name,
            ctx.tasks.len()
        );
    }
    Ok(())
}
