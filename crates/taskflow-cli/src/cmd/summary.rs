use crate::cmd::load;
use crate::output::{print_json, print_table};
use std::path::Path;
use taskflow_core::store::Store;

pub fn run(root: &Path, tag: Option<&str>, json: bool) -> anyhow::Result<()> {
    // A specific tag narrows the report to that context's counts.
    if let Some(_name) = tag {
        let (_store, ctx) = load(root, tag)?;
        let summary = ctx.summary();
        if json {
            print_json(&serde_json::json!({ "tag": ctx.tag_name, "summary": summary }))?;
        } else {
            println!("Tag '{}': {} tasks", ctx.tag_name, summary.total);
            println!(
                "  pending {}  in_progress {}  done {}  blocked {}  deferred {}  cancelled {}",
                summary.pending,
                summary.in_progress,
                summary.done,
                summary.blocked,
                summary.deferred,
                summary.cancelled
            );
        }
        return Ok(());
    }

    let store = Store::open(root)?;
    let current = store.current_tag()?;
    let tags = store.list_tags()?;
    let aggregate = store.aggregate()?;

    if json {
        let tags: Vec<_> = tags
            .iter()
            .map(|(name, meta)| {
                serde_json::json!({
                    "tag": name,
                    "current": *name == current,
                    "summary": meta.summary,
                })
            })
            .collect();
        print_json(&serde_json::json!({ "tags": tags, "aggregate": aggregate }))?;
        return Ok(());
    }

    let rows = tags
        .iter()
        .map(|(name, meta)| {
            let s = &meta.summary;
            vec![
                if *name == current {
                    format!("* {name}")
                } else {
                    format!("  {name}")
                },
                s.total.to_string(),
                s.pending.to_string(),
                s.in_progress.to_string(),
                s.done.to_string(),
                s.blocked.to_string(),
                s.deferred.to_string(),
                s.cancelled.to_string(),
            ]
        })
        .collect();
    print_table(
        &["tag", "total", "pending", "in_progress", "done", "blocked", "deferred", "cancelled"],
        rows,
    );
    println!(
        "Aggregate: {} tasks ({} done, {} in progress, {} pending, {} blocked, {} deferred)",
        aggregate.total,
        aggregate.done,
        aggregate.in_progress,
        aggregate.pending,
        aggregate.blocked,
        aggregate.deferred
    );
    Ok(())
}
