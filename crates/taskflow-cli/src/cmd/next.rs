use crate::cmd::{load, parse_ids};
use crate::output::print_json;
use std::collections::BTreeSet;
use std::path::Path;
use taskflow_core::selector::{self, WorkUnit};
use taskflow_core::TaskflowError;

pub fn run(root: &Path, tag: Option<&str>, skip: Option<&str>, json: bool) -> anyhow::Result<()> {
    let skip: BTreeSet<u32> = skip
        .map(parse_ids)
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .collect();

    let (_store, ctx) = load(root, tag)?;

    let selection = match selector::select_next(&ctx, &skip) {
        Ok(s) => s,
        Err(TaskflowError::NoActionableTask { blocked }) => {
            if json {
                print_json(&serde_json::json!({ "next": null, "blocked": blocked }))?;
            } else if blocked.is_empty() {
                println!("No actionable task: nothing is pending or blocked.");
            } else {
                println!("No actionable task. Every candidate is waiting on dependencies:");
                for candidate in &blocked {
                    let unmet: Vec<String> = candidate
                        .unmet
                        .iter()
                        .map(|(dep, status)| format!("{dep} ({status})"))
                        .collect();
                    println!("  [{}] waiting on {}", candidate.id, unmet.join(", "));
                }
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        print_json(&selection)?;
        return Ok(());
    }

    match &selection.unit {
        WorkUnit::Task { id } => {
            let task = ctx.task(*id)?;
            println!("Next: [{id}] {} ({})", task.title, task.priority);
        }
        WorkUnit::Subtask { parent, n } => {
            let task = ctx.task(*parent)?;
            let sub = task.subtask(*n)?;
            println!("Next: [{parent}.{n}] {} (in task: {})", sub.title, task.title);
        }
    }

    if selection.ranked.len() > 1 {
        println!("Also actionable:");
        for ranked in selection.ranked.iter().skip(1) {
            println!(
                "  [{}] {} ({}, unblocks {})",
                ranked.id, ranked.title, ranked.priority, ranked.blocking_factor
            );
        }
    }

    if !selection.skipped.is_empty() {
        let skipped: Vec<String> = selection.skipped.iter().map(|s| s.to_string()).collect();
        println!("Skipped: {}", skipped.join(", "));
    }

    if !selection.in_progress.is_empty() {
        let active: Vec<String> = selection.in_progress.iter().map(|s| s.to_string()).collect();
        println!("warning: already in progress: {}", active.join(", "));
    }

    Ok(())
}
