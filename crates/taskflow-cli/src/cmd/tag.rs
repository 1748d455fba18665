use crate::cmd::parse_ids;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use std::str::FromStr;
use taskflow_core::context::CopyFilter;
use taskflow_core::store::{CreateTagOptions, Store};
use taskflow_core::types::TaskStatus;

#[derive(Subcommand)]
pub enum TagSubcommand {
    /// Create a new tag context
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Record the source branch this tag mirrors
        #[arg(long)]
        from_branch: Option<String>,
    },
    /// Create a new tag as a copy of an existing one
    Copy {
        source: String,
        dest: String,
        /// Only copy tasks with these statuses (comma-separated)
        #[arg(long)]
        statuses: Option<String>,
        /// Only copy tasks with these ids (comma-separated)
        #[arg(long)]
        ids: Option<String>,
    },
    /// Delete a tag context and all its tasks
    Delete { name: String },
    /// Switch the active tag
    Switch { name: String },
    /// List all tags
    List,
}

pub fn run(root: &Path, subcmd: TagSubcommand, json: bool) -> anyhow::Result<()> {
    let store = Store::open(root).context("taskflow is not initialized here")?;
    match subcmd {
        TagSubcommand::Create {
            name,
            description,
            from_branch,
        } => create(&store, &name, description, from_branch, json),
        TagSubcommand::Copy {
            source,
            dest,
            statuses,
            ids,
        } => copy(&store, &source, &dest, statuses.as_deref(), ids.as_deref(), json),
        TagSubcommand::Delete { name } => delete(&store, &name, json),
        TagSubcommand::Switch { name } => switch(&store, &name, json),
        TagSubcommand::List => list(&store, json),
    }
}

fn create(
    store: &Store,
    name: &str,
    description: Option<String>,
    from_branch: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    store.create_tag(
        name,
        CreateTagOptions {
            description,
            from_branch,
            ..CreateTagOptions::default()
        },
    )?;

    if json {
        print_json(&serde_json::json!({ "tag": name, "created": true }))?;
    } else {
        println!("Created tag '{name}'");
    }
    Ok(())
}

fn copy(
    store: &Store,
    source: &str,
    dest: &str,
    statuses: Option<&str>,
    ids: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let statuses = statuses
        .map(|s| {
            s.split(',')
                .map(|p| TaskStatus::from_str(p.trim()))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let ids = ids
        .map(parse_ids)
        .transpose()?
        .map(|v| v.into_iter().collect());

    let filter = if statuses.is_some() || ids.is_some() {
        Some(CopyFilter { statuses, ids })
    } else {
        None
    };

    let ctx = store.create_tag(
        dest,
        CreateTagOptions {
            copy_from: Some(source.to_string()),
            copy_filter: filter,
            ..CreateTagOptions::default()
        },
    )?;

    if json {
        print_json(&serde_json::json!({
            "tag": dest,
            "copied_from": source,
            "tasks": ctx.tasks.len(),
        }))?;
    } else {
        println!(
            "Created tag '{dest}' with {} tasks copied from '{source}'",
            ctx.tasks.len()
        );
    }
    Ok(())
}

fn delete(store: &Store, name: &str, json: bool) -> anyhow::Result<()> {
    store.delete_tag(name)?;
    if json {
        print_json(&serde_json::json!({ "tag": name, "deleted": true }))?;
    } else {
        println!("Deleted tag '{name}'");
    }
    Ok(())
}

fn switch(store: &Store, name: &str, json: bool) -> anyhow::Result<()> {
    let outcome = store.switch_tag(name)?;
    if json {
        print_json(&serde_json::json!({
            "tag": name,
            "previous": outcome.previous,
            "in_progress_left_behind": outcome.in_progress,
        }))?;
    } else {
        println!("Switched to tag '{name}'");
        if !outcome.in_progress.is_empty() {
            let ids: Vec<String> = outcome.in_progress.iter().map(|i| i.to_string()).collect();
            println!(
                "warning: tag '{}' still has in-progress tasks: {}",
                outcome.previous,
                ids.join(", ")
            );
        }
    }
    Ok(())
}

fn list(store: &Store, json: bool) -> anyhow::Result<()> {
    let current = store.current_tag()?;
    let tags = store.list_tags()?;

    if json {
        let entries: Vec<_> = tags
            .iter()
            .map(|(name, meta)| {
                serde_json::json!({
                    "name": name,
                    "current": *name == current,
                    "created": meta.created,
                    "description": meta.description,
                    "branch": meta.branch,
                    "summary": meta.summary,
                })
            })
            .collect();
        print_json(&entries)?;
    } else {
        let rows = tags
            .iter()
            .map(|(name, meta)| {
                vec![
                    if *name == current {
                        format!("* {name}")
                    } else {
                        format!("  {name}")
                    },
                    meta.summary.total.to_string(),
                    meta.summary.done.to_string(),
                    meta.description.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["tag", "tasks", "done", "description"], rows);
    }
    Ok(())
}
