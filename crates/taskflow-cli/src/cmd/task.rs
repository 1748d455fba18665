use crate::cmd::{load, parse_ids};
use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;
use std::str::FromStr;
use taskflow_core::aggregate::SubtaskSignal;
use taskflow_core::sync::NoopSync;
use taskflow_core::types::{Priority, SubtaskStatus, TaskStatus};

pub fn add(
    root: &Path,
    tag: Option<&str>,
    title: &str,
    description: Option<String>,
    priority: &str,
    depends: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let priority = Priority::from_str(priority)?;
    let dependencies = depends
        .map(parse_ids)
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .collect();

    let (store, mut ctx) = load(root, tag)?;
    let id = ctx.add_task(title, description, priority, dependencies)?;
    store.commit(&mut ctx)?;

    if json {
        print_json(&serde_json::json!({ "tag": ctx.tag_name, "id": id, "title": title }))?;
    } else {
        println!("Added task [{id}]: {title}");
    }
    Ok(())
}

pub fn expand(
    root: &Path,
    tag: Option<&str>,
    id: u32,
    subtasks: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let (store, mut ctx) = load(root, tag)?;
    let ns = ctx.expand_task(id, subtasks)?;
    store.commit(&mut ctx)?;

    if json {
        let ids: Vec<String> = ns.iter().map(|n| format!("{id}.{n}")).collect();
        print_json(&serde_json::json!({ "task": id, "subtasks": ids }))?;
    } else {
        println!("Expanded task [{id}] into {} subtasks", ns.len());
    }
    Ok(())
}

pub fn status(
    root: &Path,
    tag: Option<&str>,
    id: &str,
    status: &str,
    note: Option<&str>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (store, mut ctx) = load(root, tag)?;

    // "<parent>.<n>" selects a subtask
    if let Some((parent, n)) = id.split_once('.') {
        let parent: u32 = parent.parse().with_context(|| format!("invalid id: {id}"))?;
        let n: u32 = n.parse().with_context(|| format!("invalid id: {id}"))?;
        let sub_status = SubtaskStatus::from_str(status)?;

        let signal = ctx.set_subtask_status(parent, n, sub_status)?;
        store.commit(&mut ctx)?;

        if json {
            print_json(&serde_json::json!({
                "id": format!("{parent}.{n}"),
                "status": sub_status.as_str(),
                "all_subtasks_complete": signal == SubtaskSignal::AllSubtasksComplete,
            }))?;
        } else {
            println!("Set subtask [{parent}.{n}] to {sub_status}");
            if signal == SubtaskSignal::AllSubtasksComplete {
                println!(
                    "All subtasks of task [{parent}] are done; run \
                     'taskflow status {parent} done' to complete it"
                );
            }
        }
        return Ok(());
    }

    let id: u32 = id.parse().with_context(|| format!("invalid id: {id}"))?;
    let to = TaskStatus::from_str(status)?;
    let outcome = store.transition(&mut ctx, id, to, note, force, &NoopSync)?;

    if json {
        print_json(&serde_json::json!({
            "id": id,
            "status": to.as_str(),
            "warning": outcome.warning,
        }))?;
    } else {
        println!("Set task [{id}] to {to}");
        if let Some(warning) = outcome.warning {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

pub fn list(
    root: &Path,
    tag: Option<&str>,
    status: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let filter = status.map(TaskStatus::from_str).transpose()?;
    let (_store, ctx) = load(root, tag)?;

    let tasks: Vec<_> = ctx
        .tasks
        .iter()
        .filter(|t| filter.map_or(true, |s| t.status == s))
        .collect();

    if json {
        print_json(&tasks)?;
    } else {
        let rows = tasks
            .iter()
            .map(|t| {
                let deps: Vec<String> =
                    t.dependencies.iter().map(|d| d.to_string()).collect();
                vec![
                    t.id.to_string(),
                    t.status.to_string(),
                    t.priority.to_string(),
                    deps.join(","),
                    format!("{}/{}",
                        t.subtasks.iter().filter(|s| s.status == SubtaskStatus::Done).count(),
                        t.subtasks.len()),
                    t.title.clone(),
                ]
            })
            .collect();
        print_table(&["id", "status", "priority", "deps", "subtasks", "title"], rows);
    }
    Ok(())
}

pub fn show(root: &Path, tag: Option<&str>, id: u32, json: bool) -> anyhow::Result<()> {
    let (_store, ctx) = load(root, tag)?;
    let task = ctx.task(id)?;

    if json {
        print_json(task)?;
        return Ok(());
    }

    println!("Task:      [{}] {}", task.id, task.title);
    println!("Status:    {}", task.status);
    println!("Priority:  {}", task.priority);
    if let Some(desc) = &task.description {
        println!("About:     {desc}");
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<String> = task.dependencies.iter().map(|d| d.to_string()).collect();
        println!("Depends:   {}", deps.join(", "));
    }
    if let Some(reason) = &task.blocked_reason {
        println!("Blocked:   {reason}");
    }
    if let Some(reason) = &task.deferred_reason {
        println!("Deferred:  {reason}");
    }
    if !task.acceptance_criteria.is_empty() {
        println!("Acceptance criteria:");
        for criterion in &task.acceptance_criteria {
            println!("  - {criterion}");
        }
    }
    if !task.subtasks.is_empty() {
        println!("Subtasks:");
        for sub in &task.subtasks {
            println!("  [{}] {} ({})", sub.render_id(task.id), sub.title, sub.status);
        }
    }
    Ok(())
}
