mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::tag::TagSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "taskflow",
    about = "Dependency-aware task tracking: tag contexts, status lifecycle, next-task selection",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .taskflow/ or .git/)
    #[arg(long, global = true, env = "TASKFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Operate on a specific tag instead of the current one
    #[arg(long, global = true)]
    tag: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize TaskFlow in the current project
    Init,

    /// Manage tag contexts
    Tag {
        #[command(subcommand)]
        subcommand: TagSubcommand,
    },

    /// Import a generated task list from a JSON file
    Import {
        file: PathBuf,
        /// Append to the existing tasks instead of requiring an empty tag
        #[arg(long)]
        append: bool,
    },

    /// Add a single task
    Add {
        #[arg(required = true)]
        title: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        /// high, medium, or low
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Comma-separated dependency ids (e.g. 1,3)
        #[arg(long)]
        depends: Option<String>,
    },

    /// Expand a task into subtasks
    Expand {
        id: u32,
        /// Subtask title (repeatable)
        #[arg(long = "subtask", required = true)]
        subtasks: Vec<String>,
    },

    /// Transition a task (or subtask, as <parent>.<n>) to a new status
    Status {
        id: String,
        status: String,
        /// Reason (required when blocking)
        #[arg(long)]
        note: Option<String>,
        /// Override a terminal state or an incomplete-subtask check
        #[arg(long)]
        force: bool,
    },

    /// List tasks in the current tag
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show full details for one task
    Show { id: u32 },

    /// Show the next actionable task
    Next {
        /// Comma-separated task ids to skip (e.g. 2,5)
        #[arg(long)]
        skip: Option<String>,
    },

    /// Show per-tag status counts
    Summary,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let tag = cli.tag.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Tag { subcommand } => cmd::tag::run(&root, subcommand, cli.json),
        Commands::Import { file, append } => {
            cmd::import::run(&root, tag, &file, append, cli.json)
        }
        Commands::Add {
            title,
            description,
            priority,
            depends,
        } => cmd::task::add(
            &root,
            tag,
            &title.join(" "),
            description,
            &priority,
            depends.as_deref(),
            cli.json,
        ),
        Commands::Expand { id, subtasks } => {
            cmd::task::expand(&root, tag, id, &subtasks, cli.json)
        }
        Commands::Status {
            id,
            status,
            note,
            force,
        } => cmd::task::status(&root, tag, &id, &status, note.as_deref(), force, cli.json),
        Commands::List { status } => cmd::task::list(&root, tag, status.as_deref(), cli.json),
        Commands::Show { id } => cmd::task::show(&root, tag, id, cli.json),
        Commands::Next { skip } => cmd::next::run(&root, tag, skip.as_deref(), cli.json),
        Commands::Summary => cmd::summary::run(&root, tag, cli.json),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
