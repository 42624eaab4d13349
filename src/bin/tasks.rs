use std::path::{Path, PathBuf};

use anyhow::Result;
use bootcamp::config::{Config, default_config_path};
use bootcamp::tasks::{ListOptions, NewTask, Priority, SortKey, StatusFilter, Storage, Task, TaskError, TaskManager};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tasks")]
#[command(about = "Manage a task list stored in a JSON file")]
#[command(version)]
struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Task data file (overrides tasks.data_file from the config)
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        title: String,
        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List tasks
    List {
        /// all, pending or completed
        #[arg(default_value = "all")]
        filter: String,
        #[arg(long)]
        tag: Option<String>,
        /// Only pending tasks past their due date
        #[arg(long)]
        overdue: bool,
        /// priority or date
        #[arg(long)]
        sort: Option<String>,
    },
    /// Search titles and tags
    Search {
        query: String,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        sort: Option<String>,
    },
    /// Mark a task as completed
    Done { id: u64 },
    /// Delete a task
    Delete { id: u64 },
    /// Change a task's title
    Update { id: u64, title: String },
    /// Show task statistics
    Stats,
    /// Write all tasks to a file
    Export { path: PathBuf },
    /// Merge tasks from a previously exported file
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_file = match cli.file {
        Some(file) => file,
        None => {
            let config_path = cli.config.map(PathBuf::from).unwrap_or_else(default_config_path);
            PathBuf::from(Config::load_or_default(&config_path)?.tasks.data_file)
        }
    };

    let mut manager = TaskManager::new(Storage::new(data_file));
    match run(&mut manager, cli.command).await {
        Ok(()) => Ok(()),
        Err(e @ (TaskError::NotFound(_) | TaskError::AlreadyCompleted(_) | TaskError::EmptyQuery)) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(manager: &mut TaskManager, command: Commands) -> Result<(), TaskError> {
    match command {
        Commands::Add {
            title,
            priority,
            due,
            tags,
        } => {
            let task = manager
                .add(NewTask {
                    title,
                    priority: Priority::parse_lenient(&priority),
                    due,
                    tags: split_tags(tags.as_deref()),
                })
                .await?;
            println!("Task added: \"{}\" (ID: {})", task.title, task.id);
        }
        Commands::List {
            filter,
            tag,
            overdue,
            sort,
        } => {
            let filter = StatusFilter::parse_lenient(&filter);
            let opts = ListOptions {
                tag,
                overdue,
                sort: sort.as_deref().and_then(SortKey::parse),
            };
            let tasks = manager.list(filter, &opts).await;
            print_tasks(&format!("{filter:?} tasks"), &tasks);
        }
        Commands::Search { query, tag, sort } => {
            let opts = ListOptions {
                tag,
                overdue: false,
                sort: sort.as_deref().and_then(SortKey::parse),
            };
            let tasks = manager.search(&query, &opts).await?;
            print_tasks("Search results", &tasks);
        }
        Commands::Done { id } => {
            manager.complete(id).await?;
            println!("Task {id} marked as completed");
        }
        Commands::Delete { id } => {
            manager.delete(id).await?;
            println!("Task {id} deleted");
        }
        Commands::Update { id, title } => {
            manager.update(id, &title).await?;
            println!("Task {id} updated");
        }
        Commands::Stats => {
            let stats = manager.stats().await;
            println!("{}", "=".repeat(40));
            println!("  TASK STATISTICS");
            println!("{}", "=".repeat(40));
            println!("Total tasks    : {}", stats.total);
            println!("Completed      : {}", stats.completed);
            println!("Pending        : {}", stats.pending);
            println!();
            println!("By priority:");
            println!("  High   : {}", stats.high);
            println!("  Medium : {}", stats.medium);
            println!("  Low    : {}", stats.low);
        }
        Commands::Export { path } => {
            let count = manager.export(&path).await?;
            println!("Exported {count} task(s) to {}", path.display());
        }
        Commands::Import { path } => {
            let count = manager.import(&path).await?;
            report_import(count, &path);
        }
    }
    Ok(())
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn report_import(count: usize, path: &Path) {
    if count == 0 {
        println!("No tasks to import");
    } else {
        println!("Imported {count} task(s) from {}", path.display());
    }
}

fn print_tasks(heading: &str, tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found");
        return;
    }

    println!("\n{}\n", heading.to_uppercase());
    println!(
        "{:<5} {:<32} {:<8} {:<10} {:<12} {:<16} {}",
        "ID", "Title", "Priority", "Status", "Due", "Tags", "Created"
    );
    for t in tasks {
        println!(
            "{:<5} {:<32} {:<8} {:<10} {:<12} {:<16} {}",
            t.id,
            truncate(&t.title, 32),
            t.priority.as_str(),
            t.status(),
            t.due_date.as_deref().unwrap_or(""),
            t.tags.join(","),
            t.created_at
        );
    }
    println!("\nTotal: {} task(s)\n", tasks.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
