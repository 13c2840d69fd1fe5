//! `crud-demo`: create, read, update and delete users and tasks.
//!
//! Settings come from `TASKS_*` environment variables (optionally via `.env`):
//! `TASKS_DATABASE` (default `tasks.db`), `TASKS_LOG_LEVEL`, `TASKS_LOG_FILE`.

use std::process;

use anyhow::{Context, Result};
use bench_core::config::{env_lookup, load_dotenv};
use bench_core::{initialize_logger, ConnectionConfig, LogConfig, Session};
use chrono::NaiveDate;
use task_demo::{SqliteTaskRepository, TaskRepository};

const ENV_PREFIX: &str = "TASKS";
const DEFAULT_DATABASE: &str = "tasks.db";

fn main() {
    let dotenv = match load_dotenv() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Invalid .env file: {e}");
            process::exit(1);
        }
    };

    let configs = LogConfig::from_lookup(&env_lookup, ENV_PREFIX).and_then(|log| {
        ConnectionConfig::from_lookup(&env_lookup, ENV_PREFIX, DEFAULT_DATABASE)
            .map(|conn| (log, conn))
    });
    let (log_config, connection) = match configs {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = initialize_logger(&log_config) {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    }
    if let Some(path) = dotenv {
        log::debug!("Loaded environment overrides from {}", path.display());
    }

    if let Err(e) = run(&connection) {
        log::error!("CRUD demo failed: {e:#}");
        eprintln!("CRUD demo failed: {e:#}");
        process::exit(1);
    }
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid date {year}-{month}-{day}"))
}

fn run(connection: &ConnectionConfig) -> Result<()> {
    println!("** CRUD sample with a task repository over SQLite **\n");

    let mut session = Session::open(connection).context("connecting to the database")?;
    let mut repo = SqliteTaskRepository::new(&mut session);

    repo.reset_schema()?;
    println!("Created database schema for users and tasks.");

    let anna = repo.create_user("Anna", "Shrestinian")?;
    println!("\nCreated User: {anna}");

    let task = repo.create_task("Ship Helsinki", date(2017, 4, 1)?, false)?;
    println!("\nCreated Task: {task}");

    let task = repo.assign_task(task.id, anna.id)?;
    println!(
        "\nAssigned Task: '{}' to user '{}'",
        task.title,
        anna.full_name()
    );

    println!("\nIncomplete tasks assigned to 'Anna':");
    for t in repo.incomplete_tasks_for("Anna")? {
        println!("{t}");
    }

    if let Some(first) = repo.first_task()? {
        println!("\nUpdating task: {first}");
        let updated = repo.update_due_date(first.id, date(2016, 6, 30)?)?;
        println!("dueDate changed: {updated}");
    }

    println!("\nDeleting all tasks with a dueDate in 2016");
    for t in repo.delete_tasks_due_before(date(2016, 12, 31)?)? {
        println!("Deleting task: {t}");
    }

    println!("\nTasks after delete:");
    let remaining = repo.all_tasks()?;
    if remaining.is_empty() {
        println!("[None]");
    }
    for t in remaining {
        println!("{t}");
    }

    println!("\nAll done.");
    Ok(())
}
