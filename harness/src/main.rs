//! `index-bench`: provision, time, add the acceleration index, time again.
//!
//! Takes no arguments. Settings come from `BENCH_*` environment variables,
//! optionally loaded from a `.env` file:
//!
//!   BENCH_DATABASE=sample.db BENCH_ROW_COUNT=1000000 cargo run --release -p index-bench

use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use bench_core::config::{env_lookup, load_dotenv};
use bench_core::{initialize_logger, Session};
use index_bench::report::{print_result, ConsoleReporter};
use index_bench::{BenchConfig, Harness, SqliteDialect};

fn main() {
    let dotenv = match load_dotenv() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Invalid .env file: {e}");
            process::exit(1);
        }
    };

    let config = match BenchConfig::from_lookup(&env_lookup) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = initialize_logger(&config.log) {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    }
    if let Some(path) = dotenv {
        log::debug!("Loaded environment overrides from {}", path.display());
    }

    // `run` owns the session, so it is closed before the process exits.
    if let Err(e) = run(&config) {
        log::error!("Benchmark aborted: {e:#}");
        eprintln!("Benchmark aborted: {e:#}");
        process::exit(1);
    }
}

fn run(config: &BenchConfig) -> Result<()> {
    println!("*** SQLite acceleration index demo ***");

    print!("Connecting to '{}' ... ", config.connection.database);
    io::stdout().flush()?;
    let mut session = Session::open(&config.connection).context("connecting to the database")?;
    println!("Done.");

    let interrupt = session.interrupt_handle();
    ctrlc::set_handler(move || {
        log::warn!("Interrupt received, cancelling the running statement");
        interrupt.interrupt();
    })
    .context("installing the Ctrl-C handler")?;

    let mut reporter = ConsoleReporter::stdout(&config.bench.table, config.bench.row_count);
    let result = Harness::new(&mut session, &SqliteDialect, config.bench.clone())
        .run(&mut reporter)?;

    print_result(&result);
    println!("All done.");
    Ok(())
}
