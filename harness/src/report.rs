//! Console output: stage-by-stage progress and the final comparison.

use std::io::{self, Write};

use crate::harness::{BenchmarkResult, RunEvent, RunObserver, Stage};

/// Prints each stage as it starts and finishes, so a failed run still shows
/// how far it got.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    table: String,
    row_count: u64,
}

impl ConsoleReporter {
    pub fn stdout(table: &str, row_count: u64) -> Self {
        Self::new(io::stdout(), table, row_count)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, table: &str, row_count: u64) -> Self {
        Self {
            out,
            table: table.to_string(),
            row_count,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &RunEvent<'_>) -> io::Result<()> {
        match event {
            RunEvent::Started(Stage::Provision) => write!(
                self.out,
                "Dropping and creating table '{}' with {} rows ... ",
                self.table, self.row_count
            )?,
            RunEvent::Started(Stage::Accelerate) => write!(
                self.out,
                "Adding acceleration index to table '{}' ... ",
                self.table
            )?,
            RunEvent::Started(Stage::QueryWithout | Stage::QueryWith) => {}
            RunEvent::Provisioned(_) | RunEvent::Accelerated(_) => writeln!(self.out, "Done.")?,
            RunEvent::Timed(Stage::QueryWithout, sample) => writeln!(
                self.out,
                "Query time WITHOUT acceleration index: {:.3}ms (sum = {})",
                sample.elapsed_ms(),
                sample.sum
            )?,
            RunEvent::Timed(_, sample) => writeln!(
                self.out,
                "Query time WITH acceleration index: {:.3}ms (sum = {})",
                sample.elapsed_ms(),
                sample.sum
            )?,
            RunEvent::Failed(stage, err) => {
                if matches!(stage, Stage::Provision | Stage::Accelerate) {
                    writeln!(self.out, "Failed.")?;
                }
                writeln!(self.out, "Stage '{stage}' aborted the run: {err}")?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> RunObserver for ConsoleReporter<W> {
    fn on_event(&mut self, event: &RunEvent<'_>) {
        if let Err(e) = self.write_event(event) {
            log::warn!("Could not write progress to console: {e}");
        }
    }
}

/// Summary block for a completed run.
pub fn format_result(result: &BenchmarkResult) -> String {
    let rule = "=".repeat(60);
    let speedup = match result.speedup() {
        Some(x) => format!("{x}x"),
        None => "n/a".to_string(),
    };

    format!(
        "{rule}\n  Acceleration benchmark: '{}' ({} rows)\n{rule}\n  \
         Without index:   {:>12.3}ms\n  \
         With index:      {:>12.3}ms\n  \
         Improvement:     {:>12}\n{rule}\n",
        result.dataset.name(),
        result.dataset.row_count(),
        result.without_index.elapsed_ms(),
        result.with_index.elapsed_ms(),
        speedup,
    )
}

pub fn print_result(result: &BenchmarkResult) {
    println!();
    print!("{}", format_result(result));
}
