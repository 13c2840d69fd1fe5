//! Acceleration-index benchmark over SQLite.
//!
//! Builds a deterministic synthetic table (up to 10^8 rows, default 5M),
//! times a full-table `SUM(price)`, adds a covering index on `price`, times
//! the same query again and reports the speedup.
//!
//! Run: `cargo run --release -p index-bench`
//! Configure with `BENCH_*` environment variables or a `.env` file, see
//! [`config::BenchConfig`].

pub mod config;
pub mod dataset;
pub mod dialect;
pub mod error;
pub mod harness;
pub mod report;

pub use config::{BenchConfig, BenchSettings, ReapplyPolicy};
pub use dataset::{Dataset, Row};
pub use dialect::{Dialect, SqliteDialect};
pub use error::{AccelerationError, BenchError, ProvisioningError, QueryError};
pub use harness::{BenchmarkResult, Harness, RunEvent, RunObserver, Stage, TimingSample};
