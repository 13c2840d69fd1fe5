//! Error types for each stage of a benchmark run.

use std::fmt;

use thiserror::Error;

/// Statement within provisioning that the store rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Begin,
    Drop,
    Create,
    Populate,
    Commit,
    Count,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::Begin => "begin transaction",
            ProvisionStep::Drop => "drop table",
            ProvisionStep::Create => "create table",
            ProvisionStep::Populate => "insert rows",
            ProvisionStep::Commit => "commit",
            ProvisionStep::Count => "count rows",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("requested {requested} rows but the generator only yields {ceiling}")]
    ExceedsCeiling { requested: u64, ceiling: u64 },

    #[error("{step} failed for table '{table}': {source}")]
    Rejected {
        table: String,
        step: ProvisionStep,
        #[source]
        source: rusqlite::Error,
    },

    #[error("table '{table}' holds {actual} rows, expected {expected}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        actual: u64,
    },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("aggregation on '{table}' failed: {source}")]
    Rejected {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("aggregation on '{table}' returned {actual}, expected {expected}")]
    UnexpectedSum {
        table: String,
        expected: i64,
        actual: i64,
    },
}

#[derive(Debug, Error)]
pub enum AccelerationError {
    #[error("table '{table}' already has its acceleration index")]
    AlreadyApplied { table: String },

    #[error("building the acceleration index on '{table}' failed: {source}")]
    Rejected {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Any failure that ends a run. Connection failures happen before a run
/// starts and are reported as [`bench_core::ConnectionError`].
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Acceleration(#[from] AccelerationError),
}
