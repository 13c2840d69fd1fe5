//! Benchmark configuration, read from `BENCH_*` environment variables.

use std::fmt;
use std::str::FromStr;

use bench_core::config::{parse_var, string_var, Lookup};
use bench_core::{ConfigError, ConnectionConfig, LogConfig};

use crate::dataset::{DEFAULT_ROW_COUNT, MAX_ROW_COUNT};

pub const ENV_PREFIX: &str = "BENCH";
pub const DEFAULT_DATABASE: &str = "sample.db";
pub const DEFAULT_TABLE: &str = "table_with_5m_rows";

/// What to do when the acceleration index is already present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReapplyPolicy {
    /// Fail with `AccelerationError::AlreadyApplied`.
    #[default]
    Reject,
    /// Leave the existing index in place and carry on.
    Tolerate,
}

impl FromStr for ReapplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(ReapplyPolicy::Reject),
            "tolerate" => Ok(ReapplyPolicy::Tolerate),
            _ => Err("expected 'reject' or 'tolerate'".to_string()),
        }
    }
}

impl fmt::Display for ReapplyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReapplyPolicy::Reject => f.write_str("reject"),
            ReapplyPolicy::Tolerate => f.write_str("tolerate"),
        }
    }
}

/// What the harness builds and how it treats a second acceleration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchSettings {
    pub table: String,
    pub row_count: u64,
    pub reapply_policy: ReapplyPolicy,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            row_count: DEFAULT_ROW_COUNT,
            reapply_policy: ReapplyPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub connection: ConnectionConfig,
    pub bench: BenchSettings,
    pub log: LogConfig,
}

impl BenchConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let table_key = format!("{ENV_PREFIX}_TABLE");
        let table = string_var(lookup, &table_key, DEFAULT_TABLE);
        validate_identifier(&table_key, &table)?;

        let rows_key = format!("{ENV_PREFIX}_ROW_COUNT");
        let row_count = parse_var(lookup, &rows_key, DEFAULT_ROW_COUNT)?;
        if row_count > MAX_ROW_COUNT {
            return Err(ConfigError::invalid(
                &rows_key,
                &row_count.to_string(),
                format!("at most {MAX_ROW_COUNT} rows can be generated"),
            ));
        }

        Ok(Self {
            connection: ConnectionConfig::from_lookup(lookup, ENV_PREFIX, DEFAULT_DATABASE)?,
            bench: BenchSettings {
                table,
                row_count,
                reapply_policy: parse_var(
                    lookup,
                    &format!("{ENV_PREFIX}_REAPPLY_POLICY"),
                    ReapplyPolicy::default(),
                )?,
            },
            log: LogConfig::from_lookup(lookup, ENV_PREFIX)?,
        })
    }
}

/// Table names are spliced into SQL, so only plain identifiers are allowed.
pub fn validate_identifier(key: &str, name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 64 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            key,
            name,
            "expected letters, digits and underscores, not starting with a digit",
        ))
    }
}
