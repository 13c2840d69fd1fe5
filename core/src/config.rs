//! Environment-driven configuration.
//!
//! Every setting is read through a lookup closure rather than straight from
//! `std::env`, so callers (and tests) can supply their own source. The
//! binaries pass [`env_lookup`] after calling [`load_dotenv`].

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use thiserror::Error;

use crate::DEFAULT_LOG_LEVEL;

/// Source of configuration values, keyed by variable name.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Database path that keeps everything in memory for the process lifetime.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Load a `.env` file from the working directory (or a parent) if present,
/// returning its path.
///
/// A missing file is not an error. A malformed one is rejected as a whole:
/// every line is parsed before any variable is set. Runs before the logger
/// exists, so callers report the error themselves.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::from_filename_iter(".env") {
        Ok(entries) => check_entries(entries)?,
        Err(e) if e.not_found() => return Ok(None),
        Err(e) => return Err(e),
    }
    dotenvy::dotenv().map(Some)
}

/// [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(path: &Path) -> Result<(), dotenvy::Error> {
    check_entries(dotenvy::from_path_iter(path)?)?;
    dotenvy::from_path(path)
}

fn check_entries(
    entries: impl IntoIterator<Item = Result<(String, String), dotenvy::Error>>,
) -> Result<(), dotenvy::Error> {
    for entry in entries {
        entry?;
    }
    Ok(())
}

/// [`Lookup`] over the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Read `key` and parse it, falling back to `default` when unset or blank.
pub fn parse_var<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, &raw, e.to_string())),
        _ => Ok(default),
    }
}

/// Read a boolean flag. Accepts `true/false`, `yes/no`, `on/off` and `1/0`.
pub fn parse_flag(lookup: Lookup<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, &raw, "expected true or false")),
    }
}

/// Read a string, falling back to `default` when unset or blank.
pub fn string_var(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Where to log and how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            file: None,
        }
    }
}

impl LogConfig {
    /// Reads `{prefix}_LOG_LEVEL` and `{prefix}_LOG_FILE`.
    pub fn from_lookup(lookup: Lookup<'_>, prefix: &str) -> Result<Self, ConfigError> {
        let level = parse_var(lookup, &format!("{prefix}_LOG_LEVEL"), DEFAULT_LOG_LEVEL)?;
        let file = lookup(&format!("{prefix}_LOG_FILE"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(Self { level, file })
    }
}

/// Connection descriptor for the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Database file path, or [`IN_MEMORY_DATABASE`].
    pub database: String,
    /// Create the database file when it does not exist yet.
    pub create_if_missing: bool,
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        Self {
            database: IN_MEMORY_DATABASE.to_string(),
            create_if_missing: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY_DATABASE
    }

    /// Reads `{prefix}_DATABASE` and `{prefix}_CREATE_IF_MISSING`.
    pub fn from_lookup(
        lookup: Lookup<'_>,
        prefix: &str,
        default_database: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            database: string_var(lookup, &format!("{prefix}_DATABASE"), default_database),
            create_if_missing: parse_flag(lookup, &format!("{prefix}_CREATE_IF_MISSING"), true)?,
        })
    }
}
