//! Pieces shared by the `index-bench` and `crud-demo` binaries: logger setup,
//! environment configuration and the SQLite [`session::Session`].

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use thiserror::Error;

pub mod config;
pub mod session;

pub use config::{ConfigError, ConnectionConfig, LogConfig};
pub use session::{ConnectionError, Session};

const LOGGING_PATTERN: &str = "{d} {l} {f}:{L} - {m}{n}";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to open log file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid logger configuration: {0}")]
    Config(String),

    #[error("a logger is already installed: {0}")]
    Install(#[from] log::SetLoggerError),
}

/// Install the process-wide logger.
///
/// Records at or above `config.level` go to stderr. When `config.file` is set
/// the same records are also appended to that file.
pub fn initialize_logger(config: &LogConfig) -> Result<(), LoggerError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
        .build();

    let mut config_builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(config.level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");

    if let Some(path) = &config.file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOGGING_PATTERN)))
            .build(path)
            .map_err(|source| LoggerError::File {
                path: path.clone(),
                source,
            })?;

        config_builder =
            config_builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let log4rs_config = config_builder
        .build(root.build(config.level))
        .map_err(|e| LoggerError::Config(e.to_string()))?;

    let _handle = log4rs::init_config(log4rs_config)?;

    Ok(())
}

/// Level used when neither the environment nor the caller asks for one.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
