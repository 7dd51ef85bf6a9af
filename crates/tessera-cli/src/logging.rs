//! Logging setup
//!
//! Console output plus an optional daily-rolled `tessera.log` file.
//! The returned guard must stay alive for the process lifetime; dropping
//! it flushes buffered file output.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log directory; `None` with file logging enabled falls back to
    /// `./logs`
    pub log_dir: Option<PathBuf>,
    pub console_output: bool,
    pub file_logging: bool,
    pub level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            console_output: true,
            file_logging: false,
            level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: &str,
    ) -> Self {
        Self {
            log_dir: log_dir.map(PathBuf::from),
            console_output,
            file_logging,
            level: level.parse().unwrap_or(Level::INFO),
        }
    }
}

/// Keeps the non-blocking file writer alive.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, std::io::Error> {
    let level_filter = LevelFilter::from_level(config.level);
    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers = Vec::new();

    if config.console_output {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_filter(level_filter)
                .boxed(),
        );
    }

    if config.file_logging {
        let dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));
        std::fs::create_dir_all(&dir)?;
        let appender = rolling::daily(dir, "tessera.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(level_filter)
                .boxed(),
        );
    }

    Registry::default().with(layers).init();
    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
