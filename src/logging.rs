//! tracing subscriber setup
//!
//! Text mode writes to the rolling file and stdout; JSON mode writes only to the
//! file. `RUST_LOG` replaces the configured filter entirely.

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("Global subscriber already installed: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Install the global subscriber. Keep the guard alive for the life of the process.
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard, LoggingError> {
    let appender = RollingFileAppender::builder()
        .rotation(rotation(&config.rotation))
        .filename_prefix(&config.log_file)
        .build(&config.log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level)));

    let json_file = config.use_json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer.clone())
            .with_ansi(false)
    });
    let text_file = (!config.use_json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(writer.clone())
            .with_ansi(false)
    });
    let stdout = (!config.use_json).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_file)
        .with(text_file)
        .with(stdout)
        .try_init()?;

    Ok(guard)
}

/// Unknown names never rotate
fn rotation(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

// sqlx logs every statement at info; keep it at warn unless asked for.
fn filter_directive(log_level: &str) -> String {
    if log_level.contains("sqlx") {
        log_level.to_string()
    } else {
        format!("{},sqlx=warn", log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_quiets_sqlx() {
        assert_eq!(filter_directive("info"), "info,sqlx=warn");
        assert_eq!(filter_directive("debug,sqlx=debug"), "debug,sqlx=debug");
    }

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("daily"), Rotation::DAILY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation("weekly"), Rotation::NEVER);
    }
}
