//! Logging initialization (console + optional rolling file output)

use crate::config::LoggingConfig;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the non-blocking file writer alive; drop it last to flush buffered lines.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {e}", config.level))?;

    let console_layer = if config.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, file_guard) = if config.file_enabled {
        let rotation = parse_rotation(&config.file_rotation)?;
        let appender =
            rolling::RollingFileAppender::new(rotation, &config.file_directory, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn parse_rotation(value: &str) -> anyhow::Result<rolling::Rotation> {
    match value.trim().to_ascii_lowercase().as_str() {
        "daily" => Ok(rolling::Rotation::DAILY),
        "hourly" => Ok(rolling::Rotation::HOURLY),
        "minutely" => Ok(rolling::Rotation::MINUTELY),
        "never" => Ok(rolling::Rotation::NEVER),
        other => anyhow::bail!("Unknown log rotation '{other}'"),
    }
}
