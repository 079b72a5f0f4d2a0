use crate::domain::settings::LogSettings;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub struct LoggingGuard {
    // Keeps the non-blocking writer alive so file logs get flushed
    _guards: Vec<WorkerGuard>,
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if settings.console_logging_enabled {
        Some(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_target(settings.show_target)
                .with_ansi(settings.ansi_colors),
        )
    } else {
        None
    };

    let file_layer = if settings.file_logging_enabled {
        let rotation = match settings.rotation.to_lowercase().as_str() {
            "hourly" => tracing_appender::rolling::Rotation::HOURLY,
            "minutely" => tracing_appender::rolling::Rotation::MINUTELY,
            "never" => tracing_appender::rolling::Rotation::NEVER,
            _ => tracing_appender::rolling::Rotation::DAILY,
        };

        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation,
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // File logs shouldn't have ANSI colors
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized");

    Ok(LoggingGuard { _guards: guards })
}
