/*!
 * Logging Module
 * Subscriber setup (console + rolling files) and request logging
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking,
    non_blocking::{NonBlocking, WorkerGuard},
    rolling,
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt, EnvFilter, Layer,
};

pub use config::LogConfig;

/// Writer guards. Buffered lines are flushed when these are dropped, so the
/// caller keeps them alive until shutdown.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// JSON lines for `error.log`, ERROR level only.
fn error_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(LevelFilter::ERROR)
}

/// Initialize the logging system
pub fn init(config: &LogConfig) -> LogGuards {
    if let Err(e) = std::fs::create_dir_all(&config.directory) {
        eprintln!(
            "Failed to create log directory {}: {}",
            config.directory.display(),
            e
        );
    }

    // All logs
    let file_appender = rolling::daily(&config.directory, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // Errors only
    let error_appender = rolling::daily(&config.directory, "error.log");
    let (error_writer, error_guard) = non_blocking(error_appender);

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let result = if config.is_production() {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer(error_writer))
            .with(console_layer)
            .try_init()
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer(error_writer))
            .with(console_layer)
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!("Logging initialized for {} environment", config.environment),
        Err(e) => eprintln!("Logging already initialized: {}", e),
    }

    LogGuards {
        _guards: vec![file_guard, error_guard, console_guard],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_keeps_every_writer_guard() {
        for environment in ["development", "production"] {
            let config = LogConfig {
                environment: environment.to_string(),
                level: "debug".to_string(),
                directory: std::env::temp_dir().join(format!("places-backend-logs-{environment}")),
            };
            let guards = init(&config);
            assert_eq!(guards._guards.len(), 3);
            assert!(config.directory.is_dir());
        }
    }
}
