//! Logging Configuration

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "DEEPTERM_LOG_LEVEL";

pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

fn resolve_default_level() -> LevelFilter {
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(val) => parse_log_level(&val).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid {} '{}', falling back to default",
                LOG_LEVEL_ENV, val
            );
            LevelFilter::INFO
        }),
        Err(_) => LevelFilter::INFO,
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the `DEEPTERM_LOG_LEVEL` level applies
/// to every target. Records emitted through the `log` facade by the core
/// crate are bridged into the same subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(resolve_default_level().into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
