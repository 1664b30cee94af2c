//! Logging setup.
//!
//! Everything goes to stderr; stdout carries answers, chunk listings and
//! JSON output only. `RAGBASICS_LOG_FORMAT=json` switches to one JSON
//! object per event, which is easier to collect from long vectorize runs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{AppError, AppResult};

/// Env var selecting the log line format.
pub const LOG_FORMAT_ENV: &str = "RAGBASICS_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "Unknown log format '{}' (expected text or json)",
                other
            ))),
        }
    }

    fn from_env() -> AppResult<Self> {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(LogFormat::Text),
        }
    }
}

/// Build the level filter. An explicit level wins over `RUST_LOG`; with
/// neither, only info and above is shown.
fn build_filter(log_level: Option<&str>) -> AppResult<EnvFilter> {
    let directive = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
    };

    EnvFilter::try_new(&directive)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", directive, e)))
}

/// Install the global subscriber.
///
/// Fails with `AppError::Config` on a bad filter or format, or when a
/// subscriber is already installed.
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter = build_filter(log_level)?;

    let layer = match LogFormat::from_env()? {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(!no_color)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("").unwrap(), LogFormat::Text);
        assert!(LogFormat::parse("xml").is_err());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let result = init_logging(Some("ragbasics=notalevel"), true);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_explicit_level_builds() {
        assert!(build_filter(Some("ragbasics_knowledge=debug,warn")).is_ok());
    }
}
