//! Global `tracing` subscriber setup for the emulator binary.
//!
//! Filter resolution order: explicit directives, then `RUST_LOG`, then the
//! default directive.

use std::env;

use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::LoggingError;

/// Environment variable overriding the log directives.
pub const LOG_DIRECTIVES_ENV: &str = "ASIC_EMULATOR_LOG";
/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "ASIC_EMULATOR_LOG_FORMAT";

/// Output format of the formatter layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Explicit directives, e.g. `asic_model=debug,info`.
    pub directives: Option<String>,
    /// Directive used when neither explicit directives nor `RUST_LOG` apply.
    pub default_directive: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    /// Builds a configuration from [`LOG_DIRECTIVES_ENV`] and
    /// [`LOG_FORMAT_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(directives) = env::var(LOG_DIRECTIVES_ENV) {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Some(format) = env::var(LOG_FORMAT_ENV)
            .ok()
            .as_deref()
            .and_then(LogFormat::from_env_value)
        {
            config.format = format;
        }

        config
    }

    /// Switches the default directive to `debug`.
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.default_directive = "debug".to_string();
        if self.directives.is_none() {
            self.directives = Some(self.default_directive.clone());
        }
        self
    }

    fn resolve_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Some(directives) = &self.directives {
            EnvFilter::try_new(directives).map_err(|err| LoggingError::InvalidFilter(err.to_string()))
        } else {
            Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_directive)))
        }
    }
}

/// Installs the configured subscriber as the process-wide default.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] for unparseable directives and
/// [`LoggingError::SubscriberInit`] when a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.resolve_filter()?;
    match config.format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(tracing_fmt::layer().compact())
            .try_init()?,
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(tracing_fmt::layer().json().with_ansi(false))
            .try_init()?,
    }
    Ok(())
}
