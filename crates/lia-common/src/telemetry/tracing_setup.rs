//! Tracing subscriber setup
//!
//! `RUST_LOG` always wins over the configured level.

use crate::config::{Environment, LogSettings};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Crates that log every query or frame at `info`/`debug`
const NOISY_DEPENDENCIES: &[&str] = &["sqlx", "tungstenite", "tokio_tungstenite"];

/// Subscriber options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    /// One JSON object per event instead of the human format
    pub json: bool,
    /// Include file and line numbers
    pub file_line: bool,
    /// Include the module path of each event
    pub target: bool,
    /// Cap `NOISY_DEPENDENCIES` at `warn` unless the level is `trace`
    pub quiet_dependencies: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

impl TracingConfig {
    /// Human output with source locations in development, JSON everywhere else
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        let development = env.is_development();
        Self {
            level: Level::INFO,
            json: !development,
            file_line: development,
            target: true,
            quiet_dependencies: true,
        }
    }

    /// Environment preset with `LOG_LEVEL` / `LOG_JSON` applied on top.
    ///
    /// Unknown level names fall back to `INFO`.
    #[must_use]
    pub fn from_settings(settings: &LogSettings, env: Environment) -> Self {
        let preset = Self::for_environment(env);
        Self {
            level: settings.level.parse().unwrap_or(Level::INFO),
            json: settings.json.unwrap_or(preset.json),
            ..preset
        }
    }

    fn directives(&self) -> String {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        if self.quiet_dependencies && self.level != Level::TRACE {
            directives.extend(NOISY_DEPENDENCIES.iter().map(|krate| format!("{krate}=warn")));
        }
        directives.join(",")
    }
}

/// Install the subscriber with the development preset
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install the subscriber; fails if one is already installed
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let fmt_layer = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_target(config.target);
    let fmt_layer = if config.json {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
