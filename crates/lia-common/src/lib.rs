//! # lia-common
//!
//! Shared utilities: environment-driven configuration and tracing setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, BotConfig, CascadeSettings, ConfigError, DatabaseSettings, Environment,
    GatewaySettings, LogSettings, ReconnectSettings,
};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
