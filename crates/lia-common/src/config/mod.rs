//! Configuration structs

mod bot_config;

pub use bot_config::{
    AppSettings, BotConfig, CascadeSettings, ConfigError, DatabaseSettings, Environment,
    GatewaySettings, LogSettings, ReconnectSettings,
};
