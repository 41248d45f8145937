//! Bot configuration
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub app: AppSettings,
    pub gateway: GatewaySettings,
    pub reconnect: ReconnectSettings,
    pub database: DatabaseSettings,
    pub cascade: CascadeSettings,
    pub log: LogSettings,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway connection settings
#[derive(Clone)]
pub struct GatewaySettings {
    /// Bot token sent in Identify/Resume
    pub token: String,
    pub url: String,
    pub shard_id: Option<u32>,
    pub shard_count: Option<u32>,
    /// Raw intents bitmask; `None` means "use the bot's default set"
    pub intents: Option<u64>,
    pub presence_status: Option<String>,
    pub presence_activity: Option<String>,
    pub compress: bool,
    pub large_threshold: u32,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("token", &"<redacted>")
            .field("url", &self.url)
            .field("shard_id", &self.shard_id)
            .field("shard_count", &self.shard_count)
            .field("intents", &self.intents)
            .field("presence_status", &self.presence_status)
            .field("presence_activity", &self.presence_activity)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .finish()
    }
}

/// Reconnect/backoff settings
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub enabled: bool,
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Directory holding the SQL migrations run at startup
    pub migrations_dir: Option<String>,
}

/// Batching settings for the presence history writer
#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub max_wait: Duration,
    pub max_quantity: usize,
    pub max_wait_finalize: Duration,
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    /// `None` leaves the choice to the environment preset
    pub json: Option<bool>,
}

// Default value functions
fn default_app_name() -> String {
    "robolia".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_large_threshold() -> u32 {
    250
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_cascade_max_wait_ms() -> u64 {
    500
}

fn default_cascade_max_quantity() -> usize {
    100
}

fn default_cascade_max_wait_finalize_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BotConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let shard_id = vars.parse::<u32>("SHARD_ID")?;
        let shard_count = vars.parse::<u32>("SHARD_COUNT")?;
        if shard_id.is_some() != shard_count.is_some() {
            return Err(ConfigError::InvalidValue(
                "SHARD_ID",
                "SHARD_ID and SHARD_COUNT must be set together".to_string(),
            ));
        }
        if let (Some(id), Some(count)) = (shard_id, shard_count) {
            if id >= count {
                return Err(ConfigError::InvalidValue(
                    "SHARD_ID",
                    format!("shard {id} out of range for {count} shards"),
                ));
            }
        }

        let multiplier = vars
            .parse::<f64>("BACKOFF_MULTIPLIER")?
            .unwrap_or_else(default_backoff_multiplier);
        if multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "BACKOFF_MULTIPLIER",
                multiplier.to_string(),
            ));
        }

        let max_quantity = vars
            .parse::<usize>("CASCADE_MAX_QUANTITY")?
            .unwrap_or_else(default_cascade_max_quantity);
        if max_quantity == 0 {
            return Err(ConfigError::InvalidValue(
                "CASCADE_MAX_QUANTITY",
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars
                    .get("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewaySettings {
                token: vars.get("TOKEN").ok_or(ConfigError::MissingVar("TOKEN"))?,
                url: vars.get("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                shard_id,
                shard_count,
                intents: vars.parse::<u64>("GATEWAY_INTENTS")?,
                presence_status: vars.get("PRESENCE_STATUS"),
                presence_activity: vars.get("PRESENCE_ACTIVITY"),
                compress: vars.parse_bool("GATEWAY_COMPRESS")?.unwrap_or(true),
                large_threshold: vars
                    .parse::<u32>("GATEWAY_LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
            },
            reconnect: ReconnectSettings {
                enabled: vars.parse_bool("RECONNECT")?.unwrap_or(true),
                connect_timeout: Duration::from_secs(
                    vars.parse("CONNECT_TIMEOUT_SECS")?
                        .unwrap_or_else(default_connect_timeout_secs),
                ),
                initial_backoff: Duration::from_millis(
                    vars.parse("BACKOFF_INITIAL_MS")?
                        .unwrap_or_else(default_initial_backoff_ms),
                ),
                max_backoff: Duration::from_millis(
                    vars.parse("BACKOFF_MAX_MS")?
                        .unwrap_or_else(default_max_backoff_ms),
                ),
                multiplier,
            },
            database: DatabaseSettings {
                url: database_url(&vars)?,
                max_connections: vars
                    .parse("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: vars
                    .parse("DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
                migrations_dir: vars.get("DATABASE_MIGRATIONS_DIR"),
            },
            cascade: CascadeSettings {
                max_wait: Duration::from_millis(
                    vars.parse("CASCADE_MAX_WAIT_MS")?
                        .unwrap_or_else(default_cascade_max_wait_ms),
                ),
                max_quantity,
                max_wait_finalize: Duration::from_millis(
                    vars.parse("CASCADE_MAX_WAIT_FINALIZE_MS")?
                        .unwrap_or_else(default_cascade_max_wait_finalize_ms),
                ),
            },
            log: LogSettings {
                level: vars.get("LOG_LEVEL").unwrap_or_else(default_log_level),
                json: vars.parse_bool("LOG_JSON")?,
            },
        })
    }
}

/// `DATABASE_URL` wins; otherwise the DSN is assembled from the `POSTGRES_*` parts.
fn database_url<F>(vars: &Vars<'_, F>) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = vars.get("DATABASE_URL") {
        return Ok(url);
    }

    let user = vars.get("POSTGRES_USER").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
    let password = vars.get("POSTGRES_PASSWORD").unwrap_or_default();
    let host = vars.get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = vars.parse::<u16>("POSTGRES_PORT")?.unwrap_or(5432);
    let db = vars.get("POSTGRES_DB").ok_or(ConfigError::MissingVar("POSTGRES_DB"))?;

    Ok(format!("postgresql://{user}:{password}@{host}:{port}/{db}"))
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|raw| raw.parse::<T>().map_err(|_| ConfigError::InvalidValue(key, raw)))
            .transpose()
    }

    fn parse_bool(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        self.get(key)
            .map(|raw| match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue(key, raw)),
            })
            .transpose()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("TOKEN", "abc.def"),
        ("DATABASE_URL", "postgresql://lia@localhost/lia"),
    ];

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(MINIMAL).unwrap();

        assert_eq!(config.app.name, "robolia");
        assert_eq!(config.app.env, Environment::Development);
        assert_eq!(config.gateway.token, "abc.def");
        assert!(config.gateway.compress);
        assert_eq!(config.gateway.large_threshold, 250);
        assert!(config.gateway.shard_id.is_none());
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.connect_timeout, Duration::from_secs(60));
        assert_eq!(config.cascade.max_wait, Duration::from_millis(500));
        assert_eq!(config.cascade.max_quantity, 100);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[("DATABASE_URL", "postgresql://x")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("TOKEN")));
    }

    #[test]
    fn test_dsn_from_postgres_parts() {
        let config = load(&[
            ("TOKEN", "t"),
            ("POSTGRES_USER", "lia"),
            ("POSTGRES_PASSWORD", "secret"),
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_DB", "robolia"),
        ])
        .unwrap();

        assert_eq!(config.database.url, "postgresql://lia:secret@db:6543/robolia");
    }

    #[test]
    fn test_shard_pair_required() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("SHARD_ID", "0"));
        assert!(matches!(
            load(&pairs).unwrap_err(),
            ConfigError::InvalidValue("SHARD_ID", _)
        ));

        pairs.push(("SHARD_COUNT", "2"));
        let config = load(&pairs).unwrap();
        assert_eq!(config.gateway.shard_id, Some(0));
        assert_eq!(config.gateway.shard_count, Some(2));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("CASCADE_MAX_WAIT_MS", "soon"));
        let err = load(&pairs).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("CASCADE_MAX_WAIT_MS", ref v) if v == "soon"));
    }

    #[test]
    fn test_bool_parsing() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("RECONNECT", "off"));
        pairs.push(("LOG_JSON", "TRUE"));
        let config = load(&pairs).unwrap();
        assert!(!config.reconnect.enabled);
        assert_eq!(config.log.json, Some(true));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let config = load(MINIMAL).unwrap();
        let debug = format!("{:?}", config.gateway);
        assert!(!debug.contains("abc.def"));
        assert!(debug.contains("redacted"));
    }
}
