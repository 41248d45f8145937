//! Bot entry point
//!
//! Run with:
//! ```bash
//! cargo run -p lia-bot
//! ```
//!
//! Configuration is loaded from environment variables.

use lia_common::{try_init_tracing, try_init_tracing_with_config, BotConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Config comes first: the subscriber is built from its log settings.
    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            if let Err(e) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {e}");
            }
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let tracing_config = TracingConfig::from_settings(&config.log, config.app.env);
    if let Err(e) = try_init_tracing_with_config(tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        name = %config.app.name,
        env = ?config.app.env,
        "Configuration loaded"
    );

    if let Err(e) = lia_bot::run(config).await {
        error!(error = ?e, "Bot stopped with an error");
        std::process::exit(1);
    }
}
