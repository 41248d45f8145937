//! Bot wiring
//!
//! Connects the configuration, the database, the presence recorder and the
//! gateway session, and tears them down in order.

use crate::statistics::{PresenceRecorder, PresenceTracker, DEFAULT_DEDUP_WINDOW};
use anyhow::Context;
use lia_cascade::CascadeConfig;
use lia_common::{BotConfig, CascadeSettings, GatewaySettings};
use lia_db::{
    create_pool, run_migrations, Counter, CounterRepository, DatabaseConfig, PgCounterRepository,
    PgPresenceRepository,
};
use lia_gateway::{
    Activity, BackoffConfig, IdentifyPayloadBuilder, Intents, ReconnectingSession, SessionConfig,
    SessionEnd, SessionEvent, UserStatus, WebSocketConnector,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

/// Intents asked for when `GATEWAY_INTENTS` is not set
pub fn default_intents() -> Intents {
    Intents::GUILDS
        | Intents::GUILD_MEMBERS
        | Intents::GUILD_MESSAGES
        | Intents::DIRECT_MESSAGES
        | Intents::MESSAGE_CONTENT
        | Intents::GUILD_PRESENCES
}

/// Identify payload builder for the configured token, shard and presence
pub fn identify_builder(settings: &GatewaySettings) -> anyhow::Result<IdentifyPayloadBuilder> {
    let status = settings
        .presence_status
        .as_deref()
        .map(str::parse::<UserStatus>)
        .transpose()
        .map_err(anyhow::Error::msg)
        .context("PRESENCE_STATUS")?;

    let intents = settings
        .intents
        .map_or_else(default_intents, Intents::from_bits_retain);

    Ok(IdentifyPayloadBuilder::new(settings.token.clone())
        .compress(settings.compress)
        .large_threshold(settings.large_threshold)
        .shard(settings.shard_id, settings.shard_count)
        .status(status)
        .activity(settings.presence_activity.as_deref().map(Activity::playing))
        .intents(Some(intents)))
}

pub fn session_config(config: &BotConfig) -> SessionConfig {
    SessionConfig {
        reconnect: config.reconnect.enabled,
        connect_timeout: config.reconnect.connect_timeout,
        backoff: BackoffConfig {
            initial_delay: config.reconnect.initial_backoff,
            max_delay: config.reconnect.max_backoff,
            multiplier: config.reconnect.multiplier,
        },
        shard_id: config.gateway.shard_id,
        ..SessionConfig::default()
    }
}

pub fn cascade_config(settings: &CascadeSettings) -> CascadeConfig {
    CascadeConfig::new(settings.max_wait, settings.max_quantity)
        .with_max_wait_finalize(settings.max_wait_finalize)
}

/// Drain session events until the session is dropped
///
/// Every new session (READY) advances the persisted counter.
async fn consume_events(
    mut events: broadcast::Receiver<SessionEvent>,
    recorder: Arc<PresenceRecorder>,
    counters: PgCounterRepository,
    mut sessions: Counter,
) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Dispatch(event)) => recorder.handle(&event),
            Ok(SessionEvent::Connected { session_id }) => {
                match counters.increment(&mut sessions).await {
                    Ok(()) => info!(%session_id, count = sessions.current(), "Session counted"),
                    Err(e) => warn!(%session_id, error = %e, "Failed to persist session counter"),
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event consumer lagging, dispatches dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Run the bot until the gateway closes for good or Ctrl-C
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    info!("Connecting to PostgreSQL...");
    let db_config = DatabaseConfig::from_settings(&config.database);
    let pool = create_pool(&db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&pool, &db_config.migrations_dir)
        .await
        .context("Failed to run migrations")?;
    info!("PostgreSQL ready");

    let counters = PgCounterRepository::new(pool.clone());
    let sessions = counters.latest().await.context("Failed to load counter")?;

    let recorder = Arc::new(PresenceRecorder::new(
        Arc::new(PgPresenceRepository::new(pool.clone())),
        cascade_config(&config.cascade),
        PresenceTracker::new(DEFAULT_DEDUP_WINDOW),
    )?);
    recorder.start()?;

    let handshake = identify_builder(&config.gateway)?;
    let mut session = ReconnectingSession::new(
        WebSocketConnector::new(config.gateway.url.clone()),
        handshake,
        session_config(&config),
    );
    let consumer = tokio::spawn(consume_events(
        session.subscribe(),
        Arc::clone(&recorder),
        counters,
        sessions,
    ));

    info!(
        url = %config.gateway.url,
        shard_id = ?config.gateway.shard_id,
        "Starting gateway session"
    );

    let shutdown = session.shutdown_handle();
    let outcome = tokio::select! {
        outcome = session.run() => outcome,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown signal received");
            shutdown.shutdown();
            Ok(SessionEnd::Shutdown)
        }
    };

    // closes the event channel so the consumer finishes what is buffered
    drop(session);
    if let Err(e) = consumer.await {
        warn!(error = %e, "Event consumer ended abnormally");
    }

    let stats = recorder.stats();
    recorder.stop(true).await;
    info!(
        enqueued = stats.enqueued(),
        batches = stats.dispatched_batches(),
        "Presence recorder drained"
    );
    pool.close().await;

    match outcome {
        Ok(end) => {
            info!(?end, "Gateway session ended");
            Ok(())
        }
        Err(e) => {
            error!(close_code = ?e.close_code(), error = %e, "Gateway session failed");
            Err(e.into())
        }
    }
}
