//! The reconnect loop

use super::{
    ConnectionState, DispatchEvent, HandshakeMode, SessionEvent, SessionState, SessionStatus,
};
use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::error::{SessionError, SessionResult};
use crate::identify::HandshakeBuilder;
use crate::protocol::{CloseCode, GatewayMessage, NORMAL_CLOSURE};
use crate::socket::{ConnectionLoss, GatewaySocket, Received};
use crate::transport::{Connector, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, timeout};

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reconnect after recoverable failures. When off, the first lost
    /// connection ends the session.
    pub reconnect: bool,
    /// Upper bound on opening the transport plus receiving Hello
    pub connect_timeout: Duration,
    pub backoff: BackoffConfig,
    /// Only used for logging and errors
    pub shard_id: Option<u32>,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            connect_timeout: Duration::from_secs(60),
            backoff: BackoffConfig::default(),
            shard_id: None,
            event_capacity: 1_024,
        }
    }
}

/// How a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The gateway closed the connection cleanly (1000)
    NormalClosure,
    /// `ShutdownHandle::shutdown` was called
    Shutdown,
}

/// Stops a running session from anywhere
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

enum Decision {
    Retry,
    Backoff(Duration),
    Stop(SessionResult<SessionEnd>),
}

/// A gateway session that survives connection loss
pub struct ReconnectingSession<C, H> {
    connector: C,
    handshake: H,
    config: SessionConfig,
    state: SessionState,
    backoff: ExponentialBackoff,
    status: SessionStatus,
    events: broadcast::Sender<SessionEvent>,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl<C, H> ReconnectingSession<C, H>
where
    C: Connector,
    H: HandshakeBuilder,
{
    pub fn new(connector: C, handshake: H, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            connector,
            handshake,
            backoff: ExponentialBackoff::new(config.backoff),
            config,
            state: SessionState::new(),
            status: SessionStatus::new(),
            events,
            shutdown: ShutdownHandle(Arc::new(shutdown_tx)),
            shutdown_rx,
        }
    }

    /// Receive lifecycle and dispatch events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Consecutive failed attempts since the last successful handshake
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Keep a gateway session alive until it ends for good.
    ///
    /// Transient failures are retried according to the decision rules in
    /// `decide`; the call only returns on a clean 1000 close, a shutdown
    /// request, or an error that retrying cannot fix.
    pub async fn run(&mut self) -> SessionResult<SessionEnd> {
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            if *shutdown.borrow() {
                return Ok(self.finish_shutdown());
            }

            let loss = tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => return Ok(self.finish_shutdown()),
                loss = self.run_connection() => loss,
            };

            match self.decide(loss) {
                Decision::Retry => {}
                Decision::Backoff(delay) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.wait_for(|stop| *stop) => return Ok(self.finish_shutdown()),
                        () = sleep(delay) => {}
                    }
                    self.state.set_resume(true);
                }
                Decision::Stop(result) => {
                    self.status.set(if result.is_ok() {
                        ConnectionState::Disconnected
                    } else {
                        ConnectionState::Error
                    });
                    return result;
                }
            }
        }
    }

    fn finish_shutdown(&self) -> SessionEnd {
        self.status.set(ConnectionState::Closing);
        tracing::info!(shard_id = ?self.config.shard_id, "Gateway session shutting down");
        self.status.set(ConnectionState::Disconnected);
        SessionEnd::Shutdown
    }

    /// One connection, from connect to loss. Never returns while connected.
    async fn run_connection(&mut self) -> ConnectionLoss {
        let mode = self.state.handshake_mode();
        self.status.set(ConnectionState::Connecting);
        self.emit(SessionEvent::Connecting {
            resume: mode == HandshakeMode::Resume,
        });

        let connect_timeout = self.config.connect_timeout;
        let mut socket = match timeout(connect_timeout, self.connect(mode)).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(loss)) => return loss,
            Err(_) => return TransportError::Timeout(connect_timeout).into(),
        };

        loop {
            match socket.next_event(&mut self.state).await {
                Ok(Received::Ready { session_id, event }) => {
                    self.backoff.reset();
                    self.status.set(ConnectionState::Connected);
                    tracing::info!(
                        shard_id = ?self.config.shard_id,
                        session_id = %session_id,
                        "Shard has connected to the gateway"
                    );
                    self.emit(SessionEvent::Connected { session_id });
                    self.emit(SessionEvent::Dispatch(event));
                }
                Ok(Received::Resumed { event }) => {
                    self.backoff.reset();
                    self.status.set(ConnectionState::Connected);
                    tracing::info!(
                        shard_id = ?self.config.shard_id,
                        session_id = ?self.state.session_id(),
                        "Shard has successfully resumed"
                    );
                    self.emit(SessionEvent::Resumed);
                    self.emit(SessionEvent::Dispatch(event));
                }
                Ok(Received::Dispatch(event)) => self.emit_dispatch(event),
                Err(loss) => return loss,
            }
        }
    }

    /// Open the transport, wait for Hello, and send the handshake
    async fn connect(
        &mut self,
        mode: HandshakeMode,
    ) -> Result<GatewaySocket<C::Transport>, ConnectionLoss> {
        let transport = self.connector.connect().await?;
        let mut socket = GatewaySocket::open(transport, self.config.shard_id).await?;
        self.handshake(&mut socket, mode).await?;
        Ok(socket)
    }

    async fn handshake(
        &mut self,
        socket: &mut GatewaySocket<C::Transport>,
        mode: HandshakeMode,
    ) -> Result<(), ConnectionLoss> {
        let message = match mode {
            HandshakeMode::Resume => {
                self.status.set(ConnectionState::Resuming);
                self.handshake.resume(&self.state)
            }
            HandshakeMode::Identify => None,
        };

        let message = match message {
            Some(message) => {
                tracing::info!(
                    shard_id = ?self.config.shard_id,
                    session_id = ?self.state.session_id(),
                    sequence = ?self.state.sequence(),
                    "Sending RESUME"
                );
                message
            }
            None => {
                self.status.set(ConnectionState::Identifying);
                tracing::info!(
                    shard_id = ?self.config.shard_id,
                    initial = self.state.initial(),
                    "Sending IDENTIFY"
                );
                self.handshake.identify(&self.state)
            }
        }
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

        socket.send(&message).await?;
        self.state.mark_handshake_sent();
        Ok(())
    }

    /// Decide what follows a lost connection.
    ///
    /// In order:
    /// 1. the gateway asked for a reconnect: retry at once, resuming or not as asked
    /// 2. reconnecting is disabled: stop, cleanly only for a 1000 close
    /// 3. shutdown already requested: stop
    /// 4. the peer reset the connection: resume at once
    /// 5. 4014: fail with `PrivilegedIntentsRequired`
    /// 6. any other close code that forbids reconnecting: fail
    /// 7. a clean 1000 close: stop
    /// 8. anything else: back off, then resume
    fn decide(&mut self, loss: ConnectionLoss) -> Decision {
        let shard_id = self.config.shard_id;
        self.status.set(ConnectionState::Disconnected);
        self.emit(SessionEvent::Disconnected);

        if let ConnectionLoss::Reconnect { resume } = loss {
            tracing::info!(
                shard_id = ?shard_id,
                resume,
                "Got a request to {} the websocket",
                if resume { "RESUME" } else { "IDENTIFY" }
            );
            self.backoff.reset();
            self.state.set_resume(resume);
            return Decision::Retry;
        }

        if !self.config.reconnect {
            return Decision::Stop(match loss {
                ConnectionLoss::Closed {
                    code: Some(NORMAL_CLOSURE),
                    ..
                } => Ok(SessionEnd::NormalClosure),
                loss => Err(self.fatal(loss)),
            });
        }

        if *self.shutdown_rx.borrow() {
            return Decision::Stop(Ok(SessionEnd::Shutdown));
        }

        match loss {
            ConnectionLoss::Transport(ref e) if e.is_connection_reset() => {
                tracing::info!(shard_id = ?shard_id, "Connection reset by peer, resuming");
                self.backoff.reset();
                self.state.force_resume();
                Decision::Retry
            }
            ConnectionLoss::Closed {
                code: Some(NORMAL_CLOSURE),
                ..
            } => {
                tracing::info!(shard_id = ?shard_id, "Gateway closed the session normally");
                Decision::Stop(Ok(SessionEnd::NormalClosure))
            }
            loss @ ConnectionLoss::Closed { .. } => Decision::Stop(Err(self.fatal(loss))),
            loss => {
                let delay = self.backoff.next_delay();
                let attempt = self.backoff.attempts();
                tracing::warn!(
                    shard_id = ?shard_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %loss,
                    "Attempting a reconnect"
                );
                self.emit(SessionEvent::Reconnecting { attempt, delay });
                Decision::Backoff(delay)
            }
        }
    }

    fn fatal(&self, loss: ConnectionLoss) -> SessionError {
        let error = match loss {
            ConnectionLoss::Closed {
                code: Some(code), ..
            } if code == CloseCode::DisallowedIntents.as_u16() => {
                SessionError::PrivilegedIntentsRequired {
                    shard_id: self.config.shard_id,
                }
            }
            ConnectionLoss::Closed { code, reason } => {
                SessionError::ConnectionClosed { code, reason }
            }
            ConnectionLoss::Transport(e) => SessionError::Transport(e),
            ConnectionLoss::Reconnect { .. } => SessionError::Transport(
                TransportError::Protocol("reconnect requested".to_string()),
            ),
        };

        tracing::error!(
            shard_id = ?self.config.shard_id,
            attempt = self.backoff.attempts(),
            close_code = ?error.close_code(),
            error = %error,
            "Gateway session failed"
        );
        error
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_dispatch(&self, event: DispatchEvent) {
        tracing::trace!(event = %event.name, sequence = ?event.sequence, "Dispatch");
        self.emit(SessionEvent::Dispatch(event));
    }
}

impl<C, H> std::fmt::Debug for ReconnectingSession<C, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("status", &self.status.get())
            .field("attempts", &self.backoff.attempts())
            .finish()
    }
}
