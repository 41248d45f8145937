//! One gateway connection
//!
//! Waits for Hello, keeps the heartbeat going, and turns incoming frames
//! into session-level outcomes. Reconnect policy lives in the session.

use crate::protocol::{CloseCode, GatewayMessage, OpCode, NORMAL_CLOSURE};
use crate::session::{DispatchEvent, SessionState};
use crate::transport::{Frame, Transport, TransportError};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Why a connection ended
#[derive(Debug)]
pub(crate) enum ConnectionLoss {
    /// The gateway asked for a new connection (op 7, op 9, a resumable close
    /// code, or a missed heartbeat ACK)
    Reconnect { resume: bool },
    /// Close frame with a code that does not allow resuming
    Closed { code: Option<u16>, reason: String },
    Transport(TransportError),
}

impl From<TransportError> for ConnectionLoss {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl std::fmt::Display for ConnectionLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconnect { resume } => write!(f, "reconnect requested (resume={resume})"),
            Self::Closed { code, reason } => write!(f, "closed with code {code:?}: {reason}"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

/// Map a close frame onto what the session should do next
pub(crate) fn classify_close(code: Option<u16>, reason: String) -> ConnectionLoss {
    match code {
        None | Some(NORMAL_CLOSURE) => ConnectionLoss::Closed { code, reason },
        Some(raw) => match CloseCode::from_u16(raw) {
            Some(known) if !known.is_recoverable() => ConnectionLoss::Closed { code, reason },
            // gateway codes that allow it, and transport-level codes like 1001/1006
            _ => ConnectionLoss::Reconnect { resume: true },
        },
    }
}

/// What a socket hands back to the session
#[derive(Debug)]
pub(crate) enum Received {
    Ready { session_id: String, event: DispatchEvent },
    Resumed { event: DispatchEvent },
    Dispatch(DispatchEvent),
}

struct Heartbeat {
    interval: Duration,
    next: Instant,
    acked: bool,
    sent_at: Option<Instant>,
}

impl Heartbeat {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
            acked: true,
            sent_at: None,
        }
    }
}

pub(crate) struct GatewaySocket<T> {
    transport: T,
    heartbeat: Heartbeat,
    shard_id: Option<u32>,
}

impl<T: Transport> GatewaySocket<T> {
    /// Wait for Hello on a freshly opened transport
    pub(crate) async fn open(mut transport: T, shard_id: Option<u32>) -> Result<Self, ConnectionLoss> {
        let hello = match transport.recv().await? {
            Frame::Text(text) => GatewayMessage::from_json(&text)
                .ok()
                .and_then(|msg| msg.as_hello())
                .ok_or_else(|| {
                    TransportError::Protocol("expected Hello as the first frame".to_string())
                })?,
            Frame::Close { code, reason } => return Err(classify_close(code, reason)),
        };

        let interval = Duration::from_millis(hello.heartbeat_interval);
        tracing::debug!(
            shard_id = ?shard_id,
            heartbeat_interval_ms = hello.heartbeat_interval,
            "Received Hello"
        );

        Ok(Self {
            transport,
            heartbeat: Heartbeat::new(interval),
            shard_id,
        })
    }

    pub(crate) async fn send(&mut self, message: &GatewayMessage) -> Result<(), ConnectionLoss> {
        let text = message
            .to_json()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.transport.send(text).await?;
        Ok(())
    }

    /// Close the connection with `code`, ignoring failures
    pub(crate) async fn close(&mut self, code: u16) {
        if let Err(e) = self.transport.close(code).await {
            tracing::debug!(error = %e, code, "Error while closing gateway connection");
        }
    }

    /// Run the connection until the next event worth reporting.
    ///
    /// Heartbeats, ACKs and mid-stream Hellos are handled here. Sequence
    /// numbers and the READY session id go straight into `state`.
    pub(crate) async fn next_event(
        &mut self,
        state: &mut SessionState,
    ) -> Result<Received, ConnectionLoss> {
        loop {
            let frame = tokio::select! {
                frame = self.transport.recv() => frame?,
                () = sleep_until(self.heartbeat.next) => {
                    self.beat(state.sequence()).await?;
                    continue;
                }
            };

            let text = match frame {
                Frame::Text(text) => text,
                Frame::Close { code, reason } => {
                    tracing::debug!(shard_id = ?self.shard_id, code = ?code, %reason, "Gateway sent close frame");
                    return Err(classify_close(code, reason));
                }
            };

            let message = match GatewayMessage::from_json(&text) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(shard_id = ?self.shard_id, error = %e, "Dropping undecodable gateway frame");
                    continue;
                }
            };

            if let Some(received) = self.handle(message, state).await? {
                return Ok(received);
            }
        }
    }

    async fn handle(
        &mut self,
        message: GatewayMessage,
        state: &mut SessionState,
    ) -> Result<Option<Received>, ConnectionLoss> {
        match message.op {
            OpCode::Dispatch => {
                if let Some(sequence) = message.s {
                    state.record_sequence(sequence);
                }

                let ready = message.as_ready();
                let event = DispatchEvent {
                    name: message.t.unwrap_or_default(),
                    sequence: message.s,
                    data: message.d.unwrap_or_default(),
                };

                if let Some(ready) = ready {
                    state.begin_session(ready.session_id.clone());
                    return Ok(Some(Received::Ready {
                        session_id: ready.session_id,
                        event,
                    }));
                }
                if event.name == "RESUMED" {
                    return Ok(Some(Received::Resumed { event }));
                }
                Ok(Some(Received::Dispatch(event)))
            }
            OpCode::Heartbeat => {
                // server asked for one right now; the regular schedule is unaffected
                let sequence = state.sequence();
                self.send(&GatewayMessage::heartbeat(sequence)).await?;
                Ok(None)
            }
            OpCode::HeartbeatAck => {
                self.heartbeat.acked = true;
                if let Some(sent_at) = self.heartbeat.sent_at {
                    tracing::trace!(
                        shard_id = ?self.shard_id,
                        latency_ms = sent_at.elapsed().as_millis() as u64,
                        "Heartbeat acknowledged"
                    );
                }
                Ok(None)
            }
            OpCode::Hello => {
                if let Some(hello) = message.as_hello() {
                    self.heartbeat = Heartbeat::new(Duration::from_millis(hello.heartbeat_interval));
                }
                Ok(None)
            }
            OpCode::Reconnect => {
                tracing::debug!(shard_id = ?self.shard_id, "Gateway requested a reconnect");
                self.close(CloseCode::UnknownError.as_u16()).await;
                Err(ConnectionLoss::Reconnect { resume: true })
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                if resumable {
                    self.close(CloseCode::UnknownError.as_u16()).await;
                } else {
                    state.invalidate();
                    self.close(NORMAL_CLOSURE).await;
                }
                Err(ConnectionLoss::Reconnect { resume: resumable })
            }
            OpCode::Identify | OpCode::PresenceUpdate | OpCode::Resume => {
                tracing::debug!(shard_id = ?self.shard_id, op = %message.op, "Ignoring client op from server");
                Ok(None)
            }
        }
    }

    /// Send the scheduled heartbeat, or give up on a zombied connection
    async fn beat(&mut self, sequence: Option<u64>) -> Result<(), ConnectionLoss> {
        if !self.heartbeat.acked {
            tracing::warn!(
                shard_id = ?self.shard_id,
                "Heartbeat was not acknowledged, reconnecting"
            );
            self.close(CloseCode::UnknownError.as_u16()).await;
            return Err(ConnectionLoss::Reconnect { resume: true });
        }

        self.send(&GatewayMessage::heartbeat(sequence)).await?;
        let now = Instant::now();
        self.heartbeat.acked = false;
        self.heartbeat.sent_at = Some(now);
        self.heartbeat.next = now + self.heartbeat.interval;
        Ok(())
    }
}
