//! Scripted transport for driving a session without a network

#![allow(dead_code)]

use async_trait::async_trait;
use lia_gateway::{Connector, Frame, GatewayMessage, OpCode, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// One `recv` outcome
pub enum Step {
    Frame(Frame),
    Error(TransportError),
    /// Deliver nothing for this long
    Wait(Duration),
    WaitUntil(Instant),
}

/// What the next `connect` call does
pub enum Script {
    Refuse(TransportError),
    Accept { steps: Vec<Step>, auto_ack: bool },
}

impl Script {
    pub fn accept(steps: Vec<Step>) -> Self {
        Self::Accept {
            steps,
            auto_ack: true,
        }
    }

    pub fn silent(steps: Vec<Step>) -> Self {
        Self::Accept {
            steps,
            auto_ack: false,
        }
    }

    pub fn refuse() -> Self {
        Self::Refuse(TransportError::Io(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        )))
    }
}

#[derive(Default)]
struct Shared {
    scripts: VecDeque<Script>,
    connects: Vec<Instant>,
    sent: Vec<(usize, GatewayMessage)>,
    closes: Vec<(usize, u16)>,
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        let connector = Self::default();
        connector.shared.lock().scripts = scripts.into();
        connector
    }

    /// Times at which `connect` was called
    pub fn connects(&self) -> Vec<Instant> {
        self.shared.lock().connects.clone()
    }

    /// Frames sent on the given connection, heartbeats excluded
    pub fn sent_on(&self, connection: usize) -> Vec<GatewayMessage> {
        self.shared
            .lock()
            .sent
            .iter()
            .filter(|(index, msg)| *index == connection && msg.op != OpCode::Heartbeat)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn heartbeats_on(&self, connection: usize) -> Vec<GatewayMessage> {
        self.shared
            .lock()
            .sent
            .iter()
            .filter(|(index, msg)| *index == connection && msg.op == OpCode::Heartbeat)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn closes(&self) -> Vec<(usize, u16)> {
        self.shared.lock().closes.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport, TransportError> {
        let mut shared = self.shared.lock();
        let index = shared.connects.len();
        shared.connects.push(Instant::now());

        match shared.scripts.pop_front() {
            Some(Script::Refuse(error)) => Err(error),
            Some(Script::Accept { steps, auto_ack }) => Ok(ScriptedTransport {
                index,
                steps: steps.into(),
                auto_ack,
                shared: Arc::clone(&self.shared),
            }),
            // out of script: a connection that never says anything
            None => Ok(ScriptedTransport {
                index,
                steps: VecDeque::new(),
                auto_ack: false,
                shared: Arc::clone(&self.shared),
            }),
        }
    }
}

pub struct ScriptedTransport {
    index: usize,
    steps: VecDeque<Step>,
    auto_ack: bool,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let message = GatewayMessage::from_json(&text).expect("client sent invalid JSON");
        if self.auto_ack && message.op == OpCode::Heartbeat {
            self.steps
                .push_front(Step::Frame(text_frame(&GatewayMessage::heartbeat_ack())));
        }
        self.shared.lock().sent.push((self.index, message));
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            // waits stay queued until they elapse so a cancelled recv resumes them
            if let Some(Step::Wait(duration)) = self.steps.front() {
                let deadline = Instant::now() + *duration;
                self.steps[0] = Step::WaitUntil(deadline);
            }
            if let Some(Step::WaitUntil(deadline)) = self.steps.front() {
                sleep_until(*deadline).await;
                self.steps.pop_front();
                continue;
            }

            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => return Ok(frame),
                Some(Step::Error(error)) => return Err(error),
                Some(Step::Wait(_) | Step::WaitUntil(_)) => unreachable!(),
                None => std::future::pending::<()>().await,
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.shared.lock().closes.push((self.index, code));
        Ok(())
    }
}

fn text_frame(message: &GatewayMessage) -> Frame {
    Frame::Text(message.to_json().unwrap())
}

pub fn hello(interval_ms: u64) -> Step {
    Step::Frame(text_frame(&GatewayMessage::hello(interval_ms)))
}

pub fn ready(sequence: u64, session_id: &str) -> Step {
    Step::Frame(text_frame(&GatewayMessage::dispatch(
        "READY",
        sequence,
        json!({"v": 10, "session_id": session_id, "user": {"id": "1"}}),
    )))
}

pub fn resumed(sequence: u64) -> Step {
    Step::Frame(text_frame(&GatewayMessage::dispatch(
        "RESUMED",
        sequence,
        Value::Null,
    )))
}

pub fn dispatch(name: &str, sequence: u64, data: Value) -> Step {
    Step::Frame(text_frame(&GatewayMessage::dispatch(name, sequence, data)))
}

pub fn reconnect() -> Step {
    Step::Frame(text_frame(&GatewayMessage::reconnect()))
}

pub fn invalid_session(resumable: bool) -> Step {
    Step::Frame(text_frame(&GatewayMessage::invalid_session(resumable)))
}

pub fn close(code: Option<u16>) -> Step {
    Step::Frame(Frame::Close {
        code,
        reason: String::new(),
    })
}

pub fn reset() -> Step {
    Step::Error(TransportError::Io(io::Error::from(
        io::ErrorKind::ConnectionReset,
    )))
}

pub fn dropped() -> Step {
    Step::Error(TransportError::ConnectionClosed)
}
