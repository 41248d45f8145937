//! Session over a real WebSocket
//!
//! A one-shot gateway is served on a loopback port with tokio-tungstenite.
//!
//! ```bash
//! cargo test -p lia-gateway --test websocket_tests
//! ```

use flate2::write::ZlibEncoder;
use flate2::Compression;
use futures_util::{SinkExt, StreamExt};
use lia_gateway::{
    GatewayMessage, IdentifyPayloadBuilder, OpCode, ReconnectingSession, SessionConfig,
    SessionEnd, SessionError, SessionEvent, WebSocketConnector,
};
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Text frame, or one zlib stream in a binary frame when `compress` is set
fn frame(payload: &Value, compress: bool) -> Message {
    if !compress {
        return Message::Text(payload.to_string());
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload.to_string().as_bytes()).unwrap();
    Message::Binary(encoder.finish().unwrap())
}

/// Accept one client: Hello, read the handshake, READY, one dispatch, then
/// close with `close_code`. Resolves to the handshake the client sent.
async fn serve_once(close_code: u16, compress: bool) -> (String, JoinHandle<GatewayMessage>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let hello = json!({"op": 10, "d": {"heartbeat_interval": 45_000}});
        ws.send(frame(&hello, compress)).await.unwrap();

        let handshake = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break GatewayMessage::from_json(&text).unwrap(),
                _ => continue,
            }
        };

        let ready = json!({"op": 0, "s": 1, "t": "READY", "d": {"session_id": "live-1"}});
        ws.send(frame(&ready, compress)).await.unwrap();
        let presence = json!({
            "op": 0, "s": 2, "t": "PRESENCE_UPDATE",
            "d": {"user": {"id": "9"}, "status": "idle"},
        });
        ws.send(frame(&presence, compress)).await.unwrap();

        ws.close(Some(CloseFrame {
            code: CloseCode::from(close_code),
            reason: "bye".into(),
        }))
        .await
        .unwrap();
        // wait for the client's half of the closing handshake
        while let Some(Ok(_)) = ws.next().await {}

        handshake
    });

    (url, server)
}

fn session(
    url: String,
    compress: bool,
) -> ReconnectingSession<WebSocketConnector, IdentifyPayloadBuilder> {
    ReconnectingSession::new(
        WebSocketConnector::new(url),
        IdentifyPayloadBuilder::new("live-token").compress(compress),
        SessionConfig {
            connect_timeout: Duration::from_secs(5),
            ..SessionConfig::default()
        },
    )
}

#[tokio::test]
async fn test_identify_and_normal_closure_over_websocket() {
    let (url, server) = serve_once(1000, false).await;
    let mut session = session(url, false);
    let mut events = session.subscribe();

    let end = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .expect("session should end when the server closes");
    assert_eq!(end.unwrap(), SessionEnd::NormalClosure);
    assert_eq!(session.state().session_id(), Some("live-1"));
    assert_eq!(session.state().sequence(), Some(2));

    let handshake = server.await.unwrap();
    assert_eq!(handshake.op, OpCode::Identify);
    let identify = handshake.d.unwrap();
    assert_eq!(identify["token"], "live-token");
    assert_eq!(identify["compress"], false);

    let mut dispatched = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Dispatch(dispatch) = event {
            dispatched.push(dispatch.name);
        }
    }
    assert_eq!(dispatched, vec!["READY", "PRESENCE_UPDATE"]);
}

#[tokio::test]
async fn test_fatal_close_over_websocket() {
    let (url, server) = serve_once(4004, false).await;
    let mut session = session(url, false);

    let result = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .expect("fatal close must not be retried");
    match result {
        Err(SessionError::ConnectionClosed { code, .. }) => assert_eq!(code, Some(4004)),
        other => panic!("unexpected outcome: {other:?}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn test_zlib_frames_over_websocket() {
    let (url, server) = serve_once(1000, true).await;
    let mut session = session(url, true);
    let mut events = session.subscribe();

    let end = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .expect("compressed frames should be inflated, not retried");
    assert_eq!(end.unwrap(), SessionEnd::NormalClosure);
    assert_eq!(session.state().session_id(), Some("live-1"));
    assert_eq!(session.state().sequence(), Some(2));

    let handshake = server.await.unwrap();
    assert_eq!(handshake.d.unwrap()["compress"], true);

    let mut dispatched = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Dispatch(dispatch) = event {
            dispatched.push(dispatch.name);
        }
    }
    assert_eq!(dispatched, vec!["READY", "PRESENCE_UPDATE"]);
}

#[tokio::test]
async fn test_refused_connection_is_a_transport_error() {
    // bind then drop so the port is very likely closed
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut session = ReconnectingSession::new(
        WebSocketConnector::new(url),
        IdentifyPayloadBuilder::new("live-token"),
        SessionConfig {
            reconnect: false,
            ..SessionConfig::default()
        },
    );

    let result = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .unwrap();
    assert!(matches!(result, Err(SessionError::Transport(_))));
}
