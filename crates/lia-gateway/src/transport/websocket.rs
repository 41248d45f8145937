//! WebSocket transport over tokio-tungstenite

use super::{Connector, Frame, Transport, TransportError};
use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use futures_util::{SinkExt, StreamExt};
use std::io::{self, Read};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connects to a fixed gateway URL (`wss://` uses rustls with webpki roots)
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport, TransportError> {
        let (stream, response) = connect_async(self.url.as_str()).await?;
        tracing::debug!(url = %self.url, status = %response.status(), "WebSocket connected");
        Ok(WebSocketTransport { stream })
    }
}

/// Live WebSocket connection
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message?,
                None => return Err(TransportError::ConnectionClosed),
            };

            match message {
                Message::Text(text) => return Ok(Frame::Text(text)),
                Message::Binary(data) => return decode_binary(data).map(Frame::Text),
                Message::Close(frame) => {
                    return Ok(match frame {
                        Some(frame) => Frame::Close {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.into_owned(),
                        },
                        None => Frame::Close {
                            code: None,
                            reason: String::new(),
                        },
                    });
                }
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// First byte of a zlib stream using deflate with a 32K window
const ZLIB_HEADER: u8 = 0x78;

/// With `compress: true` every binary frame is one complete zlib stream.
/// Anything else is taken as plain UTF-8 JSON.
fn decode_binary(data: Vec<u8>) -> Result<String, TransportError> {
    if data.first() != Some(&ZLIB_HEADER) {
        return String::from_utf8(data)
            .map_err(|_| TransportError::Protocol("binary frame is not UTF-8 JSON".to_string()));
    }

    let mut text = String::new();
    ZlibDecoder::new(data.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| TransportError::Protocol(format!("failed to inflate payload: {e}")))?;
    Ok(text)
}

impl From<WsError> for TransportError {
    fn from(error: WsError) -> Self {
        match error {
            WsError::Io(e) => Self::Io(e),
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                Self::Io(io::Error::from(io::ErrorKind::ConnectionReset))
            }
            WsError::Http(response) => Self::Http(response.status().as_u16()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}
