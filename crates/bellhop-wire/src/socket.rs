//! Socket boundary: a framed text transport with connect/close semantics.
//!
//! The socket does not interpret payloads; it turns a persistent duplex byte
//! channel into a stream of [`SocketEvent`]s plus a serialized `send`.

use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Boxed event stream produced by [`Communicator::events`].
pub type BoxEventStream = Pin<Box<dyn Stream<Item = SocketEvent> + Send>>;

/// Something that happened on the channel.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// One inbound text frame.
    Message(String),
    /// The channel closed; no further events follow.
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("socket closed")]
    Closed,
}

/// Object-safe transport seam between the RPC layer and a concrete channel.
///
/// `events` may be consumed once; a second call reports the socket closed.
#[async_trait]
pub trait Communicator: Send + Sync {
    async fn send(&self, text: String) -> Result<(), SocketError>;
    async fn events(&self) -> Result<BoxEventStream, SocketError>;
    async fn close(&self) -> Result<(), SocketError>;
}

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Websocket-backed communicator.
///
/// Sends are serialized through a mutex over the write half so concurrent
/// transactions never interleave partial frames.
pub struct WsCommunicator {
    write: Mutex<WsSink>,
    read: Mutex<Option<WsSource>>,
}

impl WsCommunicator {
    /// Open a websocket to `url`. Resolves once the handshake completes.
    pub async fn connect(url: &Url) -> Result<Self, SocketError> {
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| SocketError::ConnectionFailed(e.to_string()))?;
        let (write, read) = ws.split();
        Ok(Self {
            write: Mutex::new(write),
            read: Mutex::new(Some(read)),
        })
    }
}

#[async_trait]
impl Communicator for WsCommunicator {
    async fn send(&self, text: String) -> Result<(), SocketError> {
        self.write
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn events(&self) -> Result<BoxEventStream, SocketError> {
        let mut read = self.read.lock().await.take().ok_or(SocketError::Closed)?;
        let stream = async_stream::stream! {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => yield SocketEvent::Message(text),
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        yield SocketEvent::Closed { code, reason };
                        break;
                    }
                    // Ping/pong are answered by tungstenite; binary frames are
                    // not part of this protocol.
                    Ok(_) => {}
                    Err(e) => {
                        yield SocketEvent::Closed { code: None, reason: e.to_string() };
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<(), SocketError> {
        self.write
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// In-memory communicator half, paired by [`channel_pair`].
///
/// Stands in for the websocket in tests and for custom transports.
pub struct ChannelCommunicator {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ChannelCommunicator {
    fn new(tx: mpsc::UnboundedSender<String>, rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }
}

#[async_trait]
impl Communicator for ChannelCommunicator {
    async fn send(&self, text: String) -> Result<(), SocketError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx
                .send(text)
                .map_err(|_| SocketError::SendFailed("peer dropped".to_string())),
            None => Err(SocketError::Closed),
        }
    }

    async fn events(&self) -> Result<BoxEventStream, SocketError> {
        let mut rx = self.rx.lock().await.take().ok_or(SocketError::Closed)?;
        let stream = async_stream::stream! {
            while let Some(text) = rx.recv().await {
                yield SocketEvent::Message(text);
            }
            yield SocketEvent::Closed { code: None, reason: "peer dropped".to_string() };
        };
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<(), SocketError> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

/// Create a matched pair of in-memory communicators; what one sends, the
/// other receives.
pub fn channel_pair() -> (ChannelCommunicator, ChannelCommunicator) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        ChannelCommunicator::new(a_tx, b_rx),
        ChannelCommunicator::new(b_tx, a_rx),
    )
}
