//! Duplex socket collaborator
//!
//! The engine owns a [`Transport`] exclusively and drives it with
//! fire-and-forget commands; the transport reports back through
//! [`TransportEvent`]s on a channel handed over at construction. The bundled
//! [`WebSocketTransport`] speaks WebSocket via tokio-tungstenite; tests
//! substitute a recording mock.

use crate::RpcError;
use futures_util::{SinkExt, StreamExt};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Events delivered from the socket to the engine.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket is open and ready to carry frames.
    Connected,
    /// The socket closed, locally or remotely.
    Disconnected { reason: Option<String> },
    /// An inbound text frame.
    Frame(String),
    /// A fatal socket error; the engine treats this as a disconnect.
    Error(String),
}

/// A duplex byte-stream socket to the node.
///
/// All methods are fire-and-forget: outcomes arrive as [`TransportEvent`]s.
pub trait Transport: Send + Sync + 'static {
    /// Open the socket. Emits `Connected` or `Disconnected` when resolved.
    fn connect(&self);
    /// Close the socket with the given close code.
    fn disconnect(&self, code: u16);
    /// Queue an outbound frame on the open socket.
    fn send(&self, frame: String) -> crate::Result<()>;
}

enum Outbound {
    Frame(String),
    Close(u16),
}

/// WebSocket transport over tokio-tungstenite.
///
/// Each `connect()` spawns a connection task owning the socket: it dials the
/// URL under the configured deadline, then pumps outbound frames from a queue
/// and forwards inbound frames as events until the socket dies.
pub struct WebSocketTransport {
    url: String,
    connection_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl WebSocketTransport {
    pub fn new(
        url: impl Into<String>,
        connection_timeout: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            connection_timeout,
            events,
            outbound: Mutex::new(None),
        }
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.outbound.lock() {
            // A replaced sender drops the previous connection task's queue,
            // which makes that task wind down on its next poll.
            *slot = Some(outbound_tx);
        }
        let url = self.url.clone();
        let timeout = self.connection_timeout;
        let events = self.events.clone();
        tokio::spawn(run_connection(url, timeout, events, outbound_rx));
    }

    fn disconnect(&self, code: u16) {
        let sender = match self.outbound.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(sender) = sender {
            let _ = sender.send(Outbound::Close(code));
        }
    }

    fn send(&self, frame: String) -> crate::Result<()> {
        let slot = self
            .outbound
            .lock()
            .map_err(|_| RpcError::Transport("transport state poisoned".to_string()))?;
        match slot.as_ref() {
            Some(sender) => sender
                .send(Outbound::Frame(frame))
                .map_err(|_| RpcError::Transport("connection task gone".to_string())),
            None => Err(RpcError::Transport("socket not open".to_string())),
        }
    }
}

/// Own the socket for the lifetime of one connection.
async fn run_connection(
    url: String,
    connection_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let dial = tokio_tungstenite::connect_async(url.as_str());
    let stream = match tokio::time::timeout(connection_timeout, dial).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            debug!("websocket dial to {} failed: {}", url, e);
            let _ = events.send(TransportEvent::Disconnected {
                reason: Some(e.to_string()),
            });
            return;
        }
        Err(_) => {
            debug!("websocket dial to {} timed out", url);
            let _ = events.send(TransportEvent::Disconnected {
                reason: Some(format!("connection timed out after {:?}", connection_timeout)),
            });
            return;
        }
    };

    info!("websocket connected to {}", url);
    let _ = events.send(TransportEvent::Connected);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        let _ = events.send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        });
                        return;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let close = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    let _ = sink.send(Message::Close(Some(close))).await;
                    let _ = events.send(TransportEvent::Disconnected { reason: None });
                    return;
                }
                // Queue dropped: this connection has been superseded.
                None => return,
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(text.to_string()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Frame(text));
                    }
                    Err(_) => warn!("dropping non-utf8 binary frame ({} bytes)", bytes.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    let _ = events.send(TransportEvent::Disconnected { reason });
                    return;
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return;
                }
                None => {
                    let _ = events.send(TransportEvent::Disconnected { reason: None });
                    return;
                }
            },
        }
    }
}
