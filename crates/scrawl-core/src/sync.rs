//! Relay wire contract and the native WebSocket client.
//!
//! The relay is a pure conduit: one shared room, no validation, no
//! ordering, no persistence. Convergence comes from the log semantics
//! (timestamp ordering + full re-reduction), not from the transport.

use crate::ops::Operation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ship newly appended operations to every peer.
    Update { ops: Vec<Operation> },
}

/// Messages received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server-assigned identity, sent once on connect.
    Assign { client_id: String },
    /// Operations from another client, rebroadcast verbatim.
    Updates { from: String, ops: Vec<Operation> },
    /// A client disconnected.
    PeerLeft { client_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events drained from the client via `poll_events()`.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    Assigned { client_id: String },
    UpdatesReceived { from: String, ops: Vec<Operation> },
    PeerLeft { client_id: String },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    BadScheme(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};
    use url::Url;

    enum WsCommand {
        Send(String),
        Close,
    }

    /// Thread-backed WebSocket client. The socket lives on a background
    /// thread; the owner drains events once per frame with `poll_events()`.
    pub struct RelayClient {
        state: ConnectionState,
        client_id: Option<String>,
        events: Vec<SyncEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl RelayClient {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                client_id: None,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            let parsed = Url::parse(url)?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(SyncError::BadScheme(parsed.scheme().to_string()));
            }

            self.state = ConnectionState::Connecting;
            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.client_id = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Ship operations to every peer.
        pub fn send_update(&self, ops: &[Operation]) -> Result<(), SyncError> {
            let msg = ClientMessage::Update { ops: ops.to_vec() };
            let json = serde_json::to_string(&msg)?;
            match &self.cmd_tx {
                Some(tx) => tx
                    .send(WsCommand::Send(json))
                    .map_err(|_| SyncError::NotConnected),
                None => Err(SyncError::NotConnected),
            }
        }

        /// Drain pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(rx) = &self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Assigned { client_id } => {
                            self.client_id = Some(client_id.clone())
                        }
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Server-assigned identity, once the `assign` message arrived.
        pub fn client_id(&self) -> Option<&str> {
            self.client_id.as_deref()
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for RelayClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for RelayClient {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("relay client connecting to {url}");
        let (mut socket, response) = match connect(url) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("relay connection failed: {e}");
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("connection failed: {e}"),
                });
                return;
            }
        };
        log::info!("relay connected, status {}", response.status());
        let _ = event_tx.send(SyncEvent::Connected);

        // Short read timeout so the loop stays responsive to commands.
        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(json)) => {
                    if let Err(e) = socket.send(Message::Text(json)) {
                        log::error!("relay send error: {e}");
                        break;
                    }
                }
                Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(msg) => {
                        let event = match msg {
                            ServerMessage::Assign { client_id } => {
                                SyncEvent::Assigned { client_id }
                            }
                            ServerMessage::Updates { from, ops } => {
                                SyncEvent::UpdatesReceived { from, ops }
                            }
                            ServerMessage::PeerLeft { client_id } => {
                                SyncEvent::PeerLeft { client_id }
                            }
                        };
                        let _ = event_tx.send(event);
                    }
                    Err(e) => log::warn!("unparseable relay message: {e}"),
                },
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("relay read error: {e}");
                    break;
                }
            }
        }
        let _ = event_tx.send(SyncEvent::Disconnected);
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::RelayClient;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Bounds, OpBody, Rgba, TextOp};

    #[test]
    fn test_client_message_tagging() {
        let op = Operation::new(
            "u1",
            7,
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            OpBody::Text(TextOp::new("hi", Rgba::black(), 16.0)),
        );
        let json = serde_json::to_value(ClientMessage::Update {
            ops: vec![op.clone()],
        })
        .unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["ops"][0]["tool"], "text");
        assert_eq!(json["ops"][0]["userId"], "u1");
    }

    #[test]
    fn test_server_message_round_trip() {
        let json = r#"{"type":"assign","client_id":"abc"}"#;
        match serde_json::from_str::<ServerMessage>(json).unwrap() {
            ServerMessage::Assign { client_id } => assert_eq!(client_id, "abc"),
            other => panic!("unexpected message: {other:?}"),
        }

        let op = Operation::new("u2", 9, Bounds::default(), OpBody::Clear);
        let msg = ServerMessage::Updates {
            from: "peer-1".to_string(),
            ops: vec![op.clone()],
        };
        let back: ServerMessage =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        match back {
            ServerMessage::Updates { from, ops } => {
                assert_eq!(from, "peer-1");
                assert_eq!(ops[0].id, op.id);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_peer_left_tagging() {
        let msg = ServerMessage::PeerLeft {
            client_id: "gone".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "peer_left");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_send_requires_connection() {
        let client = RelayClient::new();
        assert!(matches!(
            client.send_update(&[]),
            Err(SyncError::NotConnected)
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_bad_url_rejected() {
        let mut client = RelayClient::new();
        assert!(matches!(
            client.connect("http://example.com"),
            Err(SyncError::BadScheme(_))
        ));
        assert!(client.connect("not a url").is_err());
    }
}
