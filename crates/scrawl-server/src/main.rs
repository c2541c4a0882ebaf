//! Scrawl WebSocket relay server.
//!
//! A pure fan-out conduit for operation updates. Every connection shares
//! one room; the server assigns each client an id, rebroadcasts `update`
//! payloads verbatim as `updates`, and announces departures. It never
//! inspects, orders, deduplicates or stores operations; convergence is
//! the clients' log semantics, not the transport's.
//!
//! ## Protocol
//!
//! Messages are JSON:
//! ```json
//! { "type": "update", "ops": [ ... ] }
//! { "type": "assign", "client_id": "<uuid>" }
//! { "type": "updates", "from": "<uuid>", "ops": [ ... ] }
//! { "type": "peer_left", "client_id": "<uuid>" }
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A message received from a client. Operations ride through as raw JSON
/// so the relay never interprets their contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Update { ops: Vec<serde_json::Value> },
}

/// A message broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Assign { client_id: String },
    Updates { from: String, ops: Vec<serde_json::Value> },
    PeerLeft { client_id: String },
}

/// Shared state: one broadcast channel for the single shared room.
struct AppState {
    tx: broadcast::Sender<(String, ServerMessage)>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrawl_server=info,tower_http=info".into()),
        )
        .init();

    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    let state = Arc::new(AppState { tx });

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3030));
    info!("scrawl relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:3030/ws");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}

async fn index() -> &'static str {
    "Scrawl Relay Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4().to_string();
    info!("new connection: {}", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.tx.subscribe();

    // Identity first; everything after is fan-out.
    let assign = ServerMessage::Assign {
        client_id: client_id.clone(),
    };
    let Ok(json) = serde_json::to_string(&assign) else {
        return;
    };
    if sender.send(Message::Text(json.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Update { ops }) => {
                                let _ = state.tx.send((
                                    client_id.clone(),
                                    ServerMessage::Updates {
                                        from: client_id.clone(),
                                        ops,
                                    },
                                ));
                            }
                            Err(e) => {
                                warn!("invalid message from {}: {}", client_id, e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ignore ping/pong/binary
                    Some(Err(e)) => {
                        warn!("websocket error for {}: {}", client_id, e);
                        break;
                    }
                }
            }

            msg = rx.recv() => {
                match msg {
                    // Never echo a client's own updates back.
                    Ok((from, server_msg)) => {
                        if from == client_id {
                            continue;
                        }
                        let Ok(json) = serde_json::to_string(&server_msg) else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("client {} lagged, dropped {} messages", client_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = state.tx.send((
        client_id.clone(),
        ServerMessage::PeerLeft {
            client_id: client_id.clone(),
        },
    ));
    info!("connection closed: {}", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_parses_without_touching_ops() {
        let raw = r#"{"type":"update","ops":[{"tool":"stroke","anything":"goes"}]}"#;
        let ClientMessage::Update { ops } = serde_json::from_str(raw).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["anything"], "goes");
    }

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::Assign {
            client_id: "c1".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "assign");
        assert_eq!(json["client_id"], "c1");

        let msg = ServerMessage::PeerLeft {
            client_id: "c2".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "peer_left");
    }

    #[test]
    fn test_updates_round_trip_verbatim() {
        let ops = vec![serde_json::json!({"tool":"clear","userId":"u1"})];
        let msg = ServerMessage::Updates {
            from: "c1".to_string(),
            ops: ops.clone(),
        };
        let back: ServerMessage =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        match back {
            ServerMessage::Updates { from, ops: got } => {
                assert_eq!(from, "c1");
                assert_eq!(got, ops);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
