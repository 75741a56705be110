//! WebSocket 适配层
//!
//! 把 axum 的 WebSocket 连接接到 [`ConnectionManager`](super::ConnectionManager)：
//! 注册连接、起写任务泵出站消息、循环分发入站控制消息。
//! 业务错误回 ack，不断开传输；连接关闭时清理全部房间成员关系。

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::connection::{ClientKind, ConnectionId, OutboundMessage};
use crate::core::ServerState;

/// 入站控制消息
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientMessage {
    Authenticate {
        token: String,
        #[serde(rename = "clientType")]
        client_type: ClientKind,
    },
    Subscribe {
        room: String,
    },
    Unsubscribe {
        room: String,
    },
    SubscribeDashboard {
        name: String,
    },
}

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let conn_id = state.connections.register(tx);

    // 写任务：出站队列 → WebSocket 帧
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let frame = json!({ "event": msg.event, "data": msg.data });
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Outbound frame serialization failed");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // 读循环：逐条分发入站控制消息
    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => dispatch(&state, conn_id, text.as_str()),
            Message::Close(_) => break,
            // Ping/Pong 由 axum 处理，二进制帧不在协议内
            _ => {}
        }
    }

    state.connections.on_disconnect(conn_id);
    writer.abort();
}

fn dispatch(state: &ServerState, conn_id: ConnectionId, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            state.connections.send_to(
                conn_id,
                OutboundMessage::new("error", json!({ "message": format!("Invalid message: {}", e) })),
            );
            return;
        }
    };

    match msg {
        ClientMessage::Authenticate { token, client_type } => {
            match state.connections.authenticate(conn_id, &token, client_type) {
                Ok(claims) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new("auth:success", json!({ "claims": claims })),
                ),
                Err(e) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new("auth:error", json!({ "message": e.to_string() })),
                ),
            }
        }
        ClientMessage::Subscribe { room } => {
            match state.connections.subscribe_room(conn_id, &room) {
                Ok(joined) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new("subscribe:ack", json!({ "room": joined.to_string() })),
                ),
                Err(e) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new(
                        "subscribe:error",
                        json!({ "room": room, "message": e.to_string() }),
                    ),
                ),
            }
        }
        ClientMessage::Unsubscribe { room } => {
            match state.connections.unsubscribe_room(conn_id, &room) {
                Ok(left) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new("unsubscribe:ack", json!({ "room": left.to_string() })),
                ),
                Err(e) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new(
                        "subscribe:error",
                        json!({ "room": room, "message": e.to_string() }),
                    ),
                ),
            }
        }
        ClientMessage::SubscribeDashboard { name } => {
            match state.connections.subscribe_dashboard(conn_id, &name) {
                Ok(joined) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new("subscribe:ack", json!({ "room": joined.to_string() })),
                ),
                Err(e) => state.connections.send_to(
                    conn_id,
                    OutboundMessage::new(
                        "subscribe:error",
                        json!({ "room": name, "message": e.to_string() }),
                    ),
                ),
            }
        }
    }
}
