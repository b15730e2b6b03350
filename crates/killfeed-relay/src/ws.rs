//! WebSocket 연결 처리.
//!
//! 연결마다 읽기 루프 하나와 쓰기 태스크 하나를 둡니다. 응답과 브로드캐스트
//! 프레임은 모두 제한된 송신 큐를 거치므로 소켓 sink를 건드리는 것은 쓰기
//! 태스크뿐입니다.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::registry::{ConnectionId, Frame, SharedRegistry};
use crate::server::RelayState;

/// WebSocket 업그레이드 핸들러.
///
/// # 엔드포인트
///
/// `GET /ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 연결이 어떤 식으로 끝나든 레지스트리에서 제거되도록 보장하는 가드.
struct RegistrationGuard {
    registry: SharedRegistry,
    connection_id: ConnectionId,
}

impl RegistrationGuard {
    fn register(registry: SharedRegistry, connection_id: ConnectionId, sender: mpsc::Sender<Frame>) -> Self {
        registry.register(connection_id, sender);
        metrics::increment_connections();
        Self {
            registry,
            connection_id,
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        let topics = self.registry.unregister(&self.connection_id);
        metrics::decrement_connections();
        info!(connection_id = %self.connection_id, topics = ?topics, "WebSocket disconnected");
    }
}

/// WebSocket 연결 처리.
async fn handle_socket(socket: WebSocket, state: RelayState) {
    let connection_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(state.outbound_buffer.max(1));
    let _guard = RegistrationGuard::register(
        state.registry.clone(),
        connection_id,
        outbound_tx.clone(),
    );
    info!(connection_id = %connection_id, "WebSocket connected");

    let (mut sink, stream) = socket.split();

    // 송신 큐 → 소켓
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::select! {
        _ = &mut writer => {
            debug!(connection_id = %connection_id, "Writer task ended");
        }
        _ = read_loop(connection_id, stream, outbound_tx, &state) => {
            debug!(connection_id = %connection_id, "Reader loop ended");
        }
    }

    writer.abort();
}

/// 클라이언트 프레임 수신 루프.
async fn read_loop(
    connection_id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    outbound: mpsc::Sender<Frame>,
    state: &RelayState,
) {
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let Some(reply) = state.handler.handle_text(connection_id, text.as_str()) else {
                    continue;
                };
                match reply.to_json() {
                    Ok(json) => {
                        if outbound.send(json.into()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to encode reply");
                    }
                }
            }
            Message::Binary(_) => {
                warn!(connection_id = %connection_id, "Binary messages not supported");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(connection_id = %connection_id, "Close frame received");
                break;
            }
        }
    }
}
