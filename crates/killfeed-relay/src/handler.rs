//! 연결 프로토콜 핸들러.
//!
//! 클라이언트 텍스트 프레임을 `ClientMessage`로 디코딩하고, 레지스트리를
//! 변경한 뒤 응답 메시지를 돌려줍니다. 소켓 I/O와 분리되어 있어 동기식으로
//! 테스트할 수 있습니다.

use killfeed_core::{invalid_topics, ClientMessage, ServerMessage, Topic};
use tracing::{debug, warn};

use crate::metrics;
use crate::registry::{ConnectionId, SharedRegistry};

/// 프로토콜 핸들러.
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    registry: SharedRegistry,
}

impl ProtocolHandler {
    /// 레지스트리를 공유하는 핸들러 생성.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// 텍스트 프레임 하나를 처리합니다.
    ///
    /// 잘못된 JSON은 `error` 응답이 되고 연결은 유지됩니다.
    /// 알 수 없는 `type`은 응답 없이 무시합니다.
    pub fn handle_text(&self, connection_id: ConnectionId, text: &str) -> Option<ServerMessage> {
        match ClientMessage::from_json(text) {
            Ok(message) => self.handle(connection_id, message),
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Invalid client message");
                Some(ServerMessage::error(format!("Invalid message: {}", e)))
            }
        }
    }

    /// 디코딩된 메시지 처리.
    pub fn handle(&self, connection_id: ConnectionId, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Subscribe { topics } => Some(self.subscribe(connection_id, topics)),
            ClientMessage::Unsubscribe { topics } => Some(self.unsubscribe(connection_id, topics)),
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::Unknown => {
                debug!(connection_id = %connection_id, "Ignoring unknown message type");
                None
            }
        }
    }

    /// 구독 배치 처리.
    ///
    /// 배치 안에 유효하지 않은 토픽이 하나라도 있으면 배치 전체를 거부하고
    /// 아무 토픽도 추가하지 않습니다.
    fn subscribe(&self, connection_id: ConnectionId, topics: Vec<Topic>) -> ServerMessage {
        let invalid = invalid_topics(&topics);
        if !invalid.is_empty() {
            metrics::record_subscribe_rejected();
            warn!(connection_id = %connection_id, invalid = ?invalid, "Subscribe batch rejected");
            return ServerMessage::error(format!("Invalid topics: {}", invalid.join(", ")));
        }

        match self.registry.add_topics(&connection_id, &topics) {
            Some(total) => {
                debug!(connection_id = %connection_id, topics = ?topics, total, "Subscribed");
                ServerMessage::subscribed(topics)
            }
            None => {
                warn!(connection_id = %connection_id, "Subscribe from unregistered connection");
                ServerMessage::error("Connection is not registered")
            }
        }
    }

    /// 구독 해제 처리.
    ///
    /// 보유하지 않은 토픽은 무시하며, 응답은 항상 요청 목록을 그대로 돌려줍니다.
    fn unsubscribe(&self, connection_id: ConnectionId, topics: Vec<Topic>) -> ServerMessage {
        let remaining = self.registry.remove_topics(&connection_id, &topics);
        debug!(connection_id = %connection_id, topics = ?topics, remaining = ?remaining, "Unsubscribed");
        ServerMessage::unsubscribed(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionRegistry;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn setup() -> (ProtocolHandler, SharedRegistry, ConnectionId) {
        let registry = ConnectionRegistry::shared();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        registry.register(id, tx);
        (ProtocolHandler::new(registry.clone()), registry, id)
    }

    #[test]
    fn test_subscribe_ack_and_idempotence() {
        let (handler, registry, id) = setup();

        let reply = handler.handle_text(id, r#"{"type":"subscribe","topics":["victim.10","all"]}"#);
        assert_eq!(
            reply,
            Some(ServerMessage::subscribed(vec![
                "victim.10".to_string(),
                "all".to_string()
            ]))
        );

        handler.handle_text(id, r#"{"type":"subscribe","topics":["all"]}"#);
        assert_eq!(registry.snapshot(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_subscribe_batch_is_all_or_nothing() {
        let (handler, registry, id) = setup();

        let reply = handler
            .handle_text(id, r#"{"type":"subscribe","topics":["all","system.bad!!"]}"#)
            .unwrap();

        match reply {
            ServerMessage::Error { message } => {
                assert!(message.contains("system.bad!!"));
                assert!(!message.contains("all,"));
            }
            other => panic!("Expected error, got {:?}", other),
        }
        assert!(registry.snapshot(&id).unwrap().is_empty());
    }

    #[test]
    fn test_zero_padded_id_is_rejected() {
        let (handler, registry, id) = setup();

        let reply = handler.handle_text(id, r#"{"type":"subscribe","topics":["victim.010"]}"#);
        assert_eq!(reply, Some(ServerMessage::error("Invalid topics: victim.010")));
        assert!(registry.snapshot(&id).unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe_echoes_request() {
        let (handler, registry, id) = setup();
        handler.handle_text(id, r#"{"type":"subscribe","topics":["5b"]}"#);

        let reply = handler.handle_text(id, r#"{"type":"unsubscribe","topics":["10b","5b"]}"#);
        assert_eq!(
            reply,
            Some(ServerMessage::unsubscribed(vec![
                "10b".to_string(),
                "5b".to_string()
            ]))
        );
        assert!(registry.snapshot(&id).unwrap().is_empty());
    }

    #[test]
    fn test_ping_and_unknown() {
        let (handler, registry, id) = setup();

        assert_eq!(handler.handle_text(id, r#"{"type":"ping"}"#), Some(ServerMessage::Pong));
        assert_eq!(handler.handle_text(id, r#"{"type":"hello"}"#), None);
        assert!(registry.snapshot(&id).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_keeps_state() {
        let (handler, registry, id) = setup();
        handler.handle_text(id, r#"{"type":"subscribe","topics":["all"]}"#);

        let reply = handler.handle_text(id, "{oops").unwrap();
        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert_eq!(registry.snapshot(&id).unwrap().len(), 1);
    }
}
