//! 실시간 킬메일 피드 와이어 프로토콜.
//!
//! 모든 메시지는 `type` 필드로 태그된 JSON 텍스트 프레임입니다.
//!
//! ## 클라이언트 → 서버
//!
//! ```json
//! {"type": "subscribe", "topics": ["all", "system.30000142"]}
//! {"type": "unsubscribe", "topics": ["all"]}
//! {"type": "ping"}
//! ```
//!
//! ## 서버 → 클라이언트
//!
//! ```json
//! {"type": "subscribed", "data": {"topics": ["all"]}}
//! {"type": "unsubscribed", "data": {"topics": ["all"]}}
//! {"type": "error", "message": "..."}
//! {"type": "pong"}
//! {"type": "killmail", "data": {...}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KillfeedError, KillfeedResult};
use crate::killmail::KillmailEvent;
use crate::topic::Topic;

// ==================== 클라이언트 → 서버 메시지 ====================

/// 클라이언트에서 서버로 보내는 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 토픽 구독
    Subscribe {
        /// 구독할 토픽 목록
        topics: Vec<Topic>,
    },
    /// 토픽 구독 해제
    Unsubscribe {
        /// 구독 해제할 토픽 목록
        topics: Vec<Topic>,
    },
    /// 핑 (연결 유지)
    Ping,
    /// 알 수 없는 `type` (무시됨)
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> KillfeedResult<Self> {
        serde_json::from_str(json).map_err(|e| KillfeedError::InvalidMessage(e.to_string()))
    }

    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> KillfeedResult<String> {
        serde_json::to_string(self).map_err(KillfeedError::from)
    }
}

// ==================== 서버 → 클라이언트 메시지 ====================

/// 구독/구독 해제 확인 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicList {
    /// 토픽 목록
    pub topics: Vec<Topic>,
}

/// 서버에서 클라이언트로 보내는 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 구독 확인
    Subscribed { data: TopicList },
    /// 구독 해제 확인
    Unsubscribed { data: TopicList },
    /// 에러
    Error {
        /// 에러 메시지
        message: String,
    },
    /// 퐁 응답
    Pong,
    /// 킬메일 이벤트
    Killmail { data: KillmailEvent },
}

impl ServerMessage {
    /// 구독 확인 메시지 생성.
    pub fn subscribed(topics: Vec<Topic>) -> Self {
        ServerMessage::Subscribed {
            data: TopicList { topics },
        }
    }

    /// 구독 해제 확인 메시지 생성.
    pub fn unsubscribed(topics: Vec<Topic>) -> Self {
        ServerMessage::Unsubscribed {
            data: TopicList { topics },
        }
    }

    /// 에러 메시지 생성 헬퍼.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// 메시지 종류.
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::Subscribed { .. } => MessageKind::Subscribed,
            ServerMessage::Unsubscribed { .. } => MessageKind::Unsubscribed,
            ServerMessage::Error { .. } => MessageKind::Error,
            ServerMessage::Pong => MessageKind::Pong,
            ServerMessage::Killmail { .. } => MessageKind::Killmail,
        }
    }

    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> KillfeedResult<String> {
        serde_json::to_string(self).map_err(KillfeedError::from)
    }

    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> KillfeedResult<Self> {
        serde_json::from_str(json).map_err(|e| KillfeedError::InvalidMessage(e.to_string()))
    }
}

/// 서버 메시지 종류 (`type` 필드 값).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Subscribed,
    Unsubscribed,
    Error,
    Pong,
    Killmail,
}

impl MessageKind {
    /// `type` 필드 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Subscribed => "subscribed",
            MessageKind::Unsubscribed => "unsubscribed",
            MessageKind::Error => "error",
            MessageKind::Pong => "pong",
            MessageKind::Killmail => "killmail",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = KillfeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribed" => Ok(MessageKind::Subscribed),
            "unsubscribed" => Ok(MessageKind::Unsubscribed),
            "error" => Ok(MessageKind::Error),
            "pong" => Ok(MessageKind::Pong),
            "killmail" => Ok(MessageKind::Killmail),
            other => Err(KillfeedError::InvalidMessage(format!(
                "unknown message type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_message_subscribe() {
        let json = r#"{"type": "subscribe", "topics": ["all", "system.30000142"]}"#;
        let msg = ClientMessage::from_json(json).unwrap();

        match msg {
            ClientMessage::Subscribe { topics } => {
                assert_eq!(topics.len(), 2);
                assert_eq!(topics[1], "system.30000142");
            }
            _ => panic!("Expected Subscribe message"),
        }
    }

    #[test]
    fn test_client_message_ping() {
        let msg = ClientMessage::from_json(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn test_client_message_unknown_type() {
        let msg = ClientMessage::from_json(r#"{"type": "auth", "token": "x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_client_message_malformed() {
        assert!(ClientMessage::from_json("{not json").is_err());
        assert!(ClientMessage::from_json(r#"{"type": "subscribe"}"#).is_err());
        assert!(ClientMessage::from_json("42").is_err());
    }

    #[test]
    fn test_client_message_serialization() {
        let json = ClientMessage::Unsubscribe {
            topics: vec!["a".to_string()],
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"unsubscribe","topics":["a"]}"#);
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(ServerMessage::Pong.to_json().unwrap(), r#"{"type":"pong"}"#);
        assert_eq!(
            ServerMessage::subscribed(vec!["all".to_string()])
                .to_json()
                .unwrap(),
            r#"{"type":"subscribed","data":{"topics":["all"]}}"#
        );
        assert_eq!(
            ServerMessage::error("bad").to_json().unwrap(),
            r#"{"type":"error","message":"bad"}"#
        );
    }

    #[test]
    fn test_killmail_message() {
        let event = KillmailEvent::new(1, dec!(2000000000), 30000142, "The Forge");
        let msg = ServerMessage::Killmail { data: event };
        let json = msg.to_json().unwrap();

        assert!(json.starts_with(r#"{"type":"killmail","data":{"killmailId":1"#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
        assert_eq!(msg.kind(), MessageKind::Killmail);
    }

    #[test]
    fn test_message_kind_from_str() {
        assert_eq!("pong".parse::<MessageKind>().unwrap(), MessageKind::Pong);
        assert!("welcome".parse::<MessageKind>().is_err());
    }
}
