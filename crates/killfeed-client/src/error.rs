//! 클라이언트 에러 타입.

use killfeed_core::KillfeedError;
use thiserror::Error;

/// 클라이언트 에러.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 멀티플렉서 액터가 종료됨
    #[error("Multiplexer is no longer running")]
    ChannelClosed,

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 구독할 수 없는 토픽 (서버에 보내지 않음)
    #[error("Invalid topics: {0}")]
    InvalidTopics(String),
}

/// 클라이언트 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<KillfeedError> for ClientError {
    fn from(err: KillfeedError) -> Self {
        match err {
            KillfeedError::InvalidTopic(topics) => ClientError::InvalidTopics(topics),
            other => ClientError::Serialization(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_topic_maps_to_invalid_topics() {
        let err = ClientError::from(KillfeedError::InvalidTopic("nope".to_string()));
        assert!(matches!(err, ClientError::InvalidTopics(ref topics) if topics == "nope"));
        assert_eq!(err.to_string(), "Invalid topics: nope");

        let err = ClientError::from(KillfeedError::Serialization("eof".to_string()));
        assert!(matches!(err, ClientError::Serialization(_)));
    }
}
