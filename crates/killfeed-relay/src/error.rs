//! 릴레이 서버 에러 타입.

use killfeed_core::KillfeedError;
use thiserror::Error;

/// 릴레이 에러.
#[derive(Debug, Error)]
pub enum RelayError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(String),

    /// pub/sub 전송 계층 에러
    #[error("Transport error: {0}")]
    Transport(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 직렬화/역직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 메트릭 레코더 에러
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 도메인 에러
    #[error(transparent)]
    Core(#[from] KillfeedError),
}

/// 릴레이 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        RelayError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}
