//! 킬메일 피드 공통 에러 타입.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum KillfeedError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 메시지 형식
    #[error("잘못된 메시지 형식: {0}")]
    InvalidMessage(String),

    /// 유효하지 않은 토픽
    #[error("유효하지 않은 토픽: {0}")]
    InvalidTopic(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type KillfeedResult<T> = Result<T, KillfeedError>;

impl KillfeedError {
    /// 클라이언트 입력이 원인인 에러인지 확인합니다.
    ///
    /// 이런 에러는 연결을 유지한 채 `error` 응답으로 돌려줍니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            KillfeedError::InvalidMessage(_) | KillfeedError::InvalidTopic(_)
        )
    }
}

impl From<serde_json::Error> for KillfeedError {
    fn from(err: serde_json::Error) -> Self {
        KillfeedError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for KillfeedError {
    fn from(err: config::ConfigError) -> Self {
        KillfeedError::Config(err.to_string())
    }
}
