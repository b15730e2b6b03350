//! # Killfeed Core
//!
//! 실시간 킬메일 브로드캐스트 파이프라인의 공통 타입을 제공합니다.
//!
//! - 킬메일 브로드캐스트 이벤트와 참가자
//! - 토픽 문법과 검증
//! - 라우팅 키 계산
//! - 클라이언트/서버 와이어 프로토콜
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod killmail;
pub mod logging;
pub mod protocol;
pub mod routing;
pub mod topic;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::killmail::{KillmailEvent, Participant};
pub use crate::logging::*;
pub use crate::protocol::{ClientMessage, MessageKind, ServerMessage, TopicList};
pub use crate::routing::routing_keys;
pub use crate::topic::{
    invalid_topics, is_valid_topic, validate_topics, Topic, TopicKind, ValueTier, TOPIC_ALL,
};
