//! 킬메일 실시간 피드 클라이언트.
//!
//! 여러 로컬 소비자가 하나의 물리 WebSocket 연결을 공유하도록 해주는
//! 멀티플렉서입니다. 소비자별 네임스페이스 토픽 수요를 합쳐 서버에는 변경분만
//! 보내고, 연결이 끊기면 지수 백오프로 무한히 재연결한 뒤 전체를 재구독합니다.

pub mod backoff;
pub mod config;
pub mod demand;
pub mod error;
pub mod multiplexer;

pub use backoff::Backoff;
pub use config::{ClientConfig, ConnectionMode};
pub use demand::{ConsumerId, TopicDelta, TopicDemand};
pub use error::{ClientError, Result};
pub use multiplexer::{ClientEvent, ConnectionState, Consumer, Multiplexer, MultiplexerHandle};
