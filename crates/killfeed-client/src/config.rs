//! 클라이언트 설정.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;

/// 물리 연결 공유 방식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// 모든 소비자가 하나의 물리 연결을 공유
    #[default]
    Shared,
    /// 소비자마다 별도의 물리 연결 (같은 프로토콜, 공유 없음)
    Dedicated,
}

/// 멀티플렉서 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 서버 WebSocket URL (예: `ws://127.0.0.1:3000/ws`)
    pub url: String,
    /// 첫 재연결 대기 시간 (밀리초)
    pub initial_backoff_ms: u64,
    /// 재연결 대기 시간 상한 (밀리초)
    pub max_backoff_ms: u64,
    /// 연결 유지 핑 간격 (초)
    pub ping_interval_secs: u64,
    /// 소비자별 이벤트 큐 크기
    pub event_buffer: usize,
    /// 연결 공유 방식
    pub mode: ConnectionMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            ping_interval_secs: 30,
            event_buffer: 256,
            mode: ConnectionMode::Shared,
        }
    }
}

impl ClientConfig {
    /// URL만 지정해 기본 설정 생성.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 연결 공유 방식 지정.
    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// 재연결 대기 시간 범위 지정.
    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// 설정값으로 백오프 상태 생성.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    /// 핑 간격.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}
