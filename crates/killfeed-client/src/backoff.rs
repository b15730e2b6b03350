//! 재연결 지수 백오프.

use std::time::Duration;

/// 지수 백오프 상태.
///
/// 대기 시간은 initial, 2×, 4×, … 로 늘어나며 `max`에서 멈춥니다.
/// 재시도 횟수에는 제한이 없습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// 새 백오프 생성. `initial`이 `max`보다 크면 `max`로 맞춥니다.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
            attempts: 0,
        }
    }

    /// 다음 재연결 대기 시간을 반환하고 상태를 진행합니다.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// 연결 성공 시 초기 상태로 되돌립니다.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    /// 다음에 반환될 대기 시간.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// 마지막 리셋 이후 재연결 시도 횟수.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
