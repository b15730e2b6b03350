//! Prometheus 메트릭 설정 및 헬퍼.
//!
//! 레코더가 설치되지 않은 경우(테스트 등) 모든 헬퍼는 아무 일도 하지 않습니다.
//! 메트릭 값은 관찰용이며 동작 결정에 쓰이지 않습니다.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{RelayError, Result};

/// 활성 WebSocket 연결 수 게이지.
pub const CONNECTIONS_ACTIVE: &str = "killfeed_connections_active";
/// 브로드캐스트된 이벤트 수.
pub const BROADCAST_EVENTS_TOTAL: &str = "killfeed_broadcast_events_total";
/// 송신 큐에 들어간 프레임 수.
pub const BROADCAST_DELIVERIES_TOTAL: &str = "killfeed_broadcast_deliveries_total";
/// 큐가 가득 차거나 닫혀 버려진 프레임 수.
pub const BROADCAST_DROPS_TOTAL: &str = "killfeed_broadcast_drops_total";
/// 수집 단계에서 버려진 페이로드 수 (`reason` 레이블).
pub const INGEST_DROPPED_TOTAL: &str = "killfeed_ingest_dropped_total";
/// 거부된 구독 배치 수.
pub const SUBSCRIBE_REJECTED_TOTAL: &str = "killfeed_subscribe_rejected_total";

/// Prometheus 레코더를 전역으로 설치하고 렌더링 핸들을 반환합니다.
///
/// 프로세스당 한 번만 호출할 수 있습니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RelayError::Metrics(e.to_string()))
}

// ============================================================================
// 연결 메트릭
// ============================================================================

/// 활성 연결 수 증가.
pub fn increment_connections() {
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// 활성 연결 수 감소.
pub fn decrement_connections() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

// ============================================================================
// 브로드캐스트 메트릭
// ============================================================================

/// 이벤트 하나의 팬아웃 결과 기록.
pub fn record_broadcast(delivered: usize, dropped: usize) {
    counter!(BROADCAST_EVENTS_TOTAL).increment(1);
    counter!(BROADCAST_DELIVERIES_TOTAL).increment(delivered as u64);
    if dropped > 0 {
        counter!(BROADCAST_DROPS_TOTAL).increment(dropped as u64);
    }
}

/// 수집 단계 드롭 기록.
pub fn record_ingest_drop(reason: &'static str) {
    counter!(INGEST_DROPPED_TOTAL, "reason" => reason).increment(1);
}

/// 구독 배치 거부 기록.
pub fn record_subscribe_rejected() {
    counter!(SUBSCRIBE_REJECTED_TOTAL).increment(1);
}
