//! 릴레이 서버 조립.
//!
//! `RelayServer`는 레지스트리 하나를 만들고 브로드캐스터, 프로토콜 핸들러,
//! WebSocket 엔드포인트에 공유합니다. 한 프로세스 안에 여러 서버가 공존할 수
//! 있습니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use killfeed_core::RelayConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::broadcaster::Broadcaster;
use crate::handler::ProtocolHandler;
use crate::ingestor::EventIngestor;
use crate::lookup::KillmailLookup;
use crate::registry::{ConnectionRegistry, SharedRegistry};
use crate::ws::websocket_handler;

/// axum 핸들러가 공유하는 상태.
#[derive(Clone)]
pub struct RelayState {
    /// 연결 레지스트리
    pub registry: SharedRegistry,
    /// 프로토콜 핸들러
    pub handler: Arc<ProtocolHandler>,
    /// 연결별 송신 큐 크기
    pub outbound_buffer: usize,
    /// Prometheus 렌더링 핸들
    pub metrics: Option<PrometheusHandle>,
}

/// 헬스 체크 응답.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// 상태
    pub status: &'static str,
    /// 활성 연결 수
    pub connections: usize,
    /// 서버 버전
    pub version: &'static str,
}

/// 릴레이 서버.
pub struct RelayServer {
    registry: SharedRegistry,
    broadcaster: Arc<Broadcaster>,
    handler: Arc<ProtocolHandler>,
    config: RelayConfig,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// 새 서버 생성.
    pub fn new(config: RelayConfig) -> Self {
        let registry = ConnectionRegistry::shared();
        Self {
            broadcaster: Arc::new(Broadcaster::new(registry.clone())),
            handler: Arc::new(ProtocolHandler::new(registry.clone())),
            registry,
            config,
            metrics: None,
        }
    }

    /// `/metrics`에서 렌더링할 Prometheus 핸들 설정.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// 연결 레지스트리.
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// 브로드캐스터.
    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// 이 서버로 팬아웃하는 수집기 생성.
    pub fn ingestor(&self, lookup: Arc<dyn KillmailLookup>) -> EventIngestor {
        EventIngestor::new(self.broadcaster(), lookup, self.config.lookup_timeout())
    }

    /// 핸들러 상태.
    pub fn state(&self) -> RelayState {
        RelayState {
            registry: self.registry.clone(),
            handler: Arc::clone(&self.handler),
            outbound_buffer: self.config.outbound_buffer,
            metrics: self.metrics.clone(),
        }
    }

    /// 전체 라우터 생성.
    ///
    /// - `GET /ws` - WebSocket 피드
    /// - `GET /health` - 헬스 체크
    /// - `GET /metrics` - Prometheus 메트릭
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(websocket_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state())
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer())
    }
}

/// /health 엔드포인트 핸들러.
async fn health_handler(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.len(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(State(state): State<RelayState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// CORS 레이어.
///
/// `CORS_ORIGINS`(쉼표 구분)가 있으면 해당 origin만, 없으면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .max_age(Duration::from_secs(3600))
}
