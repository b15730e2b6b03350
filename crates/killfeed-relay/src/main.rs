//! 킬메일 실시간 릴레이 서버 바이너리.
//!
//! # 환경 변수
//!
//! - `KILLFEED_CONFIG`: 설정 파일 경로 (기본값: `config/default.toml`)
//! - `KILLFEED__*`: 설정 값 덮어쓰기 (예: `KILLFEED__SERVER__PORT=8080`)
//! - `RUST_LOG`: 로그 필터

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use killfeed_core::{init_logging, AppConfig, LogConfig};
use killfeed_relay::lookup::{DisabledLookup, KillmailLookup, PgKillmailLookup};
use killfeed_relay::metrics::setup_metrics_recorder;
use killfeed_relay::{RelayServer, TransportSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config_path =
        std::env::var("KILLFEED_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let config = AppConfig::load(&config_path)?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!(config = %config_path, "Starting killfeed relay...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    // fallback 조회기 (DB가 없으면 ID만 있는 페이로드는 모두 버려짐)
    let lookup: Arc<dyn KillmailLookup> = match PgKillmailLookup::connect(&config.database).await {
        Ok(Some(lookup)) => Arc::new(lookup),
        Ok(None) => {
            warn!("database.url not set, killmail lookup fallback disabled");
            Arc::new(DisabledLookup)
        }
        Err(e) => {
            warn!(error = %e, "Database unavailable, killmail lookup fallback disabled");
            Arc::new(DisabledLookup)
        }
    };

    let server = RelayServer::new(config.relay.clone()).with_metrics(metrics_handle);
    let ingestor = Arc::new(server.ingestor(lookup));

    let shutdown_token = CancellationToken::new();

    let subscriber = TransportSubscriber::new(&config.redis)?;
    let subscriber_task = tokio::spawn(subscriber.run(ingestor, shutdown_token.clone()));
    info!(channel = %config.redis.channel, "Transport subscriber started");

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Relay server listening");
    info!("WebSocket available at ws://{}/ws", addr);

    axum::serve(listener, server.router())
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if tokio::time::timeout(Duration::from_secs(10), subscriber_task)
        .await
        .is_err()
    {
        warn!("Transport subscriber did not stop in time, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM을 받으면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
