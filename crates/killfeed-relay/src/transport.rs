//! Redis pub/sub 전송 계층.
//!
//! 구독자는 단일 채널을 구독하여 메시지마다 수집기를 호출합니다. 연결이
//! 끊기거나 열리지 않으면 고정 지연 후 무한히 재구독합니다.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use killfeed_core::RedisConfig;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RelayError, Result};
use crate::ingestor::{EventIngestor, TransportPayload};

/// 구독 세션 종료 원인.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// 종료 토큰 취소
    Shutdown,
    /// 서버 측 스트림 종료
    StreamClosed,
}

/// pub/sub 채널 구독자.
#[derive(Debug, Clone)]
pub struct TransportSubscriber {
    client: Client,
    channel: String,
    resubscribe_delay: Duration,
}

impl TransportSubscriber {
    /// 설정으로 구독자 생성 (아직 연결하지 않음).
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            channel: config.channel.clone(),
            resubscribe_delay: config.resubscribe_delay(),
        })
    }

    /// 종료 토큰이 취소될 때까지 구독을 유지합니다.
    pub async fn run(self, ingestor: Arc<EventIngestor>, shutdown: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            match self.subscribe_once(&ingestor, &shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::StreamClosed) => {
                    attempt = 0;
                    warn!(channel = %self.channel, "Pub/sub stream closed");
                }
                Err(e) => {
                    attempt += 1;
                    error!(channel = %self.channel, attempt, error = %e, "Pub/sub subscription failed");
                }
            }

            info!(
                channel = %self.channel,
                delay_ms = self.resubscribe_delay.as_millis() as u64,
                "Resubscribing after delay"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }

        info!(channel = %self.channel, "Transport subscriber stopped");
    }

    async fn subscribe_once(
        &self,
        ingestor: &Arc<EventIngestor>,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "Subscribed to transport channel");

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                message = messages.next() => {
                    let Some(message) = message else {
                        return Ok(SessionEnd::StreamClosed);
                    };
                    match message.get_payload::<String>() {
                        Ok(raw) => ingestor.dispatch(&raw),
                        Err(e) => warn!(error = %e, "Discarding non-UTF-8 transport payload"),
                    }
                }
            }
        }
    }
}

/// pub/sub 채널 발행자.
pub struct TransportPublisher {
    connection: MultiplexedConnection,
    channel: String,
}

impl TransportPublisher {
    /// Redis에 연결합니다.
    pub async fn connect(url: &str, channel: impl Into<String>) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            connection,
            channel: channel.into(),
        })
    }

    /// 페이로드를 발행하고 수신한 구독자 수를 반환합니다.
    pub async fn publish(&mut self, payload: &TransportPayload) -> Result<i64> {
        if payload.killmail_id.is_none() && payload.normalized_killmail.is_none() {
            return Err(RelayError::Serialization(
                "payload carries neither killmailId nor normalizedKillmail".to_string(),
            ));
        }

        let json = serde_json::to_string(payload)?;
        let receivers: i64 = self.connection.publish(&self.channel, json).await?;
        debug!(channel = %self.channel, receivers, "Transport payload published");
        Ok(receivers)
    }
}
