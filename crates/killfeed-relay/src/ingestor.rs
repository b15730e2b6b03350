//! 전송 채널 이벤트 수집기.
//!
//! pub/sub 채널의 원시 페이로드를 디코딩하고, 필요하면 단건 조회로 전체
//! 킬메일을 얻은 뒤 브로드캐스터에 넘깁니다.
//!
//! # 페이로드 형식
//!
//! ```json
//! {"normalizedKillmail": {...}}
//! {"killmailId": 123}
//! ```
//!
//! 디코딩 실패, 조회 결과 없음, 조회 실패, 조회 타임아웃은 모두 이벤트를
//! 버리며 재시도하지 않습니다. 원인은 로그와 메트릭에서 구분됩니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use killfeed_core::KillmailEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::broadcaster::Broadcaster;
use crate::lookup::KillmailLookup;
use crate::metrics;

/// 전송 채널 페이로드.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportPayload {
    /// 킬메일 ID (조회 경로)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killmail_id: Option<i64>,
    /// 정규화된 전체 킬메일 (빠른 경로)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_killmail: Option<KillmailEvent>,
}

impl TransportPayload {
    /// 전체 레코드를 담은 페이로드.
    pub fn normalized(event: KillmailEvent) -> Self {
        Self {
            killmail_id: Some(event.killmail_id),
            normalized_killmail: Some(event),
        }
    }

    /// ID만 담은 페이로드.
    pub fn reference(killmail_id: i64) -> Self {
        Self {
            killmail_id: Some(killmail_id),
            normalized_killmail: None,
        }
    }
}

/// 수신 측 페이로드. 내장 킬메일은 나중에 개별적으로 검증합니다.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default)]
    killmail_id: Option<i64>,
    #[serde(default)]
    normalized_killmail: Option<serde_json::Value>,
}

/// 이벤트를 버린 이유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// 페이로드 디코딩 실패
    Decode,
    /// 조회 결과 없음
    NotFound,
    /// 조회 중 에러
    LookupError,
    /// 조회 타임아웃
    LookupTimeout,
}

impl DropReason {
    /// 메트릭 레이블 값.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Decode => "decode",
            DropReason::NotFound => "not_found",
            DropReason::LookupError => "lookup_error",
            DropReason::LookupTimeout => "lookup_timeout",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 동기 디코딩 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// 바로 브로드캐스트할 수 있는 이벤트
    Ready(KillmailEvent),
    /// 조회가 필요한 킬메일 ID
    Lookup(i64),
    /// 버려진 페이로드
    Discard(DropReason),
}

/// 수집 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 브로드캐스트됨
    Broadcast {
        /// 킬메일 ID
        killmail_id: i64,
        /// 토픽이 겹친 연결 수
        sent: usize,
    },
    /// 버려짐
    Dropped(DropReason),
}

/// 이벤트 수집기.
#[derive(Clone)]
pub struct EventIngestor {
    broadcaster: Arc<Broadcaster>,
    lookup: Arc<dyn KillmailLookup>,
    lookup_timeout: Duration,
}

impl EventIngestor {
    /// 새 수집기 생성.
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        lookup: Arc<dyn KillmailLookup>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            broadcaster,
            lookup,
            lookup_timeout,
        }
    }

    /// 원시 페이로드를 동기적으로 디코딩합니다.
    ///
    /// 내장된 킬메일이 완전할 때만 빠른 경로를 쓰고, 불완전하면
    /// `killmailId`가 있는 한 조회 경로로 넘어갑니다.
    pub fn prepare(&self, raw: &str) -> Prepared {
        let payload: RawPayload = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable transport payload");
                return self.discard(DropReason::Decode);
            }
        };

        if let Some(value) = payload.normalized_killmail {
            match serde_json::from_value::<KillmailEvent>(value) {
                Ok(event) => return Prepared::Ready(event),
                Err(e) => debug!(
                    killmail_id = ?payload.killmail_id,
                    error = %e,
                    "Embedded killmail incomplete"
                ),
            }
        }

        match payload.killmail_id {
            Some(id) => Prepared::Lookup(id),
            None => {
                warn!("Discarding transport payload without usable killmail");
                self.discard(DropReason::Decode)
            }
        }
    }

    fn discard(&self, reason: DropReason) -> Prepared {
        metrics::record_ingest_drop(reason.as_str());
        Prepared::Discard(reason)
    }

    /// fallback 조회로 전체 레코드를 얻습니다.
    pub async fn resolve(&self, killmail_id: i64) -> Result<KillmailEvent, DropReason> {
        let reason = match tokio::time::timeout(
            self.lookup_timeout,
            self.lookup.lookup_killmail(killmail_id),
        )
        .await
        {
            Ok(Ok(Some(event))) => return Ok(event),
            Ok(Ok(None)) => {
                debug!(killmail_id, "Killmail not yet available, dropping");
                DropReason::NotFound
            }
            Ok(Err(e)) => {
                warn!(killmail_id, error = %e, "Killmail lookup failed, dropping");
                DropReason::LookupError
            }
            Err(_) => {
                warn!(
                    killmail_id,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Killmail lookup timed out, dropping"
                );
                DropReason::LookupTimeout
            }
        };

        metrics::record_ingest_drop(reason.as_str());
        Err(reason)
    }

    /// 이벤트를 브로드캐스트합니다.
    pub fn publish(&self, event: &KillmailEvent) -> IngestOutcome {
        match self.broadcaster.broadcast(event) {
            Ok(report) => IngestOutcome::Broadcast {
                killmail_id: event.killmail_id,
                sent: report.matched,
            },
            Err(e) => {
                warn!(killmail_id = event.killmail_id, error = %e, "Failed to encode killmail frame");
                metrics::record_ingest_drop(DropReason::Decode.as_str());
                IngestOutcome::Dropped(DropReason::Decode)
            }
        }
    }

    /// 페이로드 하나를 끝까지 처리하고 결과를 반환합니다.
    pub async fn ingest(&self, raw: &str) -> IngestOutcome {
        match self.prepare(raw) {
            Prepared::Ready(event) => self.publish(&event),
            Prepared::Lookup(id) => match self.resolve(id).await {
                Ok(event) => self.publish(&event),
                Err(reason) => IngestOutcome::Dropped(reason),
            },
            Prepared::Discard(reason) => IngestOutcome::Dropped(reason),
        }
    }

    /// 구독 루프에서 호출하는 진입점.
    ///
    /// 빠른 경로는 즉시 브로드캐스트하여 발행 순서를 유지하고, 조회가 필요한
    /// 페이로드는 별도 태스크로 넘겨 다음 메시지 처리를 막지 않습니다.
    pub fn dispatch(self: &Arc<Self>, raw: &str) {
        match self.prepare(raw) {
            Prepared::Ready(event) => {
                self.publish(&event);
            }
            Prepared::Lookup(id) => {
                let ingestor = Arc::clone(self);
                tokio::spawn(async move {
                    if let Ok(event) = ingestor.resolve(id).await {
                        ingestor.publish(&event);
                    }
                });
            }
            Prepared::Discard(_) => {}
        }
    }
}

impl fmt::Debug for EventIngestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventIngestor")
            .field("broadcaster", &self.broadcaster)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}
