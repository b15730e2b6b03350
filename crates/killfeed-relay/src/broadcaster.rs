//! 킬메일 팬아웃.
//!
//! 이벤트마다 레지스트리를 한 번 순회하여 토픽이 겹치는 연결의 송신 큐에
//! 프레임을 넣습니다. 전달은 best-effort입니다: 큐가 가득 찼거나 닫힌 연결의
//! 프레임은 버립니다 (drop-newest).

use std::collections::HashSet;

use killfeed_core::{routing_keys, KillmailEvent, MessageKind, ServerMessage, Topic};
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::Result;
use crate::metrics;
use crate::registry::{Frame, SharedRegistry};

/// 이벤트 하나의 팬아웃 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// 토픽이 겹친 연결 수 (`sentCount`)
    pub matched: usize,
    /// 큐가 가득 차거나 닫혀 버려진 프레임 수
    pub dropped: usize,
}

impl BroadcastReport {
    /// 실제로 큐에 들어간 프레임 수.
    pub fn delivered(&self) -> usize {
        self.matched - self.dropped
    }
}

/// 브로드캐스터.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: SharedRegistry,
}

impl Broadcaster {
    /// 레지스트리를 공유하는 브로드캐스터 생성.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// 라우팅 키를 계산하여 이벤트를 팬아웃합니다.
    pub fn broadcast(&self, event: &KillmailEvent) -> Result<BroadcastReport> {
        let keys = routing_keys(event);
        self.broadcast_with_keys(event, &keys)
    }

    /// 주어진 라우팅 키로 이벤트를 팬아웃합니다.
    ///
    /// 프레임은 이벤트당 한 번만 직렬화됩니다.
    pub fn broadcast_with_keys(
        &self,
        event: &KillmailEvent,
        keys: &HashSet<Topic>,
    ) -> Result<BroadcastReport> {
        let kind = MessageKind::Killmail;
        let frame: Frame = ServerMessage::Killmail {
            data: event.clone(),
        }
        .to_json()?
        .into();

        let mut report = BroadcastReport::default();
        for target in self.registry.matching(keys) {
            report.matched += 1;
            match target.sender.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    debug!(connection_id = %target.id, killmail_id = event.killmail_id, "Outbound queue full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    debug!(connection_id = %target.id, killmail_id = event.killmail_id, "Outbound queue closed, frame dropped");
                }
            }
        }

        metrics::record_broadcast(report.delivered(), report.dropped);
        debug!(
            killmail_id = event.killmail_id,
            message_type = %kind,
            keys = keys.len(),
            sent = report.matched,
            dropped = report.dropped,
            "Killmail broadcast"
        );

        Ok(report)
    }
}
