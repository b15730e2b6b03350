//! 연결 레지스트리.
//!
//! 살아있는 WebSocket 연결과 연결별 구독 토픽 집합을 추적합니다.
//! 모든 연산은 동기식이며 하나의 `RwLock`으로 보호됩니다. 브로드캐스트 스캔은
//! 읽기 잠금, 구독 변경은 쓰기 잠금을 잡으므로 스캔 도중 부분적으로 적용된
//! 구독이 관찰되는 일은 없습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use killfeed_core::Topic;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 연결 식별자.
pub type ConnectionId = Uuid;

/// 연결 송신 큐에 넣는 직렬화된 텍스트 프레임.
pub type Frame = Utf8Bytes;

/// 연결 하나의 레지스트리 항목.
#[derive(Debug)]
struct ConnectionEntry {
    topics: HashSet<Topic>,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Frame>,
}

/// 브로드캐스트 대상 연결.
#[derive(Debug, Clone)]
pub struct MatchedConnection {
    /// 연결 ID
    pub id: ConnectionId,
    /// 송신 큐
    pub sender: mpsc::Sender<Frame>,
}

/// 연결 레지스트리.
///
/// 프로세스 전역 싱글턴이 아니라 서버가 소유하는 명시적 객체입니다.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

/// 공유 가능한 레지스트리 타입.
pub type SharedRegistry = Arc<ConnectionRegistry>;

impl ConnectionRegistry {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 공유 레지스트리 생성.
    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }

    // 잠금을 쥔 스레드가 패닉해도 맵 자체는 일관성을 유지하므로 그대로 사용
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, ConnectionEntry>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, ConnectionEntry>> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 새 연결 등록 (빈 토픽 집합).
    ///
    /// 같은 ID가 이미 있으면 교체하고 `false`를 반환합니다.
    pub fn register(&self, id: ConnectionId, sender: mpsc::Sender<Frame>) -> bool {
        let entry = ConnectionEntry {
            topics: HashSet::new(),
            connected_at: Utc::now(),
            sender,
        };
        self.write().insert(id, entry).is_none()
    }

    /// 연결 제거.
    ///
    /// 제거된 경우 해당 연결이 보유하던 토픽 수를 반환합니다.
    pub fn unregister(&self, id: &ConnectionId) -> Option<usize> {
        self.write().remove(id).map(|entry| entry.topics.len())
    }

    /// 토픽 추가 (멱등).
    ///
    /// 변경 후 토픽 집합 크기를 반환하며, 연결이 없으면 `None`입니다.
    pub fn add_topics(&self, id: &ConnectionId, topics: &[Topic]) -> Option<usize> {
        let mut connections = self.write();
        let entry = connections.get_mut(id)?;
        entry.topics.extend(topics.iter().cloned());
        Some(entry.topics.len())
    }

    /// 토픽 제거 (없는 토픽은 무시).
    pub fn remove_topics(&self, id: &ConnectionId, topics: &[Topic]) -> Option<usize> {
        let mut connections = self.write();
        let entry = connections.get_mut(id)?;
        for topic in topics {
            entry.topics.remove(topic);
        }
        Some(entry.topics.len())
    }

    /// 연결의 현재 토픽 집합 복사본.
    pub fn snapshot(&self, id: &ConnectionId) -> Option<HashSet<Topic>> {
        self.read().get(id).map(|entry| entry.topics.clone())
    }

    /// 연결 시각.
    pub fn connected_at(&self, id: &ConnectionId) -> Option<DateTime<Utc>> {
        self.read().get(id).map(|entry| entry.connected_at)
    }

    /// 등록 여부.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.read().contains_key(id)
    }

    /// 등록된 모든 연결 ID.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.read().keys().copied().collect()
    }

    /// 등록된 연결 수.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// 연결이 하나도 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// 토픽 집합이 `keys`와 겹치는 모든 연결.
    ///
    /// 레지스트리 전체를 한 번 순회합니다. 빈 토픽 집합은 어떤 키와도 겹치지 않습니다.
    pub fn matching(&self, keys: &HashSet<Topic>) -> Vec<MatchedConnection> {
        self.read()
            .iter()
            .filter(|(_, entry)| !entry.topics.is_disjoint(keys))
            .map(|(id, entry)| MatchedConnection {
                id: *id,
                sender: entry.sender.clone(),
            })
            .collect()
    }
}
