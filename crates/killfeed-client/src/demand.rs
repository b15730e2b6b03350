//! 로컬 소비자들의 토픽 수요 집계.
//!
//! 소비자마다 이름 붙은 네임스페이스에 토픽 집합을 등록하고, 모든
//! 네임스페이스의 합집합이 서버에 걸어둘 구독 집합이 됩니다. 변경이 있을
//! 때마다 서버가 현재 가진 집합과 비교해 차이만 보냅니다.

use std::collections::{BTreeSet, HashMap};

use killfeed_core::{ClientMessage, Topic};

/// 소비자 식별자.
pub type ConsumerId = u64;

/// 서버에 보낼 구독 변경분.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicDelta {
    /// 새로 구독할 토픽
    pub subscribe: Vec<Topic>,
    /// 구독 해제할 토픽
    pub unsubscribe: Vec<Topic>,
}

impl TopicDelta {
    /// 변경이 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    /// 와이어 메시지로 변환 (구독 먼저, 해제 다음).
    pub fn into_messages(self) -> Vec<ClientMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.subscribe.is_empty() {
            messages.push(ClientMessage::Subscribe {
                topics: self.subscribe,
            });
        }
        if !self.unsubscribe.is_empty() {
            messages.push(ClientMessage::Unsubscribe {
                topics: self.unsubscribe,
            });
        }
        messages
    }
}

/// 토픽 수요 집계기.
#[derive(Debug, Default)]
pub struct TopicDemand {
    namespaces: HashMap<ConsumerId, HashMap<String, BTreeSet<Topic>>>,
    current: BTreeSet<Topic>,
}

impl TopicDemand {
    /// 빈 집계기 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 네임스페이스 토픽 집합을 교체하고 변경분을 반환합니다.
    pub fn set_namespace_topics<I>(
        &mut self,
        consumer: ConsumerId,
        namespace: &str,
        topics: I,
    ) -> TopicDelta
    where
        I: IntoIterator<Item = Topic>,
    {
        let topics: BTreeSet<Topic> = topics.into_iter().collect();
        let namespaces = self.namespaces.entry(consumer).or_default();
        if topics.is_empty() {
            namespaces.remove(namespace);
        } else {
            namespaces.insert(namespace.to_string(), topics);
        }
        self.sync()
    }

    /// 네임스페이스 하나를 제거하고 변경분을 반환합니다.
    pub fn clear_namespace(&mut self, consumer: ConsumerId, namespace: &str) -> TopicDelta {
        if let Some(namespaces) = self.namespaces.get_mut(&consumer) {
            namespaces.remove(namespace);
        }
        self.sync()
    }

    /// 소비자의 모든 네임스페이스를 제거하고 변경분을 반환합니다.
    pub fn remove_consumer(&mut self, consumer: ConsumerId) -> TopicDelta {
        self.namespaces.remove(&consumer);
        self.sync()
    }

    /// 모든 네임스페이스의 합집합.
    pub fn desired(&self) -> BTreeSet<Topic> {
        self.namespaces
            .values()
            .flat_map(|namespaces| namespaces.values())
            .flatten()
            .cloned()
            .collect()
    }

    /// 서버가 현재 가지고 있다고 보는 집합.
    pub fn current(&self) -> &BTreeSet<Topic> {
        &self.current
    }

    /// 새 물리 연결용 전체 재구독.
    ///
    /// 서버는 재연결 이전 상태를 갖고 있지 않으므로 현재 집합을 비우고
    /// 원하는 집합 전체를 구독 변경분으로 돌려줍니다.
    pub fn resync(&mut self) -> TopicDelta {
        self.current.clear();
        self.sync()
    }

    fn sync(&mut self) -> TopicDelta {
        let desired = self.desired();
        let delta = TopicDelta {
            subscribe: desired.difference(&self.current).cloned().collect(),
            unsubscribe: self.current.difference(&desired).cloned().collect(),
        };
        self.current = desired;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(list: &[&str]) -> Vec<Topic> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_union_and_minimal_unsubscribe() {
        let mut demand = TopicDemand::new();

        let first = demand.set_namespace_topics(1, "n1", topics(&["a", "b"]));
        assert_eq!(first.subscribe, topics(&["a", "b"]));

        let second = demand.set_namespace_topics(2, "n2", topics(&["b", "c"]));
        assert_eq!(second.subscribe, topics(&["c"]));
        assert!(second.unsubscribe.is_empty());
        assert_eq!(demand.desired(), topics(&["a", "b", "c"]).into_iter().collect::<BTreeSet<_>>());

        let removed = demand.clear_namespace(1, "n1");
        assert_eq!(
            removed,
            TopicDelta {
                subscribe: vec![],
                unsubscribe: topics(&["a"]),
            }
        );
        assert_eq!(demand.desired(), topics(&["b", "c"]).into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_replacing_namespace_sends_only_changes() {
        let mut demand = TopicDemand::new();
        demand.set_namespace_topics(1, "feed", topics(&["all", "5b"]));

        let delta = demand.set_namespace_topics(1, "feed", topics(&["5b", "10b"]));
        assert_eq!(delta.subscribe, topics(&["10b"]));
        assert_eq!(delta.unsubscribe, topics(&["all"]));

        assert!(demand.set_namespace_topics(1, "feed", topics(&["10b", "5b"])).is_empty());
    }

    #[test]
    fn test_same_consumer_multiple_namespaces() {
        let mut demand = TopicDemand::new();
        demand.set_namespace_topics(1, "victim", topics(&["victim.10"]));
        demand.set_namespace_topics(1, "attacker", topics(&["attacker.20"]));

        let delta = demand.remove_consumer(1);
        assert_eq!(delta.unsubscribe, topics(&["attacker.20", "victim.10"]));
        assert!(demand.current().is_empty());
    }

    #[test]
    fn test_resync_resubscribes_everything() {
        let mut demand = TopicDemand::new();
        demand.set_namespace_topics(1, "n1", topics(&["a"]));
        demand.set_namespace_topics(2, "n2", topics(&["b"]));

        let delta = demand.resync();
        assert_eq!(delta.subscribe, topics(&["a", "b"]));
        assert!(delta.unsubscribe.is_empty());
    }

    #[test]
    fn test_delta_messages() {
        let delta = TopicDelta {
            subscribe: topics(&["c"]),
            unsubscribe: topics(&["a"]),
        };
        let messages = delta.into_messages();

        assert_eq!(
            messages,
            vec![
                ClientMessage::Subscribe { topics: topics(&["c"]) },
                ClientMessage::Unsubscribe { topics: topics(&["a"]) },
            ]
        );
        assert!(TopicDelta::default().into_messages().is_empty());
    }
}
