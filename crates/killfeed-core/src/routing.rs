//! 라우팅 키 계산.
//!
//! 킬메일 이벤트 하나를 해당 이벤트를 봐야 하는 토픽 집합으로 변환합니다.
//! 순수 함수이며 I/O가 없습니다.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::killmail::KillmailEvent;
use crate::topic::{Topic, TopicKind, ValueTier};

/// `5b` 등급 기준 (초과).
pub const FIVE_BILLION_THRESHOLD: Decimal = Decimal::from_parts(500_000_000, 0, 0, false, 0);

/// `10b` 등급 기준 (초과).
pub const TEN_BILLION_THRESHOLD: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// 이벤트의 라우팅 키 집합 계산.
///
/// 항상 `all`을 포함하며, 두 가치 등급 검사는 서로 독립적입니다
/// (10억 초과 킬은 `5b`와 `10b`를 모두 가짐). 없는 참가자 ID는 건너뜁니다.
pub fn routing_keys(event: &KillmailEvent) -> HashSet<Topic> {
    let mut keys = HashSet::with_capacity(12);
    keys.insert(TopicKind::All.to_topic());

    if event.total_value > TEN_BILLION_THRESHOLD {
        keys.insert(TopicKind::Tier(ValueTier::TenBillion).to_topic());
    }
    if event.total_value > FIVE_BILLION_THRESHOLD {
        keys.insert(TopicKind::Tier(ValueTier::FiveBillion).to_topic());
    }

    keys.extend(event.victim.ids().map(|id| TopicKind::Victim(id).to_topic()));
    keys.extend(event.attacker.ids().map(|id| TopicKind::Attacker(id).to_topic()));

    keys.insert(TopicKind::System(event.solar_system_id).to_topic());
    keys.insert(TopicKind::Region(event.region_name.clone()).to_topic());

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::killmail::Participant;
    use rust_decimal_macros::dec;

    fn event(total_value: Decimal) -> KillmailEvent {
        KillmailEvent::new(1, total_value, 30000142, "The Forge")
            .with_victim(Participant::new(10, 98000001, Some(99000001)))
            .with_attacker(Participant::new(20, 98000002, None))
    }

    #[test]
    fn test_threshold_constants() {
        assert_eq!(FIVE_BILLION_THRESHOLD, dec!(500000000));
        assert_eq!(TEN_BILLION_THRESHOLD, dec!(1000000000));
    }

    #[test]
    fn test_full_key_set() {
        let keys = routing_keys(&event(dec!(2000000000)));
        let expected: HashSet<String> = [
            "all",
            "5b",
            "10b",
            "victim.10",
            "victim.98000001",
            "victim.99000001",
            "attacker.20",
            "attacker.98000002",
            "system.30000142",
            "region.The Forge",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(keys, expected);
    }

    #[test]
    fn test_value_tier_boundaries() {
        let at_five = routing_keys(&event(dec!(500000000)));
        assert!(!at_five.contains("5b"));

        let above_five = routing_keys(&event(dec!(500000000.01)));
        assert!(above_five.contains("5b"));
        assert!(!above_five.contains("10b"));

        let at_ten = routing_keys(&event(dec!(1000000000)));
        assert!(at_ten.contains("5b"));
        assert!(!at_ten.contains("10b"));
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let solo = KillmailEvent::new(2, dec!(0), 30000144, "Domain")
            .with_victim(Participant::new(5, 5, Some(5)));
        let keys = routing_keys(&solo);

        assert!(keys.contains("victim.5"));
        assert_eq!(keys.len(), 4); // all, victim.5, system, region
    }
}
