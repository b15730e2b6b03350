//! 구독 토픽 문법.
//!
//! 토픽은 와이어에서는 불투명한 문자열이지만, 유효한 패턴 집합은 고정되어 있습니다.
//!
//! # 토픽 형식
//!
//! - `all` - 모든 킬메일
//! - `5b`, `10b` - 가치 등급
//! - `victim.{id}` - 피해자 캐릭터/코퍼레이션/얼라이언스
//! - `attacker.{id}` - 공격자 캐릭터/코퍼레이션/얼라이언스
//! - `system.{id}` - 솔라 시스템
//! - `region.{name}` - 리전

use std::fmt;

use crate::error::{KillfeedError, KillfeedResult};

/// 토픽 문자열.
pub type Topic = String;

/// 모든 이벤트에 붙는 토픽.
pub const TOPIC_ALL: &str = "all";

const VICTIM_PREFIX: &str = "victim.";
const ATTACKER_PREFIX: &str = "attacker.";
const SYSTEM_PREFIX: &str = "system.";
const REGION_PREFIX: &str = "region.";

/// 가치 등급 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTier {
    /// `5b`
    FiveBillion,
    /// `10b`
    TenBillion,
}

impl ValueTier {
    /// 토픽 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::FiveBillion => "5b",
            ValueTier::TenBillion => "10b",
        }
    }
}

/// 파싱된 토픽.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// 전체 피드
    All,
    /// 가치 등급
    Tier(ValueTier),
    /// 피해자 엔티티
    Victim(i64),
    /// 공격자 엔티티
    Attacker(i64),
    /// 솔라 시스템
    System(i64),
    /// 리전
    Region(String),
}

impl TopicKind {
    /// 문자열에서 토픽 파싱.
    ///
    /// 고정 패턴에 맞지 않으면 `None`을 반환합니다. 엔티티 ID는 숫자만,
    /// 리전 이름은 ASCII 영숫자와 공백, `-`, `'`, `.`만 허용합니다.
    pub fn parse(topic: &str) -> Option<Self> {
        match topic {
            TOPIC_ALL => return Some(TopicKind::All),
            "5b" => return Some(TopicKind::Tier(ValueTier::FiveBillion)),
            "10b" => return Some(TopicKind::Tier(ValueTier::TenBillion)),
            _ => {}
        }

        if let Some(id) = topic.strip_prefix(VICTIM_PREFIX) {
            parse_entity_id(id).map(TopicKind::Victim)
        } else if let Some(id) = topic.strip_prefix(ATTACKER_PREFIX) {
            parse_entity_id(id).map(TopicKind::Attacker)
        } else if let Some(id) = topic.strip_prefix(SYSTEM_PREFIX) {
            parse_entity_id(id).map(TopicKind::System)
        } else if let Some(name) = topic.strip_prefix(REGION_PREFIX) {
            is_region_name(name).then(|| TopicKind::Region(name.to_string()))
        } else {
            None
        }
    }

    /// 정규 토픽 문자열로 변환.
    pub fn to_topic(&self) -> Topic {
        self.to_string()
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicKind::All => f.write_str(TOPIC_ALL),
            TopicKind::Tier(tier) => f.write_str(tier.as_str()),
            TopicKind::Victim(id) => write!(f, "{}{}", VICTIM_PREFIX, id),
            TopicKind::Attacker(id) => write!(f, "{}{}", ATTACKER_PREFIX, id),
            TopicKind::System(id) => write!(f, "{}{}", SYSTEM_PREFIX, id),
            TopicKind::Region(name) => write!(f, "{}{}", REGION_PREFIX, name),
        }
    }
}

/// 토픽이 유효한 패턴인지 확인.
pub fn is_valid_topic(topic: &str) -> bool {
    TopicKind::parse(topic).is_some()
}

/// 배치에서 유효하지 않은 토픽만 골라 요청 순서대로 반환합니다.
pub fn invalid_topics<'a>(topics: &'a [Topic]) -> Vec<&'a str> {
    topics
        .iter()
        .map(String::as_str)
        .filter(|topic| !is_valid_topic(topic))
        .collect()
}

/// 배치 전체를 검증합니다.
///
/// 유효하지 않은 토픽이 있으면 요청 순서대로 모아 `InvalidTopic`으로 돌려줍니다.
pub fn validate_topics(topics: &[Topic]) -> KillfeedResult<()> {
    let invalid = invalid_topics(topics);
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(KillfeedError::InvalidTopic(invalid.join(", ")))
    }
}

// 라우팅 키는 항상 정규 십진 표기이므로 선행 0이 붙은 ID는 매칭될 수 없음
fn parse_entity_id(id: &str) -> Option<i64> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if id.len() > 1 && id.starts_with('0') {
        return None;
    }
    id.parse().ok()
}

fn is_region_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.'))
}
