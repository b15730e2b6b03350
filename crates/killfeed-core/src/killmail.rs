//! 킬메일 브로드캐스트 이벤트 도메인 모델.
//!
//! 처리가 끝난 킬메일 하나당 한 번 생성되며, 생성 후에는 변경되지 않습니다.
//! 와이어 형식은 camelCase JSON이고 `totalValue`는 JSON 숫자로 직렬화됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// 킬메일 참가자 (피해자 또는 대표 공격자).
///
/// NPC나 구조물 킬에는 일부 ID가 없으므로 모든 필드가 선택적입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// 캐릭터 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
    /// 코퍼레이션 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporation_id: Option<i64>,
    /// 얼라이언스 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alliance_id: Option<i64>,
}

impl Participant {
    /// 모든 ID를 지정해 참가자 생성.
    pub fn new(character_id: i64, corporation_id: i64, alliance_id: Option<i64>) -> Self {
        Self {
            character_id: Some(character_id),
            corporation_id: Some(corporation_id),
            alliance_id,
        }
    }

    /// 캐릭터 ID만 있는 참가자 생성.
    pub fn character(character_id: i64) -> Self {
        Self {
            character_id: Some(character_id),
            ..Default::default()
        }
    }

    /// 존재하는 ID를 캐릭터, 코퍼레이션, 얼라이언스 순서로 반환합니다.
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        [self.character_id, self.corporation_id, self.alliance_id]
            .into_iter()
            .flatten()
    }
}

/// 킬메일 브로드캐스트 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillmailEvent {
    /// 킬메일 ID (고유)
    pub killmail_id: i64,
    /// 총 손실 가치 (ISK, 음수 불가)
    #[serde(
        serialize_with = "rust_decimal::serde::float::serialize",
        deserialize_with = "deserialize_total_value"
    )]
    pub total_value: Decimal,
    /// 킬 발생 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killmail_time: Option<DateTime<Utc>>,
    /// 피해자
    #[serde(default)]
    pub victim: Participant,
    /// 대표 공격자 (전체 공격자 목록이 아님)
    #[serde(default)]
    pub attacker: Participant,
    /// 솔라 시스템 ID
    pub solar_system_id: i64,
    /// 리전 이름
    pub region_name: String,
}

impl KillmailEvent {
    /// 참가자 정보 없이 새 이벤트 생성.
    pub fn new(
        killmail_id: i64,
        total_value: Decimal,
        solar_system_id: i64,
        region_name: impl Into<String>,
    ) -> Self {
        Self {
            killmail_id,
            total_value,
            killmail_time: None,
            victim: Participant::default(),
            attacker: Participant::default(),
            solar_system_id,
            region_name: region_name.into(),
        }
    }

    /// 피해자 설정.
    pub fn with_victim(mut self, victim: Participant) -> Self {
        self.victim = victim;
        self
    }

    /// 대표 공격자 설정.
    pub fn with_attacker(mut self, attacker: Participant) -> Self {
        self.attacker = attacker;
        self
    }
}

fn deserialize_total_value<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = rust_decimal::serde::float::deserialize(deserializer)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(serde::de::Error::custom(format!(
            "totalValue must be non-negative, got {}",
            value
        )));
    }
    Ok(value)
}
