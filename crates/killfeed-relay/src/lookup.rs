//! 킬메일 단건 조회 (fallback 경로).
//!
//! 전송 페이로드에 `killmailId`만 있을 때 수집기가 전체 레코드를 얻기 위해
//! 사용합니다.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use killfeed_core::{DatabaseConfig, KillmailEvent, Participant};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use crate::error::Result;

/// 킬메일 조회 인터페이스.
#[async_trait]
pub trait KillmailLookup: Send + Sync {
    /// ID로 정규화된 킬메일을 조회합니다.
    ///
    /// 아직 커밋되지 않은 등의 이유로 레코드가 없으면 `Ok(None)`입니다.
    async fn lookup_killmail(&self, killmail_id: i64) -> Result<Option<KillmailEvent>>;
}

// ==================== PostgreSQL ====================

/// `killmails` 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct KillmailRecord {
    pub killmail_id: i64,
    pub total_value: Decimal,
    pub victim_character_id: Option<i64>,
    pub victim_corporation_id: Option<i64>,
    pub victim_alliance_id: Option<i64>,
    pub attacker_character_id: Option<i64>,
    pub attacker_corporation_id: Option<i64>,
    pub attacker_alliance_id: Option<i64>,
    pub solar_system_id: i64,
    pub region_name: String,
    pub killmail_time: Option<DateTime<Utc>>,
}

impl From<KillmailRecord> for KillmailEvent {
    fn from(record: KillmailRecord) -> Self {
        KillmailEvent {
            killmail_id: record.killmail_id,
            total_value: record.total_value,
            killmail_time: record.killmail_time,
            victim: Participant {
                character_id: record.victim_character_id,
                corporation_id: record.victim_corporation_id,
                alliance_id: record.victim_alliance_id,
            },
            attacker: Participant {
                character_id: record.attacker_character_id,
                corporation_id: record.attacker_corporation_id,
                alliance_id: record.attacker_alliance_id,
            },
            solar_system_id: record.solar_system_id,
            region_name: record.region_name,
        }
    }
}

/// PostgreSQL 기반 조회.
#[derive(Debug, Clone)]
pub struct PgKillmailLookup {
    pool: PgPool,
}

impl PgKillmailLookup {
    /// 기존 풀로 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 설정으로 연결 풀을 만들어 생성합니다.
    ///
    /// URL이 설정되지 않았으면 `Ok(None)`을 반환합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Option<Self>> {
        let Some(url) = config.url.as_deref() else {
            return Ok(None);
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        info!(max_connections = config.max_connections, "Database pool connected");
        Ok(Some(Self::new(pool)))
    }
}

#[async_trait]
impl KillmailLookup for PgKillmailLookup {
    async fn lookup_killmail(&self, killmail_id: i64) -> Result<Option<KillmailEvent>> {
        let record = sqlx::query_as::<_, KillmailRecord>(
            r#"
            SELECT killmail_id, total_value,
                   victim_character_id, victim_corporation_id, victim_alliance_id,
                   attacker_character_id, attacker_corporation_id, attacker_alliance_id,
                   solar_system_id, region_name, killmail_time
            FROM killmails
            WHERE killmail_id = $1
            "#,
        )
        .bind(killmail_id)
        .fetch_optional(&self.pool)
        .await?;

        debug!(killmail_id, found = record.is_some(), "Killmail lookup");
        Ok(record.map(KillmailEvent::from))
    }
}

// ==================== 대체 구현 ====================

/// 데이터베이스가 설정되지 않았을 때 사용하는 조회기. 항상 `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLookup;

#[async_trait]
impl KillmailLookup for DisabledLookup {
    async fn lookup_killmail(&self, _killmail_id: i64) -> Result<Option<KillmailEvent>> {
        Ok(None)
    }
}

/// 메모리 기반 조회기.
#[derive(Debug, Default)]
pub struct MemoryLookup {
    killmails: RwLock<HashMap<i64, KillmailEvent>>,
}

impl MemoryLookup {
    /// 빈 조회기 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 킬메일 추가 (같은 ID는 덮어씀).
    pub fn insert(&self, event: KillmailEvent) {
        self.killmails
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.killmail_id, event);
    }
}

#[async_trait]
impl KillmailLookup for MemoryLookup {
    async fn lookup_killmail(&self, killmail_id: i64) -> Result<Option<KillmailEvent>> {
        Ok(self
            .killmails
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&killmail_id)
            .cloned())
    }
}
