//! 전송 채널에 페이로드를 직접 발행하는 기능.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use killfeed_core::{KillmailEvent, RedisConfig};
use killfeed_relay::{TransportPayload, TransportPublisher};
use tracing::info;

/// publish 설정.
#[derive(Debug)]
pub struct PublishConfig {
    /// Redis URL (기본: 설정 파일 기본값)
    pub redis_url: Option<String>,
    /// 채널 이름
    pub channel: Option<String>,
    /// 조회 경로로 보낼 킬메일 ID
    pub killmail_id: Option<i64>,
    /// 정규화된 이벤트 JSON 파일
    pub file: Option<PathBuf>,
}

/// 발행할 페이로드 구성.
///
/// 파일이 주어지면 정규화된 이벤트를 싣고, 아니면 ID만 보냅니다.
pub fn build_payload(killmail_id: Option<i64>, file: Option<&Path>) -> Result<TransportPayload> {
    if let Some(path) = file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let event: KillmailEvent = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid killmail event in {}", path.display()))?;
        return Ok(TransportPayload::normalized(event));
    }

    killmail_id
        .map(TransportPayload::reference)
        .ok_or_else(|| anyhow::anyhow!("Either --killmail-id or --file is required"))
}

/// 페이로드를 한 번 발행합니다.
pub async fn publish(config: PublishConfig) -> Result<i64> {
    let defaults = RedisConfig::default();
    let url = config.redis_url.unwrap_or(defaults.url);
    let channel = config.channel.unwrap_or(defaults.channel);

    let payload = build_payload(config.killmail_id, config.file.as_deref())?;

    info!(channel = %channel, "Connecting to Redis...");
    let mut publisher = TransportPublisher::connect(&url, channel.as_str())
        .await
        .context("Failed to connect to Redis")?;
    let receivers = publisher.publish(&payload).await?;

    info!(channel = %channel, receivers, "Payload published");
    Ok(receivers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use killfeed_core::Participant;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_payload() {
        let payload = build_payload(Some(42), None).unwrap();
        assert_eq!(payload.killmail_id, Some(42));
        assert!(payload.normalized_killmail.is_none());
    }

    #[test]
    fn test_payload_from_file() {
        let event = KillmailEvent::new(1, dec!(2000000000), 30000142, "The Forge")
            .with_victim(Participant::character(10));
        let path = std::env::temp_dir().join(format!("killfeed-publish-{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string(&event).unwrap()).unwrap();

        let payload = build_payload(Some(99), Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(payload.normalized_killmail, Some(event));
    }

    #[test]
    fn test_payload_requires_source() {
        assert!(build_payload(None, None).is_err());
        assert!(build_payload(None, Some(Path::new("/nonexistent/killmail.json"))).is_err());
    }
}
