//! 토픽 구독 스트림 출력 기능.

use anyhow::{bail, Result};
use killfeed_client::{ClientConfig, ClientEvent, Multiplexer};
use killfeed_core::{KillmailEvent, MessageKind, Participant, ServerMessage};
use tracing::{info, warn};

/// CLI 소비자가 쓰는 네임스페이스.
pub const NAMESPACE: &str = "cli";

/// tail 설정.
#[derive(Debug)]
pub struct TailConfig {
    /// 릴레이 WebSocket URL
    pub url: String,
    /// 구독할 토픽
    pub topics: Vec<String>,
    /// 원본 JSON 출력
    pub json: bool,
}

/// 토픽을 구독하고 Ctrl+C까지 수신한 메시지를 출력합니다.
pub async fn tail(config: TailConfig) -> Result<()> {
    let handle = Multiplexer::spawn(ClientConfig::new(config.url.clone()));
    let mut consumer = handle.consumer()?;
    consumer.listen([MessageKind::Killmail, MessageKind::Error])?;
    consumer.set_topics(NAMESPACE, config.topics.clone())?;

    info!(url = %config.url, topics = ?config.topics, "Tailing killmail feed");

    loop {
        tokio::select! {
            event = consumer.recv() => match event {
                Some(event) => print_event(&event, config.json)?,
                None => bail!("Multiplexer stopped unexpectedly"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping tail");
                return Ok(());
            }
        }
    }
}

fn print_event(event: &ClientEvent, json: bool) -> Result<()> {
    match event {
        ClientEvent::Connection(state) => eprintln!("-- connection {}", state),
        ClientEvent::Message(ServerMessage::Killmail { data }) => {
            if json {
                println!("{}", serde_json::to_string(data)?);
            } else {
                println!("{}", format_killmail(data));
            }
        }
        ClientEvent::Message(ServerMessage::Error { message }) => {
            warn!(message = %message, "Relay rejected request");
        }
        ClientEvent::Message(_) => {}
    }
    Ok(())
}

fn format_participant(participant: &Participant) -> String {
    match (participant.character_id, participant.corporation_id) {
        (Some(character), _) => character.to_string(),
        (None, Some(corporation)) => format!("corp {}", corporation),
        (None, None) => "-".to_string(),
    }
}

/// 킬메일 한 줄 요약.
pub fn format_killmail(event: &KillmailEvent) -> String {
    format!(
        "#{} {} ISK  {} ({})  victim {} / attacker {}",
        event.killmail_id,
        event.total_value.round_dp(0),
        event.region_name,
        event.solar_system_id,
        format_participant(&event.victim),
        format_participant(&event.attacker),
    )
}
