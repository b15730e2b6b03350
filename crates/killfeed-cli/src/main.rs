//! 킬메일 피드 운영 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 피해자 10, 100억 이상 킬 구독
//! killfeed tail --url ws://127.0.0.1:3000/ws --topic victim.10 --topic 10b
//!
//! # 킬메일 ID만 발행 (릴레이가 DB에서 조회)
//! killfeed publish --killmail-id 123456789
//!
//! # 정규화된 이벤트 파일 발행
//! killfeed publish --channel killmail-processed --file event.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use killfeed_core::{init_logging, LogConfig, LogFormat};
use tracing::error;

mod commands;

use commands::publish::{publish, PublishConfig};
use commands::tail::{tail, TailConfig};

#[derive(Parser)]
#[command(name = "killfeed")]
#[command(about = "Killmail feed CLI - 실시간 킬메일 구독 및 발행 도구", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 토픽을 구독하고 수신한 킬메일 출력
    Tail {
        /// 릴레이 WebSocket URL
        #[arg(short, long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,

        /// 구독할 토픽 (여러 번 지정 가능, 예: victim.10, 10b, all)
        #[arg(short, long, required = true)]
        topic: Vec<String>,

        /// 킬메일을 JSON 그대로 출력
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// 전송 채널에 페이로드 하나 발행
    Publish {
        /// Redis URL (기본: redis://127.0.0.1:6379/0)
        #[arg(long)]
        redis_url: Option<String>,

        /// 채널 이름 (기본: killmail-processed)
        #[arg(short, long)]
        channel: Option<String>,

        /// 킬메일 ID (릴레이가 DB에서 조회)
        #[arg(short, long, required_unless_present = "file")]
        killmail_id: Option<i64>,

        /// 정규화된 킬메일 이벤트 JSON 파일
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 출력과 섞이지 않도록 기본은 경고 이상만
    init_logging(LogConfig::new("warn").with_format(LogFormat::Compact))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Tail { url, topic, json } => {
            let config = TailConfig {
                url,
                topics: topic,
                json,
            };
            if let Err(e) = tail(config).await {
                error!("Tail failed: {}", e);
                return Err(e);
            }
        }

        Commands::Publish {
            redis_url,
            channel,
            killmail_id,
            file,
        } => {
            let config = PublishConfig {
                redis_url,
                channel,
                killmail_id,
                file,
            };
            match publish(config).await {
                Ok(receivers) => {
                    println!("발행 완료: 구독자 {}명 수신", receivers);
                }
                Err(e) => {
                    error!("Publish failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
