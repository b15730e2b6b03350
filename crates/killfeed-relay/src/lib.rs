//! 킬메일 실시간 릴레이 서버.
//!
//! pub/sub 채널에서 처리 완료된 킬메일을 받아 토픽별로 라우팅하고, 해당
//! 토픽을 구독한 WebSocket 연결에 팬아웃합니다.
//!
//! ```text
//! Redis 채널 → EventIngestor → routing_keys → Broadcaster → ConnectionRegistry → WebSocket
//! ```
//!
//! 클라이언트 → 서버 방향으로 레지스트리를 변경하는 것은 `ProtocolHandler`뿐입니다.

pub mod broadcaster;
pub mod error;
pub mod handler;
pub mod ingestor;
pub mod lookup;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod transport;
pub mod ws;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use error::{RelayError, Result};
pub use handler::ProtocolHandler;
pub use ingestor::{DropReason, EventIngestor, IngestOutcome, Prepared, TransportPayload};
pub use lookup::{DisabledLookup, KillmailLookup, MemoryLookup, PgKillmailLookup};
pub use registry::{ConnectionId, ConnectionRegistry, Frame, SharedRegistry};
pub use server::{HealthResponse, RelayServer, RelayState};
pub use transport::{TransportPublisher, TransportSubscriber};
