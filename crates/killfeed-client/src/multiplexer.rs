//! 클라이언트 연결 멀티플렉서.
//!
//! 액터 태스크 하나가 물리 WebSocket 연결을 소유하고, 여러 로컬 소비자는
//! 채널로만 액터와 통신합니다. 소비자 사이에 공유되는 가변 상태는 없습니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use killfeed_client::{ClientConfig, ClientEvent, Multiplexer};
//! use killfeed_core::MessageKind;
//!
//! let handle = Multiplexer::spawn(ClientConfig::new("ws://127.0.0.1:3000/ws"));
//! let mut consumer = handle.consumer()?;
//! consumer.listen([MessageKind::Killmail])?;
//! consumer.set_topics("watchlist", ["victim.10", "10b"])?;
//!
//! while let Some(event) = consumer.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use killfeed_core::{validate_topics, ClientMessage, MessageKind, ServerMessage, Topic};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::{ClientConfig, ConnectionMode};
use crate::demand::{ConsumerId, TopicDelta, TopicDemand};
use crate::error::{ClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// ==================== 공개 타입 ====================

/// 물리 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 없음 (재연결 대기 중)
    Disconnected,
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Open => f.write_str("open"),
        }
    }
}

/// 소비자에게 전달되는 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// 서버 메시지
    Message(ServerMessage),
    /// 연결 상태 변경
    Connection(ConnectionState),
}

/// 액터 명령.
#[derive(Debug)]
enum Command {
    Register {
        consumer: ConsumerId,
        events: mpsc::Sender<ClientEvent>,
    },
    Unregister {
        consumer: ConsumerId,
    },
    SetTopics {
        consumer: ConsumerId,
        namespace: String,
        topics: Vec<Topic>,
    },
    ClearNamespace {
        consumer: ConsumerId,
        namespace: String,
    },
    Listen {
        consumer: ConsumerId,
        kinds: Option<Vec<MessageKind>>,
    },
}

// ==================== 핸들 / 소비자 ====================

/// 멀티플렉서 진입점.
pub struct Multiplexer;

impl Multiplexer {
    /// 설정에 따라 멀티플렉서를 시작합니다.
    ///
    /// 공유 모드에서는 여기서 액터 하나를 띄우고, 전용 모드에서는 소비자를
    /// 만들 때마다 액터를 띄웁니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn(config: ClientConfig) -> MultiplexerHandle {
        let inner = match config.mode {
            ConnectionMode::Shared => HandleInner::Shared {
                commands: spawn_actor(config.clone()),
                next_id: Arc::new(AtomicU64::new(1)),
                event_buffer: config.event_buffer,
            },
            ConnectionMode::Dedicated => HandleInner::Dedicated { config },
        };
        MultiplexerHandle { inner }
    }
}

fn spawn_actor(config: ClientConfig) -> mpsc::UnboundedSender<Command> {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = ConnectionActor::new(config, rx);
    tokio::spawn(actor.run());
    tx
}

#[derive(Clone)]
enum HandleInner {
    Shared {
        commands: mpsc::UnboundedSender<Command>,
        next_id: Arc<AtomicU64>,
        event_buffer: usize,
    },
    Dedicated {
        config: ClientConfig,
    },
}

/// 멀티플렉서 핸들. 복제해서 여러 곳에서 소비자를 만들 수 있습니다.
///
/// 핸들과 모든 소비자가 사라지면 액터도 종료됩니다.
#[derive(Clone)]
pub struct MultiplexerHandle {
    inner: HandleInner,
}

impl MultiplexerHandle {
    /// 새 로컬 소비자 생성.
    ///
    /// 소비자는 생성 직후 현재 연결 상태를 이벤트로 받습니다.
    pub fn consumer(&self) -> Result<Consumer> {
        match &self.inner {
            HandleInner::Shared {
                commands,
                next_id,
                event_buffer,
            } => {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                Consumer::register(id, commands.clone(), *event_buffer)
            }
            HandleInner::Dedicated { config } => {
                let commands = spawn_actor(config.clone());
                Consumer::register(1, commands, config.event_buffer)
            }
        }
    }

    /// 연결 공유 방식.
    pub fn mode(&self) -> ConnectionMode {
        match self.inner {
            HandleInner::Shared { .. } => ConnectionMode::Shared,
            HandleInner::Dedicated { .. } => ConnectionMode::Dedicated,
        }
    }
}

/// 로컬 소비자.
///
/// 드롭되면 모든 네임스페이스가 제거되고 구독이 다시 계산됩니다. 물리 연결은
/// 유지됩니다.
pub struct Consumer {
    id: ConsumerId,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::Receiver<ClientEvent>,
}

impl Consumer {
    fn register(
        id: ConsumerId,
        commands: mpsc::UnboundedSender<Command>,
        event_buffer: usize,
    ) -> Result<Self> {
        let (events_tx, events) = mpsc::channel(event_buffer.max(1));
        commands
            .send(Command::Register {
                consumer: id,
                events: events_tx,
            })
            .map_err(|_| ClientError::ChannelClosed)?;
        Ok(Self {
            id,
            commands,
            events,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// 소비자 ID.
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// 네임스페이스의 토픽 집합을 교체합니다.
    ///
    /// 서버는 유효하지 않은 토픽이 섞인 배치를 통째로 거부하므로, 그런 토픽이
    /// 하나라도 있으면 `InvalidTopics`를 반환하고 기존 집합을 유지합니다.
    pub fn set_topics<I, T>(&self, namespace: impl Into<String>, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        let topics: Vec<Topic> = topics.into_iter().map(Into::into).collect();
        validate_topics(&topics)?;
        self.send(Command::SetTopics {
            consumer: self.id,
            namespace: namespace.into(),
            topics,
        })
    }

    /// 네임스페이스를 제거합니다.
    pub fn clear(&self, namespace: impl Into<String>) -> Result<()> {
        self.send(Command::ClearNamespace {
            consumer: self.id,
            namespace: namespace.into(),
        })
    }

    /// 지정한 종류의 서버 메시지를 받도록 등록합니다.
    pub fn listen<I>(&self, kinds: I) -> Result<()>
    where
        I: IntoIterator<Item = MessageKind>,
    {
        self.send(Command::Listen {
            consumer: self.id,
            kinds: Some(kinds.into_iter().collect()),
        })
    }

    /// 모든 서버 메시지를 받도록 등록합니다.
    pub fn listen_all(&self) -> Result<()> {
        self.send(Command::Listen {
            consumer: self.id,
            kinds: None,
        })
    }

    /// 다음 이벤트 수신. 액터가 종료되면 `None`.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unregister { consumer: self.id });
    }
}

// ==================== 액터 ====================

/// 소비자 하나의 이벤트 수신 설정.
struct ConsumerSlot {
    events: mpsc::Sender<ClientEvent>,
    kinds: HashSet<MessageKind>,
    wildcard: bool,
}

impl ConsumerSlot {
    fn wants(&self, kind: MessageKind) -> bool {
        self.wildcard || self.kinds.contains(&kind)
    }
}

/// 물리 연결 세션 종료 원인.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Shutdown,
}

/// 물리 연결을 소유하는 액터.
struct ConnectionActor {
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    consumers: HashMap<ConsumerId, ConsumerSlot>,
    demand: TopicDemand,
    state: ConnectionState,
    backoff: Backoff,
}

impl ConnectionActor {
    fn new(config: ClientConfig, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            backoff: config.backoff(),
            config,
            commands,
            consumers: HashMap::new(),
            demand: TopicDemand::new(),
            state: ConnectionState::Disconnected,
        }
    }

    async fn run(mut self) {
        let url = self.config.url.clone();

        loop {
            self.set_state(ConnectionState::Connecting);

            let connect = connect_async(url.clone());
            tokio::pin!(connect);
            let result = loop {
                tokio::select! {
                    result = &mut connect => break result,
                    command = self.commands.recv() => match command {
                        Some(command) => {
                            self.apply(command);
                        }
                        None => return,
                    },
                }
            };

            match result {
                Ok((ws, _)) => {
                    info!(url = %url, "Feed connection open");
                    self.backoff.reset();
                    self.set_state(ConnectionState::Open);
                    let end = self.drive(ws).await;
                    self.set_state(ConnectionState::Disconnected);
                    if end == SessionEnd::Shutdown {
                        info!(url = %url, "Multiplexer shut down");
                        return;
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Feed connection failed");
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            let delay = self.backoff.next_delay();
            info!(
                attempt = self.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    command = self.commands.recv() => match command {
                        Some(command) => {
                            self.apply(command);
                        }
                        None => return,
                    },
                }
            }
        }
    }

    /// 연결된 동안의 메시지 루프.
    async fn drive(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        // 서버는 이전 연결의 구독을 모르므로 전체 재구독
        let delta = self.demand.resync();
        if send_delta(&mut sink, delta).await.is_err() {
            return SessionEnd::Disconnected;
        }

        let period = self.config.ping_interval();
        let mut ping = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        for consumer in self.dispatch(&text) {
                            let delta = self.remove_consumer(consumer);
                            if send_delta(&mut sink, delta).await.is_err() {
                                return SessionEnd::Disconnected;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Feed connection closed by server");
                        return SessionEnd::Disconnected;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Feed connection error");
                        return SessionEnd::Disconnected;
                    }
                    Some(Ok(_)) => {}
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Some(delta) = self.apply(command) {
                            if send_delta(&mut sink, delta).await.is_err() {
                                return SessionEnd::Disconnected;
                            }
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = ping.tick() => {
                    debug!("Sending keep-alive ping");
                    if send_message(&mut sink, &ClientMessage::Ping).await.is_err() {
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }
    }

    /// 명령을 적용하고, 서버에 보낼 구독 변경분이 있으면 반환합니다.
    fn apply(&mut self, command: Command) -> Option<TopicDelta> {
        let delta = match command {
            Command::Register { consumer, events } => {
                let _ = events.try_send(ClientEvent::Connection(self.state));
                self.consumers.insert(
                    consumer,
                    ConsumerSlot {
                        events,
                        kinds: HashSet::new(),
                        wildcard: false,
                    },
                );
                debug!(consumer, consumers = self.consumers.len(), "Consumer registered");
                None
            }
            Command::Unregister { consumer } => Some(self.remove_consumer(consumer)),
            Command::SetTopics {
                consumer,
                namespace,
                topics,
            } => Some(self.demand.set_namespace_topics(consumer, &namespace, topics)),
            Command::ClearNamespace {
                consumer,
                namespace,
            } => Some(self.demand.clear_namespace(consumer, &namespace)),
            Command::Listen { consumer, kinds } => {
                if let Some(slot) = self.consumers.get_mut(&consumer) {
                    match kinds {
                        Some(kinds) => slot.kinds.extend(kinds),
                        None => slot.wildcard = true,
                    }
                }
                None
            }
        };
        delta.filter(|delta| !delta.is_empty())
    }

    fn remove_consumer(&mut self, consumer: ConsumerId) -> TopicDelta {
        if self.consumers.remove(&consumer).is_some() {
            debug!(consumer, consumers = self.consumers.len(), "Consumer removed");
        }
        self.demand.remove_consumer(consumer)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        for slot in self.consumers.values() {
            let _ = slot.events.try_send(ClientEvent::Connection(state));
        }
    }

    /// 서버 메시지를 관심 있는 소비자에게 팬아웃합니다.
    ///
    /// 이벤트 채널이 닫힌 소비자 ID 목록을 반환합니다.
    fn dispatch(&self, text: &str) -> Vec<ConsumerId> {
        let message = match ServerMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable server frame");
                return Vec::new();
            }
        };

        let kind = message.kind();
        let mut closed = Vec::new();
        for (id, slot) in &self.consumers {
            if !slot.wants(kind) {
                continue;
            }
            match slot.events.try_send(ClientEvent::Message(message.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(consumer = *id, message_type = %kind, "Consumer queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        closed
    }
}

async fn send_message(sink: &mut WsSink, message: &ClientMessage) -> Result<()> {
    let json = message.to_json()?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

async fn send_delta(sink: &mut WsSink, delta: TopicDelta) -> Result<()> {
    for message in delta.into_messages() {
        debug!(message = ?message, "Sending subscription delta");
        send_message(sink, &message).await?;
    }
    Ok(())
}
