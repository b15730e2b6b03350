//! 스크립트된 로컬 WebSocket 서버로 멀티플렉서 동작을 검증합니다.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use killfeed_client::{
    ClientConfig, ClientError, ClientEvent, ConnectionMode, ConnectionState, Consumer, Multiplexer,
};
use killfeed_core::{MessageKind, ServerMessage};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

type ServerSide = WebSocketStream<TcpStream>;

/// 연결을 받아 테스트로 넘겨주는 서버.
struct ScriptedServer {
    addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<ServerSide>,
}

impl ScriptedServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });

        Self { addr, accepted }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("ws://{}", self.addr)).with_backoff(50, 200)
    }

    async fn accept(&mut self) -> ServerSide {
        tokio::time::timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .expect("no connection accepted")
            .unwrap()
    }

    async fn assert_no_connection(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(200), self.accepted.recv()).await;
        assert!(next.is_err(), "unexpected extra connection");
    }
}

/// 클라이언트가 보낸 다음 텍스트 프레임 (핑 제외).
async fn next_request(ws: &mut ServerSide) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if value["type"] != "ping" {
                        return value;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("client connection ended: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for client frame")
}

async fn assert_no_request(ws: &mut ServerSide) {
    let next = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("client connection ended: {:?}", other),
            }
        }
    })
    .await;
    assert!(next.is_err(), "unexpected client frame: {:?}", next);
}

async fn push(ws: &mut ServerSide, message: &ServerMessage) {
    ws.send(Message::Text(message.to_json().unwrap())).await.unwrap();
}

async fn next_event(consumer: &mut Consumer) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), consumer.recv())
        .await
        .expect("timed out waiting for event")
        .expect("multiplexer stopped")
}

async fn wait_for_state(consumer: &mut Consumer, state: ConnectionState) {
    loop {
        if next_event(consumer).await == ClientEvent::Connection(state) {
            return;
        }
    }
}

async fn assert_no_event(consumer: &mut Consumer) {
    let next = tokio::time::timeout(Duration::from_millis(200), consumer.recv()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next);
}

#[tokio::test]
async fn test_union_diff_sends_minimal_unsubscribe() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut first = handle.consumer().unwrap();
    let mut second = handle.consumer().unwrap();
    let mut ws = server.accept().await;
    wait_for_state(&mut first, ConnectionState::Open).await;
    wait_for_state(&mut second, ConnectionState::Open).await;

    first.set_topics("n1", ["victim.1", "victim.2"]).unwrap();
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["victim.1", "victim.2"]})
    );

    second.set_topics("n2", ["victim.2", "victim.3"]).unwrap();
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["victim.3"]})
    );

    first.clear("n1").unwrap();
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "unsubscribe", "topics": ["victim.1"]})
    );
    assert_no_request(&mut ws).await;

    // 같은 집합을 다시 설정하면 아무것도 보내지 않음
    second.set_topics("n2", ["victim.3", "victim.2"]).unwrap();
    assert_no_request(&mut ws).await;
    server.assert_no_connection().await;
}

#[tokio::test]
async fn test_dropping_consumer_releases_its_topics() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut keeper = handle.consumer().unwrap();
    let leaver = handle.consumer().unwrap();
    let mut ws = server.accept().await;
    wait_for_state(&mut keeper, ConnectionState::Open).await;

    keeper.set_topics("feed", ["10b"]).unwrap();
    next_request(&mut ws).await;
    leaver.set_topics("feed", ["10b", "system.30000142"]).unwrap();
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["system.30000142"]})
    );

    drop(leaver);
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "unsubscribe", "topics": ["system.30000142"]})
    );

    // 물리 연결은 유지됨
    push(&mut ws, &ServerMessage::Pong).await;
    keeper.listen_all().unwrap();
    server.assert_no_connection().await;
}

#[tokio::test]
async fn test_reconnect_resubscribes_full_set() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut consumer = handle.consumer().unwrap();
    let mut ws = server.accept().await;
    wait_for_state(&mut consumer, ConnectionState::Open).await;

    consumer.set_topics("a", ["all"]).unwrap();
    consumer.set_topics("b", ["region.The Forge"]).unwrap();
    next_request(&mut ws).await;
    next_request(&mut ws).await;

    drop(ws);
    wait_for_state(&mut consumer, ConnectionState::Disconnected).await;

    let mut ws = server.accept().await;
    wait_for_state(&mut consumer, ConnectionState::Open).await;
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["all", "region.The Forge"]})
    );
}

#[tokio::test]
async fn test_invalid_topics_never_reach_server() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut healthy = handle.consumer().unwrap();
    let broken = handle.consumer().unwrap();
    let mut ws = server.accept().await;
    wait_for_state(&mut healthy, ConnectionState::Open).await;

    healthy.set_topics("feed", ["victim.10"]).unwrap();
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["victim.10"]})
    );

    let err = broken.set_topics("feed", ["nope", "victim.20"]).unwrap_err();
    assert!(matches!(err, ClientError::InvalidTopics(ref topics) if topics == "nope"));
    assert_no_request(&mut ws).await;

    // 재연결 후 전체 재구독에도 섞이지 않음
    drop(ws);
    wait_for_state(&mut healthy, ConnectionState::Disconnected).await;
    let mut ws = server.accept().await;
    wait_for_state(&mut healthy, ConnectionState::Open).await;
    assert_eq!(
        next_request(&mut ws).await,
        json!({"type": "subscribe", "topics": ["victim.10"]})
    );
    assert_no_request(&mut ws).await;
}

#[tokio::test]
async fn test_messages_fan_out_by_kind() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut killmails_only = handle.consumer().unwrap();
    let mut everything = handle.consumer().unwrap();
    let mut state_only = handle.consumer().unwrap();
    killmails_only.listen([MessageKind::Killmail]).unwrap();
    everything.listen_all().unwrap();

    let mut ws = server.accept().await;
    for consumer in [&mut killmails_only, &mut everything, &mut state_only] {
        wait_for_state(consumer, ConnectionState::Open).await;
    }

    let killmail: ServerMessage = serde_json::from_value(json!({
        "type": "killmail",
        "data": {
            "killmailId": 1,
            "totalValue": 2000000000,
            "victim": {"characterId": 10},
            "attacker": {"characterId": 20},
            "solarSystemId": 30000142,
            "regionName": "The Forge"
        }
    }))
    .unwrap();

    push(&mut ws, &ServerMessage::Pong).await;
    push(&mut ws, &killmail).await;

    assert_eq!(next_event(&mut killmails_only).await, ClientEvent::Message(killmail.clone()));
    assert_eq!(next_event(&mut everything).await, ClientEvent::Message(ServerMessage::Pong));
    assert_eq!(next_event(&mut everything).await, ClientEvent::Message(killmail));
    assert_no_event(&mut killmails_only).await;
    assert_no_event(&mut state_only).await;
}

#[tokio::test]
async fn test_late_consumer_receives_current_state() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config());

    let mut early = handle.consumer().unwrap();
    let _ws = server.accept().await;
    wait_for_state(&mut early, ConnectionState::Open).await;

    let mut late = handle.consumer().unwrap();
    assert_eq!(
        next_event(&mut late).await,
        ClientEvent::Connection(ConnectionState::Open)
    );
}

#[tokio::test]
async fn test_dedicated_mode_opens_connection_per_consumer() {
    let mut server = ScriptedServer::start().await;
    let handle = Multiplexer::spawn(server.config().with_mode(ConnectionMode::Dedicated));
    assert_eq!(handle.mode(), ConnectionMode::Dedicated);

    let mut first = handle.consumer().unwrap();
    let mut second = handle.consumer().unwrap();
    let mut ws_a = server.accept().await;
    let mut ws_b = server.accept().await;
    wait_for_state(&mut first, ConnectionState::Open).await;
    wait_for_state(&mut second, ConnectionState::Open).await;

    first.set_topics("feed", ["5b"]).unwrap();
    second.set_topics("feed", ["5b"]).unwrap();

    // 두 연결 모두 각자 구독을 보냄
    let expected = json!({"type": "subscribe", "topics": ["5b"]});
    assert_eq!(next_request(&mut ws_a).await, expected);
    assert_eq!(next_request(&mut ws_b).await, expected);
}
