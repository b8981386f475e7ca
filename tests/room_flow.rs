//! 실제 소켓을 통한 방 흐름 통합 테스트

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use projectroom::ai::{GenerationError, TextGenerator};
use projectroom::config::Config;
use projectroom::projects::{ProjectContext, StaticProjectSource};
use projectroom::server;
use projectroom::state::AppState;
use projectroom::store::MemoryStore;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const SECRET: &str = "integration-secret";
const PROJECT_ID: &str = "65a1f0c2b3d4e5f6a7b8c9d0";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, prompt: &str, _: Option<&str>) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("summary of {}", prompt))
    }
}

fn token(user_id: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    encode(
        &Header::default(),
        &json!({ "id": user_id, "email": format!("{}@example.com", user_id), "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn spawn_server() -> (SocketAddr, Arc<AppState>, Arc<CountingGenerator>) {
    let generator = Arc::new(CountingGenerator::default());
    let project = ProjectContext {
        id: PROJECT_ID.to_string(),
        name: "alpha".to_string(),
        member_ids: vec!["u1".to_string(), "u2".to_string()],
    };
    let state = Arc::new(AppState::new(
        Config::with_secret(SECRET),
        Arc::new(MemoryStore::new()),
        Arc::new(StaticProjectSource::new([project])),
        generator.clone(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state, generator)
}

async fn connect(addr: SocketAddr, user_id: &str) -> Client {
    let url = format!(
        "ws://{}/ws?token={}&projectId={}",
        addr,
        token(user_id),
        PROJECT_ID
    );
    let (mut client, _) = connect_async(url).await.unwrap();
    let connected = next_event(&mut client).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["payload"]["userId"], user_id);
    client
}

async fn send(client: &mut Client, event: Value) {
    client.send(Message::Text(event.to_string())).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(client: &mut Client) -> Value {
    send(client, json!({ "type": "join-project", "payload": { "projectId": PROJECT_ID } })).await;
    let history = next_event(client).await;
    assert_eq!(history["type"], "load-messages");
    let joined = next_event(client).await;
    assert_eq!(joined["type"], "joined-project");
    assert_eq!(joined["payload"]["success"], true);
    history
}

#[tokio::test]
async fn connection_without_valid_token_is_refused() {
    let (addr, _, _) = spawn_server().await;

    for url in [
        format!("ws://{}/ws", addr),
        format!("ws://{}/ws?token=garbage", addr),
    ] {
        match connect_async(url).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
            other => panic!("expected 401, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn heartbeat_is_acknowledged() {
    let (addr, _, _) = spawn_server().await;
    let mut client = connect(addr, "u1").await;

    send(&mut client, json!({ "type": "heartbeat" })).await;
    assert_eq!(next_event(&mut client).await["type"], "heartbeat-ack");
}

#[tokio::test]
async fn room_chat_with_ai_summary() {
    let (addr, state, generator) = spawn_server().await;
    let mut alice = connect(addr, "u1").await;
    let mut bob = connect(addr, "u2").await;

    assert_eq!(join(&mut alice).await["payload"], json!([]));
    join(&mut bob).await;

    send(
        &mut alice,
        json!({ "type": "project-message", "payload": { "projectId": PROJECT_ID, "message": "hello" } }),
    )
    .await;
    let hello = next_event(&mut bob).await;
    assert_eq!(hello["type"], "project-message");
    assert_eq!(hello["payload"]["message"], "hello");
    assert_eq!(hello["payload"]["senderId"], "u1");

    send(
        &mut bob,
        json!({ "type": "project-message", "payload": { "projectId": PROJECT_ID, "message": "@AI summarize hello" } }),
    )
    .await;

    let relayed = next_event(&mut alice).await;
    assert_eq!(relayed["payload"]["senderId"], "u2");

    for client in [&mut alice, &mut bob] {
        assert_eq!(next_event(client).await["type"], "ai-typing");
        let answer = next_event(client).await;
        assert_eq!(answer["type"], "project-message");
        assert_eq!(answer["payload"]["senderId"], "ai");
        assert_eq!(answer["payload"]["senderName"], "AI Assistant");
        assert_eq!(answer["payload"]["message"], "summary of summarize hello");
        assert_eq!(next_event(client).await["type"], "ai-done");
    }

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.history.len(PROJECT_ID).await.unwrap(), 3);

    // 늦게 들어온 참가자는 기록을 오래된 순으로 받는다
    let mut carol = connect(addr, "u3").await;
    let history = join(&mut carol).await;
    let texts: Vec<&str> = history["payload"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["hello", "@AI summarize hello", "summary of summarize hello"]);
}

#[tokio::test]
async fn logout_revokes_token_for_new_connections() {
    let (addr, _, _) = spawn_server().await;
    let jwt = token("u1");

    let response = reqwest::Client::new()
        .post(format!("http://{}/auth/logout", addr))
        .bearer_auth(&jwt)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    match connect_async(format!("ws://{}/ws?token={}", addr, jwt)).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected 401, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn health_reports_store_backend() {
    let (addr, _, _) = spawn_server().await;

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}
