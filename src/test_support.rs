//! 단위 테스트 공용 도우미

use crate::ai::{GenerationError, TextGenerator};
use crate::auth::Claims;
use crate::config::Config;
use crate::error::StoreError;
use crate::projects::{ProjectContext, StaticProjectSource};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::{CacheStore, MemoryStore};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedReceiver;

pub const SECRET: &str = "test-secret";
pub const PROJECT_ID: &str = "65a1f0c2b3d4e5f6a7b8c9d0";

pub fn sign(secret: &str, id: &str, email: &str, exp: u64) -> String {
    let claims = Claims {
        id: id.to_string(),
        email: email.to_string(),
        exp,
        iat: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn in_one_hour() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600
}

pub fn project() -> ProjectContext {
    ProjectContext {
        id: PROJECT_ID.to_string(),
        name: "alpha".to_string(),
        member_ids: vec!["u1".to_string(), "u2".to_string()],
    }
}

/// 호출 횟수를 세고 지정한 시간만큼 지연되는 생성기
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub fail: bool,
}

impl CountingGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _system_instruction: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(GenerationError::Empty);
        }
        Ok(format!("answer to {}", prompt))
    }
}

/// 쓰기는 모두 실패하고 읽기는 내부 메모리 저장소로 가는 저장소
#[derive(Default)]
pub struct WriteFailingStore(pub MemoryStore);

fn refused(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

#[async_trait]
impl CacheStore for WriteFailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.get(key).await
    }
    async fn set_ex(&self, key: &str, _: &str, _: u64) -> Result<(), StoreError> {
        Err(refused(key))
    }
    async fn set_nx_ex(&self, key: &str, _: &str, _: u64) -> Result<bool, StoreError> {
        Err(refused(key))
    }
    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.0.del(key).await
    }
    async fn push_bounded(&self, key: &str, _: &str, _: usize) -> Result<(), StoreError> {
        Err(refused(key))
    }
    async fn range(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>, StoreError> {
        self.0.range(key, start, stop).await
    }
    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.0.len(key).await
    }
    async fn set_add(&self, key: &str, _: &str) -> Result<(), StoreError> {
        Err(refused(key))
    }
    async fn set_remove(&self, key: &str, _: &str) -> Result<(), StoreError> {
        Err(refused(key))
    }
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.0.set_members(key).await
    }
}

pub fn state_with(
    config: Config,
    store: Arc<dyn CacheStore>,
    generator: Arc<CountingGenerator>,
) -> Arc<AppState> {
    Arc::new(AppState::new(
        config,
        store,
        Arc::new(StaticProjectSource::new([project()])),
        generator,
    ))
}

pub fn test_state(generator: Arc<CountingGenerator>) -> Arc<AppState> {
    state_with(
        Config::with_secret(SECRET),
        Arc::new(MemoryStore::new()),
        generator,
    )
}

/// 채널에 쌓인 메시지를 모두 꺼낸다
pub fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
