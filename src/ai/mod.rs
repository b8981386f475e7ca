//! AI 응답 생성 (cache-aside + 분산 잠금)
//!
//! 같은 프롬프트가 여러 연결/프로세스에서 동시에 들어와도 캐시와 잠금
//! 창 안에서는 upstream 호출이 한 번만 일어난다. 잠금을 얻지 못한 쪽은
//! 재시도하지 않고 포기하며, 잠금 보유자가 방에 결과를 방송한다.

pub mod gemini;
pub mod generator;

pub use gemini::GeminiClient;
pub use generator::{GenerationError, TextGenerator};

use crate::config::AiConfig;
use crate::error::ChatError;
use crate::store::CacheStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const TRIGGER: &str = "@ai";

/// 메시지에 `@ai` 가 있으면 표시를 모두 지운 프롬프트를 돌려준다
pub fn extract_prompt(text: &str) -> Option<String> {
    // ASCII 소문자화는 바이트 위치를 보존한다
    let lower = text.to_ascii_lowercase();
    if !lower.contains(TRIGGER) {
        return None;
    }
    let mut stripped = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, _) in lower.match_indices(TRIGGER) {
        stripped.push_str(&text[cursor..start]);
        cursor = start + TRIGGER.len();
    }
    stripped.push_str(&text[cursor..]);

    let prompt = stripped.trim();
    if prompt.is_empty() {
        None
    } else {
        Some(prompt.to_string())
    }
}

/// 소문자화한 프롬프트의 SHA-256 으로 만든 응답 캐시 키
pub fn prompt_key(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.to_lowercase().as_bytes());
    format!("ai:prompt:{}", hex::encode(digest))
}

pub fn lock_key(prompt: &str) -> String {
    format!("ai:lock:{}", prompt_key(prompt))
}

/// 조건부 쓰기 결과. 블로킹 mutex 가 아니다
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    Contended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiOutcome {
    Cached(String),
    Generated(String),
    /// 다른 생성이 진행 중이라 포기함
    Contended,
}

impl AiOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            AiOutcome::Cached(text) | AiOutcome::Generated(text) => Some(text),
            AiOutcome::Contended => None,
        }
    }
}

pub struct Assistant {
    store: Arc<dyn CacheStore>,
    generator: Arc<dyn TextGenerator>,
    system_instruction: Option<String>,
    cache_ttl_secs: u64,
    lock_ttl_secs: u64,
}

impl Assistant {
    pub fn new(store: Arc<dyn CacheStore>, generator: Arc<dyn TextGenerator>, config: &AiConfig) -> Self {
        Self {
            store,
            generator,
            system_instruction: config.system_instruction.clone(),
            cache_ttl_secs: config.cache_ttl_secs,
            lock_ttl_secs: config.lock_ttl_secs,
        }
    }

    pub async fn respond(&self, prompt: &str) -> Result<AiOutcome, ChatError> {
        if let Some(text) = self.cached(prompt).await {
            tracing::debug!("AI response served from cache");
            return Ok(AiOutcome::Cached(text));
        }

        if self.try_lock(prompt).await == LockOutcome::Contended {
            tracing::debug!("AI generation already in flight, abandoning");
            return Ok(AiOutcome::Contended);
        }

        let generated = self
            .generator
            .generate(prompt, self.system_instruction.as_deref())
            .await;
        if let Ok(text) = &generated {
            self.remember(prompt, text).await;
        }
        self.release(prompt).await;

        let text = generated.map_err(|e| ChatError::UpstreamUnavailable(e.to_string()))?;
        Ok(AiOutcome::Generated(text))
    }

    async fn cached(&self, prompt: &str) -> Option<String> {
        match self.store.get(&prompt_key(prompt)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "AI cache read failed, treating as miss");
                None
            }
        }
    }

    async fn remember(&self, prompt: &str, text: &str) {
        if let Err(e) = self
            .store
            .set_ex(&prompt_key(prompt), text, self.cache_ttl_secs)
            .await
        {
            tracing::warn!(error = %e, "AI cache write failed");
        }
    }

    /// 저장소 장애 시에는 잠금 없이 생성한다 (중복 생성만 감수)
    pub async fn try_lock(&self, prompt: &str) -> LockOutcome {
        match self
            .store
            .set_nx_ex(&lock_key(prompt), "1", self.lock_ttl_secs)
            .await
        {
            Ok(true) => LockOutcome::Acquired,
            Ok(false) => LockOutcome::Contended,
            Err(e) => {
                tracing::warn!(error = %e, "AI lock unavailable, generating unguarded");
                LockOutcome::Acquired
            }
        }
    }

    async fn release(&self, prompt: &str) {
        if let Err(e) = self.store.del(&lock_key(prompt)).await {
            tracing::warn!(error = %e, "AI lock release failed, waiting for TTL");
        }
    }
}
