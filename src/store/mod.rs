//! 내구성 캐시 저장소 (key-value / list / set)
//!
//! 프로젝트 메타데이터 캐시, 최근 채팅 기록, AI 응답 캐시와 잠금이 모두
//! 이 저장소를 거친다. 모든 변경은 단일 키 원자 연산이다.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::error::StoreError;
use async_trait::async_trait;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 백엔드 이름 (health 응답용)
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// SET NX EX. 키를 새로 설정했으면 true
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<bool, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// 리스트 앞에 추가한 직후 `limit` 개로 자른다 (push-then-trim)
    async fn push_bounded(&self, key: &str, value: &str, limit: usize)
        -> Result<(), StoreError>;

    /// LRANGE 와 같은 포함 범위. `stop` 이 길이를 넘으면 끝까지
    async fn range(&self, key: &str, start: usize, stop: usize)
        -> Result<Vec<String>, StoreError>;

    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
