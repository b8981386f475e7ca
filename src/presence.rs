//! 접속 중인 사용자 관리
//!
//! 연결 객체가 아니라 캐시 저장소의 `presence:online` set 에 둔다.
//! 멤버는 연결 단위 `{user_id}:{peer_id}` 이므로 한 프로세스의 연결 해제가
//! 다른 프로세스에 남은 같은 사용자의 연결을 지우지 않는다.
//! 실패는 로그만 남기고 연결 처리를 막지 않는다.

use crate::store::CacheStore;
use std::collections::BTreeSet;
use std::sync::Arc;

const ONLINE_KEY: &str = "presence:online";

#[derive(Clone)]
pub struct PresenceService {
    store: Arc<dyn CacheStore>,
}

/// peer_id 는 uuid 라 `:` 가 없다. 마지막 `:` 앞이 user_id
fn member(user_id: &str, peer_id: &str) -> String {
    format!("{}:{}", user_id, peer_id)
}

fn user_of(member: &str) -> &str {
    member.rsplit_once(':').map_or(member, |(user_id, _)| user_id)
}

impl PresenceService {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, user_id: &str, peer_id: &str) {
        if let Err(e) = self.store.set_add(ONLINE_KEY, &member(user_id, peer_id)).await {
            tracing::warn!(user_id = %user_id, peer_id = %peer_id, error = %e, "Presence add failed");
        }
    }

    pub async fn remove(&self, user_id: &str, peer_id: &str) {
        if let Err(e) = self.store.set_remove(ONLINE_KEY, &member(user_id, peer_id)).await {
            tracing::warn!(user_id = %user_id, peer_id = %peer_id, error = %e, "Presence remove failed");
        }
    }

    /// 접속 중인 사용자 id (중복 제거, 정렬). 저장소 장애 시 빈 목록
    pub async fn online(&self) -> Vec<String> {
        match self.store.set_members(ONLINE_KEY).await {
            Ok(members) => members
                .iter()
                .map(|m| user_of(m).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Presence query failed");
                Vec::new()
            }
        }
    }

    /// 어느 프로세스에든 연결이 하나라도 있으면 true
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.online().await.iter().any(|id| id == user_id)
    }
}
