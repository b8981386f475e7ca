//! 방별 최근 메시지 기록
//!
//! `messages:{projectId}` 리스트에 최신순으로 저장하고, 추가 직후 N 개로
//! 자른다. 읽을 때는 화면 표시용으로 오래된 순으로 뒤집는다.

use crate::error::StoreError;
use crate::protocol::ChatMessage;
use crate::store::CacheStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct MessageHistory {
    store: Arc<dyn CacheStore>,
    limit: usize,
}

impl MessageHistory {
    pub fn new(store: Arc<dyn CacheStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
        }
    }

    fn key(room_id: &str) -> String {
        format!("messages:{}", room_id)
    }

    /// push-then-trim
    pub async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let payload = serde_json::to_string(message)?;
        self.store
            .push_bounded(&Self::key(&message.project_id), &payload, self.limit)
            .await
    }

    /// 최근 `count` 개를 오래된 순으로
    pub async fn recent(&self, room_id: &str, count: usize) -> Result<Vec<ChatMessage>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let raw = self.store.range(&Self::key(room_id), 0, count - 1).await?;
        let mut messages: Vec<ChatMessage> = raw
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(room_id = %room_id, error = %e, "Skipping undecodable history entry");
                    None
                }
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }

    pub async fn len(&self, room_id: &str) -> Result<usize, StoreError> {
        self.store.len(&Self::key(room_id)).await
    }
}
