//! 프로세스 내 메모리 백엔드
//!
//! Redis 가 없을 때의 단일 프로세스 실행과 테스트에 쓰인다. 만료 시각은
//! `tokio::time::Instant` 로 재므로 멈춘 테스트 시계에서도 동작한다.

use super::CacheStore;
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use tokio::time::{Duration, Instant};

enum Slot {
    Text(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

struct Record {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Record {
    fn text(value: &str, ttl_secs: u64) -> Self {
        Self {
            slot: Slot::Text(value.to_string()),
            expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        self.records.remove_if(key, |_, record| record.is_expired(now));
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.purge_expired(key);
        match self.records.get(key) {
            None => Ok(None),
            Some(record) => match &record.slot {
                Slot::Text(value) => Ok(Some(value.clone())),
                _ => Err(StoreError::WrongType(key.to_string())),
            },
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.records
            .insert(key.to_string(), Record::text(value, ttl_secs));
        Ok(())
    }

    async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(Record::text(value, ttl_secs));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Record::text(value, ttl_secs));
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    async fn push_bounded(
        &self,
        key: &str,
        value: &str,
        limit: usize,
    ) -> Result<(), StoreError> {
        self.purge_expired(key);
        let mut record = self.records.entry(key.to_string()).or_insert_with(|| Record {
            slot: Slot::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut record.slot {
            Slot::List(items) => {
                items.push_front(value.to_string());
                items.truncate(limit);
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn range(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.purge_expired(key);
        match self.records.get(key) {
            None => Ok(Vec::new()),
            Some(record) => match &record.slot {
                Slot::List(items) => Ok(items
                    .iter()
                    .skip(start)
                    .take((stop + 1).saturating_sub(start))
                    .cloned()
                    .collect()),
                _ => Err(StoreError::WrongType(key.to_string())),
            },
        }
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        self.purge_expired(key);
        match self.records.get(key) {
            None => Ok(0),
            Some(record) => match &record.slot {
                Slot::List(items) => Ok(items.len()),
                _ => Err(StoreError::WrongType(key.to_string())),
            },
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut record = self.records.entry(key.to_string()).or_insert_with(|| Record {
            slot: Slot::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut record.slot {
            Slot::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let emptied = match self.records.get_mut(key) {
            None => return Ok(()),
            Some(mut record) => match &mut record.slot {
                Slot::Set(members) => {
                    members.remove(member);
                    members.is_empty()
                }
                _ => return Err(StoreError::WrongType(key.to_string())),
            },
        };
        // Redis 처럼 빈 set 은 키째 사라진다
        if emptied {
            self.records.remove_if(key, |_, record| {
                matches!(&record.slot, Slot::Set(members) if members.is_empty())
            });
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        match self.records.get(key) {
            None => Ok(Vec::new()),
            Some(record) => match &record.slot {
                Slot::Set(members) => Ok(members.iter().cloned().collect()),
                _ => Err(StoreError::WrongType(key.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_only_succeeds_once_until_expiry() {
        tokio::time::pause();
        let store = MemoryStore::new();

        assert!(store.set_nx_ex("lock", "1", 15).await.unwrap());
        assert!(!store.set_nx_ex("lock", "1", 15).await.unwrap());

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(store.set_nx_ex("lock", "1", 15).await.unwrap());
    }

    #[tokio::test]
    async fn get_misses_after_ttl() {
        tokio::time::pause();
        let store = MemoryStore::new();
        store.set_ex("k", "v", 5).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_bounded_keeps_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.push_bounded("list", &i.to_string(), 3).await.unwrap();
        }
        assert_eq!(store.len("list").await.unwrap(), 3);
        assert_eq!(store.range("list", 0, 49).await.unwrap(), vec!["4", "3", "2"]);
        assert_eq!(store.range("list", 1, 1).await.unwrap(), vec!["3"]);
    }

    #[tokio::test]
    async fn wrong_type_is_reported() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 60).await.unwrap();
        assert!(matches!(
            store.push_bounded("k", "x", 10).await,
            Err(StoreError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn empty_set_disappears() {
        let store = MemoryStore::new();
        store.set_add("online", "u1").await.unwrap();
        store.set_add("online", "u2").await.unwrap();
        store.set_remove("online", "u1").await.unwrap();
        assert_eq!(store.set_members("online").await.unwrap(), vec!["u2"]);

        store.set_remove("online", "u2").await.unwrap();
        assert!(store.set_members("online").await.unwrap().is_empty());
        // 키가 지워졌으므로 다른 타입으로 재사용 가능
        store.set_ex("online", "v", 1).await.unwrap();
    }
}
