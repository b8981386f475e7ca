//! 애플리케이션 상태 관리

use crate::ai::{Assistant, TextGenerator};
use crate::auth::{Identity, TokenVerifier};
use crate::config::Config;
use crate::history::MessageHistory;
use crate::presence::PresenceService;
use crate::projects::{ProjectContext, ProjectResolver, ProjectSource};
use crate::protocol::ServerMessage;
use crate::store::CacheStore;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 멤버십 (room_id -> peer_id 집합). 비면 항목을 지운다
    pub rooms: DashMap<String, HashSet<String>>,
    /// 피어 세션 (peer_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 설정
    pub config: Arc<Config>,
    pub store: Arc<dyn CacheStore>,
    pub verifier: TokenVerifier,
    pub projects: ProjectResolver,
    pub history: MessageHistory,
    pub presence: PresenceService,
    pub assistant: Assistant,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn CacheStore>,
        project_source: Arc<dyn ProjectSource>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            peers: DashMap::new(),
            verifier: TokenVerifier::new(&config.auth.jwt_secret),
            projects: ProjectResolver::new(
                store.clone(),
                project_source,
                config.cache.project_ttl_secs,
            ),
            history: MessageHistory::new(store.clone(), config.room.message_limit),
            presence: PresenceService::new(store.clone()),
            assistant: Assistant::new(store.clone(), generator, &config.ai),
            store,
            config: Arc::new(config),
        }
    }

    /// 방의 현재 로컬 멤버 수
    pub fn room_size(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// 방 멤버 peer_id 목록 (락을 잡은 채로 보내지 않도록 복사)
    pub fn room_members(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn identity_of(&self, peer_id: &str) -> Option<Identity> {
        self.peers.get(peer_id).map(|s| s.identity.clone())
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    pub id: String,
    pub identity: Identity,
    /// 연결 시 해석된 프로젝트 (없을 수 있음)
    pub project: Option<ProjectContext>,
    /// 참여 중인 방 (동시에 여러 개 가능)
    pub rooms: DashSet<String>,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}
