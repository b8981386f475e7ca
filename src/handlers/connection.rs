//! 연결 핸들러

use crate::gate::GateSession;
use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 새 연결 처리
pub async fn handle_connection(
    state: Arc<AppState>,
    session: GateSession,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let peer_id = Uuid::new_v4().to_string();
    let user_id = session.identity.id.clone();
    let project_id = session.project.as_ref().map(|p| p.id.clone());

    let peer = PeerSession {
        id: peer_id.clone(),
        identity: session.identity,
        project: session.project,
        rooms: DashSet::new(),
        sender: sender.clone(),
        connected_at: Instant::now(),
    };

    state.peers.insert(peer_id.clone(), peer);
    state.presence.add(&user_id, &peer_id).await;

    let _ = sender.send(ServerMessage::Connected {
        socket_id: peer_id.clone(),
        user_id: user_id.clone(),
        project_id: project_id.clone(),
    });

    tracing::info!(
        peer_id = %peer_id,
        user_id = %user_id,
        project_id = ?project_id,
        "New connection established"
    );
    peer_id
}

/// 연결 해제 처리
pub async fn handle_disconnect(state: Arc<AppState>, peer_id: &str) {
    let Some((_, session)) = state.peers.remove(peer_id) else {
        return;
    };

    for room_id in session.rooms.iter() {
        crate::handlers::room::leave_room_internal(&state, peer_id, room_id.key());
    }

    // 이 연결의 항목만 지운다. 같은 사용자의 다른 연결은 그대로 남는다
    state.presence.remove(&session.identity.id, peer_id).await;

    tracing::info!(
        peer_id = %peer_id,
        user_id = %session.identity.id,
        connected_secs = session.connected_at.elapsed().as_secs(),
        "Connection closed"
    );
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

/// 접속 중인 사용자 목록 요청
pub async fn handle_list_online(state: Arc<AppState>, sender: &UnboundedSender<ServerMessage>) {
    let user_ids = state.presence.online().await;
    let _ = sender.send(ServerMessage::OnlineUsers { user_ids });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::config::Config;
    use crate::store::{CacheStore, MemoryStore};
    use crate::test_support::{drain, state_with, test_state, CountingGenerator, SECRET};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn session(user_id: &str) -> GateSession {
        GateSession {
            identity: Identity {
                id: user_id.to_string(),
                email: format!("{}@example.com", user_id),
            },
            project: None,
        }
    }

    #[tokio::test]
    async fn presence_follows_last_connection_of_user() {
        let state = test_state(Arc::new(CountingGenerator::new(Duration::ZERO)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = handle_connection(state.clone(), session("u1"), tx.clone()).await;
        let second = handle_connection(state.clone(), session("u1"), tx.clone()).await;
        assert!(matches!(
            drain(&mut rx).first(),
            Some(ServerMessage::Connected { user_id, .. }) if user_id == "u1"
        ));
        assert!(state.presence.is_online("u1").await);

        handle_disconnect(state.clone(), &first).await;
        assert!(state.presence.is_online("u1").await);

        handle_disconnect(state.clone(), &second).await;
        assert!(!state.presence.is_online("u1").await);
        assert!(state.peers.is_empty());
    }

    #[tokio::test]
    async fn list_online_reports_presence() {
        let state = test_state(Arc::new(CountingGenerator::new(Duration::ZERO)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_connection(state.clone(), session("u2"), tx.clone()).await;
        handle_connection(state.clone(), session("u1"), tx.clone()).await;
        drain(&mut rx);

        handle_list_online(state, &tx).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::OnlineUsers { user_ids }] if user_ids == &["u1", "u2"]
        ));
    }

    #[tokio::test]
    async fn presence_survives_disconnect_on_another_process() {
        // 두 프로세스가 같은 저장소를 공유한다
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let generator = Arc::new(CountingGenerator::new(Duration::ZERO));
        let first = state_with(Config::with_secret(SECRET), store.clone(), generator.clone());
        let second = state_with(Config::with_secret(SECRET), store, generator);
        let (tx, _rx) = mpsc::unbounded_channel();

        let on_first = handle_connection(first.clone(), session("u1"), tx.clone()).await;
        let on_second = handle_connection(second.clone(), session("u1"), tx.clone()).await;

        handle_disconnect(second.clone(), &on_second).await;
        assert!(first.presence.is_online("u1").await);
        assert!(second.presence.is_online("u1").await);

        handle_disconnect(first.clone(), &on_first).await;
        assert!(!second.presence.is_online("u1").await);
    }
}
