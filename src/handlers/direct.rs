//! 1:1 개인 메시지 중계
//!
//! 기록에 남기지 않는다. 수신자가 이 프로세스에 없으면 조용히 버린다
//! (다른 프로세스에 접속 중인지는 로그로만 구분한다).

use crate::protocol::{now_iso, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

pub async fn handle_private_message(
    state: Arc<AppState>,
    peer_id: &str,
    receiver_id: &str,
    text: &str,
) {
    if receiver_id.trim().is_empty() || text.trim().is_empty() {
        return;
    }
    let Some(sender) = state.identity_of(peer_id) else {
        return;
    };

    // 사용자 id 로 수신 연결 찾기 (첫 번째 연결)
    let target = state
        .peers
        .iter()
        .find(|p| p.identity.id == receiver_id)
        .map(|p| p.sender.clone());

    let Some(target) = target else {
        if state.presence.is_online(receiver_id).await {
            tracing::debug!(peer_id = %peer_id, receiver_id = %receiver_id, "Private message dropped, receiver connected to another instance");
        } else {
            tracing::debug!(peer_id = %peer_id, receiver_id = %receiver_id, "Private message dropped, receiver offline");
        }
        return;
    };

    let message = ServerMessage::PrivateMessage {
        sender_id: sender.id.clone(),
        sender_name: sender.display_name().to_string(),
        receiver_id: receiver_id.to_string(),
        message: text.to_string(),
        timestamp: now_iso(),
    };

    let _ = target.send(message.clone());
    // 발신자 화면 확인용 사본
    if let Some(session) = state.peers.get(peer_id) {
        let _ = session.sender.send(message);
    }

    tracing::debug!(peer_id = %peer_id, receiver_id = %receiver_id, "Private message relayed");
}
