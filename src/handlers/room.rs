//! 방 관리 핸들러
//!
//! 방은 별도 생성 기록 없이 (멤버 집합, 메시지 기록) 으로만 존재한다.
//! 발신자에게는 자기 메시지를 되돌려 보내지 않는다 (클라이언트가 먼저 그린다).

use crate::ai;
use crate::error::ChatError;
use crate::handlers::assistant;
use crate::projects::is_valid_project_id;
use crate::protocol::{ChatMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

/// 방 참여 처리
pub async fn handle_join_project(state: Arc<AppState>, peer_id: &str, project_id: &str) {
    let room_id = project_id.trim().to_string();

    if !is_valid_project_id(&room_id) {
        reject_join(&state, peer_id, ChatError::InvalidInput("Invalid projectId".to_string()));
        return;
    }

    let Some(identity) = state.identity_of(peer_id) else {
        return;
    };

    if state.config.room.enforce_membership {
        let is_member = state
            .projects
            .resolve(&room_id)
            .await
            .is_some_and(|project| project.has_member(&identity.id));
        if !is_member {
            reject_join(
                &state,
                peer_id,
                ChatError::InvalidInput("Not a member of this project".to_string()),
            );
            return;
        }
    }

    // 멤버십 갱신 (락 범위 제한)
    let newly_joined = {
        let mut members = state.rooms.entry(room_id.clone()).or_default();
        members.insert(peer_id.to_string())
    };
    if let Some(session) = state.peers.get(peer_id) {
        session.rooms.insert(room_id.clone());
    }

    // 재참여 시에는 기록을 다시 보내지 않는다
    if newly_joined {
        let messages = match state
            .history
            .recent(&room_id, state.config.room.join_history)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "History read failed, sending empty history");
                Vec::new()
            }
        };
        send_to_peer(&state, peer_id, ServerMessage::LoadMessages(messages));
    }

    let room_size = state.room_size(&room_id);
    send_to_peer(
        &state,
        peer_id,
        ServerMessage::JoinedProject {
            success: true,
            project_id: Some(room_id.clone()),
            room_size: Some(room_size),
            error: None,
        },
    );

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        room_size = room_size,
        rejoin = !newly_joined,
        "User joined room"
    );
}

/// 참여 실패는 요청한 연결에만 알린다
fn reject_join(state: &AppState, peer_id: &str, err: ChatError) {
    tracing::warn!(peer_id = %peer_id, code = err.code(), error = %err, "Join rejected");
    let reason = match err {
        ChatError::InvalidInput(reason) => reason,
        other => other.to_string(),
    };
    send_to_peer(state, peer_id, ServerMessage::join_failed(reason));
}

/// 방 나가기 내부 로직. 남은 인원을 돌려준다
pub fn leave_room_internal(state: &AppState, peer_id: &str, room_id: &str) -> usize {
    let remaining = match state.rooms.get_mut(room_id) {
        Some(mut members) => {
            members.remove(peer_id);
            members.len()
        }
        None => return 0,
    };

    if remaining == 0 {
        state.rooms.remove_if(room_id, |_, members| members.is_empty());
    }

    tracing::info!(
        peer_id = %peer_id,
        room_id = %room_id,
        remaining = remaining,
        "User left room"
    );
    remaining
}

/// 방 나가기 처리
pub async fn handle_leave_project(state: Arc<AppState>, peer_id: &str, project_id: &str) {
    let room_id = project_id.trim();
    if let Some(session) = state.peers.get(peer_id) {
        session.rooms.remove(room_id);
    }
    leave_room_internal(&state, peer_id, room_id);
    send_to_peer(
        &state,
        peer_id,
        ServerMessage::LeftProject {
            project_id: room_id.to_string(),
        },
    );
}

/// 방 메시지 처리: 저장 → 방송 → (@ai 이면) 어시스턴트
pub async fn handle_project_message(
    state: Arc<AppState>,
    peer_id: &str,
    project_id: &str,
    text: &str,
) {
    let room_id = project_id.trim();
    if room_id.is_empty() || text.trim().is_empty() {
        return;
    }
    if !is_valid_project_id(room_id) {
        tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Dropping message for malformed room id");
        return;
    }
    let Some(identity) = state.identity_of(peer_id) else {
        return;
    };

    let message = ChatMessage::from_user(room_id, text, &identity);

    // 저장에 실패하면 방송하지 않는다
    if let Err(e) = state.history.append(&message).await {
        tracing::warn!(peer_id = %peer_id, room_id = %room_id, error = %e, "Message not persisted, send aborted");
        let err = ChatError::from(e);
        send_to_peer(
            &state,
            peer_id,
            ServerMessage::Error {
                code: err.code().to_string(),
                message: "Message could not be saved".to_string(),
            },
        );
        return;
    }

    broadcast_to_room_except(
        &state,
        room_id,
        peer_id,
        ServerMessage::ProjectMessage(message),
    );

    tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Message broadcast");

    if let Some(prompt) = ai::extract_prompt(text) {
        // 생성 대기 중에도 이 연결의 다른 이벤트는 계속 처리된다
        let state = state.clone();
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            assistant::run(state, room_id, prompt).await;
        });
    }
}

/// 특정 피어에게 메시지 전송
pub fn send_to_peer(state: &AppState, peer_id: &str, message: ServerMessage) {
    if let Some(session) = state.peers.get(peer_id) {
        let _ = session.sender.send(message);
    }
}

/// 방 전체에 브로드캐스트
pub fn broadcast_to_room(state: &AppState, room_id: &str, message: ServerMessage) {
    for peer_id in state.room_members(room_id) {
        send_to_peer(state, &peer_id, message.clone());
    }
}

/// 방의 특정 피어를 제외하고 브로드캐스트
pub fn broadcast_to_room_except(
    state: &AppState,
    room_id: &str,
    except_peer_id: &str,
    message: ServerMessage,
) {
    for peer_id in state.room_members(room_id) {
        if peer_id != except_peer_id {
            send_to_peer(state, &peer_id, message.clone());
        }
    }
}
