//! 방 안의 AI 응답 흐름: ai-typing → (응답) → ai-done

use crate::ai::AiOutcome;
use crate::handlers::room::broadcast_to_room;
use crate::protocol::{ChatMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

/// 트리거된 프롬프트에 대해 방 전체에 AI 응답을 방송한다.
/// 어떤 결과든 마지막에 ai-done 을 보낸다.
pub async fn run(state: Arc<AppState>, room_id: String, prompt: String) {
    broadcast_to_room(
        &state,
        &room_id,
        ServerMessage::AiTyping {
            project_id: room_id.clone(),
        },
    );

    match state.assistant.respond(&prompt).await {
        Ok(outcome) => {
            if let Some(text) = outcome.text() {
                publish(&state, &room_id, text).await;
            }
            tracing::info!(
                room_id = %room_id,
                outcome = outcome_label(&outcome),
                "AI request finished"
            );
        }
        Err(e) => {
            tracing::warn!(room_id = %room_id, code = e.code(), error = %e, "AI request failed");
        }
    }

    broadcast_to_room(
        &state,
        &room_id,
        ServerMessage::AiDone {
            project_id: room_id.clone(),
        },
    );
}

async fn publish(state: &AppState, room_id: &str, text: &str) {
    let message = ChatMessage::from_assistant(room_id, text);
    if let Err(e) = state.history.append(&message).await {
        tracing::warn!(room_id = %room_id, error = %e, "AI message not persisted, skipping broadcast");
        return;
    }
    broadcast_to_room(state, room_id, ServerMessage::ProjectMessage(message));
}

fn outcome_label(outcome: &AiOutcome) -> &'static str {
    match outcome {
        AiOutcome::Cached(_) => "cached",
        AiOutcome::Generated(_) => "generated",
        AiOutcome::Contended => "contended",
    }
}
