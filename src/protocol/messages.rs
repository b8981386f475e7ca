//! 클라이언트-서버 메시지 프로토콜 정의

use crate::auth::Identity;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const AI_SENDER_ID: &str = "ai";
pub const AI_SENDER_NAME: &str = "AI Assistant";

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    JoinProject { project_id: String },
    LeaveProject { project_id: String },

    // Chat
    ProjectMessage { project_id: String, message: String },
    PrivateMessage { receiver_id: String, message: String },

    // Presence
    ListOnline,
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected {
        socket_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
    },
    HeartbeatAck,
    Error { code: String, message: String },

    // Room Events
    LoadMessages(Vec<ChatMessage>),
    JoinedProject {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_size: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    LeftProject { project_id: String },

    // Chat
    ProjectMessage(ChatMessage),
    PrivateMessage {
        sender_id: String,
        sender_name: String,
        receiver_id: String,
        message: String,
        timestamp: String,
    },

    // AI lifecycle
    AiTyping { project_id: String },
    AiDone { project_id: String },

    // Presence
    OnlineUsers { user_ids: Vec<String> },
}

impl ServerMessage {
    pub fn join_failed(error: impl Into<String>) -> Self {
        ServerMessage::JoinedProject {
            success: false,
            project_id: None,
            room_size: None,
            error: Some(error.into()),
        }
    }
}

/// 방 기록에 저장되는 불변 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "message")]
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// 사용자 메시지. id 는 `{senderId}-{epochMillis}`
    pub fn from_user(project_id: &str, text: &str, sender: &Identity) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}-{}", sender.id, now.timestamp_millis()),
            project_id: project_id.to_string(),
            text: text.to_string(),
            sender_id: sender.id.clone(),
            sender_name: sender.display_name().to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// 어시스턴트 메시지. id 는 `ai-{epochMillis}`
    pub fn from_assistant(project_id: &str, text: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("ai-{}", now.timestamp_millis()),
            project_id: project_id.to_string(),
            text: text.to_string(),
            sender_id: AI_SENDER_ID.to_string(),
            sender_name: AI_SENDER_NAME.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// 현재 시각 (ISO 8601, 밀리초, UTC)
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
