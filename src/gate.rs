//! 연결 게이트: 인증과 프로젝트 컨텍스트 해석
//!
//! 인증 실패만 연결을 거부한다. 프로젝트 해석 실패는 모두
//! "프로젝트 컨텍스트 없음" 으로 수용한다.

use crate::auth::{self, Identity};
use crate::error::ChatError;
use crate::projects::{is_valid_project_id, ProjectContext};
use crate::state::AppState;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::Deserialize;

/// WebSocket 연결 쿼리
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub token: Option<String>,
    pub project_id: Option<String>,
}

/// 게이트를 통과한 연결 정보
#[derive(Debug, Clone)]
pub struct GateSession {
    pub identity: Identity,
    pub project: Option<ProjectContext>,
}

/// Authorization 헤더 우선, 없으면 명시적 token 필드
pub fn extract_token(headers: &HeaderMap, explicit: Option<&str>) -> Option<String> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(value) = header {
        // "Bearer <jwt>" 또는 토큰만
        return value.split_whitespace().last().map(str::to_string);
    }

    explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// 새 연결 인증
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query: &ConnectQuery,
) -> Result<GateSession, ChatError> {
    let token = extract_token(headers, query.token.as_deref())
        .ok_or_else(|| ChatError::Unauthenticated("no token provided".to_string()))?;

    let (identity, _) = state.verifier.verify(&token)?;
    if auth::is_revoked(state.store.as_ref(), &token).await {
        return Err(ChatError::Unauthenticated("token revoked".to_string()));
    }

    let project_id = query
        .project_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let project = match project_id {
        None => {
            tracing::debug!(user_id = %identity.id, "No projectId provided");
            None
        }
        Some(id) if !is_valid_project_id(id) => {
            tracing::warn!(user_id = %identity.id, project_id = %id, "Invalid projectId, connecting unscoped");
            None
        }
        Some(id) => state.projects.resolve(id).await,
    };

    Ok(GateSession { identity, project })
}
