//! 에러 타입

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// 캐시 저장소 에러
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("wrong value type at key {0}")]
    WrongType(String),
}

/// 채팅 처리 에러
///
/// `Unauthenticated` 만 연결을 종료시킨다. 나머지는 해당 작업에 한정된다.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("authentication error: {0}")]
    Unauthenticated(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("cache unavailable")]
    CacheUnavailable(#[from] StoreError),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated(_) => "UNAUTHENTICATED",
            ChatError::InvalidInput(_) => "INVALID_INPUT",
            ChatError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ChatError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match self {
            ChatError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::UpstreamUnavailable(_) | ChatError::CacheUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        // 인증 실패 사유는 로그에만 남긴다
        let body = serde_json::json!({
            "code": self.code(),
            "message": match &self {
                ChatError::Unauthenticated(_) => "Authentication Error".to_string(),
                other => other.to_string(),
            },
        });
        (status, axum::Json(body)).into_response()
    }
}
