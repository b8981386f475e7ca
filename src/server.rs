//! HTTP 라우터와 WebSocket 연결 루프

use crate::auth;
use crate::error::ChatError;
use crate::gate::{self, ConnectQuery};
use crate::handlers;
use crate::protocol::{now_iso, ClientMessage, ServerMessage};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, HeaderValue, Request},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

/// 애플리케이션 라우터
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/auth/logout", post(logout_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(cors),
        )
        .with_state(state)
}

/// 요청 span. 쿼리에 토큰이 실리므로 경로만 남긴다
fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path()
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>ProjectRoom Chat Server</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "projectroom-server",
        "store": state.store.backend(),
        "connections": state.peers.len(),
        "rooms": state.rooms.len(),
        "timestamp": now_iso(),
    }))
}

/// 토큰 폐기 (로그아웃)
async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ChatError> {
    let token = gate::extract_token(&headers, None)
        .ok_or_else(|| ChatError::Unauthenticated("no token provided".to_string()))?;
    let (identity, claims) = state.verifier.verify(&token)?;
    auth::revoke(state.store.as_ref(), &token, &claims).await?;

    tracing::info!(user_id = %identity.id, "Token revoked");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// 업그레이드 전에 게이트를 통과해야 한다
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Response {
    match gate::authenticate(&state, &headers, &query).await {
        Ok(session) => ws.on_upgrade(move |socket| handle_socket(socket, state, session)),
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "Connection refused");
            e.into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session: gate::GateSession) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let peer_id = handlers::handle_connection(state.clone(), session, tx.clone()).await;

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode server message"),
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &peer_id, &tx, msg).await,
                Err(e) => {
                    tracing::debug!(peer_id = %peer_id, error = %e, "Ignoring unparseable client message");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(state, &peer_id).await;
    send_task.abort();
}

async fn handle_client_message(
    state: &Arc<AppState>,
    peer_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::JoinProject { project_id } => {
            handlers::handle_join_project(state.clone(), peer_id, &project_id).await;
        }
        ClientMessage::LeaveProject { project_id } => {
            handlers::handle_leave_project(state.clone(), peer_id, &project_id).await;
        }
        ClientMessage::ProjectMessage {
            project_id,
            message,
        } => {
            handlers::handle_project_message(state.clone(), peer_id, &project_id, &message).await;
        }
        ClientMessage::PrivateMessage {
            receiver_id,
            message,
        } => {
            handlers::handle_private_message(state.clone(), peer_id, &receiver_id, &message).await;
        }
        ClientMessage::ListOnline => {
            handlers::handle_list_online(state.clone(), sender).await;
        }
    }
}
