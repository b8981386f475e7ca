//! ProjectRoom 채팅 서버 실행 파일

use anyhow::{bail, Context};
use projectroom::ai::{GeminiClient, TextGenerator};
use projectroom::config::Config;
use projectroom::projects::{HttpProjectSource, ProjectSource, StaticProjectSource};
use projectroom::server;
use projectroom::state::AppState;
use projectroom::store::{CacheStore, MemoryStore, RedisStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화 (RUST_LOG 우선)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.auth.jwt_secret.is_empty() {
        bail!("JWT_SECRET must be set");
    }

    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .context("failed to connect to redis")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using in-process memory store (single instance only)");
            Arc::new(MemoryStore::new())
        }
    };

    let project_source: Arc<dyn ProjectSource> = match (&config.projects.url, &config.projects.file) {
        (Some(url), _) => Arc::new(
            HttpProjectSource::new(url, config.ai.timeout).context("invalid PROJECT_SOURCE_URL")?,
        ),
        (None, Some(path)) => Arc::new(
            StaticProjectSource::from_file(path)
                .await
                .with_context(|| format!("failed to load projects from {}", path.display()))?,
        ),
        (None, None) => {
            tracing::warn!("No project source configured, every connection will be unscoped");
            Arc::new(StaticProjectSource::default())
        }
    };

    if config.ai.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, AI requests will fail");
    }
    let generator: Arc<dyn TextGenerator> =
        Arc::new(GeminiClient::new(&config.ai).context("failed to build Gemini client")?);

    let addr = format!("{}:{}", config.host, config.port);
    let store_backend = store.backend();
    let state = Arc::new(AppState::new(config, store, project_source, generator));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("🚀 ProjectRoom chat server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("Store: {}", store_backend);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
