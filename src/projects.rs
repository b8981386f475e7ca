//! 프로젝트 컨텍스트 조회 (캐시 → 원본 저장소)
//!
//! 프로젝트 CRUD 는 외부 서비스의 몫이다. 여기서는 id 로 조회만 하고,
//! 결과를 캐시 저장소에 `project:{id}` 로 잠시 보관한다.

use crate::store::CacheStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 캐시된 프로젝트 메타데이터 투영
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "users")]
    pub member_ids: Vec<String>,
}

impl ProjectContext {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Error)]
pub enum ProjectSourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// 프로젝트 원본 저장소
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ProjectContext>, ProjectSourceError>;
}

/// 문서 저장소 object id 형식 (16진수 24자)
pub fn is_valid_project_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// 고정 목록 기반 원본 (파일 또는 테스트)
#[derive(Default)]
pub struct StaticProjectSource {
    projects: HashMap<String, ProjectContext>,
}

impl StaticProjectSource {
    pub fn new(projects: impl IntoIterator<Item = ProjectContext>) -> Self {
        Self {
            projects: projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// `[ProjectContext]` JSON 파일 로드
    pub async fn from_file(path: &Path) -> Result<Self, ProjectSourceError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let projects: Vec<ProjectContext> = serde_json::from_str(&raw)?;
        Ok(Self::new(projects))
    }
}

#[async_trait]
impl ProjectSource for StaticProjectSource {
    async fn find_by_id(&self, id: &str) -> Result<Option<ProjectContext>, ProjectSourceError> {
        Ok(self.projects.get(id).cloned())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectEnvelope {
    Wrapped { project: ProjectContext },
    Bare(ProjectContext),
}

/// 프로젝트 서비스 HTTP 원본: `GET {base}/projects/{id}`
pub struct HttpProjectSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProjectSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProjectSourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProjectSource for HttpProjectSource {
    async fn find_by_id(&self, id: &str) -> Result<Option<ProjectContext>, ProjectSourceError> {
        let url = format!("{}/projects/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProjectSourceError::Status(status.as_u16()));
        }
        let project = match response.json::<ProjectEnvelope>().await? {
            ProjectEnvelope::Wrapped { project } => project,
            ProjectEnvelope::Bare(project) => project,
        };
        Ok(Some(project))
    }
}

/// 2단 조회: 캐시 → 원본 → 캐시 채우기 (best-effort)
pub struct ProjectResolver {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn ProjectSource>,
    ttl_secs: u64,
}

impl ProjectResolver {
    pub fn new(store: Arc<dyn CacheStore>, source: Arc<dyn ProjectSource>, ttl_secs: u64) -> Self {
        Self {
            store,
            source,
            ttl_secs,
        }
    }

    fn cache_key(id: &str) -> String {
        format!("project:{}", id)
    }

    /// 모든 실패는 None 으로 내려간다
    pub async fn resolve(&self, id: &str) -> Option<ProjectContext> {
        if let Some(project) = self.try_cache(id).await {
            tracing::debug!(project_id = %id, "Project loaded from cache");
            return Some(project);
        }

        let project = self.fetch_source(id).await?;
        self.populate_cache(&project);
        Some(project)
    }

    async fn try_cache(&self, id: &str) -> Option<ProjectContext> {
        let raw = match self.store.get(&Self::cache_key(id)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Project cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(project) => Some(project),
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Discarding undecodable cached project");
                None
            }
        }
    }

    async fn fetch_source(&self, id: &str) -> Option<ProjectContext> {
        match self.source.find_by_id(id).await {
            Ok(Some(project)) => Some(project),
            Ok(None) => {
                tracing::warn!(project_id = %id, "Project not found in source");
                None
            }
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Project source lookup failed");
                None
            }
        }
    }

    /// 백그라운드로 캐시에 기록. 실패는 로그만 남긴다
    fn populate_cache(&self, project: &ProjectContext) {
        let payload = match serde_json::to_string(project) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(project_id = %project.id, error = %e, "Project encode failed");
                return;
            }
        };
        let store = self.store.clone();
        let key = Self::cache_key(&project.id);
        let ttl = self.ttl_secs;
        tokio::spawn(async move {
            match store.set_ex(&key, &payload, ttl).await {
                Ok(()) => tracing::debug!(key = %key, "Project cached"),
                Err(e) => tracing::warn!(key = %key, error = %e, "Project cache write failed"),
            }
        });
    }
}
