//! 환경 변수 기반 설정 관리

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub room: RoomConfig,
    pub ai: AiConfig,
    pub projects: ProjectSourceConfig,
    pub log_level: String,
}

/// 인증 설정
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// 캐시 저장소 설정
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// None 이면 프로세스 내 메모리 저장소 사용
    pub redis_url: Option<String>,
    pub project_ttl_secs: u64,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub message_limit: usize,
    pub join_history: usize,
    pub enforce_membership: bool,
}

/// AI 설정
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub system_instruction: Option<String>,
    pub cache_ttl_secs: u64,
    pub lock_ttl_secs: u64,
}

/// 프로젝트 원본 저장소 설정
#[derive(Debug, Clone)]
pub struct ProjectSourceConfig {
    pub url: Option<String>,
    pub file: Option<PathBuf>,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_var("PORT", 8000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            },
            cache: CacheConfig {
                redis_url: optional_var("REDIS_URL"),
                project_ttl_secs: parse_var("PROJECT_CACHE_TTL", 300),
            },
            room: RoomConfig {
                message_limit: parse_var("MESSAGE_LIMIT", 100),
                join_history: parse_var("JOIN_HISTORY", 50),
                enforce_membership: env::var("ENFORCE_MEMBERSHIP")
                    .map(|v| v == "true")
                    .unwrap_or(false),
            },
            ai: AiConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
                base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/".to_string()),
                timeout: Duration::from_secs(parse_var("GEMINI_TIMEOUT_SECS", 30)),
                system_instruction: optional_var("AI_SYSTEM_INSTRUCTION"),
                cache_ttl_secs: parse_var("AI_CACHE_TTL", 3600),
                lock_ttl_secs: parse_var("AI_LOCK_TTL", 15),
            },
            projects: ProjectSourceConfig {
                url: optional_var("PROJECT_SOURCE_URL"),
                file: optional_var("PROJECTS_FILE").map(PathBuf::from),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// 테스트 및 로컬 실행용 기본값
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_origins: vec!["*".to_string()],
            auth: AuthConfig {
                jwt_secret: secret.into(),
            },
            cache: CacheConfig {
                redis_url: None,
                project_ttl_secs: 300,
            },
            room: RoomConfig {
                message_limit: 100,
                join_history: 50,
                enforce_membership: false,
            },
            ai: AiConfig {
                api_key: String::new(),
                model: "gemini-2.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/".to_string(),
                timeout: Duration::from_secs(30),
                system_instruction: None,
                cache_ttl_secs: 3600,
                lock_ttl_secs: 15,
            },
            projects: ProjectSourceConfig {
                url: None,
                file: None,
            },
            log_level: "debug".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
