//! 토큰 검증 (HS256 JWT)

use crate::error::ChatError;
use crate::store::CacheStore;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT claims. 발급 측은 `{ id, email, exp }` 를 서명한다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// 연결에 붙는 호출자 신원
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl Identity {
    /// 메시지에 표시되는 이름
    pub fn display_name(&self) -> &str {
        &self.email
    }
}

/// 공유 비밀키 기반 토큰 검증기. 상태가 없다
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// 만료, 형식 오류, 서명 불일치는 모두 `Unauthenticated`
    pub fn verify(&self, token: &str) -> Result<(Identity, Claims), ChatError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| ChatError::Unauthenticated(e.to_string()))?;
        let claims = data.claims;
        if claims.id.is_empty() {
            return Err(ChatError::Unauthenticated("token has no subject id".to_string()));
        }
        let identity = Identity {
            id: claims.id.clone(),
            email: claims.email.clone(),
        };
        Ok((identity, claims))
    }
}

fn revocation_key(token: &str) -> String {
    format!("blacklist:{}", token)
}

/// 폐기된 토큰인지 확인. 저장소 장애는 폐기되지 않은 것으로 본다
pub async fn is_revoked(store: &dyn CacheStore, token: &str) -> bool {
    match store.get(&revocation_key(token)).await {
        Ok(value) => value.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, "Revocation check skipped, cache unavailable");
            false
        }
    }
}

/// 토큰을 남은 수명 동안 폐기한다
pub async fn revoke(store: &dyn CacheStore, token: &str, claims: &Claims) -> Result<(), ChatError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let remaining = claims.exp.saturating_sub(now).max(1);
    store
        .set_ex(&revocation_key(token), "1", remaining)
        .await?;
    Ok(())
}
