//! # Identity Resolution (Universal Auth Identifier)
//!
//! Normalizes any of the four credential modalities to the same canonical
//! identity (§3, §4.9). A resolution is cached behind
//! `uai:{method}:{safe_identifier}` in the tiered cache (§4.4); a cache hit
//! never touches the database, and `safe_identifier` is always derived from
//! a credential's hash - the raw secret is never used as, or embedded in, a
//! cache key.

use serde::{Deserialize, Serialize};
use shared::auth::jwt::JwtDecoder;
use shared::config::UaiConfig;
use shared::crypto;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::tiered::{CacheLayer, TieredCache};
use crate::domain::entities::UpsertUserAccount;
use crate::domain::events::{EventPayload, NewEvent};
use crate::repository::{api_key_repository, oauth_token_repository, session_repository, user_account_repository};

use super::event_log;

/// Which of the four credential modalities a resolution request presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    OauthBearer,
    SessionCookie,
    ApiKey,
    Jwt,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OauthBearer => "oauth_bearer",
            Self::SessionCookie => "session_cookie",
            Self::ApiKey => "api_key",
            Self::Jwt => "jwt",
        }
    }
}

/// The value held behind a UAI cache key (§3 `UAICacheEntry`, minus the
/// expiry bookkeeping the tiered cache already owns).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedIdentity {
    auth_id: Uuid,
    organization_id: Option<Uuid>,
    email: Option<String>,
    auth_method: AuthMethod,
    credential_id: Option<Uuid>,
}

/// A resolved identity, annotated with where it was served from.
pub struct UaiResult {
    pub auth_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub email: Option<String>,
    pub auth_method: AuthMethod,
    pub credential_id: Option<Uuid>,
    pub from_cache: bool,
    pub cache_layer: Option<CacheLayer>,
}

/// Length (in hex characters) of the cache-key identifier prefix - 128 bits
/// of a SHA-256 digest, ample collision resistance for a cache keyspace far
/// smaller than 2^64 live credentials, while never exposing the raw secret
/// or the full digest in a key a log line might capture.
const KEY_PREFIX_LEN: usize = 32;

fn cache_key(method: AuthMethod, credential: &str) -> String {
    let digest = crypto::hash_secret(credential);
    format!("uai:{}:{}", method.as_str(), &digest[..KEY_PREFIX_LEN])
}

#[derive(Clone)]
pub struct UaiService {
    pool: PgPool,
    cache: TieredCache,
    jwt: JwtDecoder,
    config: UaiConfig,
}

impl UaiService {
    pub fn new(pool: PgPool, cache: TieredCache, jwt: JwtDecoder, config: UaiConfig) -> Self {
        Self { pool, cache, jwt, config }
    }

    /// Resolves `credential` (presented via `method`) to a canonical
    /// identity, reading through the tiered cache and falling back to the
    /// authoritative store on miss (§4.9 steps 1-5).
    pub async fn resolve(&self, method: AuthMethod, credential: &str) -> Result<Option<UaiResult>, ApiError> {
        let key = cache_key(method, credential);

        let this = self.clone();
        let credential = credential.to_string();
        let loaded = self
            .cache
            .get_or_load(&key, move || async move { this.load_from_store(method, &credential).await })
            .await?;

        Ok(loaded.map(|(identity, layer)| UaiResult {
            auth_id: identity.auth_id,
            organization_id: identity.organization_id,
            email: identity.email,
            auth_method: identity.auth_method,
            credential_id: identity.credential_id,
            from_cache: layer != CacheLayer::L3,
            cache_layer: Some(layer),
        }))
    }

    /// Invalidates every cache tier for one credential. Callers must invoke
    /// this whenever an admin mutation revokes the identity behind it -
    /// disabling a user, revoking a key or token (§4.9 staleness contract).
    pub async fn invalidate(&self, method: AuthMethod, credential: &str) {
        self.cache.invalidate(&cache_key(method, credential)).await;
    }

    async fn load_from_store(&self, method: AuthMethod, credential: &str) -> Result<Option<CachedIdentity>, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        let now = chrono::Utc::now();

        match method {
            AuthMethod::OauthBearer => {
                let hash = crypto::hash_secret(credential);
                let Some(token) = oauth_token_repository::find_by_hash(&mut conn, &hash).await? else {
                    return Ok(None);
                };
                if !token.is_live(now) {
                    return Ok(None);
                }
                let account = user_account_repository::find_by_id(&mut conn, token.user_id).await?;
                Ok(Some(CachedIdentity {
                    auth_id: token.user_id,
                    organization_id: None,
                    email: account.map(|a| a.email),
                    auth_method: method,
                    credential_id: Some(token.id),
                }))
            }
            AuthMethod::SessionCookie => {
                let hash = crypto::hash_secret(credential);
                let Some(session) = session_repository::find_live_by_token_hash(&mut conn, &hash, now).await? else {
                    return Ok(None);
                };
                let account = user_account_repository::find_by_id(&mut conn, session.user_id).await?;
                Ok(Some(CachedIdentity {
                    auth_id: session.user_id,
                    organization_id: None,
                    email: account.map(|a| a.email),
                    auth_method: method,
                    credential_id: Some(session.id),
                }))
            }
            AuthMethod::ApiKey => {
                let hash = crypto::hash_secret(credential);
                let Some(key) = api_key_repository::find_by_hash(&mut conn, &hash).await? else {
                    return Ok(None);
                };
                if !key.is_valid(now) {
                    return Ok(None);
                }
                let account = user_account_repository::find_by_id(&mut conn, key.user_id).await?;
                Ok(Some(CachedIdentity {
                    auth_id: key.user_id,
                    organization_id: None,
                    email: account.map(|a| a.email),
                    auth_method: method,
                    credential_id: Some(key.id),
                }))
            }
            AuthMethod::Jwt => {
                let claims = self.jwt.decode(credential)?;
                let user_id = claims.sub.parse::<Uuid>().map_err(|_| ApiError::InvalidToken)?;

                let account = user_account_repository::find_by_id(&mut conn, user_id).await?;
                let account = match account {
                    Some(account) => Some(account),
                    None if self.config.create_if_missing => {
                        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;
                        let upserted = user_account_repository::upsert(
                            &mut tx,
                            UpsertUserAccount {
                                user_id,
                                email: claims.email.clone().unwrap_or_else(|| format!("{user_id}@unknown")),
                                role: "member".to_string(),
                                provider: claims.iss.clone(),
                                raw_metadata: serde_json::json!({}),
                            },
                        )
                        .await?;
                        event_log::record(
                            &mut tx,
                            NewEvent::new(
                                upserted.user_id,
                                EventPayload::UserUpserted { user_id: upserted.user_id, email: upserted.email.clone() },
                            ),
                        )
                        .await?;
                        tx.commit().await.map_err(ApiError::DatabaseError)?;
                        Some(upserted)
                    }
                    None => None,
                };

                let Some(account) = account else {
                    return Ok(None);
                };

                Ok(Some(CachedIdentity {
                    auth_id: account.user_id,
                    organization_id: None,
                    email: Some(account.email),
                    auth_method: method,
                    credential_id: None,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_strings() {
        assert_eq!(AuthMethod::OauthBearer.as_str(), "oauth_bearer");
        assert_eq!(AuthMethod::ApiKey.as_str(), "api_key");
    }

    #[test]
    fn cache_key_never_contains_the_raw_credential() {
        let key = cache_key(AuthMethod::ApiKey, "lano_super-secret-value");
        assert!(!key.contains("super-secret-value"));
        assert!(key.starts_with("uai:api_key:"));
    }

    #[test]
    fn cache_key_is_stable_for_the_same_credential() {
        let a = cache_key(AuthMethod::SessionCookie, "tok-123");
        let b = cache_key(AuthMethod::SessionCookie, "tok-123");
        assert_eq!(a, b);
    }
}
