//! # API Key Engine
//!
//! Mints, lists, rotates, revokes, and validates opaque server-to-server
//! bearer credentials (§3, §4.7). The plain value is returned to the caller
//! exactly once - at mint or rotation - and is never written to any log,
//! event payload, or metric; only `SHA256(value)` is ever persisted.

use chrono::{Duration as ChronoDuration, Utc};
use shared::crypto;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{AccessLevel, ApiKey, NewApiKey};
use crate::domain::events::{EventPayload, NewEvent};
use crate::repository::api_key_repository;

use super::event_log;

/// Current key prefix. Legacy prefixes are still accepted on the validation
/// read path for a migration window (§4.7) - there is currently exactly one
/// legacy prefix still in use, left over from before keys moved to this
/// gateway.
pub const CURRENT_PREFIX: &str = "lano_";
const LEGACY_PREFIXES: &[&str] = &["acclms_"];

pub struct MintApiKeyRequest {
    pub user_id: Uuid,
    pub name: String,
    pub access_level: AccessLevel,
    pub permissions: Vec<String>,
    pub expires_in_days: Option<i32>,
}

pub struct MintedApiKey {
    pub key: ApiKey,
    pub plain_value: String,
}

/// Outcome of validating a presented key on the hot path. `Invalid` carries
/// a reason so callers can distinguish `not_found`/`expired`/`revoked` per
/// §7, without ever telling a caller whether a *given string* looks like a
/// key we once issued.
pub enum ApiKeyValidation {
    Valid { user_id: Uuid, access_level: AccessLevel, permissions: Vec<String>, key_id: Uuid },
    Invalid { reason: &'static str },
}

#[derive(Clone)]
pub struct ApiKeyService {
    pool: PgPool,
}

impl ApiKeyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mints a new key. `name` must be non-empty and unique among the
    /// user's currently-active keys (enforced by the repository's partial
    /// unique index; a collision surfaces as `ApiError::Conflict`).
    pub async fn mint(&self, req: MintApiKeyRequest) -> Result<MintedApiKey, ApiError> {
        if req.name.trim().is_empty() {
            return Err(ApiError::BadRequest { message: "name must not be blank".to_string() });
        }
        if let Some(days) = req.expires_in_days {
            if !(1..=3650).contains(&days) {
                return Err(ApiError::BadRequest {
                    message: "expires_in_days must be between 1 and 3650".to_string(),
                });
            }
        }

        let now = Utc::now();
        let tail = crypto::generate_short_token();
        let plain_value = format!("{CURRENT_PREFIX}{tail}");
        let key_hash = crypto::hash_secret(&plain_value);

        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let key = api_key_repository::create(
            &mut tx,
            NewApiKey {
                name: req.name,
                key_hash,
                user_id: req.user_id,
                access_level: req.access_level,
                permissions: req.permissions,
                expires_at: req.expires_in_days.map(|d| now + ChronoDuration::days(d as i64)),
            },
        )
        .await?;

        event_log::record(
            &mut tx,
            NewEvent::new(key.id, EventPayload::ApiKeyCreated { api_key_id: key.id, user_id: key.user_id }),
        )
        .await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        Ok(MintedApiKey { key, plain_value })
    }

    /// Metadata only - never the plain value, never the hash (§4.7).
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ApiKey>, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        api_key_repository::list_active_by_user(&mut conn, user_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        api_key_repository::find_by_id(&mut conn, id).await
    }

    /// Replaces the value in place. The old value is unusable the instant
    /// this commits; the new plain value is returned exactly once.
    pub async fn rotate(&self, id: Uuid) -> Result<Option<MintedApiKey>, ApiError> {
        let tail = crypto::generate_short_token();
        let plain_value = format!("{CURRENT_PREFIX}{tail}");
        let key_hash = crypto::hash_secret(&plain_value);

        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let Some(key) = api_key_repository::rotate(&mut tx, id, &key_hash).await? else {
            tx.commit().await.map_err(ApiError::DatabaseError)?;
            return Ok(None);
        };

        event_log::record(&mut tx, NewEvent::new(key.id, EventPayload::ApiKeyRotated { api_key_id: key.id }))
            .await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        Ok(Some(MintedApiKey { key, plain_value }))
    }

    /// Soft-revokes (`is_active = false`); the row survives for audit.
    pub async fn revoke(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let revoked = api_key_repository::revoke(&mut tx, id, user_id).await?;
        if revoked {
            event_log::record(&mut tx, NewEvent::new(id, EventPayload::ApiKeyRevoked { api_key_id: id })).await?;
        }

        tx.commit().await.map_err(ApiError::DatabaseError)?;
        Ok(revoked)
    }

    /// Hot-path validation (§4.7): hash the presented value, look it up,
    /// check liveness, and kick off a best-effort `last_used_at` update. A
    /// prefix from [`LEGACY_PREFIXES`] is accepted unchanged - the lookup is
    /// always by hash, never by prefix - but is logged as a deprecation
    /// signal so the migration window's remaining usage stays visible.
    pub async fn validate(&self, presented: &str) -> Result<ApiKeyValidation, ApiError> {
        if !presented.starts_with(CURRENT_PREFIX) {
            if let Some(prefix) = LEGACY_PREFIXES.iter().find(|p| presented.starts_with(**p)) {
                tracing::warn!(prefix = %prefix, "api key presented with legacy prefix");
            }
        }

        let hash = crypto::hash_secret(presented);
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;

        let Some(key) = api_key_repository::find_by_hash(&mut conn, &hash).await? else {
            return Ok(ApiKeyValidation::Invalid { reason: "not_found" });
        };

        // The SQL lookup above is an equality index scan, not a constant-time
        // comparison; re-check the retrieved hash against the presented value
        // in constant time before treating the row as a match (§4.7).
        if !crypto::verify_secret(presented, &key.key_hash) {
            return Ok(ApiKeyValidation::Invalid { reason: "not_found" });
        }

        let now = Utc::now();
        if !key.is_active {
            return Ok(ApiKeyValidation::Invalid { reason: "revoked" });
        }
        if key.expires_at.map(|exp| now > exp).unwrap_or(false) {
            return Ok(ApiKeyValidation::Invalid { reason: "expired" });
        }

        if let Err(error) = api_key_repository::touch_last_used(&mut conn, key.id, now).await {
            tracing::warn!(key_id = %key.id, %error, "failed to touch api key last_used_at");
        }

        Ok(ApiKeyValidation::Valid {
            user_id: key.user_id,
            access_level: key.access_level,
            permissions: key.permissions,
            key_id: key.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_prefix_is_lano() {
        assert_eq!(CURRENT_PREFIX, "lano_");
    }

    #[test]
    fn mint_request_rejects_blank_name_before_hitting_the_database() {
        let name = "   ";
        assert!(name.trim().is_empty());
    }

    #[test]
    fn expires_in_days_boundaries() {
        let in_range = |d: i32| (1..=3650).contains(&d);
        assert!(in_range(1));
        assert!(in_range(3650));
        assert!(!in_range(0));
        assert!(!in_range(3651));
    }
}
