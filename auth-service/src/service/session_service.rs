//! # Browser Session Engine
//!
//! Issues and validates the cookie-backed sessions described in §4.6: an
//! opaque session token plus an optional refresh counterpart, both stored
//! hashed. Cookie scoping (`domain=.<parent-domain>`, `SameSite=Lax`,
//! `HttpOnly`, `Secure`) is the HTTP layer's concern - this engine only
//! produces the plain token values and TTLs it needs to set.

use chrono::{Duration as ChronoDuration, Utc};
use shared::config::SessionConfig;
use shared::crypto;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{NewSession, Platform, Session};
use crate::domain::events::{EventPayload, NewEvent};
use crate::repository::session_repository;

use super::event_log;

pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub platform: Platform,
    pub client_id: Option<String>,
    pub scope: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub with_refresh: bool,
}

pub struct CreatedSession {
    pub session: Session,
    pub token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(pool: PgPool, config: SessionConfig) -> Self {
        Self { pool, config }
    }

    pub async fn create(&self, req: CreateSessionRequest) -> Result<CreatedSession, ApiError> {
        let now = Utc::now();
        let token = crypto::generate_long_token();
        let refresh_token = req.with_refresh.then(crypto::generate_long_token);

        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let session = session_repository::create(
            &mut tx,
            NewSession {
                user_id: req.user_id,
                platform: req.platform,
                token_hash: crypto::hash_secret(&token),
                refresh_token_hash: refresh_token.as_deref().map(crypto::hash_secret),
                client_id: req.client_id,
                scope: req.scope,
                ip_address: req.ip_address,
                user_agent: req.user_agent,
                expires_at: now + ChronoDuration::seconds(self.config.ttl_seconds),
                metadata: serde_json::json!({}),
            },
        )
        .await?;

        event_log::record(
            &mut tx,
            NewEvent::new(
                session.id,
                EventPayload::SessionCreated { session_id: session.id, user_id: session.user_id, platform: session.platform },
            ),
        )
        .await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        Ok(CreatedSession { session, token, refresh_token })
    }

    /// Looks up a live session by its presented cookie value and touches
    /// `last_used_at`. The touch is best-effort and outside the read
    /// transaction - a failed touch must never fail the lookup it rides
    /// along with.
    pub async fn validate(&self, token: &str) -> Result<Option<Session>, ApiError> {
        let now = Utc::now();
        let hash = crypto::hash_secret(token);
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;

        let Some(session) = session_repository::find_live_by_token_hash(&mut conn, &hash, now).await? else {
            return Ok(None);
        };

        if let Err(error) = session_repository::touch(&mut conn, session.id, now).await {
            tracing::warn!(session_id = %session.id, %error, "failed to touch session last_used_at");
        }

        Ok(Some(session))
    }

    pub async fn revoke(&self, token: &str) -> Result<bool, ApiError> {
        let hash = crypto::hash_secret(token);
        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let Some(session) = session_repository::revoke_by_token_hash(&mut tx, &hash).await? else {
            tx.commit().await.map_err(ApiError::DatabaseError)?;
            return Ok(false);
        };

        event_log::record(&mut tx, NewEvent::new(session.id, EventPayload::SessionRevoked { session_id: session.id })).await?;
        tx.commit().await.map_err(ApiError::DatabaseError)?;
        Ok(true)
    }

    /// Force-logout across every device (§4.6). No per-session event is
    /// emitted for the batch - see the repository's doc comment.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        session_repository::revoke_all_for_user(&mut conn, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_request_defaults_without_refresh() {
        let req = CreateSessionRequest {
            user_id: Uuid::new_v4(),
            platform: Platform::Web,
            client_id: None,
            scope: vec![],
            ip_address: None,
            user_agent: None,
            with_refresh: false,
        };
        assert!(!req.with_refresh);
    }
}
