//! # Audit Log Repository
//!
//! Typed access to `audit_log` and `oauth_audit_log` (§3, §4.10). These are
//! human-facing trails distinct from the [`event_repository`] stream: events
//! feed the external projection system, audit rows back the gateway's own
//! "what happened to this credential" queries and are never replayed into
//! another system.
//!
//! [`event_repository`]: super::event_repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::errors::ApiError;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// A general authentication audit record (login, logout, session revoke).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub async fn append_audit_log(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    action: &str,
    success: bool,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    metadata: serde_json::Value,
) -> Result<AuditLogEntry, ApiError> {
    sqlx::query_as::<_, AuditLogEntry>(
        "INSERT INTO audit_log \
         (id, user_id, action, success, ip_address, user_agent, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
         RETURNING id, user_id, action, success, ip_address, user_agent, metadata, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(success)
    .bind(ip_address)
    .bind(user_agent)
    .bind(metadata)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)
}

/// An OAuth2-protocol-specific audit record (authorize/token/revoke/
/// introspect calls), kept separate from [`AuditLogEntry`] because it always
/// carries a `client_id` and never a bare `user_id`-only event.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OAuthAuditLogEntry {
    pub id: Uuid,
    pub client_id: String,
    pub user_id: Option<Uuid>,
    pub grant_type: Option<String>,
    pub action: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
pub async fn append_oauth_audit_log(
    conn: &mut PgConnection,
    client_id: &str,
    user_id: Option<Uuid>,
    grant_type: Option<&str>,
    action: &str,
    success: bool,
    error_code: Option<&str>,
    ip_address: Option<&str>,
) -> Result<OAuthAuditLogEntry, ApiError> {
    sqlx::query_as::<_, OAuthAuditLogEntry>(
        "INSERT INTO oauth_audit_log \
         (id, client_id, user_id, grant_type, action, success, error_code, ip_address, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now()) \
         RETURNING id, client_id, user_id, grant_type, action, success, error_code, ip_address, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(client_id.to_lowercase())
    .bind(user_id)
    .bind(grant_type)
    .bind(action)
    .bind(success)
    .bind(error_code)
    .bind(ip_address)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)
}
