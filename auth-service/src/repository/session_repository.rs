//! # Session Repository
//!
//! Typed access to `sessions` (§3, §4.6): browser/first-party session
//! issuance, lookup by hash, last-used touch, and revocation.

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::entities::{NewSession, Session};

const COLUMNS: &str = "id, user_id, platform, token_hash, refresh_token_hash, client_id, scope, \
    ip_address, user_agent, expires_at, last_used_at, metadata, created_at";

pub async fn create(conn: &mut PgConnection, new: NewSession) -> Result<Session, ApiError> {
    let query = format!(
        "INSERT INTO sessions \
         (id, user_id, platform, token_hash, refresh_token_hash, client_id, scope, ip_address, \
          user_agent, expires_at, last_used_at, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), $11, now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, Session>(&query)
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.platform)
        .bind(new.token_hash)
        .bind(new.refresh_token_hash)
        .bind(new.client_id)
        .bind(new.scope)
        .bind(new.ip_address)
        .bind(new.user_agent)
        .bind(new.expires_at)
        .bind(new.metadata)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Looks up a live session by its opaque token's hash. Expired rows are
/// treated as absent rather than returned for the caller to check.
pub async fn find_live_by_token_hash(
    conn: &mut PgConnection,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM sessions WHERE token_hash = $1 AND expires_at > $2");
    sqlx::query_as::<_, Session>(&query)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Updates `last_used_at` only. Non-transactional best-effort touch (§4.6).
pub async fn touch(conn: &mut PgConnection, id: Uuid, now: DateTime<Utc>) -> Result<(), ApiError> {
    sqlx::query("UPDATE sessions SET last_used_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}

/// Revokes a session by its token hash, returning the deleted row (if any)
/// so the caller can emit `SessionRevoked` with the right `session_id`.
pub async fn revoke_by_token_hash(
    conn: &mut PgConnection,
    token_hash: &str,
) -> Result<Option<Session>, ApiError> {
    let query = format!("DELETE FROM sessions WHERE token_hash = $1 RETURNING {COLUMNS}");
    sqlx::query_as::<_, Session>(&query)
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Bulk-revokes every session for a user (force logout-all). No per-session
/// event is emitted per §4.6 - a single `SessionRevoked`-class audit entry
/// at the service layer covers the whole batch.
pub async fn revoke_all_for_user(conn: &mut PgConnection, user_id: Uuid) -> Result<u64, ApiError> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(result.rows_affected())
}
