//! # OAuth State Repository
//!
//! Typed access to `oauth_states` (§4.4, §4.9) - the L3 tier for CSRF
//! tokens, device codes, OTP states, and the UAI's durable fallback. This is
//! the tier the tiered cache's degradation contract falls all the way back
//! to: it must always succeed even when L1 and L2 are both down.

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgConnection;

use crate::domain::oauth_state::{NewOAuthStateRecord, OAuthStateRecord};

const COLUMNS: &str = "key, blob, expires_at, created_at";

/// Upserts a state blob. Re-writing an existing key (e.g. refreshing a
/// device code's expiry) replaces the blob and expiry wholesale.
pub async fn put(conn: &mut PgConnection, record: NewOAuthStateRecord) -> Result<OAuthStateRecord, ApiError> {
    let query = format!(
        "INSERT INTO oauth_states (key, blob, expires_at, created_at) \
         VALUES ($1, $2, $3, now()) \
         ON CONFLICT (key) DO UPDATE SET blob = EXCLUDED.blob, expires_at = EXCLUDED.expires_at \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, OAuthStateRecord>(&query)
        .bind(record.key)
        .bind(record.blob)
        .bind(record.expires_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Looks up a live record by key. An expired row is treated as absent -
/// callers don't need a second `is_expired` check on the happy path.
pub async fn get_live(
    conn: &mut PgConnection,
    key: &str,
    now: DateTime<Utc>,
) -> Result<Option<OAuthStateRecord>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_states WHERE key = $1 AND expires_at > $2");
    sqlx::query_as::<_, OAuthStateRecord>(&query)
        .bind(key)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Deletes a key outright (one-time artifacts like a consumed CSRF token).
pub async fn delete(conn: &mut PgConnection, key: &str) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM oauth_states WHERE key = $1")
        .bind(key)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}

/// Sweeps rows past expiry. Run periodically by a background task, not on
/// any request path.
pub async fn delete_expired(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<u64, ApiError> {
    let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= $1")
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(result.rows_affected())
}
