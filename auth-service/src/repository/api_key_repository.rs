//! # API Key Repository
//!
//! Typed access to `api_keys` (§3, §4.7). Keys are looked up by hash only -
//! the prefix (`lano_` or a legacy prefix still inside its migration window)
//! is metadata for display and rotation, never part of the lookup key (§9
//! Design Note).

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::entities::{ApiKey, NewApiKey};

const COLUMNS: &str = "id, name, key_hash, user_id, access_level, permissions, expires_at, \
    last_used_at, is_active, created_at";

pub async fn create(conn: &mut PgConnection, new: NewApiKey) -> Result<ApiKey, ApiError> {
    let query = format!(
        "INSERT INTO api_keys \
         (id, name, key_hash, user_id, access_level, permissions, expires_at, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, true, now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, ApiKey>(&query)
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.key_hash)
        .bind(new.user_id)
        .bind(new.access_level)
        .bind(new.permissions)
        .bind(new.expires_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("api_keys_user_id_name_active_key") {
                    return ApiError::Conflict { resource: "api_key_name".to_string() };
                }
            }
            ApiError::DatabaseError(e)
        })
}

pub async fn find_by_hash(conn: &mut PgConnection, key_hash: &str) -> Result<Option<ApiKey>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM api_keys WHERE key_hash = $1");
    sqlx::query_as::<_, ApiKey>(&query)
        .bind(key_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<ApiKey>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM api_keys WHERE id = $1");
    sqlx::query_as::<_, ApiKey>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Lists all active keys for a user, newest first. `key_hash` is included
/// because `FromRow` maps the whole row - callers must never echo it back.
pub async fn list_active_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<ApiKey>, ApiError> {
    let query = format!(
        "SELECT {COLUMNS} FROM api_keys WHERE user_id = $1 AND is_active = true ORDER BY created_at DESC"
    );
    sqlx::query_as::<_, ApiKey>(&query)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Replaces a key's hash in place (rotation keeps `id`/`name`/grants stable,
/// only the secret and `last_used_at` reset).
pub async fn rotate(
    conn: &mut PgConnection,
    id: Uuid,
    new_key_hash: &str,
) -> Result<Option<ApiKey>, ApiError> {
    let query = format!(
        "UPDATE api_keys SET key_hash = $2, last_used_at = NULL \
         WHERE id = $1 AND is_active = true \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, ApiKey>(&query)
        .bind(id)
        .bind(new_key_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Soft-revokes a key so future validation attempts fail without losing the
/// row for audit purposes.
pub async fn revoke(conn: &mut PgConnection, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
    let result = sqlx::query(
        "UPDATE api_keys SET is_active = false WHERE id = $1 AND user_id = $2 AND is_active = true",
    )
    .bind(id)
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_last_used(conn: &mut PgConnection, id: Uuid, now: DateTime<Utc>) -> Result<(), ApiError> {
    sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}
