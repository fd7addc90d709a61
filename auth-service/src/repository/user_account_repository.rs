//! # User Account Repository
//!
//! Typed access to `user_accounts` (§3, §4.9) - the canonical identity every
//! credential modality resolves to. This gateway is not the profile system of
//! record (§1 non-goals); `upsert` only ever writes the minimal identity
//! fields it needs itself.

use shared::errors::ApiError;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::entities::{UpsertUserAccount, UserAccount};

const COLUMNS: &str = "user_id, email, role, provider, raw_metadata, created_at, \
    last_sign_in_at, updated_at";

pub async fn find_by_id(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<UserAccount>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM user_accounts WHERE user_id = $1");
    sqlx::query_as::<_, UserAccount>(&query)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<UserAccount>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM user_accounts WHERE email = $1");
    sqlx::query_as::<_, UserAccount>(&query)
        .bind(email.to_lowercase())
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Upserts on `user_id`. `last_sign_in_at` is bumped to `now()` on every
/// call - this is invoked at the start of each successful authentication.
pub async fn upsert(conn: &mut PgConnection, record: UpsertUserAccount) -> Result<UserAccount, ApiError> {
    let query = format!(
        "INSERT INTO user_accounts \
         (user_id, email, role, provider, raw_metadata, created_at, last_sign_in_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, now(), now(), now()) \
         ON CONFLICT (user_id) DO UPDATE SET \
           email = EXCLUDED.email, \
           role = EXCLUDED.role, \
           provider = EXCLUDED.provider, \
           raw_metadata = EXCLUDED.raw_metadata, \
           last_sign_in_at = now(), \
           updated_at = now() \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, UserAccount>(&query)
        .bind(record.user_id)
        .bind(record.email.to_lowercase())
        .bind(record.role)
        .bind(record.provider)
        .bind(record.raw_metadata)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}
