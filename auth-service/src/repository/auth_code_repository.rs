//! # Authorization Code Repository
//!
//! Typed access to `oauth_authorization_codes` (§3, §4.5). `try_consume`
//! is the sole serialization point for one-time use: it locks the row with
//! `SELECT ... FOR UPDATE` before deciding whether this consumption is the
//! first (§9 Open Question: the DB row under lock is authoritative, never
//! a cache entry).

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::entities::{AuthorizationCode, NewAuthorizationCode};

const COLUMNS: &str = "id, code_hash, client_id, user_id, code_challenge, code_challenge_method, \
    redirect_uri, scope, state, expires_at, consumed, consumed_at, ip_address, user_agent, \
    issued_refresh_token_id, created_at";

pub async fn create(
    conn: &mut PgConnection,
    new: NewAuthorizationCode,
) -> Result<AuthorizationCode, ApiError> {
    let query = format!(
        "INSERT INTO oauth_authorization_codes \
         (id, code_hash, client_id, user_id, code_challenge, code_challenge_method, redirect_uri, \
          scope, state, expires_at, consumed, ip_address, user_agent, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, false, $11, $12, now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, AuthorizationCode>(&query)
        .bind(Uuid::new_v4())
        .bind(new.code_hash)
        .bind(new.client_id)
        .bind(new.user_id)
        .bind(new.code_challenge)
        .bind(new.code_challenge_method)
        .bind(new.redirect_uri)
        .bind(new.scope)
        .bind(new.state)
        .bind(new.expires_at)
        .bind(new.ip_address)
        .bind(new.user_agent)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Outcome of a consumption attempt. Distinguishing `AlreadyConsumed` from
/// `NotFound` lets the OAuth engine trigger chain-revocation replay defense
/// (§8) only when a genuine reuse happened, and carries the consumed row
/// (with its `issued_refresh_token_id`) so the engine can locate the chain
/// to revoke without a second query.
pub enum ConsumeOutcome {
    Consumed(AuthorizationCode),
    AlreadyConsumed(AuthorizationCode),
    Expired,
    NotFound,
}

pub async fn try_consume(
    conn: &mut PgConnection,
    code_hash: &str,
    now: DateTime<Utc>,
) -> Result<ConsumeOutcome, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_authorization_codes WHERE code_hash = $1 FOR UPDATE");
    let Some(code) = sqlx::query_as::<_, AuthorizationCode>(&query)
        .bind(code_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?
    else {
        return Ok(ConsumeOutcome::NotFound);
    };

    if code.consumed {
        return Ok(ConsumeOutcome::AlreadyConsumed(code));
    }
    if code.is_expired(now) {
        return Ok(ConsumeOutcome::Expired);
    }

    sqlx::query("UPDATE oauth_authorization_codes SET consumed = true, consumed_at = $2 WHERE id = $1")
        .bind(code.id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(ConsumeOutcome::Consumed(code))
}

/// Records which refresh token was issued for a successful consumption, so
/// a later replay can find the chain to revoke.
pub async fn set_issued_refresh_token(
    conn: &mut PgConnection,
    code_id: Uuid,
    refresh_token_id: Uuid,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE oauth_authorization_codes SET issued_refresh_token_id = $2 WHERE id = $1")
        .bind(code_id)
        .bind(refresh_token_id)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}
