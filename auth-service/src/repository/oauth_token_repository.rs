//! # OAuth Token Repository
//!
//! Typed access to `oauth_tokens` (§3, §4.5). Tokens form a directed tree
//! keyed by `parent_token_id`; [`revoke_subtree`] walks it breadth-first,
//! issuing one `UPDATE ... WHERE parent_token_id = ANY($1)` per level, per
//! the §9 Design Note (no recursive CTE - there's no true cycle, just a
//! bounded-depth tree).

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::entities::{NewOAuthToken, OAuthToken, RevokedReason};

const COLUMNS: &str = "id, token_hash, token_type, client_id, user_id, scope, expires_at, \
    revoked, revoked_at, revoked_reason, parent_token_id, created_at";

pub async fn create(conn: &mut PgConnection, new: NewOAuthToken) -> Result<OAuthToken, ApiError> {
    let query = format!(
        "INSERT INTO oauth_tokens \
         (id, token_hash, token_type, client_id, user_id, scope, expires_at, revoked, \
          parent_token_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8, now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, OAuthToken>(&query)
        .bind(Uuid::new_v4())
        .bind(new.token_hash)
        .bind(new.token_type)
        .bind(new.client_id)
        .bind(new.user_id)
        .bind(new.scope)
        .bind(new.expires_at)
        .bind(new.parent_token_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

pub async fn find_by_hash(conn: &mut PgConnection, token_hash: &str) -> Result<Option<OAuthToken>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_tokens WHERE token_hash = $1");
    sqlx::query_as::<_, OAuthToken>(&query)
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<OAuthToken>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_tokens WHERE id = $1");
    sqlx::query_as::<_, OAuthToken>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Revokes exactly one token. Does not touch children - use
/// [`revoke_subtree`] when the whole chain must go.
pub async fn revoke_one(
    conn: &mut PgConnection,
    id: Uuid,
    reason: RevokedReason,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE oauth_tokens SET revoked = true, revoked_at = $2, revoked_reason = $3 \
         WHERE id = $1 AND revoked = false",
    )
    .bind(id)
    .bind(now)
    .bind(reason)
    .execute(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;
    Ok(())
}

/// Revokes `root` and every live descendant reachable through
/// `parent_token_id`, level by level. Returns the ids actually revoked
/// (excludes nodes already revoked before this call).
pub async fn revoke_subtree(
    conn: &mut PgConnection,
    root: Uuid,
    reason: RevokedReason,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, ApiError> {
    let mut revoked_ids = Vec::new();
    let mut frontier = vec![root];

    while !frontier.is_empty() {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE oauth_tokens SET revoked = true, revoked_at = $2, revoked_reason = $3 \
             WHERE id = ANY($1) AND revoked = false \
             RETURNING id",
        )
        .bind(&frontier)
        .bind(now)
        .bind(reason)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;

        let newly_revoked: Vec<Uuid> = rows.into_iter().map(|(id,)| id).collect();
        if newly_revoked.is_empty() {
            break;
        }
        revoked_ids.extend(newly_revoked.iter().copied());

        let children: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM oauth_tokens WHERE parent_token_id = ANY($1) AND revoked = false",
        )
        .bind(&newly_revoked)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;

        frontier = children.into_iter().map(|(id,)| id).collect();
    }

    Ok(revoked_ids)
}

/// Live (non-revoked) direct children of `parent_id`.
pub async fn find_live_children(conn: &mut PgConnection, parent_id: Uuid) -> Result<Vec<OAuthToken>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_tokens WHERE parent_token_id = $1 AND revoked = false");
    sqlx::query_as::<_, OAuthToken>(&query)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Revokes every live descendant of `root` - never `root` itself. Used when
/// `root` was already revoked by a prior statement in the same call (rotation
/// revokes the old refresh token directly, then needs only its descendants
/// brought down with a different `reason`) or was already revoked before this
/// call began (replay defense against a reused, already-rotated token).
pub async fn revoke_descendants(
    conn: &mut PgConnection,
    root: Uuid,
    reason: RevokedReason,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, ApiError> {
    let children = find_live_children(conn, root).await?;
    let mut frontier: Vec<Uuid> = children.into_iter().map(|c| c.id).collect();
    let mut revoked_ids = Vec::new();

    while !frontier.is_empty() {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE oauth_tokens SET revoked = true, revoked_at = $2, revoked_reason = $3 \
             WHERE id = ANY($1) AND revoked = false \
             RETURNING id",
        )
        .bind(&frontier)
        .bind(now)
        .bind(reason)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;

        let newly_revoked: Vec<Uuid> = rows.into_iter().map(|(id,)| id).collect();
        if newly_revoked.is_empty() {
            break;
        }
        revoked_ids.extend(newly_revoked.iter().copied());

        let next: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM oauth_tokens WHERE parent_token_id = ANY($1) AND revoked = false",
        )
        .bind(&newly_revoked)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;

        frontier = next.into_iter().map(|(id,)| id).collect();
    }

    Ok(revoked_ids)
}
