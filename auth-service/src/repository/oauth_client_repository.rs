//! # OAuth Client Repository
//!
//! Typed access to `oauth_clients` (§3). Clients are provisioned out of
//! band - `create` exists for seeding and admin tooling, not a public HTTP
//! endpoint (see [`crate::domain::entities::NewOAuthClient`]).

use shared::errors::ApiError;
use sqlx::PgConnection;

use crate::domain::entities::{ClientStatus, NewOAuthClient, OAuthClient};

const COLUMNS: &str = "client_id, client_type, application_type, require_pkce, \
    allowed_code_challenge_methods, allowed_redirect_uris, allowed_scopes, default_scopes, \
    status, created_at, updated_at";

/// Looks up a client by id. Comparison is case-insensitive per §3 -
/// `client_id` is always stored lowercased, so the caller's input is
/// lowercased before the query.
pub async fn find_by_id(conn: &mut PgConnection, client_id: &str) -> Result<Option<OAuthClient>, ApiError> {
    let query = format!("SELECT {COLUMNS} FROM oauth_clients WHERE client_id = $1");
    sqlx::query_as::<_, OAuthClient>(&query)
        .bind(client_id.to_lowercase())
        .fetch_optional(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Looks up an active client, returning `None` for disabled or unknown ids
/// so callers don't need a second status check.
pub async fn find_active_by_id(conn: &mut PgConnection, client_id: &str) -> Result<Option<OAuthClient>, ApiError> {
    Ok(find_by_id(conn, client_id).await?.filter(OAuthClient::is_active))
}

pub async fn create(conn: &mut PgConnection, new: NewOAuthClient) -> Result<OAuthClient, ApiError> {
    let query = format!(
        "INSERT INTO oauth_clients (client_id, client_type, application_type, require_pkce, \
         allowed_code_challenge_methods, allowed_redirect_uris, allowed_scopes, default_scopes, \
         status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, OAuthClient>(&query)
        .bind(new.client_id.to_lowercase())
        .bind(new.client_type)
        .bind(new.application_type)
        .bind(new.require_pkce)
        .bind(new.allowed_code_challenge_methods)
        .bind(new.allowed_redirect_uris)
        .bind(new.allowed_scopes)
        .bind(new.default_scopes)
        .bind(ClientStatus::Active)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("oauth_clients_pkey") {
                    return ApiError::Conflict { resource: "oauth_client".to_string() };
                }
            }
            ApiError::DatabaseError(e)
        })
}

/// Disables a client. Invalidates every cached `OAuthClient` entry for this
/// id in the tiered cache is the caller's responsibility (§4.4).
pub async fn disable(conn: &mut PgConnection, client_id: &str) -> Result<(), ApiError> {
    sqlx::query("UPDATE oauth_clients SET status = 'disabled', updated_at = now() WHERE client_id = $1")
        .bind(client_id.to_lowercase())
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}
