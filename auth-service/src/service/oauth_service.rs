//! # OAuth2/PKCE Engine
//!
//! Implements the authorization-code-plus-PKCE grant end to end (§4.5):
//! `authorize` issues a one-time code, `exchange_authorization_code` consumes
//! it under row lock and mints the first access/refresh pair, `refresh`
//! rotates that pair with replay defense, and `revoke`/`introspect` back the
//! RFC 6749-shaped HTTP surface.
//!
//! Every state transition that matters downstream - a token issued, a code
//! replayed, a chain revoked - is recorded via [`event_log::record`] in the
//! same transaction as the row mutation that caused it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use shared::config::OAuthConfig;
use shared::crypto::{self, CodeChallengeMethod};
use shared::errors::{ApiError, OAuthErrorCode};
use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::tiered::TieredCache;
use crate::domain::entities::{NewOAuthToken, OAuthClient, RevokedReason, TokenType};
use crate::domain::events::{EventPayload, NewEvent};
use crate::domain::oauth_state::{NewOAuthStateRecord, StateNamespace};
use crate::repository::{
    auth_code_repository::{self, ConsumeOutcome},
    oauth_client_repository, oauth_state_repository, oauth_token_repository,
};

use super::event_log;

/// Non-authoritative existence hint for an outstanding authorization code,
/// cached behind the `oauth_states` L3 tier (§4.4, §9 Open Question:
/// "auth-code cache-vs-DB authority"). Never consulted to decide whether a
/// code can be consumed - the `FOR UPDATE` row in `authorization_codes`
/// stays the only serialization point - but it lets `exchange_authorization_code`
/// short-circuit the common "never heard of this code" case without a
/// database round trip even if L1/L2 are both cold.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthCodeHint {
    client_id: String,
    user_id: Uuid,
}

/// Everything `authorize` needs that the HTTP layer has already
/// authenticated (the caller is responsible for knowing `user_id` - this
/// engine never performs the end-user login step itself, §1 non-goals).
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AuthorizeResult {
    pub redirect_uri: String,
    pub code: String,
    pub state: String,
}

pub struct TokenResult {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

pub struct IntrospectResult {
    pub active: bool,
    pub client_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub scope: Option<String>,
    pub token_type: Option<TokenType>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
}

#[derive(Clone)]
pub struct OAuthService {
    pool: PgPool,
    config: OAuthConfig,
    state_cache: TieredCache,
}

impl OAuthService {
    pub fn new(pool: PgPool, config: OAuthConfig, state_cache: TieredCache) -> Self {
        Self { pool, config, state_cache }
    }

    /// Confirms a client exists, is active, and has `redirect_uri` on its
    /// allow-list, with no other side effects. The HTTP layer calls this
    /// before emitting *any* error response that would redirect to a
    /// caller-supplied URI (§6): until this returns `Ok`, `redirect_uri` is
    /// untrusted and must never appear in a `Location` header.
    pub async fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> Result<(), ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        self.fetch_authorized_client(&mut conn, client_id, redirect_uri).await?;
        Ok(())
    }

    async fn fetch_authorized_client(
        &self,
        conn: &mut sqlx::PgConnection,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<OAuthClient, ApiError> {
        let client = oauth_client_repository::find_active_by_id(conn, client_id)
            .await?
            .ok_or_else(|| ApiError::oauth(OAuthErrorCode::InvalidClient, "unknown or disabled client"))?;

        if !client.allowed_redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err(ApiError::oauth(OAuthErrorCode::InvalidRequest, "redirect_uri not registered for client"));
        }

        Ok(client)
    }

    /// Validates the request against the registered client and issues a
    /// one-time authorization code (§4.5 step 1).
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<AuthorizeResult, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;

        let client = self.fetch_authorized_client(&mut conn, &req.client_id, &req.redirect_uri).await?;

        let method = CodeChallengeMethod::parse(&req.code_challenge_method).filter(|m| {
            client.allowed_code_challenge_methods.iter().any(|allowed| allowed == m.as_str())
        });
        if client.require_pkce && method.is_none() {
            return Err(ApiError::oauth(OAuthErrorCode::InvalidRequest, "unsupported code_challenge_method"));
        }
        if client.require_pkce && req.code_challenge.is_empty() {
            return Err(ApiError::oauth(OAuthErrorCode::InvalidRequest, "code_challenge required"));
        }

        let scope = resolve_scope(req.scope.as_deref(), &client)?;
        let now = Utc::now();
        let code = crypto::generate_short_token();
        let code_hash = crypto::hash_secret(&code);

        auth_code_repository::create(
            &mut conn,
            crate::domain::entities::NewAuthorizationCode {
                code_hash,
                client_id: client.client_id.clone(),
                user_id: req.user_id,
                code_challenge: req.code_challenge,
                code_challenge_method: method.unwrap_or(CodeChallengeMethod::S256).as_str().to_string(),
                redirect_uri: req.redirect_uri.clone(),
                scope,
                state: req.state.clone(),
                expires_at: now + ChronoDuration::seconds(self.config.auth_code_ttl_seconds),
                ip_address: req.ip_address,
                user_agent: req.user_agent,
            },
        )
        .await?;

        let hint_key = StateNamespace::AuthCodeHint.key(&code_hash);
        self.state_cache.put(&hint_key, &AuthCodeHint { client_id: client.client_id.clone(), user_id: req.user_id }).await;
        if let Err(error) = oauth_state_repository::put(
            &mut conn,
            NewOAuthStateRecord {
                key: hint_key,
                blob: serde_json::json!({ "client_id": client.client_id, "user_id": req.user_id }),
                expires_at: now + ChronoDuration::seconds(self.config.auth_code_ttl_seconds),
            },
        )
        .await
        {
            tracing::warn!(%error, "failed to write auth-code L3 cache hint");
        }

        Ok(AuthorizeResult { redirect_uri: req.redirect_uri, code, state: req.state })
    }

    /// Consumes an authorization code and mints the first access/refresh
    /// pair (§4.5 step 2). The entire consumption + mint + event append
    /// happens in one transaction so a crash mid-way never leaves a consumed
    /// code with no issued tokens.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        code_verifier: &str,
    ) -> Result<TokenResult, ApiError> {
        let now = Utc::now();
        let code_hash = crypto::hash_secret(code);
        let hint_key = StateNamespace::AuthCodeHint.key(&code_hash);

        // Fast-path existence check only - never authoritative (§9 Open
        // Question). A miss here still falls through to the `FOR UPDATE`
        // consume below, so an L1/L2/L3 outage never blocks a real grant.
        let pool = self.pool.clone();
        let loader_key = hint_key.clone();
        match self
            .state_cache
            .get_or_load::<AuthCodeHint, _, _>(&hint_key, move || async move {
                let mut conn = pool.acquire().await.map_err(ApiError::DatabaseError)?;
                match oauth_state_repository::get_live(&mut conn, &loader_key, Utc::now()).await? {
                    Some(record) => Ok(serde_json::from_value(record.blob).ok()),
                    None => Ok(None),
                }
            })
            .await
        {
            Ok(Some((_, layer))) => tracing::debug!(?layer, "auth-code hint present"),
            Ok(None) => tracing::debug!("auth-code hint absent, falling through to authoritative store"),
            Err(error) => tracing::warn!(%error, "auth-code L3 hint lookup failed, falling through to authoritative store"),
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let consumed = match auth_code_repository::try_consume(&mut tx, &code_hash, now).await? {
            ConsumeOutcome::Consumed(code) => code,
            ConsumeOutcome::AlreadyConsumed(code) => {
                // Replay defense (§8): a code presented twice revokes the
                // whole chain it already produced, not just this request.
                if let Some(refresh_id) = code.issued_refresh_token_id {
                    let revoked = oauth_token_repository::revoke_subtree(
                        &mut tx,
                        refresh_id,
                        RevokedReason::Revoked,
                        now,
                    )
                    .await?;
                    for id in revoked {
                        event_log::record(
                            &mut tx,
                            NewEvent::new(id, EventPayload::TokenRevoked { token_id: id, reason: RevokedReason::Revoked }),
                        )
                        .await?;
                    }
                }
                event_log::record(
                    &mut tx,
                    NewEvent::new(
                        code.id,
                        EventPayload::AuthorizationCodeReplayed { code_id: code.id, client_id: code.client_id.clone() },
                    ),
                )
                .await?;
                tx.commit().await.map_err(ApiError::DatabaseError)?;
                return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "authorization code already used"));
            }
            ConsumeOutcome::Expired => {
                tx.commit().await.map_err(ApiError::DatabaseError)?;
                return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "authorization code expired"));
            }
            ConsumeOutcome::NotFound => {
                tx.rollback().await.map_err(ApiError::DatabaseError)?;
                return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "unknown authorization code"));
            }
        };

        if consumed.client_id != client_id.to_lowercase() {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidClient, "client_id mismatch"));
        }
        if consumed.redirect_uri != redirect_uri {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "redirect_uri mismatch"));
        }

        let method = CodeChallengeMethod::parse(&consumed.code_challenge_method).unwrap_or(CodeChallengeMethod::Plain);
        if !crypto::verify_pkce(code_verifier, &consumed.code_challenge, method) {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "PKCE verification failed"));
        }

        let refresh_plain = crypto::generate_long_token();
        let refresh = oauth_token_repository::create(
            &mut tx,
            NewOAuthToken {
                token_hash: crypto::hash_secret(&refresh_plain),
                token_type: TokenType::Refresh,
                client_id: consumed.client_id.clone(),
                user_id: consumed.user_id,
                scope: consumed.scope.clone(),
                expires_at: now + ChronoDuration::seconds(self.config.refresh_token_ttl_seconds),
                parent_token_id: None,
            },
        )
        .await?;
        event_log::record(
            &mut tx,
            NewEvent::new(
                refresh.id,
                EventPayload::TokenIssued {
                    token_id: refresh.id,
                    token_type: TokenType::Refresh,
                    client_id: consumed.client_id.clone(),
                    parent_token_id: None,
                },
            ),
        )
        .await?;

        let access_plain = crypto::generate_short_token();
        let access = oauth_token_repository::create(
            &mut tx,
            NewOAuthToken {
                token_hash: crypto::hash_secret(&access_plain),
                token_type: TokenType::Access,
                client_id: consumed.client_id.clone(),
                user_id: consumed.user_id,
                scope: consumed.scope.clone(),
                expires_at: now + ChronoDuration::seconds(self.config.access_token_ttl_seconds),
                parent_token_id: Some(refresh.id),
            },
        )
        .await?;
        event_log::record(
            &mut tx,
            NewEvent::new(
                access.id,
                EventPayload::TokenIssued {
                    token_id: access.id,
                    token_type: TokenType::Access,
                    client_id: consumed.client_id.clone(),
                    parent_token_id: Some(refresh.id),
                },
            ),
        )
        .await?;

        auth_code_repository::set_issued_refresh_token(&mut tx, consumed.id, refresh.id).await?;
        event_log::record(
            &mut tx,
            NewEvent::new(
                consumed.id,
                EventPayload::AuthorizationCodeConsumed { code_id: consumed.id, client_id: consumed.client_id.clone() },
            ),
        )
        .await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        self.state_cache.invalidate(&hint_key).await;
        if let Ok(mut conn) = self.pool.acquire().await {
            if let Err(error) = oauth_state_repository::delete(&mut conn, &hint_key).await {
                tracing::warn!(%error, "failed to delete consumed auth-code L3 cache hint");
            }
        }

        Ok(TokenResult {
            access_token: access_plain,
            refresh_token: refresh_plain,
            token_type: "Bearer",
            expires_in: self.config.access_token_ttl_seconds,
            scope: consumed.scope.join(" "),
        })
    }

    /// Rotates a refresh token (§4.5 step 3). The presented token is always
    /// revoked - either as the routine "rotated" case (first use) or, on
    /// reuse, the entire chain it already produced is brought down with
    /// reason `revoked` (§8 replay-defense property).
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> Result<TokenResult, ApiError> {
        let now = Utc::now();
        let token_hash = crypto::hash_secret(refresh_token);
        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        let Some(old_refresh) = oauth_token_repository::find_by_hash(&mut tx, &token_hash).await? else {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "unknown refresh token"));
        };

        if old_refresh.token_type != TokenType::Refresh {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "not a refresh token"));
        }
        if old_refresh.client_id != client_id.to_lowercase() {
            tx.rollback().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidClient, "client_id mismatch"));
        }

        if old_refresh.revoked {
            let revoked = oauth_token_repository::revoke_descendants(&mut tx, old_refresh.id, RevokedReason::Revoked, now).await?;
            for id in revoked {
                event_log::record(
                    &mut tx,
                    NewEvent::new(id, EventPayload::TokenRevoked { token_id: id, reason: RevokedReason::Revoked }),
                )
                .await?;
            }
            tx.commit().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "refresh token already used"));
        }

        if now > old_refresh.expires_at {
            oauth_token_repository::revoke_one(&mut tx, old_refresh.id, RevokedReason::Expired, now).await?;
            event_log::record(
                &mut tx,
                NewEvent::new(old_refresh.id, EventPayload::TokenRevoked { token_id: old_refresh.id, reason: RevokedReason::Expired }),
            )
            .await?;
            tx.commit().await.map_err(ApiError::DatabaseError)?;
            return Err(ApiError::oauth(OAuthErrorCode::InvalidGrant, "refresh token expired"));
        }

        // An omitted or empty scope inherits the prior grant (Open Question,
        // resolved in DESIGN.md); a narrower scope is accepted, a wider one
        // is rejected - a refresh can never escalate privilege.
        let new_scope = match requested_scope.map(str::trim) {
            None | Some("") => old_refresh.scope.clone(),
            Some(raw) => {
                let requested: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
                if let Some(unknown) = requested.iter().find(|s| !old_refresh.scope.contains(s)) {
                    let message = format!("cannot widen scope beyond prior grant: {unknown}");
                    tx.rollback().await.map_err(ApiError::DatabaseError)?;
                    return Err(ApiError::oauth(OAuthErrorCode::InvalidScope, message));
                }
                requested
            }
        };

        oauth_token_repository::revoke_one(&mut tx, old_refresh.id, RevokedReason::Rotated, now).await?;
        event_log::record(
            &mut tx,
            NewEvent::new(old_refresh.id, EventPayload::TokenRevoked { token_id: old_refresh.id, reason: RevokedReason::Rotated }),
        )
        .await?;

        let stranded = oauth_token_repository::revoke_descendants(&mut tx, old_refresh.id, RevokedReason::AncestorRotated, now).await?;
        for id in stranded {
            event_log::record(
                &mut tx,
                NewEvent::new(id, EventPayload::TokenRevoked { token_id: id, reason: RevokedReason::AncestorRotated }),
            )
            .await?;
        }

        let refresh_plain = crypto::generate_long_token();
        let new_refresh = oauth_token_repository::create(
            &mut tx,
            NewOAuthToken {
                token_hash: crypto::hash_secret(&refresh_plain),
                token_type: TokenType::Refresh,
                client_id: old_refresh.client_id.clone(),
                user_id: old_refresh.user_id,
                scope: new_scope.clone(),
                expires_at: now + ChronoDuration::seconds(self.config.refresh_token_ttl_seconds),
                parent_token_id: Some(old_refresh.id),
            },
        )
        .await?;
        event_log::record(
            &mut tx,
            NewEvent::new(
                new_refresh.id,
                EventPayload::TokenIssued {
                    token_id: new_refresh.id,
                    token_type: TokenType::Refresh,
                    client_id: old_refresh.client_id.clone(),
                    parent_token_id: Some(old_refresh.id),
                },
            ),
        )
        .await?;

        let access_plain = crypto::generate_short_token();
        let new_access = oauth_token_repository::create(
            &mut tx,
            NewOAuthToken {
                token_hash: crypto::hash_secret(&access_plain),
                token_type: TokenType::Access,
                client_id: old_refresh.client_id.clone(),
                user_id: old_refresh.user_id,
                scope: new_scope.clone(),
                expires_at: now + ChronoDuration::seconds(self.config.access_token_ttl_seconds),
                parent_token_id: Some(new_refresh.id),
            },
        )
        .await?;
        event_log::record(
            &mut tx,
            NewEvent::new(
                new_access.id,
                EventPayload::TokenIssued {
                    token_id: new_access.id,
                    token_type: TokenType::Access,
                    client_id: old_refresh.client_id.clone(),
                    parent_token_id: Some(new_refresh.id),
                },
            ),
        )
        .await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;

        Ok(TokenResult {
            access_token: access_plain,
            refresh_token: refresh_plain,
            token_type: "Bearer",
            expires_in: self.config.access_token_ttl_seconds,
            scope: new_scope.join(" "),
        })
    }

    /// Revokes a presented token per RFC 7009: always succeeds, revoking the
    /// whole subtree if it was a refresh token.
    pub async fn revoke(&self, token: &str) -> Result<(), ApiError> {
        let now = Utc::now();
        let hash = crypto::hash_secret(token);
        let mut tx = self.pool.begin().await.map_err(ApiError::DatabaseError)?;

        if let Some(found) = oauth_token_repository::find_by_hash(&mut tx, &hash).await? {
            let revoked_ids = if found.token_type == TokenType::Refresh {
                oauth_token_repository::revoke_subtree(&mut tx, found.id, RevokedReason::Revoked, now).await?
            } else {
                oauth_token_repository::revoke_one(&mut tx, found.id, RevokedReason::Revoked, now).await?;
                vec![found.id]
            };
            for id in revoked_ids {
                event_log::record(
                    &mut tx,
                    NewEvent::new(id, EventPayload::TokenRevoked { token_id: id, reason: RevokedReason::Revoked }),
                )
                .await?;
            }
        }

        tx.commit().await.map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    /// Reports whether a presented token is currently live (§6 introspection
    /// endpoint). Unknown or dead tokens answer `{ active: false }` rather
    /// than an error, per RFC 7662.
    pub async fn introspect(&self, token: &str) -> Result<IntrospectResult, ApiError> {
        let now = Utc::now();
        let hash = crypto::hash_secret(token);
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;

        let Some(found) = oauth_token_repository::find_by_hash(&mut conn, &hash).await? else {
            return Ok(inactive());
        };
        if !found.is_live(now) {
            return Ok(inactive());
        }

        Ok(IntrospectResult {
            active: true,
            client_id: Some(found.client_id),
            user_id: Some(found.user_id),
            scope: Some(found.scope.join(" ")),
            token_type: Some(found.token_type),
            exp: Some(found.expires_at.timestamp()),
            iat: Some(found.created_at.timestamp()),
        })
    }
}

fn inactive() -> IntrospectResult {
    IntrospectResult { active: false, client_id: None, user_id: None, scope: None, token_type: None, exp: None, iat: None }
}

/// Resolves the effective scope of a fresh grant: an omitted or blank
/// request inherits the client's default scopes; an explicit request must
/// be a subset of what the client is allowed (§4.5).
fn resolve_scope(requested: Option<&str>, client: &OAuthClient) -> Result<Vec<String>, ApiError> {
    match requested.map(str::trim) {
        None | Some("") => Ok(client.default_scopes.clone()),
        Some(raw) => {
            let requested: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
            if let Some(unknown) = requested.iter().find(|s| !client.allowed_scopes.contains(s)) {
                return Err(ApiError::oauth(OAuthErrorCode::InvalidScope, format!("scope not allowed: {unknown}")));
            }
            Ok(requested)
        }
    }
}

#[allow(unused_imports)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ClientStatus, ClientType};

    fn test_client() -> OAuthClient {
        OAuthClient {
            client_id: "demo-cli".to_string(),
            client_type: ClientType::Public,
            application_type: "cli".to_string(),
            require_pkce: true,
            allowed_code_challenge_methods: vec!["S256".to_string()],
            allowed_redirect_uris: vec!["http://localhost:8765/callback".to_string()],
            allowed_scopes: vec!["profile".to_string(), "offline_access".to_string()],
            default_scopes: vec!["profile".to_string()],
            status: ClientStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn resolve_scope_defaults_when_absent() {
        let client = test_client();
        let scope = resolve_scope(None, &client).unwrap();
        assert_eq!(scope, vec!["profile".to_string()]);
    }

    #[test]
    fn resolve_scope_defaults_when_blank() {
        let client = test_client();
        let scope = resolve_scope(Some("   "), &client).unwrap();
        assert_eq!(scope, vec!["profile".to_string()]);
    }

    #[test]
    fn resolve_scope_rejects_unknown_scope() {
        let client = test_client();
        let err = resolve_scope(Some("profile admin"), &client).unwrap_err();
        assert_eq!(err.error_code(), "invalid_scope");
    }

    #[test]
    fn resolve_scope_accepts_allowed_subset() {
        let client = test_client();
        let scope = resolve_scope(Some("offline_access"), &client).unwrap();
        assert_eq!(scope, vec!["offline_access".to_string()]);
    }
}
