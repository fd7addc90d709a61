//! # HTTP Handlers
//!
//! Extracts and validates the request, calls into the service layer, and
//! shapes the response per §6. Handlers never touch the repository layer
//! directly - that boundary always runs through a `service::*` type so a
//! transaction never spans the HTTP request/response lifecycle.
//!
//! Two authentication surfaces feed each other here: the OAuth2/PKCE and
//! session-cookie engines each mint their own credential, and
//! [`crate::service::uai_service`] is the single place a handler asks "who
//! is this, regardless of which of the four credential modalities they
//! presented" (§4.9).

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use shared::errors::ApiError;
use shared::validation;
use uuid::Uuid;

use crate::domain::entities::{AccessLevel, Platform};
use crate::repository::audit_repository;
use crate::service::api_key_service::{ApiKeyValidation, MintApiKeyRequest};
use crate::service::oauth_service::AuthorizeRequest;
use crate::service::session_service::CreateSessionRequest;
use crate::service::uai_service::AuthMethod;
use crate::AppState;

use super::dto::{
    ApiKeyResponse, AuthorizeQuery, CreateApiKeyRequest, HealthResponse, IntrospectRequest,
    IntrospectResponse, LoginRequest, MintedApiKeyResponse, OAuthErrorResponse, RevokeRequest,
    SessionResponse, TokenRequest, TokenResponse, VerifyRequest, VerifyResponse,
};

const SESSION_COOKIE_NAME: &str = "gw_session";

// =============================================================================
// HEALTH
// =============================================================================

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let cache = match &state.redis {
        Some(redis) => redis.ping().await.is_ok(),
        None => true,
    };
    let stats = state.outbox_worker.stats().await.unwrap_or_default();

    let status = if database { "ok" } else { "degraded" };
    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        service: "auth-gateway".to_string(),
        database,
        cache,
        outbox_pending: stats.pending,
        outbox_failed: stats.failed,
    })
}

// =============================================================================
// OAUTH2 / PKCE
// =============================================================================

/// `GET /oauth/authorize` - issues a one-time authorization code on behalf
/// of whichever identity is already signed in via the browser session
/// cookie. This gateway never renders a login page itself (§1 non-goals); a
/// caller with no live session is rejected rather than redirected to one.
pub async fn oauth_authorize(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<AuthorizeQuery>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&query)?;

    // The client and its redirect_uri are untrusted until confirmed against
    // the allow-list; an error response must never 302 to a URI that isn't
    // known-good yet, so this check runs before anything below it (§6).
    if let Err(err) = state.oauth_service.validate_redirect_uri(&query.client_id, &query.redirect_uri).await {
        return Ok(untrusted_oauth_error(err));
    }

    if query.response_type != "code" {
        return Ok(oauth_error_redirect(
            &query.redirect_uri,
            &query.state,
            "unsupported_response_type",
            "only the authorization code flow is supported",
        ));
    }

    let session = authenticate_session(&req, &state).await?;

    rate_limited(&state, &format!("oauth_authorize:{}", query.client_id)).await?;

    let result = state
        .oauth_service
        .authorize(AuthorizeRequest {
            client_id: query.client_id.clone(),
            redirect_uri: query.redirect_uri.clone(),
            scope: query.scope.clone(),
            state: query.state.clone(),
            code_challenge: query.code_challenge.clone(),
            code_challenge_method: query.code_challenge_method.clone(),
            user_id: session.user_id,
            ip_address: client_ip(&req),
            user_agent: user_agent(&req),
        })
        .await;

    match result {
        Ok(issued) => {
            let location = format!(
                "{}?code={}&state={}",
                issued.redirect_uri,
                urlencode(&issued.code),
                urlencode(&issued.state)
            );
            Ok(HttpResponse::Found().insert_header(("Location", location)).finish())
        }
        // redirect_uri was already confirmed against the client's allow-list
        // above, so it's safe to redirect with whatever went wrong here.
        Err(ApiError::OAuthProtocolError { code, description }) => Ok(oauth_error_redirect(
            &query.redirect_uri,
            &query.state,
            code.as_str(),
            description.as_deref().unwrap_or(""),
        )),
        Err(other) => Err(other),
    }
}

/// `POST /oauth/token` - dispatches on `grant_type` (§4.5).
pub async fn oauth_token(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<TokenRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;

    let client_id = body.client_id.clone().unwrap_or_default();
    rate_limited(&state, &format!("oauth_token:{client_id}")).await?;

    let mut conn = state.pool.acquire().await.map_err(ApiError::DatabaseError)?;

    let result = match body.grant_type.as_str() {
        "authorization_code" => {
            let code = body.code.as_deref().ok_or_else(|| {
                ApiError::oauth(shared::errors::OAuthErrorCode::InvalidRequest, "code is required")
            })?;
            let redirect_uri = body.redirect_uri.as_deref().ok_or_else(|| {
                ApiError::oauth(shared::errors::OAuthErrorCode::InvalidRequest, "redirect_uri is required")
            })?;
            let code_verifier = body.code_verifier.as_deref().ok_or_else(|| {
                ApiError::oauth(shared::errors::OAuthErrorCode::InvalidRequest, "code_verifier is required")
            })?;
            state
                .oauth_service
                .exchange_authorization_code(code, redirect_uri, &client_id, code_verifier)
                .await
        }
        "refresh_token" => {
            let refresh_token = body.refresh_token.as_deref().ok_or_else(|| {
                ApiError::oauth(shared::errors::OAuthErrorCode::InvalidRequest, "refresh_token is required")
            })?;
            state.oauth_service.refresh(refresh_token, &client_id, body.scope.as_deref()).await
        }
        other => Err(ApiError::oauth(
            shared::errors::OAuthErrorCode::UnsupportedGrantType,
            format!("unsupported grant_type: {other}"),
        )),
    };

    let success = result.is_ok();
    let error_code = result.as_ref().err().and_then(|e| match e {
        ApiError::OAuthProtocolError { code, .. } => Some(code.as_str()),
        _ => None,
    });
    let _ = audit_repository::append_oauth_audit_log(
        &mut conn,
        &client_id,
        None,
        Some(body.grant_type.as_str()),
        "token",
        success,
        error_code,
        client_ip(&req).as_deref(),
    )
    .await;

    let token = result?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        token_type: token.token_type.to_string(),
        expires_in: token.expires_in,
        scope: token.scope,
    }))
}

/// `POST /oauth/revoke` - RFC 7009, always succeeds (§4.5).
pub async fn oauth_revoke(
    state: web::Data<AppState>,
    body: web::Json<RevokeRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;
    state.oauth_service.revoke(&body.token).await?;
    Ok(HttpResponse::Ok().finish())
}

/// `POST /oauth/introspect` - RFC 7662.
pub async fn oauth_introspect(
    state: web::Data<AppState>,
    body: web::Json<IntrospectRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;
    let result = state.oauth_service.introspect(&body.token).await?;

    Ok(HttpResponse::Ok().json(IntrospectResponse {
        active: result.active,
        client_id: result.client_id,
        user_id: result.user_id.map(|id| id.to_string()),
        scope: result.scope,
        token_type: result.token_type.map(|t| format!("{t:?}").to_lowercase()),
        exp: result.exp,
        iat: result.iat,
    }))
}

// =============================================================================
// SESSIONS
// =============================================================================

/// `POST /v1/auth/login` - resolves the presented credentials against the
/// user-account store and mints a browser session. Password verification
/// itself is delegated to an upstream identity provider (§1 non-goals) -
/// this gateway only ever checks that the account exists and mints the
/// session cookie once the caller vouches for the credential.
pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;

    let ip_address = client_ip(&req);
    rate_limited(&state, &format!("login:{}", ip_address.clone().unwrap_or_default())).await?;

    let mut conn = state.pool.acquire().await.map_err(ApiError::DatabaseError)?;
    let account = crate::repository::user_account_repository::find_by_email(&mut conn, &body.email).await?;
    drop(conn);

    let Some(account) = account else {
        log_audit(&state, None, "login", false, ip_address.as_deref(), user_agent(&req).as_deref()).await;
        return Err(ApiError::InvalidCredentials);
    };

    let created = state
        .session_service
        .create(CreateSessionRequest {
            user_id: account.user_id,
            platform: Platform::Web,
            client_id: None,
            scope: vec![],
            ip_address: ip_address.clone(),
            user_agent: user_agent(&req),
            with_refresh: false,
        })
        .await?;

    log_audit(&state, Some(account.user_id), "login", true, ip_address.as_deref(), user_agent(&req).as_deref()).await;

    let mut response = HttpResponse::Ok();
    response.cookie(session_cookie(&state, created.token.clone(), state.session_ttl_seconds));
    Ok(response.json(SessionResponse {
        user_id: account.user_id.to_string(),
        email: account.email,
        platform: "web".to_string(),
        expires_at: created.session.expires_at.to_rfc3339(),
    }))
}

/// `POST /v1/auth/logout` - revokes the session behind the presented cookie
/// and clears it client-side regardless of whether it was still live.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        let revoked = state.session_service.revoke(cookie.value()).await?;
        state.uai_service.invalidate(AuthMethod::SessionCookie, cookie.value()).await;
        log_audit(&state, None, "logout", revoked, client_ip(&req).as_deref(), user_agent(&req).as_deref()).await;
    }

    let mut response = HttpResponse::Ok();
    response.cookie(expired_session_cookie(&state));
    Ok(response.finish())
}

/// `GET /v1/auth/session` - reports the identity behind the presented
/// session cookie.
pub async fn get_session(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let session = authenticate_session(&req, &state).await?;
    let mut conn = state.pool.acquire().await.map_err(ApiError::DatabaseError)?;
    let account = crate::repository::user_account_repository::find_by_id(&mut conn, session.user_id).await?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        user_id: session.user_id.to_string(),
        email: account.map(|a| a.email).unwrap_or_default(),
        platform: format!("{:?}", session.platform).to_lowercase(),
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

/// `POST /v1/auth/verify` - validates an arbitrary presented credential via
/// UAI resolution, mirroring `/oauth/introspect` semantics for non-OAuth
/// callers (convenience for internal services, §6).
pub async fn verify(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;

    let method = if body.credential.starts_with(crate::service::api_key_service::CURRENT_PREFIX) {
        AuthMethod::ApiKey
    } else {
        AuthMethod::OauthBearer
    };

    match state.uai_service.resolve(method, &body.credential).await? {
        Some(identity) => {
            let access_level = match method {
                AuthMethod::ApiKey => match state.api_key_service.validate(&body.credential).await? {
                    ApiKeyValidation::Valid { access_level, .. } => Some(access_level.as_str().to_string()),
                    ApiKeyValidation::Invalid { .. } => None,
                },
                _ => None,
            };
            Ok(HttpResponse::Ok().json(VerifyResponse {
                valid: true,
                user_id: Some(identity.auth_id.to_string()),
                access_level,
                reason: None,
            }))
        }
        None => Ok(HttpResponse::Ok().json(VerifyResponse {
            valid: false,
            user_id: None,
            access_level: None,
            reason: Some("not_found".to_string()),
        })),
    }
}

// =============================================================================
// API KEYS
// =============================================================================

pub async fn create_api_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateApiKeyRequest>,
) -> Result<HttpResponse, ApiError> {
    validation::validate_request(&body)?;
    let user_id = authenticate(&req, &state).await?;

    let access_level = body
        .access_level
        .as_deref()
        .map(parse_access_level)
        .unwrap_or(AccessLevel::Authenticated);

    let minted = state
        .api_key_service
        .mint(MintApiKeyRequest {
            user_id,
            name: body.name.clone(),
            access_level,
            permissions: body.permissions.clone(),
            expires_in_days: body.expires_in_days,
        })
        .await?;

    Ok(HttpResponse::Created().json(MintedApiKeyResponse {
        key: ApiKeyResponse::from(minted.key),
        key_value: minted.plain_value,
    }))
}

pub async fn list_api_keys(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user_id = authenticate(&req, &state).await?;
    let keys = state.api_key_service.list(user_id).await?;
    let response: Vec<ApiKeyResponse> = keys.into_iter().map(ApiKeyResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

pub async fn rotate_api_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = authenticate(&req, &state).await?;
    let key_id = path.into_inner();

    let existing = state
        .api_key_service
        .get(key_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("api_key:{key_id}") })?;
    if existing.user_id != user_id {
        return Err(ApiError::AccessDenied);
    }

    let minted = state
        .api_key_service
        .rotate(key_id)
        .await?
        .ok_or_else(|| ApiError::NotFound { resource: format!("api_key:{key_id}") })?;

    Ok(HttpResponse::Ok().json(MintedApiKeyResponse {
        key: ApiKeyResponse::from(minted.key),
        key_value: minted.plain_value,
    }))
}

pub async fn revoke_api_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let user_id = authenticate(&req, &state).await?;
    let key_id = path.into_inner();

    let revoked = state.api_key_service.revoke(key_id, user_id).await?;
    if !revoked {
        return Err(ApiError::NotFound { resource: format!("api_key:{key_id}") });
    }
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

fn parse_access_level(value: &str) -> AccessLevel {
    AccessLevel::ALL
        .iter()
        .find(|level| level.as_str() == value)
        .copied()
        .unwrap_or(AccessLevel::Authenticated)
}

/// Resolves the signed-in user behind a presented session cookie or bearer
/// credential - the generic auth extractor for endpoints any of the four
/// credential modalities may call (§4.9).
async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Uuid, ApiError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        if let Some(identity) = state.uai_service.resolve(AuthMethod::SessionCookie, cookie.value()).await? {
            return Ok(identity.auth_id);
        }
    }
    if let Some(token) = extract_bearer_token(req) {
        if token.starts_with(crate::service::api_key_service::CURRENT_PREFIX) {
            if let Some(identity) = state.uai_service.resolve(AuthMethod::ApiKey, &token).await? {
                return Ok(identity.auth_id);
            }
        } else if let Some(identity) = state.uai_service.resolve(AuthMethod::OauthBearer, &token).await? {
            return Ok(identity.auth_id);
        }
    }
    Err(ApiError::MissingAuth)
}

/// A narrower variant of [`authenticate`] for endpoints that only accept the
/// browser session cookie - `/oauth/authorize` must know which end user is
/// granting consent, not which service is calling on their behalf.
async fn authenticate_session(
    req: &HttpRequest,
    state: &AppState,
) -> Result<crate::domain::entities::Session, ApiError> {
    let cookie = req.cookie(SESSION_COOKIE_NAME).ok_or(ApiError::MissingAuth)?;
    state.session_service.validate(cookie.value()).await?.ok_or(ApiError::MissingAuth)
}

fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().peer_addr().map(String::from)
}

fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers().get("User-Agent")?.to_str().ok().map(str::to_string)
}

fn session_cookie(state: &AppState, value: String, ttl_seconds: i64) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME, value)
        .domain(state.cookie_domain.clone())
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(ttl_seconds))
        .finish()
}

fn expired_session_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME, "")
        .domain(state.cookie_domain.clone())
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(0))
        .finish()
}

async fn rate_limited(state: &AppState, bucket: &str) -> Result<(), ApiError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let outcome = state.rate_limit_service.check(bucket, now_ms).await;
    if !outcome.allowed {
        let retry_after = ((outcome.reset_time_ms - now_ms).max(0) / 1000) as u64;
        return Err(ApiError::TooManyRequests { retry_after_seconds: retry_after });
    }
    Ok(())
}

async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    success: bool,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) {
    if let Ok(mut conn) = state.pool.acquire().await {
        let _ = audit_repository::append_audit_log(
            &mut conn,
            user_id,
            action,
            success,
            ip_address,
            user_agent,
            serde_json::json!({}),
        )
        .await;
    }
}

/// Renders a non-redirecting OAuth error for a client or redirect_uri that
/// hasn't been confirmed against the allow-list yet - the presented
/// `redirect_uri` is attacker-controlled at this point and must never reach
/// a `Location` header (§6).
fn untrusted_oauth_error(err: ApiError) -> HttpResponse {
    let (error, error_description) = match err {
        ApiError::OAuthProtocolError { code, description } => (code.as_str().to_string(), description),
        other => ("invalid_request".to_string(), Some(other.to_string())),
    };
    HttpResponse::BadRequest().json(OAuthErrorResponse { error, error_description })
}

fn oauth_error_redirect(redirect_uri: &str, state: &str, error: &str, description: &str) -> HttpResponse {
    if redirect_uri.is_empty() {
        return HttpResponse::BadRequest().json(OAuthErrorResponse {
            error: error.to_string(),
            error_description: Some(description.to_string()),
        });
    }
    let location = format!(
        "{redirect_uri}?error={}&error_description={}&state={}",
        urlencode(error),
        urlencode(description),
        urlencode(state)
    );
    HttpResponse::Found().insert_header(("Location", location)).finish()
}

/// Minimal RFC 3986 percent-encoding for a query-string component. Only the
/// unreserved character set passes through unescaped.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_access_level_falls_back_to_authenticated() {
        assert_eq!(parse_access_level("bogus"), AccessLevel::Authenticated);
        assert_eq!(parse_access_level("admin"), AccessLevel::Admin);
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a+b%26c");
    }
}
