//! # Data Transfer Objects (DTOs)
//!
//! The wire-level request/response shapes for the OAuth2/PKCE, session, API
//! key, and UAI verify surfaces (§6). Validation uses the `validator` crate
//! (see [`shared::validation`]); JSON fields are `camelCase` except where an
//! external RFC fixes the field name (`/oauth/*` bodies use the exact OAuth2
//! wire vocabulary - `client_id`, `code_verifier`, etc - since they must
//! interoperate with generic OAuth2 clients, not just this gateway's own
//! frontend).

use serde::{Deserialize, Serialize};
use validator::Validate;

use shared::validation::validators;

// =============================================================================
// OAUTH2 / PKCE
// =============================================================================

/// Query parameters for `GET /oauth/authorize`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthorizeQuery {
    pub response_type: String,
    #[validate(custom(function = "validators::not_blank"))]
    pub client_id: String,
    #[validate(custom(function = "validators::valid_redirect_uri"))]
    pub redirect_uri: String,
    pub scope: Option<String>,
    #[validate(custom(function = "validators::not_blank"))]
    pub state: String,
    #[validate(custom(function = "validators::not_blank"))]
    pub code_challenge: String,
    pub code_challenge_method: String,
}

/// Body for `POST /oauth/token`. Both grant types share one struct since
/// the wire bodies only differ in which optional fields are populated -
/// mirroring how most OAuth2 servers accept `application/x-www-form-urlencoded`
/// or JSON against the same field set.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevokeRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub token: String,
    pub token_type_hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IntrospectRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// The standard OAuth2 error JSON body (§7), also reused for the error
/// query parameters `/oauth/authorize` redirects back with.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

// =============================================================================
// SESSIONS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub platform: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub credential: String,
}

// =============================================================================
// API KEYS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    #[validate(custom(function = "validators::not_blank"))]
    #[validate(length(max = 200, message = "name too long"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validators::valid_access_level"))]
    pub access_level: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validators::valid_expires_in_days"))]
    pub expires_in_days: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub access_level: String,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    pub created_at: String,
}

/// Returned only from create/rotate - the one moment the plain value is
/// ever observable outside this process (§4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintedApiKeyResponse {
    #[serde(flatten)]
    pub key: ApiKeyResponse,
    pub key_value: String,
}

// =============================================================================
// HEALTH
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: bool,
    pub cache: bool,
    pub outbox_pending: i64,
    pub outbox_failed: i64,
}

// =============================================================================
// CONVERSIONS
// =============================================================================

use crate::domain::entities::ApiKey;

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id.to_string(),
            name: key.name,
            access_level: key.access_level.as_str().to_string(),
            permissions: key.permissions,
            expires_at: key.expires_at.map(|dt| dt.to_rfc3339()),
            last_used_at: key.last_used_at.map(|dt| dt.to_rfc3339()),
            created_at: key.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn login_request_requires_valid_email() {
        let request = LoginRequest { email: "not-an-email".to_string(), password: "x".to_string() };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_api_key_request_rejects_blank_name() {
        let request = CreateApiKeyRequest {
            name: "   ".to_string(),
            access_level: None,
            permissions: vec![],
            expires_in_days: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_api_key_request_rejects_out_of_range_expiry() {
        let request = CreateApiKeyRequest {
            name: "ci".to_string(),
            access_level: None,
            permissions: vec![],
            expires_in_days: Some(3651),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn minted_api_key_response_flattens_key_fields() {
        let response = MintedApiKeyResponse {
            key: ApiKeyResponse {
                id: "id".to_string(),
                name: "ci".to_string(),
                access_level: "authenticated".to_string(),
                permissions: vec![],
                expires_at: None,
                last_used_at: None,
                created_at: "now".to_string(),
            },
            key_value: "lano_abc".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["keyValue"], "lano_abc");
        assert_eq!(json["name"], "ci");
    }
}
