//! # JWT Decoding (Read-Only)
//!
//! The gateway never mints JWTs itself - every credential it issues (OAuth
//! access/refresh tokens, API keys, session tokens) is an opaque random
//! string, hashed with SHA-256 (see [`crate::crypto`]). `jwt` nonetheless
//! appears as one of the UAI `AuthMethod` variants because some downstream
//! deployments present a JWT minted by a fronting identity provider; this
//! module only needs to *decode* that token's claims well enough to extract
//! a stable subject for identity resolution. Signature verification is still
//! performed against the configured secret so a forged `sub` claim cannot be
//! used to impersonate another user, but there is no corresponding
//! encode/issue path in this crate.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::errors::ApiError;

/// Claims expected on an externally-issued JWT presented as a bearer
/// credential. Only the fields the UAI resolver needs are modeled; unknown
/// claims are ignored rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject - the identity provider's stable user identifier.
    pub sub: String,
    /// Issuer, checked against [`JwtConfig::issuer`].
    pub iss: Option<String>,
    /// Audience, checked against [`JwtConfig::audience`].
    pub aud: Option<String>,
    /// Expiration (Unix seconds).
    pub exp: i64,
    /// Issued-at (Unix seconds).
    pub iat: Option<i64>,
    /// Optional email claim, used opportunistically during UAI provisioning.
    pub email: Option<String>,
}

impl JwtClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decodes and verifies externally-issued JWTs against a shared secret.
///
/// This is the mirror image of a normal JWT service: there is no
/// `encode`/`generate_tokens` method because this gateway has nothing to
/// sign - it only ever needs to read someone else's token.
#[derive(Clone)]
pub struct JwtDecoder {
    secret: String,
    issuer: String,
    audience: String,
}

impl JwtDecoder {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            secret: config.secret,
            issuer: config.issuer,
            audience: config.audience,
        }
    }

    /// Decodes `token`, verifying its HS256 signature, issuer and audience.
    ///
    /// Returns [`ApiError::InvalidToken`] for any malformed, expired or
    /// mis-issued token - callers should not distinguish further, since
    /// leaking *why* a bearer token was rejected aids credential probing.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ApiError::InvalidToken)?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "a-test-secret-that-is-long-enough-1234".to_string(),
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 604800,
            issuer: "auth-gateway".to_string(),
            audience: "auth-gateway-api".to_string(),
        }
    }

    #[test]
    fn decodes_valid_token() {
        let cfg = config();
        let claims = JwtClaims {
            sub: "user-123".to_string(),
            iss: Some(cfg.issuer.clone()),
            aud: Some(cfg.audience.clone()),
            exp: (Utc::now() + chrono::Duration::minutes(5)).timestamp(),
            iat: Some(Utc::now().timestamp()),
            email: Some("user@example.com".to_string()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.secret.as_bytes()),
        )
        .unwrap();

        let decoder = JwtDecoder::new(cfg);
        let decoded = decoder.decode(&token).unwrap();
        assert_eq!(decoded.sub, "user-123");
    }

    #[test]
    fn rejects_wrong_issuer() {
        let cfg = config();
        let claims = JwtClaims {
            sub: "user-123".to_string(),
            iss: Some("someone-else".to_string()),
            aud: Some(cfg.audience.clone()),
            exp: (Utc::now() + chrono::Duration::minutes(5)).timestamp(),
            iat: None,
            email: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.secret.as_bytes()),
        )
        .unwrap();

        let decoder = JwtDecoder::new(cfg);
        assert!(decoder.decode(&token).is_err());
    }
}
