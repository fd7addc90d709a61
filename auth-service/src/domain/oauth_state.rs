//! # Transient OAuth State (L3 authoritative tier)
//!
//! Backs the `oauth_states` table described in §4.4: a generic key→blob
//! store with an expiry, used for anything the tiered cache needs to
//! survive an L1/L2 outage - CSRF tokens, device codes, OTP states, and
//! (as a fast-path hint only, never authoritative - see §9) authorization
//! code lookups.
//!
//! Every blob is namespaced so unrelated short-lived artifacts never
//! collide on key even if a caller reuses an identifier across namespaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Namespace prefix for an [`OAuthStateRecord`] key, keeping the
/// underlying `oauth_states` table generic across unrelated artifact
/// kinds (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateNamespace {
    CsrfToken,
    DeviceCode,
    OtpState,
    AuthCodeHint,
}

impl StateNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CsrfToken => "csrf",
            Self::DeviceCode => "device_code",
            Self::OtpState => "otp",
            Self::AuthCodeHint => "auth_code",
        }
    }

    /// Builds the full `oauth_states` key for a given namespace and id.
    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

/// A row in the `oauth_states` table: the authoritative L3 tier for
/// short-lived key→blob state (§4.4).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuthStateRecord {
    pub key: String,
    pub blob: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OAuthStateRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Fields required to write a new [`OAuthStateRecord`].
#[derive(Debug, Clone)]
pub struct NewOAuthStateRecord {
    pub key: String,
    pub blob: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_keys_are_prefixed() {
        assert_eq!(StateNamespace::CsrfToken.key("abc"), "csrf:abc");
        assert_eq!(StateNamespace::DeviceCode.key("xyz"), "device_code:xyz");
    }
}
