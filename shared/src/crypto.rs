//! # Crypto Primitives
//!
//! Token generation, hashing, PKCE verification, and constant-time comparison
//! shared by every credential-bearing engine (OAuth, sessions, API keys).
//!
//! ## Design
//!
//! | Operation | Primitive | Notes |
//! |-----------|-----------|-------|
//! | Opaque token generation | `rand::thread_rng` | 48 bytes for codes/access tokens, 64 for refresh tokens/API keys |
//! | Hashing | SHA-256 (`sha2`) | No salt - lookups are `hash = SHA256(presented)` |
//! | PKCE verification | SHA-256 + base64url-no-pad | S256 only |
//! | Secret comparison | `subtle::ConstantTimeEq` | Timing-safe equality on hashes |
//!
//! No salt is used on secret hashing because these are high-entropy random
//! strings, not user-chosen passwords; the hash only needs to support
//! deterministic lookup, and 256+ bits of entropy makes precomputation
//! infeasible.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Byte length for authorization codes and access tokens.
pub const TOKEN_BYTES_SHORT: usize = 48;

/// Byte length for refresh tokens and API key secrets.
pub const TOKEN_BYTES_LONG: usize = 64;

/// Generates `n` bytes of cryptographic randomness, hex-encoded.
///
/// The returned string is the only form of the secret ever shown to a
/// caller; only its hash is persisted.
pub fn generate_opaque_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a 48-byte opaque token (authorization codes, access tokens).
pub fn generate_short_token() -> String {
    generate_opaque_token(TOKEN_BYTES_SHORT)
}

/// Generates a 64-byte opaque token (refresh tokens, API key secrets).
pub fn generate_long_token() -> String {
    generate_opaque_token(TOKEN_BYTES_LONG)
}

/// Hashes a secret with SHA-256, returning lowercase hex.
///
/// Used uniformly for authorization codes, access/refresh tokens, API keys
/// and session tokens. Deterministic by design: lookups compare
/// `hash_secret(presented)` against the stored hash.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two hash strings in constant time.
///
/// Always prefer this over `==` when one side is attacker-controlled
/// (e.g. a presented API key's computed hash vs. a stored hash).
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifies a presented secret against a stored hash in constant time.
///
/// Equivalent to `constant_time_eq(&hash_secret(presented), stored_hash)`
/// but spelled out for call-site clarity.
pub fn verify_secret(presented: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_secret(presented), stored_hash)
}

/// PKCE code challenge method. Only `S256` is accepted for new grants;
/// `Plain` exists so a client record can reject it explicitly rather than
/// silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeChallengeMethod {
    S256,
    Plain,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
            CodeChallengeMethod::Plain => "plain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// Computes the PKCE `code_challenge` for a given `code_verifier` under S256.
///
/// `code_challenge = base64url-no-pad(SHA256(code_verifier))` per RFC 7636 §4.2.
pub fn pkce_challenge_s256(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verifies a presented `code_verifier` against a stored `code_challenge`.
///
/// Only `S256` is supported; `plain` verification is intentionally not
/// implemented since no in-scope client is permitted to request it (§4.1).
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: CodeChallengeMethod) -> bool {
    match method {
        CodeChallengeMethod::S256 => {
            if !is_valid_pkce_verifier(code_verifier) {
                return false;
            }
            constant_time_eq(&pkce_challenge_s256(code_verifier), code_challenge)
        }
        CodeChallengeMethod::Plain => false,
    }
}

/// Validates `code_verifier` shape per RFC 7636 §4.1: 43-128 characters from
/// the unreserved URI character set `[A-Za-z0-9\-._~]`.
pub fn is_valid_pkce_verifier(verifier: &str) -> bool {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return false;
    }
    verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_short_token_is_96_hex_chars() {
        let token = generate_short_token();
        assert_eq!(token.len(), TOKEN_BYTES_SHORT * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_long_token_is_128_hex_chars() {
        let token = generate_long_token();
        assert_eq!(token.len(), TOKEN_BYTES_LONG * 2);
    }

    #[test]
    fn generate_opaque_token_is_unique() {
        let a = generate_long_token();
        let b = generate_long_token();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_secret_is_deterministic() {
        let h1 = hash_secret("my-secret-value");
        let h2 = hash_secret("my-secret-value");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn hash_secret_differs_for_different_inputs() {
        assert_ne!(hash_secret("a"), hash_secret("b"));
    }

    #[test]
    fn verify_secret_roundtrip() {
        let secret = generate_long_token();
        let hash = hash_secret(&secret);
        assert!(verify_secret(&secret, &hash));
        assert!(!verify_secret("wrong-secret", &hash));
    }

    #[test]
    fn pkce_known_vector_matches() {
        // Fixed RFC 7636 Appendix B-style test vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(pkce_challenge_s256(verifier), challenge);
        assert!(verify_pkce(verifier, challenge, CodeChallengeMethod::S256));
    }

    #[test]
    fn pkce_mismatch_rejected() {
        let challenge = pkce_challenge_s256("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert!(!verify_pkce(
            "a-totally-different-verifier-that-is-long-enough-1234",
            &challenge,
            CodeChallengeMethod::S256
        ));
    }

    #[test]
    fn pkce_verifier_length_bounds() {
        assert!(!is_valid_pkce_verifier(&"a".repeat(42)));
        assert!(is_valid_pkce_verifier(&"a".repeat(43)));
        assert!(is_valid_pkce_verifier(&"a".repeat(128)));
        assert!(!is_valid_pkce_verifier(&"a".repeat(129)));
    }

    #[test]
    fn pkce_verifier_rejects_invalid_characters() {
        assert!(!is_valid_pkce_verifier(&format!("{}{}", "a".repeat(42), "!")));
    }

    #[test]
    fn code_challenge_method_parses_known_values() {
        assert_eq!(CodeChallengeMethod::parse("S256"), Some(CodeChallengeMethod::S256));
        assert_eq!(CodeChallengeMethod::parse("plain"), Some(CodeChallengeMethod::Plain));
        assert_eq!(CodeChallengeMethod::parse("xyz"), None);
    }
}
