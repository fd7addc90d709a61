//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! ## Overview
//!
//! This module provides:
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validate_request`] | Validate a struct implementing `Validate` |
//! | [`parse_and_validate`] | Parse JSON and validate in one step |
//! | [`validators`] | Custom validation functions |
//!
//! ## How Validation Works
//!
//! We use the [`validator`](https://docs.rs/validator/) crate which provides
//! derive macros for declarative validation:
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//!     
//!     #[validate(length(min = 10))]
//!     password: String,
//!     
//!     #[validate(custom(function = "validators::not_blank"))]
//!     name: String,
//! }
//! ```
//!
//! ## Validation Flow
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ JSON Request │────►│ Deserialize   │────►│   Validate   │
//! │              │     │ (serde)       │     │  (validator) │
//! └──────────────┘     └───────────────┘     └──────┬───────┘
//!                                                   │
//!         ┌─────────────────────────────────────────┴───────┐
//!         │                                                 │
//!         ▼                                                 ▼
//! ┌───────────────┐                               ┌─────────────────┐
//! │   Success     │                               │ ValidationError │
//! │ (continue)    │                               │   (400 + details)│
//! └───────────────┘                               └─────────────────┘
//! ```
//!
//! ## Error Response Format
//!
//! When validation fails, the API returns a 400 Bad Request with details:
//!
//! ```json
//! {
//!   "code": "VALIDATION_ERROR",
//!   "message": "Validation error",
//!   "details": {
//!     "email": [
//!       { "code": "email", "message": "Invalid email format" }
//!     ],
//!     "password": [
//!       { "code": "length", "message": "Must be at least 10 characters" }
//!     ]
//!   }
//! }
//! ```
//!
//! ## Custom Validators
//!
//! The [`validators`] module provides common validation functions:
//!
//! | Validator | Purpose |
//! |-----------|---------|
//! | `not_blank` | String is not empty after trimming |
//! | `valid_redirect_uri` | Absolute, non-empty OAuth redirect URI shape |
//! | `valid_access_level` | API key access level against the fixed tier set |
//! | `valid_expires_in_days` | API key expiry window, 1..=3650 days |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::validation::{validate_request, validators};
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateApiKeyRequest {
//!     #[validate(custom(function = "validators::not_blank"))]
//!     name: String,
//!
//!     #[validate(custom(function = "validators::valid_expires_in_days"))]
//!     expires_in_days: i32,
//! }
//!
//! async fn handler(body: Json<CreateApiKeyRequest>) -> Result<impl Responder, ApiError> {
//!     validate_request(&body)?;
//!     // Validation passed, continue...
//! }
//! ```
//!
//! ## Related Documentation
//!
//! - [`validator` crate](https://docs.rs/validator/)
//! - [`crate::errors::ApiError`] - Error handling
//! - [`_docs/development/development-standards.md`] - Validation guidelines

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// This is the primary validation function. Use it in handlers to
/// validate incoming data.
///
/// ## Example
///
/// ```rust,ignore
/// async fn create_user(body: Json<CreateUserDto>) -> Result<impl Responder, ApiError> {
///     validate_request(&body)?;  // Returns early if invalid
///     
///     // Continue with validated data
/// }
/// ```
///
/// ## Errors
///
/// Returns `ApiError::ValidationError` with field-level details if validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::ValidationError)
}

/// Parses JSON string and validates in a single step.
///
/// Useful when you have raw JSON and need to parse + validate.
///
/// ## Example
///
/// ```rust,ignore
/// let json = r#"{"email": "user@example.com", "password": "secret"}"#;
/// let user: CreateUserDto = parse_and_validate(json)?;
/// ```
///
/// ## Errors
///
/// - `ApiError::BadRequest` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    // Parse JSON
    let data: T = serde_json::from_str(json)
        .map_err(|e| ApiError::BadRequest { message: e.to_string() })?;

    // Validate
    validate_request(&data)?;

    Ok(data)
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
///
/// These functions follow the validator crate's signature:
/// `fn(&T) -> Result<(), ValidationError>`
///
/// ## Usage
///
/// ```rust,ignore
/// use validator::Validate;
/// use shared::validation::validators;
///
/// #[derive(Validate)]
/// struct MyStruct {
///     #[validate(custom(function = "validators::not_blank"))]
///     name: String,
/// }
/// ```
pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    ///
    /// ## Valid Values
    ///
    /// - `"hello"` ✓
    /// - `"  hello  "` ✓ (has content)
    ///
    /// ## Invalid Values
    ///
    /// - `""` ✗
    /// - `"   "` ✗ (whitespace only)
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }

    /// Validates a redirect URI is an absolute, non-empty URI.
    ///
    /// This only checks shape - whether a given `redirect_uri` is one the
    /// requesting client is actually allowed to use is an exact-string
    /// membership check against `OAuthClient::allowed_redirect_uris`, done
    /// by the OAuth engine, never normalized.
    pub fn valid_redirect_uri(value: &str) -> Result<(), ValidationError> {
        if value.is_empty() || !value.contains("://") {
            return Err(ValidationError::new("invalid_redirect_uri"));
        }
        Ok(())
    }

    /// Validates an API key access level against the fixed tier set.
    ///
    /// ## Valid Values
    ///
    /// `public`, `authenticated`, `team`, `admin`, `enterprise`
    pub fn valid_access_level(value: &str) -> Result<(), ValidationError> {
        const LEVELS: [&str; 5] = ["public", "authenticated", "team", "admin", "enterprise"];
        if LEVELS.contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::new("invalid_access_level"))
        }
    }

    /// Validates an API key expiry window in days.
    ///
    /// Must be a positive integer no greater than 3650 (ten years).
    ///
    /// ## Valid Values
    ///
    /// - `1` ✓
    /// - `3650` ✓
    ///
    /// ## Invalid Values
    ///
    /// - `0` ✗
    /// - `3651` ✗
    pub fn valid_expires_in_days(value: i32) -> Result<(), ValidationError> {
        if value < 1 || value > 3650 {
            return Err(ValidationError::new("invalid_expires_in_days"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn test_not_blank_valid() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("  hello  ").is_ok());
        assert!(not_blank("a").is_ok());
    }

    #[test]
    fn test_not_blank_invalid() {
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\t\n").is_err());
    }

    #[test]
    fn test_valid_redirect_uri() {
        assert!(valid_redirect_uri("http://127.0.0.1:8989/callback").is_ok());
        assert!(valid_redirect_uri("https://app.example.com/cb").is_ok());
        assert!(valid_redirect_uri("").is_err());
        assert!(valid_redirect_uri("not-a-uri").is_err());
    }

    #[test]
    fn test_valid_access_level() {
        for level in ["public", "authenticated", "team", "admin", "enterprise"] {
            assert!(valid_access_level(level).is_ok());
        }
        assert!(valid_access_level("superadmin").is_err());
        assert!(valid_access_level("").is_err());
    }

    #[test]
    fn test_valid_expires_in_days_boundaries() {
        assert!(valid_expires_in_days(1).is_ok());
        assert!(valid_expires_in_days(3650).is_ok());
        assert!(valid_expires_in_days(0).is_err());
        assert!(valid_expires_in_days(3651).is_err());
    }
}

