//! # Cross-Cutting Auth Helpers
//!
//! Everything that is genuinely specific to one credential modality (OAuth
//! state machine, API keys, browser sessions) lives in the gateway crate next
//! to the persistence and cache layers it depends on. This module only holds
//! what several of those engines share without pulling in gateway-specific
//! types: decoding a foreign-issued JWT for [UAI](crate) resolution.
//!
//! Password verification is out of scope (§1 non-goals) - credential checks
//! are delegated to an external identity provider - so there is no password
//! hashing module here.

pub mod jwt;

pub use jwt::{JwtClaims, JwtDecoder};
