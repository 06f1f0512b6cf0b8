//! HTTP Basic authentication checks
//!
//! Static credential check in front of every `/api` route. Credentials come
//! from configuration. With none configured the gate stays shut unless it
//! was explicitly disabled.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. The axum middleware wrapping
//! them lives in the server crate.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

use crate::config::{AuthMode, Credentials};

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No `Authorization` header, or not a Basic one
    MissingCredentials,

    /// Header present but not decodable
    MalformedHeader(String),

    /// Decoded credentials do not match
    InvalidCredentials,
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredentials => write!(f, "Authentication required"),
            ApiAuthError::MalformedHeader(reason) => {
                write!(f, "Malformed authorization header: {}", reason)
            }
            ApiAuthError::InvalidCredentials => write!(f, "Invalid credentials"),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Header Parsing
// ========================================

/// Decode a `Basic <base64(user:pass)>` header value
///
/// The password may itself contain `:`; only the first colon separates.
///
/// # Examples
///
/// ```
/// use snailtrack_common::api::auth::parse_basic_header;
///
/// // "kid:shell" in base64
/// let (user, pass) = parse_basic_header("Basic a2lkOnNoZWxs").unwrap();
/// assert_eq!(user, "kid");
/// assert_eq!(pass, "shell");
/// ```
pub fn parse_basic_header(header: &str) -> Result<(String, String), ApiAuthError> {
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(ApiAuthError::MissingCredentials)?
        .trim();

    let decoded = BASE64
        .decode(encoded)
        .map_err(|e| ApiAuthError::MalformedHeader(format!("invalid base64: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| ApiAuthError::MalformedHeader("credentials are not UTF-8".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ApiAuthError::MalformedHeader("missing ':' separator".to_string()))?;

    Ok((username.to_string(), password.to_string()))
}

/// Encode credentials as a `Basic` header value
pub fn basic_header_value(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", username, password)))
}

// ========================================
// Credential Validation
// ========================================

/// Compare against the configured credentials.
///
/// Both sides are hashed first so the comparison runs over fixed-length
/// digests regardless of input length.
pub fn verify_credentials(expected: &Credentials, username: &str, password: &str) -> bool {
    let user_ok = digest(username) == digest(&expected.username);
    let pass_ok = digest(password) == digest(&expected.password);
    user_ok & pass_ok
}

/// Full gate check for one request
///
/// A locked gate has nothing to compare against, so any credentials that
/// parse are rejected as invalid.
pub fn check_authorization(header: Option<&str>, mode: &AuthMode) -> Result<(), ApiAuthError> {
    let expected = match mode {
        AuthMode::Disabled => return Ok(()),
        AuthMode::Basic(credentials) => Some(credentials),
        AuthMode::Locked => None,
    };

    let header = header.ok_or(ApiAuthError::MissingCredentials)?;
    let (username, password) = parse_basic_header(header)?;

    match expected {
        Some(expected) if verify_credentials(expected, &username, &password) => Ok(()),
        _ => Err(ApiAuthError::InvalidCredentials),
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
