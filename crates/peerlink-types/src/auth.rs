//! Bearer and Basic credential handling.
//!
//! Outbound calls build their `Authorization` values here, and every listener
//! parses inbound values with [`parse_bearer`]. Malformed credentials are
//! rejected locally and never reach the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced when a bearer credential or `Authorization` header is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BearerHeaderError {
    /// No `Authorization` header was supplied.
    #[error("missing Authorization header")]
    Missing,

    /// The header value is not valid visible ASCII.
    #[error("Authorization header is not valid visible ASCII")]
    InvalidEncoding,

    /// The scheme is something other than `Bearer`.
    #[error("Authorization scheme must be Bearer")]
    UnsupportedScheme,

    /// The scheme and token are not separated by exactly one whitespace character.
    #[error("Authorization header must have the form `Bearer <token>`")]
    InvalidSeparator,

    /// The token part is empty.
    #[error("bearer token is empty")]
    EmptyToken,

    /// The token contains whitespace or non-printable characters.
    #[error("bearer token contains invalid characters")]
    InvalidToken,
}

/// Checks that `token` can be carried as `Bearer <token>`.
///
/// # Errors
///
/// Returns [`BearerHeaderError::EmptyToken`] for an empty token and
/// [`BearerHeaderError::InvalidToken`] when it contains anything other than
/// visible ASCII.
pub fn validate_token(token: &str) -> Result<(), BearerHeaderError> {
    if token.is_empty() {
        return Err(BearerHeaderError::EmptyToken);
    }
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(BearerHeaderError::InvalidToken);
    }
    Ok(())
}

/// Builds the `Authorization` value `Bearer <token>`.
///
/// # Errors
///
/// Fails when the token would produce a malformed header.
pub fn bearer_authorization(token: &str) -> Result<String, BearerHeaderError> {
    validate_token(token)?;
    Ok(format!("Bearer {}", token))
}

/// Builds the `Authorization` value `Basic base64(client_id:client_secret)`.
pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
    let credentials = format!("{}:{}", client_id, client_secret);
    format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
}

/// Parses an `Authorization` header value of the form `Bearer <token>`.
///
/// The scheme is matched case-insensitively and must be followed by exactly
/// one whitespace character and a non-empty token without further whitespace.
///
/// # Errors
///
/// Returns the specific [`BearerHeaderError`] describing the defect.
pub fn parse_bearer(value: &str) -> Result<&str, BearerHeaderError> {
    if !value.is_ascii() {
        return Err(BearerHeaderError::InvalidEncoding);
    }

    let (scheme, rest) = match value.find(|c: char| c.is_ascii_whitespace()) {
        Some(idx) => (&value[..idx], &value[idx..]),
        None => (value, ""),
    };

    if scheme.is_empty() {
        return Err(BearerHeaderError::InvalidSeparator);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(BearerHeaderError::UnsupportedScheme);
    }

    // `rest` starts with the separator (one ASCII byte) when present.
    let token = rest.get(1..).unwrap_or("");
    if token.is_empty() {
        return Err(BearerHeaderError::EmptyToken);
    }
    if token.starts_with(|c: char| c.is_ascii_whitespace()) {
        return Err(BearerHeaderError::InvalidSeparator);
    }

    validate_token(token)?;
    Ok(token)
}

/// An opaque access token issued by the security token service.
///
/// Expiry is implicit and not tracked locally. The token is borrowed by
/// callers for each outbound call and never persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
    token: String,
    client_id: String,
}

impl BearerToken {
    /// Wraps a raw token issued to `client_id`.
    ///
    /// # Errors
    ///
    /// Fails when the token cannot be carried in a `Bearer` header.
    pub fn new(
        token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, BearerHeaderError> {
        let token = token.into();
        validate_token(&token)?;
        Ok(Self {
            token,
            client_id: client_id.into(),
        })
    }

    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// The client identity this token authenticates.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The `Authorization` header value for this token.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .finish()
    }
}
