//! Error types for credential exchange.

use crate::transport::TransportError;
use peerlink_types::BearerHeaderError;

/// Errors that can occur while talking to the security token service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The authority rejected the client credentials (HTTP 401 or `invalid_client`).
    #[error("authority rejected the client credentials")]
    Unauthorized,

    /// The authority answered with an OAuth error payload.
    #[error("authority rejected the request: {0}")]
    Rejected(String),

    /// The authority could not be reached before the deadline.
    #[error("authority unreachable: {0}")]
    Unreachable(String),

    /// A credential was malformed and was not sent.
    #[error("malformed credential: {0}")]
    MalformedCredential(#[from] BearerHeaderError),

    /// The authority answered with something that is neither a success nor an error payload.
    #[error("unexpected authority response: {0}")]
    InvalidResponse(String),

    /// The configured authority URL is unusable.
    #[error("invalid authority endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidEndpoint(url) => AuthError::InvalidEndpoint(url),
            other => AuthError::Unreachable(other.to_string()),
        }
    }
}
