//! Error types for peer session lifecycle calls.

use peerlink_correlation::AddressingError;
use peerlink_sts::TransportError;
use peerlink_types::BearerHeaderError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a lifecycle call against the authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// `register` did not yield a well-formed registration record.
    #[error("peer registration failed: {0}")]
    RegistrationFailed(String),

    /// The authority could not be reached.
    #[error("authority unreachable: {0}")]
    Unreachable(String),

    /// No complete response arrived before the deadline.
    #[error("no response within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The authority has no record for the peer.
    #[error("peer not found: {0}")]
    NotFound(String),

    /// The authority refused the registration access token for this peer.
    #[error("registration access token rejected")]
    Unauthorized,

    /// The peer was terminated earlier; no further lifecycle call is valid.
    #[error("peer session terminated: {0}")]
    Terminated(String),

    /// The authority answered with a status this call does not expect.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// A success response carried an undecodable body.
    #[error("malformed registration record: {0}")]
    Malformed(String),

    /// A credential was malformed and was not sent.
    #[error("malformed credential: {0}")]
    MalformedCredential(#[from] BearerHeaderError),

    /// The response answered a different message.
    #[error(transparent)]
    Addressing(#[from] AddressingError),

    /// The configured authority URL is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<TransportError> for LifecycleError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(after) => LifecycleError::Timeout(after),
            TransportError::InvalidEndpoint(url) => LifecycleError::InvalidEndpoint(url),
            other => LifecycleError::Unreachable(other.to_string()),
        }
    }
}
