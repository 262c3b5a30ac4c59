//! Shared types, wire payloads, and header helpers for PeerLink.
//!
//! This crate provides the foundational types used across all PeerLink
//! crates: the bearer credential handed out by the security token service,
//! the peer session record owned by the authority, liveness outcomes, the
//! OAuth payloads exchanged with the token service, and the explicit
//! `Authorization` header parser used by every listener.
//!
//! No crate in the workspace depends on anything *except* `peerlink-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

pub mod auth;
pub mod headers;
pub mod peer;
pub mod token;

pub use auth::{
    basic_authorization, bearer_authorization, parse_bearer, validate_token, BearerHeaderError,
    BearerToken,
};
pub use peer::{
    DpacStatus, PeerRegistrationRequest, PeerSessionRecord, PeerSessionState, PeerUpdateRequest,
};
pub use token::{
    Audience, ClientInformation, ClientRegistrationRequest, ClientUpdateRequest, OAuthErrorResponse,
    TokenIntrospectionRequest, TokenRequest, TokenResponse, TokenRevocationRequest, TokenStatus,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a single liveness probe against a peer.
///
/// Probing a peer that is down is an expected outcome, so every variant is a
/// first-class result rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LivenessOutcome {
    /// The peer answered with a success status and matching (or absent) correlation.
    Alive,
    /// The connection failed, or the peer answered but rejected the probe.
    Unreachable,
    /// No response arrived before the probe deadline.
    Timeout,
    /// The peer answered with a `RelatesTo` that names a different message.
    AddressingMismatch,
}

impl LivenessOutcome {
    /// Returns the string label for this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "ALIVE",
            Self::Unreachable => "UNREACHABLE",
            Self::Timeout => "TIMEOUT",
            Self::AddressingMismatch => "ADDRESSING_MISMATCH",
        }
    }

    /// Returns `true` only for [`LivenessOutcome::Alive`].
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }
}

impl fmt::Display for LivenessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
