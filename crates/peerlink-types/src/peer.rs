//! Peer session payloads exchanged with the authority and between peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /peer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRegistrationRequest {
    /// Human-readable name of the registering peer.
    pub peer_name: String,
    /// Listener URI that accepts `PUT /ping`.
    pub ping_uri: String,
    /// Listener URI that accepts status notifications (`PUT /dpac`).
    pub notification_uri: String,
    /// Capabilities the peer offers.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Request body for `PUT /peer/{id}`.
///
/// The update replaces the stored metadata as a whole, so sending the same
/// request twice converges to the same stored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerUpdateRequest {
    pub peer_id: String,
    pub peer_name: String,
    pub ping_uri: String,
    pub notification_uri: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Registration record held by the authority for one peer.
///
/// The `registration_access_token` authenticates lifecycle calls against this
/// record only and must never be reused for another peer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSessionRecord {
    pub peer_id: String,
    pub registration_access_token: String,
    pub peer_name: String,
    pub ping_uri: String,
    pub notification_uri: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Seconds since the epoch at which the authority issued `peer_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id_issued_at: Option<i64>,
    /// Fully qualified configuration endpoint for this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_client_uri: Option<String>,
}

impl fmt::Debug for PeerSessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSessionRecord")
            .field("peer_id", &self.peer_id)
            .field("registration_access_token", &"[REDACTED]")
            .field("peer_name", &self.peer_name)
            .field("ping_uri", &self.ping_uri)
            .field("notification_uri", &self.notification_uri)
            .field("capabilities", &self.capabilities)
            .field("peer_id_issued_at", &self.peer_id_issued_at)
            .field("registration_client_uri", &self.registration_client_uri)
            .finish()
    }
}

/// Locally observed lifecycle state of a peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerSessionState {
    Unregistered,
    Registered,
    Updated,
    Reset,
    /// Terminal: no further lifecycle call is valid.
    Terminated,
}

impl PeerSessionState {
    /// Whether lifecycle calls may still be issued for the peer.
    pub fn accepts_calls(self) -> bool {
        !matches!(self, Self::Terminated)
    }

    /// Returns the string label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unregistered => "UNREGISTERED",
            Self::Registered => "REGISTERED",
            Self::Updated => "UPDATED",
            Self::Reset => "RESET",
            Self::Terminated => "TERMINATED",
        }
    }
}

/// Status notification delivered to a peer's `/dpac` listener.
///
/// Reports the activation state of one protection area and channel pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpacStatus {
    pub dpa_id: String,
    pub channel: String,
    pub active: bool,
    /// RFC 3339 timestamp of the state change.
    pub timestamp: String,
}
