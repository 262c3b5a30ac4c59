//! Status notifications to a peer's `/dpac` listener.

use crate::correlated::{send_correlated, Reply};
use crate::prober::PeerEndpoint;
use peerlink_correlation::Correlator;
use peerlink_sts::transport::{endpoint, TransportError};
use peerlink_types::{BearerToken, DpacStatus};
use reqwest::header::AUTHORIZATION;
use std::fmt;
use std::time::Duration;

/// Reference deadline for one notification.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of delivering one status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The listener accepted the notification with a success status.
    Delivered,
    /// The listener could not be reached.
    Unreachable,
    /// No response arrived before the deadline.
    Timeout,
    /// The listener answered a different message.
    AddressingMismatch,
    /// The listener answered with a failure status.
    Rejected(u16),
}

impl DeliveryOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("DELIVERED"),
            Self::Unreachable => f.write_str("UNREACHABLE"),
            Self::Timeout => f.write_str("TIMEOUT"),
            Self::AddressingMismatch => f.write_str("ADDRESSING_MISMATCH"),
            Self::Rejected(status) => write!(f, "REJECTED({})", status),
        }
    }
}

/// Delivers [`DpacStatus`] notifications with `PUT /dpac`.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    http: reqwest::Client,
    correlator: Correlator,
}

impl StatusNotifier {
    pub fn new(correlator: Correlator) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("notifier http client build error, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self { http, correlator }
    }

    /// Sends one notification within `timeout`. Never retries.
    pub async fn notify(
        &self,
        peer: &PeerEndpoint,
        token: &BearerToken,
        status: &DpacStatus,
        timeout: Duration,
    ) -> DeliveryOutcome {
        let url = match endpoint(peer.base_url(), &["dpac"]) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(peer_id = %peer.peer_id(), "notification not sent: {}", e);
                return DeliveryOutcome::Unreachable;
            }
        };

        let call = self
            .http
            .put(url)
            .header(AUTHORIZATION, token.authorization())
            .json(status);

        let envelope = self.correlator.envelope(None);
        let outcome = match send_correlated(&self.correlator, &envelope, call, timeout).await {
            Reply::Answered(reply) if reply.status.is_success() => DeliveryOutcome::Delivered,
            Reply::Answered(reply) => DeliveryOutcome::Rejected(reply.status.as_u16()),
            Reply::Mismatch { error, .. } => {
                tracing::warn!(peer_id = %peer.peer_id(), "{}", error);
                DeliveryOutcome::AddressingMismatch
            }
            Reply::Failed(TransportError::Timeout(_)) => DeliveryOutcome::Timeout,
            Reply::Failed(e) => {
                tracing::debug!(peer_id = %peer.peer_id(), "notification failed: {}", e);
                DeliveryOutcome::Unreachable
            }
        };

        tracing::info!(
            peer_id = %peer.peer_id(),
            dpa_id = %status.dpa_id,
            channel = %status.channel,
            active = status.active,
            message_id = %envelope.message_id(),
            outcome = %outcome,
            "status notification"
        );
        outcome
    }
}
