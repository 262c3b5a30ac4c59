//! Liveness probing of peer listeners.

use crate::correlated::{send_correlated, Reply};
use futures_util::future::join_all;
use peerlink_correlation::Correlator;
use peerlink_sts::transport::{endpoint, parse_base, TransportError};
use peerlink_types::{BearerToken, LivenessOutcome};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use std::time::{Duration, Instant};

/// Reference connect timeout for a probe.
pub const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Reference deadline for a complete probe response.
pub const PROBE_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A peer's listener, addressed by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    peer_id: String,
    base_url: Url,
}

impl PeerEndpoint {
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] if `base_url` cannot carry a path.
    pub fn new(peer_id: impl Into<String>, base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            peer_id: peer_id.into(),
            base_url: parse_base(base_url)?,
        })
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Sends `PUT /ping` to peers and classifies what comes back.
#[derive(Debug, Clone)]
pub struct LivenessProber {
    http: reqwest::Client,
    correlator: Correlator,
    state_hash: String,
}

impl LivenessProber {
    pub fn new(correlator: Correlator) -> Self {
        Self::with_connect_timeout(correlator, PROBE_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(correlator: Correlator, connect_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("probe http client build error, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            correlator,
            state_hash: String::new(),
        }
    }

    /// Sets the opaque state digest carried in each probe body.
    pub fn with_state_hash(mut self, state_hash: impl Into<String>) -> Self {
        self.state_hash = state_hash.into();
        self
    }

    /// Probes one peer. Never retries and never fails: every observation maps
    /// to a [`LivenessOutcome`].
    pub async fn probe(
        &self,
        peer: &PeerEndpoint,
        token: &BearerToken,
        timeout: Duration,
    ) -> LivenessOutcome {
        let url = match endpoint(&peer.base_url, &["ping"]) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(peer_id = %peer.peer_id, "probe not sent: {}", e);
                return LivenessOutcome::Unreachable;
            }
        };

        let call = self
            .http
            .put(url)
            .header(AUTHORIZATION, token.authorization())
            .header(CONTENT_TYPE, "text/plain")
            .body(self.state_hash.clone());

        let envelope = self.correlator.envelope(None);
        let started = Instant::now();
        let outcome = match send_correlated(&self.correlator, &envelope, call, timeout).await {
            Reply::Answered(reply) if reply.status.is_success() => LivenessOutcome::Alive,
            Reply::Answered(reply) => {
                tracing::debug!(
                    peer_id = %peer.peer_id,
                    status = reply.status.as_u16(),
                    "probe refused"
                );
                LivenessOutcome::Unreachable
            }
            Reply::Mismatch { error, status } => {
                tracing::warn!(
                    peer_id = %peer.peer_id,
                    status = status.as_u16(),
                    "{}",
                    error
                );
                LivenessOutcome::AddressingMismatch
            }
            Reply::Failed(TransportError::Timeout(_)) => LivenessOutcome::Timeout,
            Reply::Failed(e) => {
                tracing::debug!(peer_id = %peer.peer_id, "probe failed: {}", e);
                LivenessOutcome::Unreachable
            }
        };

        tracing::debug!(
            peer_id = %peer.peer_id,
            message_id = %envelope.message_id(),
            outcome = %outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe completed"
        );
        outcome
    }

    /// Probes every peer concurrently with the same token and deadline.
    ///
    /// Each probe runs independently, so one slow peer does not delay the
    /// others. Results come back in input order.
    pub async fn probe_all(
        &self,
        peers: &[PeerEndpoint],
        token: &BearerToken,
        timeout: Duration,
    ) -> Vec<(String, LivenessOutcome)> {
        let probes = peers.iter().map(|peer| async move {
            let outcome = self.probe(peer, token, timeout).await;
            (peer.peer_id.clone(), outcome)
        });
        join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_endpoint_rejects_unusable_url() {
        assert!(PeerEndpoint::new("p", "mailto:peer@example.com").is_err());
        assert!(PeerEndpoint::new("p", "not a url").is_err());
    }

    #[tokio::test]
    async fn probe_of_closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let peer = PeerEndpoint::new("p", &format!("http://{}", addr)).unwrap();
        let token = BearerToken::new("t", "c").unwrap();
        let outcome = LivenessProber::new(Correlator::default())
            .probe(&peer, &token, PROBE_READ_TIMEOUT)
            .await;
        assert_eq!(outcome, LivenessOutcome::Unreachable);
    }
}
