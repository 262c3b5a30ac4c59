//! Background tasks for the PeerLink server.
//!
//! Includes:
//! - Scheduled liveness probing of configured peers.

use crate::config::{ConfigError, ProbeCredentials, ProberConfig};
use peerlink_correlation::Correlator;
use peerlink_session::{LivenessProber, PeerEndpoint};
use peerlink_sts::{StsClient, StsConfig};
use peerlink_types::{BearerToken, LivenessOutcome, TokenRequest};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Everything one probe sweep needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ProbeSchedule {
    prober: LivenessProber,
    peers: Vec<PeerEndpoint>,
    credentials: CredentialSource,
    interval: Duration,
    timeout: Duration,
}

#[derive(Debug, Clone)]
enum CredentialSource {
    Static(BearerToken),
    Exchange {
        sts: StsClient,
        client_id: String,
        client_secret: String,
        scope: Option<String>,
    },
}

impl CredentialSource {
    async fn token(&self) -> Option<BearerToken> {
        match self {
            Self::Static(token) => Some(token.clone()),
            Self::Exchange {
                sts,
                client_id,
                client_secret,
                scope,
            } => {
                let request = TokenRequest::client_credentials(scope.clone());
                match sts.exchange_token(client_id, client_secret, &request).await {
                    Ok(token) => Some(token),
                    Err(e) => {
                        tracing::warn!(client_id = %client_id, "probe token exchange failed: {}", e);
                        None
                    }
                }
            }
        }
    }
}

impl ProbeSchedule {
    /// Resolves the `[prober]` section. Returns `None` when probing is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unusable peer or authority URLs and
    /// malformed static tokens.
    pub fn from_config(
        config: &ProberConfig,
        correlator: Correlator,
    ) -> Result<Option<Self>, ConfigError> {
        if config.interval_secs == 0 || config.peers.is_empty() {
            return Ok(None);
        }

        let credentials = match &config.credentials {
            None => {
                return Err(ConfigError::Invalid(
                    "prober.credentials is required when probing is enabled".to_string(),
                ))
            }
            Some(ProbeCredentials::Static { token }) => CredentialSource::Static(
                BearerToken::new(token.clone(), "static")
                    .map_err(|e| ConfigError::Invalid(format!("prober.credentials.token: {}", e)))?,
            ),
            Some(ProbeCredentials::Exchange {
                sts_url,
                client_id,
                client_secret,
                scope,
            }) => CredentialSource::Exchange {
                sts: StsClient::new(StsConfig::new(sts_url.clone())).map_err(|e| {
                    ConfigError::Invalid(format!("prober.credentials.sts_url: {}", e))
                })?,
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                scope: scope.clone(),
            },
        };

        let peers = config
            .peers
            .iter()
            .map(|target| {
                PeerEndpoint::new(target.peer_id.clone(), &target.base_url).map_err(|e| {
                    ConfigError::Invalid(format!("prober.peers[{}]: {}", target.peer_id, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let prober = LivenessProber::with_connect_timeout(
            correlator,
            Duration::from_millis(config.connect_timeout_ms),
        )
        .with_state_hash(config.state_hash.clone());

        Ok(Some(Self {
            prober,
            peers,
            credentials,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_millis(config.timeout_ms),
        }))
    }

    /// Runs one concurrent sweep over every peer.
    ///
    /// Returns an empty list when no token could be obtained.
    pub async fn sweep(&self) -> Vec<(String, LivenessOutcome)> {
        let Some(token) = self.credentials.token().await else {
            return Vec::new();
        };

        let outcomes = self.prober.probe_all(&self.peers, &token, self.timeout).await;
        for (peer_id, outcome) in &outcomes {
            if outcome.is_alive() {
                tracing::debug!(peer_id = %peer_id, outcome = %outcome, "peer liveness");
            } else {
                tracing::info!(peer_id = %peer_id, outcome = %outcome, "peer liveness");
            }
        }
        let alive = outcomes.iter().filter(|(_, o)| o.is_alive()).count();
        tracing::info!(alive, total = outcomes.len(), "liveness sweep complete");
        outcomes
    }
}

/// Starts the liveness probing task.
///
/// Sweeps every `interval` until `shutdown` turns true or its sender is dropped.
pub async fn start_probe_task(schedule: ProbeSchedule, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(
        peers = schedule.peers.len(),
        interval_secs = schedule.interval.as_secs(),
        timeout_ms = schedule.timeout.as_millis() as u64,
        "starting liveness probe task"
    );

    loop {
        tokio::select! {
            _ = sleep(schedule.interval) => {}
            _ = shutdown.wait_for(|stopping| *stopping) => {
                tracing::info!("liveness probe task stopped");
                return;
            }
        }

        schedule.sweep().await;
    }
}
