//! Peer session lifecycle against the gateway authority.
//!
//! `register` creates a record and yields its `registration_access_token`;
//! `read`, `update`, `reset` and `terminate` authenticate with that token.
//! Token-to-peer binding is enforced by the authority, not here.
//!
//! Calls for the same `peer_id` are serialized through a per-peer gate so
//! overlapping `update`/`reset`/`terminate` requests are never interleaved on
//! the wire. Waiting at the gate counts against the call's deadline.

use crate::correlated::{send_correlated, Reply};
use crate::error::LifecycleError;
use peerlink_correlation::Correlator;
use peerlink_sts::transport::{endpoint, parse_base};
use peerlink_types::{
    bearer_authorization, PeerRegistrationRequest, PeerSessionRecord, PeerSessionState,
    PeerUpdateRequest,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode, Url};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;

/// Reference deadline for `reset` (1/2 second).
pub const RESET_TIMEOUT: Duration = Duration::from_millis(500);

/// Default TCP connect timeout for lifecycle calls.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall deadline for `register`, `read`, `update` and `terminate`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`PeerSessionClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Base URL of the gateway authority, e.g. `https://gateway.example/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub reset_timeout: Duration,
}

impl LifecycleConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reset_timeout: RESET_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct PeerSlot {
    state: PeerSessionState,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl PeerSlot {
    fn new() -> Self {
        Self {
            state: PeerSessionState::Unregistered,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Client for the authority's `/peer` endpoints.
#[derive(Debug, Clone)]
pub struct PeerSessionClient {
    http: reqwest::Client,
    base: Url,
    correlator: Correlator,
    request_timeout: Duration,
    reset_timeout: Duration,
    /// Uses `std::sync::Mutex`: only held for brief map operations that never
    /// span an `.await`.
    peers: Arc<Mutex<PeerTable>>,
}

type PeerTable = HashMap<String, PeerSlot>;

/// Holds a peer's gate for the length of one call.
///
/// On release, a slot that never left `Unregistered` is dropped from the table
/// unless another call is queued on its gate.
struct Admission {
    peers: Arc<Mutex<PeerTable>>,
    peer_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        let mut table = lock_table(&self.peers);
        let idle = table.get(&self.peer_id).is_some_and(|slot| {
            // One reference in the table, one in our guard.
            slot.state == PeerSessionState::Unregistered && Arc::strong_count(&slot.gate) == 2
        });
        if idle {
            table.remove(&self.peer_id);
        }
    }
}

fn lock_table(peers: &Mutex<PeerTable>) -> MutexGuard<'_, PeerTable> {
    match peers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // Only plain map updates happen under this lock, so the data is still consistent.
            tracing::error!("peer session table lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl PeerSessionClient {
    /// Builds a lifecycle client for the authority at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidEndpoint`] if the base URL is unusable.
    pub fn new(config: LifecycleConfig, correlator: Correlator) -> Result<Self, LifecycleError> {
        let base = parse_base(&config.base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("lifecycle http client build error, using defaults: {}", e);
                reqwest::Client::new()
            });

        Ok(Self {
            http,
            base,
            correlator,
            request_timeout: config.request_timeout,
            reset_timeout: config.reset_timeout,
            peers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The last lifecycle state observed locally for `peer_id`.
    pub fn session_state(&self, peer_id: &str) -> PeerSessionState {
        self.table()
            .get(peer_id)
            .map(|slot| slot.state)
            .unwrap_or(PeerSessionState::Unregistered)
    }

    /// Registers a peer at `POST /peer`, authenticated by an initial access token.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RegistrationFailed`] for any non-success status or a
    /// body that is not a well-formed registration record.
    pub async fn register(
        &self,
        initial_access_token: &str,
        request: &PeerRegistrationRequest,
    ) -> Result<PeerSessionRecord, LifecycleError> {
        let authorization = bearer_authorization(initial_access_token)?;
        let url = endpoint(&self.base, &["peer"])?;
        let call = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .json(request);

        let envelope = self.correlator.envelope(None);
        let reply = match send_correlated(&self.correlator, &envelope, call, self.request_timeout)
            .await
        {
            Reply::Answered(reply) => reply,
            Reply::Mismatch { error, .. } => {
                tracing::warn!(message_id = %envelope.message_id(), "registration answered another message: {}", error);
                return Err(error.into());
            }
            Reply::Failed(e) => return Err(e.into()),
        };

        if !reply.status.is_success() {
            tracing::info!(
                status = reply.status.as_u16(),
                message_id = %envelope.message_id(),
                "peer registration refused"
            );
            return Err(LifecycleError::RegistrationFailed(format!(
                "HTTP {}",
                reply.status.as_u16()
            )));
        }

        let record: PeerSessionRecord = serde_json::from_slice(&reply.body).map_err(|e| {
            LifecycleError::RegistrationFailed(format!("malformed registration record: {}", e))
        })?;

        if record.registration_access_token == initial_access_token {
            tracing::warn!(
                peer_id = %record.peer_id,
                "authority issued the initial access token as the registration access token"
            );
        }

        self.set_state(&record.peer_id, PeerSessionState::Registered);
        tracing::info!(peer_id = %record.peer_id, "peer registered");
        Ok(record)
    }

    /// Replaces the peer's registration metadata at `PUT /peer/{id}`.
    pub async fn update(
        &self,
        registration_access_token: &str,
        peer_id: &str,
        request: &PeerUpdateRequest,
    ) -> Result<PeerSessionRecord, LifecycleError> {
        let authorization = bearer_authorization(registration_access_token)?;
        let url = endpoint(&self.base, &["peer", peer_id])?;
        let call = self
            .http
            .put(url)
            .header(AUTHORIZATION, authorization)
            .json(request);

        self.record_call(peer_id, call, Some(PeerSessionState::Updated))
            .await
    }

    /// Reads the peer's registration record at `GET /peer/{id}`.
    pub async fn read(
        &self,
        registration_access_token: &str,
        peer_id: &str,
    ) -> Result<PeerSessionRecord, LifecycleError> {
        let authorization = bearer_authorization(registration_access_token)?;
        let url = endpoint(&self.base, &["peer", peer_id])?;
        let call = self.http.get(url).header(AUTHORIZATION, authorization);

        self.record_call(peer_id, call, None).await
    }

    /// Soft-resets the peering session at `POST /peer/{id}` with body `{}`.
    ///
    /// Returns `true` only for an empty HTTP 204 within the reset deadline.
    /// Any other outcome is logged and reported as `false`; a lost reset can
    /// be retried later.
    pub async fn reset(&self, registration_access_token: &str, peer_id: &str) -> bool {
        let call = bearer_authorization(registration_access_token)
            .map_err(LifecycleError::from)
            .and_then(|authorization| {
                let url = endpoint(&self.base, &["peer", peer_id])?;
                Ok(self
                    .http
                    .post(url)
                    .header(AUTHORIZATION, authorization)
                    .header(CONTENT_TYPE, "application/json")
                    .body("{}"))
            });

        self.acknowledged("reset", peer_id, call, self.reset_timeout, PeerSessionState::Reset)
            .await
    }

    /// Terminates the peer's registration at `DELETE /peer/{id}`.
    ///
    /// Returns `true` only for HTTP 204. After a successful termination every
    /// further lifecycle call for `peer_id` fails locally with
    /// [`LifecycleError::Terminated`].
    pub async fn terminate(&self, registration_access_token: &str, peer_id: &str) -> bool {
        let call = bearer_authorization(registration_access_token)
            .map_err(LifecycleError::from)
            .and_then(|authorization| {
                let url = endpoint(&self.base, &["peer", peer_id])?;
                Ok(self.http.delete(url).header(AUTHORIZATION, authorization))
            });

        self.acknowledged(
            "terminate",
            peer_id,
            call,
            self.request_timeout,
            PeerSessionState::Terminated,
        )
        .await
    }

    async fn record_call(
        &self,
        peer_id: &str,
        call: RequestBuilder,
        next: Option<PeerSessionState>,
    ) -> Result<PeerSessionRecord, LifecycleError> {
        let (_gate, remaining) = self.admit(peer_id, self.request_timeout).await?;

        let envelope = self.correlator.envelope(None);
        let reply = match send_correlated(&self.correlator, &envelope, call, remaining).await {
            Reply::Answered(reply) => reply,
            Reply::Mismatch { error, .. } => {
                tracing::warn!(peer_id, "lifecycle response answered another message: {}", error);
                return Err(error.into());
            }
            Reply::Failed(e) => return Err(e.into()),
        };

        match reply.status {
            status if status.is_success() => {
                let record: PeerSessionRecord = serde_json::from_slice(&reply.body)
                    .map_err(|e| LifecycleError::Malformed(e.to_string()))?;
                if let Some(state) = next {
                    self.set_state(peer_id, state);
                }
                Ok(record)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LifecycleError::Unauthorized),
            StatusCode::NOT_FOUND => Err(LifecycleError::NotFound(peer_id.to_string())),
            other => Err(LifecycleError::UnexpectedStatus(other.as_u16())),
        }
    }

    async fn acknowledged(
        &self,
        operation: &'static str,
        peer_id: &str,
        call: Result<RequestBuilder, LifecycleError>,
        deadline: Duration,
        next: PeerSessionState,
    ) -> bool {
        let call = match call {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(operation, peer_id, "peer {} not sent: {}", operation, e);
                return false;
            }
        };

        let (_gate, remaining) = match self.admit(peer_id, deadline).await {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::info!(operation, peer_id, "peer {} not sent: {}", operation, e);
                return false;
            }
        };

        let envelope = self.correlator.envelope(None);
        match send_correlated(&self.correlator, &envelope, call, remaining).await {
            Reply::Answered(reply) if reply.status == StatusCode::NO_CONTENT && reply.body.is_empty() => {
                self.set_state(peer_id, next);
                tracing::info!(operation, peer_id, message_id = %envelope.message_id(), "peer {} acknowledged", operation);
                true
            }
            Reply::Answered(reply) => {
                tracing::info!(
                    operation,
                    peer_id,
                    status = reply.status.as_u16(),
                    body_len = reply.body.len(),
                    "peer {} not acknowledged",
                    operation
                );
                false
            }
            Reply::Mismatch { error, status } => {
                tracing::warn!(
                    operation,
                    peer_id,
                    status = status.as_u16(),
                    "peer {} answered another message: {}",
                    operation,
                    error
                );
                false
            }
            Reply::Failed(e) => {
                tracing::info!(operation, peer_id, "peer {} failed: {}", operation, e);
                false
            }
        }
    }

    /// Waits for the peer's gate within `deadline` and rejects terminated peers.
    ///
    /// Returns the held gate and the part of `deadline` still left.
    async fn admit(
        &self,
        peer_id: &str,
        deadline: Duration,
    ) -> Result<(Admission, Duration), LifecycleError> {
        let started = Instant::now();
        let gate = self
            .table()
            .entry(peer_id.to_string())
            .or_insert_with(PeerSlot::new)
            .gate
            .clone();

        let guard = tokio::time::timeout(deadline, gate.lock_owned())
            .await
            .map_err(|_| LifecycleError::Timeout(deadline))?;
        let admission = Admission {
            peers: Arc::clone(&self.peers),
            peer_id: peer_id.to_string(),
            _guard: guard,
        };

        if !self.session_state(peer_id).accepts_calls() {
            return Err(LifecycleError::Terminated(peer_id.to_string()));
        }

        Ok((admission, deadline.saturating_sub(started.elapsed())))
    }

    fn set_state(&self, peer_id: &str, state: PeerSessionState) {
        self.table()
            .entry(peer_id.to_string())
            .or_insert_with(PeerSlot::new)
            .state = state;
    }

    fn table(&self) -> MutexGuard<'_, PeerTable> {
        lock_table(&self.peers)
    }
}
