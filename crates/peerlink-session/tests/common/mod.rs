//! In-process stand-ins for the gateway authority and for peer listeners.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use peerlink_types::headers::{MESSAGE_ID, RELATES_TO};
use peerlink_types::{PeerRegistrationRequest, PeerSessionRecord, PeerUpdateRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const INITIAL_TOKEN: &str = "initial-1";

pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL of a port nothing listens on.
pub fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Response headers answering the request's `MessageID`.
fn echo(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    if let Some(id) = headers.get(MESSAGE_ID) {
        out.insert(RELATES_TO, id.clone());
    }
    out
}

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AuthorityState {
    peers: Mutex<HashMap<String, PeerSessionRecord>>,
    issued: AtomicU64,
    reset_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct Authority {
    pub base: String,
    state: Arc<AuthorityState>,
}

impl Authority {
    /// Highest number of `PUT /peer/{id}` calls observed in flight at once.
    pub fn max_concurrent_updates(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn has_peer(&self, peer_id: &str) -> bool {
        self.state.peers.lock().unwrap().contains_key(peer_id)
    }
}

pub async fn spawn_authority() -> Authority {
    spawn_authority_with_reset_delay(Duration::ZERO).await
}

pub async fn spawn_authority_with_reset_delay(reset_delay: Duration) -> Authority {
    let state = Arc::new(AuthorityState {
        reset_delay,
        ..Default::default()
    });
    let router = Router::new()
        .route("/peer", post(register))
        .route(
            "/peer/{id}",
            put(update).get(read).post(reset).delete(terminate),
        )
        .with_state(state.clone());
    Authority {
        base: spawn(router).await,
        state,
    }
}

fn authorized(
    state: &AuthorityState,
    headers: &HeaderMap,
    peer_id: &str,
) -> Result<PeerSessionRecord, StatusCode> {
    let peers = state.peers.lock().unwrap();
    let record = peers.get(peer_id).ok_or(StatusCode::NOT_FOUND)?;
    if bearer(headers) != Some(record.registration_access_token.as_str()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(record.clone())
}

async fn register(
    State(state): State<Arc<AuthorityState>>,
    headers: HeaderMap,
    Json(request): Json<PeerRegistrationRequest>,
) -> Response {
    if bearer(&headers) != Some(INITIAL_TOKEN) {
        return (StatusCode::UNAUTHORIZED, echo(&headers)).into_response();
    }
    let n = state.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let record = PeerSessionRecord {
        peer_id: format!("peer-{}", n),
        registration_access_token: format!("reg-{}", n),
        peer_name: request.peer_name,
        ping_uri: request.ping_uri,
        notification_uri: request.notification_uri,
        capabilities: request.capabilities,
        peer_id_issued_at: Some(1_700_000_000),
        registration_client_uri: None,
    };
    state
        .peers
        .lock()
        .unwrap()
        .insert(record.peer_id.clone(), record.clone());
    (StatusCode::CREATED, echo(&headers), Json(record)).into_response()
}

async fn read(
    State(state): State<Arc<AuthorityState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match authorized(&state, &headers, &id) {
        Ok(record) => (StatusCode::OK, echo(&headers), Json(record)).into_response(),
        Err(status) => (status, echo(&headers)).into_response(),
    }
}

async fn update(
    State(state): State<Arc<AuthorityState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PeerUpdateRequest>,
) -> Response {
    let mut record = match authorized(&state, &headers, &id) {
        Ok(record) => record,
        Err(status) => return (status, echo(&headers)).into_response(),
    };

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    record.peer_name = request.peer_name;
    record.ping_uri = request.ping_uri;
    record.notification_uri = request.notification_uri;
    record.capabilities = request.capabilities;
    state.peers.lock().unwrap().insert(id, record.clone());
    (StatusCode::OK, echo(&headers), Json(record)).into_response()
}

async fn reset(
    State(state): State<Arc<AuthorityState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = authorized(&state, &headers, &id) {
        return (status, echo(&headers)).into_response();
    }
    if body.as_ref() != b"{}" {
        return (StatusCode::BAD_REQUEST, echo(&headers)).into_response();
    }
    tokio::time::sleep(state.reset_delay).await;
    (StatusCode::NO_CONTENT, echo(&headers)).into_response()
}

async fn terminate(
    State(state): State<Arc<AuthorityState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(status) = authorized(&state, &headers, &id) {
        return (status, echo(&headers)).into_response();
    }
    state.peers.lock().unwrap().remove(&id);
    (StatusCode::NO_CONTENT, echo(&headers)).into_response()
}

// ---------------------------------------------------------------------------
// Peer listener
// ---------------------------------------------------------------------------

/// What a stand-in peer puts in `RelatesTo`.
#[derive(Debug, Clone, Copy)]
pub enum Echo {
    Matching,
    Foreign,
    Absent,
}

#[derive(Debug, Clone, Copy)]
pub struct PeerBehaviour {
    pub delay: Duration,
    pub status: StatusCode,
    pub echo: Echo,
}

impl PeerBehaviour {
    pub fn healthy() -> Self {
        Self {
            delay: Duration::ZERO,
            status: StatusCode::NO_CONTENT,
            echo: Echo::Matching,
        }
    }

    pub fn silent() -> Self {
        Self {
            delay: Duration::from_secs(30),
            ..Self::healthy()
        }
    }
}

/// One request as seen by a stand-in peer.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub message_id: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

struct PeerState {
    behaviour: PeerBehaviour,
    seen: Mutex<Vec<Seen>>,
}

pub struct PeerListener {
    pub base: String,
    state: Arc<PeerState>,
}

impl PeerListener {
    pub fn seen(&self) -> Vec<Seen> {
        self.state.seen.lock().unwrap().clone()
    }
}

pub async fn spawn_peer(behaviour: PeerBehaviour) -> PeerListener {
    let state = Arc::new(PeerState {
        behaviour,
        seen: Mutex::new(Vec::new()),
    });
    let router = Router::new()
        .route("/ping", put(answer_ping))
        .route("/dpac", put(answer_dpac))
        .with_state(state.clone());
    PeerListener {
        base: spawn(router).await,
        state,
    }
}

async fn answer_ping(State(peer): State<Arc<PeerState>>, headers: HeaderMap, body: Bytes) -> Response {
    answer(&peer, "/ping", headers, body).await
}

async fn answer_dpac(State(peer): State<Arc<PeerState>>, headers: HeaderMap, body: Bytes) -> Response {
    answer(&peer, "/dpac", headers, body).await
}

async fn answer(peer: &PeerState, path: &str, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    peer.seen.lock().unwrap().push(Seen {
        path: path.to_string(),
        message_id: header(MESSAGE_ID),
        authorization: header("authorization"),
        body: body.to_vec(),
    });

    tokio::time::sleep(peer.behaviour.delay).await;

    let mut out = HeaderMap::new();
    out.insert(MESSAGE_ID, "peer-echo-1".parse().unwrap());
    match peer.behaviour.echo {
        Echo::Matching => {
            if let Some(id) = headers.get(MESSAGE_ID) {
                out.insert(RELATES_TO, id.clone());
            }
        }
        Echo::Foreign => {
            out.insert(RELATES_TO, "someone-else".parse().unwrap());
        }
        Echo::Absent => {}
    }
    (peer.behaviour.status, out).into_response()
}
