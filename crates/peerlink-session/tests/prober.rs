//! Liveness probing against in-process stand-in peers.

mod common;

use axum::http::StatusCode;
use common::{closed_port, spawn_peer, Echo, PeerBehaviour};
use peerlink_correlation::{ClockSeededCounter, Correlator};
use peerlink_session::{LivenessProber, PeerEndpoint, PROBE_READ_TIMEOUT};
use peerlink_types::{BearerToken, LivenessOutcome};
use std::time::{Duration, Instant};

fn token() -> BearerToken {
    BearerToken::new("probe-token", "client-1").unwrap()
}

fn prober() -> LivenessProber {
    LivenessProber::new(Correlator::default())
}

async fn probe_with(behaviour: PeerBehaviour) -> LivenessOutcome {
    let listener = spawn_peer(behaviour).await;
    let peer = PeerEndpoint::new("peer-1", &listener.base).unwrap();
    prober().probe(&peer, &token(), PROBE_READ_TIMEOUT).await
}

#[tokio::test]
async fn healthy_peer_is_alive() {
    assert_eq!(probe_with(PeerBehaviour::healthy()).await, LivenessOutcome::Alive);
}

#[tokio::test]
async fn peer_without_correlation_echo_is_alive() {
    let behaviour = PeerBehaviour {
        echo: Echo::Absent,
        ..PeerBehaviour::healthy()
    };
    assert_eq!(probe_with(behaviour).await, LivenessOutcome::Alive);
}

#[tokio::test]
async fn foreign_relates_to_is_addressing_mismatch_despite_success() {
    let behaviour = PeerBehaviour {
        echo: Echo::Foreign,
        ..PeerBehaviour::healthy()
    };
    assert_eq!(
        probe_with(behaviour).await,
        LivenessOutcome::AddressingMismatch
    );
}

#[tokio::test]
async fn foreign_relates_to_wins_over_failure_status() {
    let behaviour = PeerBehaviour {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        echo: Echo::Foreign,
        ..PeerBehaviour::healthy()
    };
    assert_eq!(
        probe_with(behaviour).await,
        LivenessOutcome::AddressingMismatch
    );
}

#[tokio::test]
async fn refusing_peer_is_unreachable() {
    let behaviour = PeerBehaviour {
        status: StatusCode::UNAUTHORIZED,
        ..PeerBehaviour::healthy()
    };
    assert_eq!(probe_with(behaviour).await, LivenessOutcome::Unreachable);
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let peer = PeerEndpoint::new("peer-1", &closed_port()).unwrap();
    let outcome = prober().probe(&peer, &token(), PROBE_READ_TIMEOUT).await;
    assert_eq!(outcome, LivenessOutcome::Unreachable);
}

#[tokio::test]
async fn silent_peer_times_out_within_deadline() {
    let listener = spawn_peer(PeerBehaviour::silent()).await;
    let peer = PeerEndpoint::new("peer-1", &listener.base).unwrap();

    let started = Instant::now();
    let outcome = prober().probe(&peer, &token(), PROBE_READ_TIMEOUT).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, LivenessOutcome::Timeout);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
}

#[tokio::test]
async fn concurrent_probes_take_the_slowest_not_the_sum() {
    let quick = spawn_peer(PeerBehaviour {
        delay: Duration::from_millis(100),
        ..PeerBehaviour::healthy()
    })
    .await;
    let silent = spawn_peer(PeerBehaviour::silent()).await;
    let peers = vec![
        PeerEndpoint::new("quick", &quick.base).unwrap(),
        PeerEndpoint::new("silent", &silent.base).unwrap(),
    ];

    let started = Instant::now();
    let outcomes = prober()
        .probe_all(&peers, &token(), Duration::from_millis(500))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(
        outcomes,
        vec![
            ("quick".to_string(), LivenessOutcome::Alive),
            ("silent".to_string(), LivenessOutcome::Timeout),
        ]
    );
    assert!(elapsed < Duration::from_millis(900), "{:?}", elapsed);
}

#[tokio::test]
async fn probe_carries_token_state_hash_and_injected_message_id() {
    let listener = spawn_peer(PeerBehaviour::healthy()).await;
    let peer = PeerEndpoint::new("peer-1", &listener.base).unwrap();
    let prober = LivenessProber::new(Correlator::new(ClockSeededCounter::starting_at(7)))
        .with_state_hash("abc123");

    prober.probe(&peer, &token(), PROBE_READ_TIMEOUT).await;
    prober.probe(&peer, &token(), PROBE_READ_TIMEOUT).await;

    let seen = listener.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].path, "/ping");
    assert_eq!(seen[0].message_id.as_deref(), Some("7"));
    assert_eq!(seen[1].message_id.as_deref(), Some("8"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer probe-token"));
    assert_eq!(seen[0].body, b"abc123");
}
