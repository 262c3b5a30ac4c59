//! Peer session lifecycle against an in-process stand-in authority.

mod common;

use common::{closed_port, spawn_authority, spawn_authority_with_reset_delay, INITIAL_TOKEN};
use peerlink_correlation::Correlator;
use peerlink_session::{LifecycleConfig, LifecycleError, PeerSessionClient, RESET_TIMEOUT};
use peerlink_types::{PeerRegistrationRequest, PeerSessionState, PeerUpdateRequest};
use std::time::{Duration, Instant};

fn client(base: &str) -> PeerSessionClient {
    PeerSessionClient::new(LifecycleConfig::new(base), Correlator::default()).unwrap()
}

fn registration() -> PeerRegistrationRequest {
    PeerRegistrationRequest {
        peer_name: "Peer One".to_string(),
        ping_uri: "http://peer-one.example/ping".to_string(),
        notification_uri: "http://peer-one.example/dpac".to_string(),
        capabilities: vec!["ping".to_string()],
    }
}

fn update_for(peer_id: &str, name: &str) -> PeerUpdateRequest {
    PeerUpdateRequest {
        peer_id: peer_id.to_string(),
        peer_name: name.to_string(),
        ping_uri: "http://peer-one.example/ping".to_string(),
        notification_uri: "http://peer-one.example/dpac".to_string(),
        capabilities: vec!["ping".to_string(), "dpac".to_string()],
    }
}

#[tokio::test]
async fn registration_token_is_scoped_to_the_peer() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);

    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();
    assert_ne!(record.registration_access_token, INITIAL_TOKEN);
    assert_eq!(
        sessions.session_state(&record.peer_id),
        PeerSessionState::Registered
    );

    let err = sessions
        .update(INITIAL_TOKEN, &record.peer_id, &update_for(&record.peer_id, "Renamed"))
        .await
        .unwrap_err();
    assert_eq!(err, LifecycleError::Unauthorized);

    let updated = sessions
        .update(
            &record.registration_access_token,
            &record.peer_id,
            &update_for(&record.peer_id, "Renamed"),
        )
        .await
        .unwrap();
    assert_eq!(updated.peer_name, "Renamed");
    assert_eq!(
        sessions.session_state(&record.peer_id),
        PeerSessionState::Updated
    );
}

#[tokio::test]
async fn another_peers_token_is_rejected_by_the_authority() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);

    let first = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();
    let second = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();

    let err = sessions
        .read(&second.registration_access_token, &first.peer_id)
        .await
        .unwrap_err();
    assert_eq!(err, LifecycleError::Unauthorized);
}

#[tokio::test]
async fn update_twice_converges() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();
    let token = &record.registration_access_token;
    let request = update_for(&record.peer_id, "Stable");

    let once = sessions.update(token, &record.peer_id, &request).await.unwrap();
    let twice = sessions.update(token, &record.peer_id, &request).await.unwrap();
    assert_eq!(once, twice);

    let read = sessions.read(token, &record.peer_id).await.unwrap();
    assert_eq!(read, twice);
}

#[tokio::test]
async fn read_of_unknown_peer_is_not_found() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);

    let err = sessions.read("reg-404", "peer-404").await.unwrap_err();
    assert_eq!(err, LifecycleError::NotFound("peer-404".to_string()));
}

#[tokio::test]
async fn register_with_wrong_initial_token_fails() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);

    let err = sessions
        .register("not-initial", &registration())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::RegistrationFailed(_)), "{:?}", err);
}

#[tokio::test]
async fn register_against_dead_authority_is_unreachable() {
    let sessions = client(&closed_port());
    let err = sessions
        .register(INITIAL_TOKEN, &registration())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Unreachable(_)), "{:?}", err);
}

#[tokio::test]
async fn malformed_registration_token_is_rejected_locally() {
    let sessions = client(&closed_port());
    let err = sessions.read("has space", "peer-1").await.unwrap_err();
    assert!(matches!(err, LifecycleError::MalformedCredential(_)), "{:?}", err);
}

#[tokio::test]
async fn reset_acknowledged_with_no_content() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();

    assert!(
        sessions
            .reset(&record.registration_access_token, &record.peer_id)
            .await
    );
    assert_eq!(sessions.session_state(&record.peer_id), PeerSessionState::Reset);
}

#[tokio::test]
async fn reset_against_silent_authority_is_false_within_deadline() {
    let authority = spawn_authority_with_reset_delay(Duration::from_secs(30)).await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();

    let started = Instant::now();
    let acknowledged = sessions
        .reset(&record.registration_access_token, &record.peer_id)
        .await;
    let elapsed = started.elapsed();

    assert!(!acknowledged);
    assert!(elapsed >= RESET_TIMEOUT - Duration::from_millis(50), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
    assert_eq!(
        sessions.session_state(&record.peer_id),
        PeerSessionState::Registered
    );
}

#[tokio::test]
async fn reset_with_wrong_token_is_false() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();

    assert!(!sessions.reset(INITIAL_TOKEN, &record.peer_id).await);
}

#[tokio::test]
async fn terminate_is_terminal() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();
    let token = &record.registration_access_token;

    assert!(sessions.terminate(token, &record.peer_id).await);
    assert!(!authority.has_peer(&record.peer_id));
    assert_eq!(
        sessions.session_state(&record.peer_id),
        PeerSessionState::Terminated
    );

    let err = sessions.read(token, &record.peer_id).await.unwrap_err();
    assert_eq!(err, LifecycleError::Terminated(record.peer_id.clone()));
    let err = sessions
        .update(token, &record.peer_id, &update_for(&record.peer_id, "Late"))
        .await
        .unwrap_err();
    assert_eq!(err, LifecycleError::Terminated(record.peer_id.clone()));
    assert!(!sessions.reset(token, &record.peer_id).await);
    assert!(!sessions.terminate(token, &record.peer_id).await);
}

#[tokio::test]
async fn overlapping_updates_for_one_peer_are_serialized() {
    let authority = spawn_authority().await;
    let sessions = client(&authority.base);
    let record = sessions.register(INITIAL_TOKEN, &registration()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let sessions = sessions.clone();
        let record = record.clone();
        handles.push(tokio::spawn(async move {
            sessions
                .update(
                    &record.registration_access_token,
                    &record.peer_id,
                    &update_for(&record.peer_id, &format!("Name {}", i)),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(authority.max_concurrent_updates(), 1);
}
