//! Shared handler plumbing for the listener endpoints.

use crate::error::ListenerError;
use crate::fault::{FaultInjector, FaultOutcome};
use crate::middleware::InboundEnvelope;
use crate::AppState;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use peerlink_types::headers::{MESSAGE_ID, RELATES_TO};

/// Runs the endpoint's simulated processing.
pub(crate) async fn simulate(
    state: &AppState,
    faults: &FaultInjector,
    endpoint: &'static str,
    inbound: &InboundEnvelope,
) -> Result<(), ListenerError> {
    let mut shutdown = state.shutdown.clone();
    match faults.apply(&mut shutdown).await {
        FaultOutcome::Proceed => Ok(()),
        FaultOutcome::Fail => {
            tracing::info!(endpoint, message_id = %inbound.message_id, "injected failure");
            Err(ListenerError::InjectedFailure)
        }
        FaultOutcome::Interrupted => {
            tracing::info!(endpoint, message_id = %inbound.message_id, "processing interrupted by shutdown");
            Err(ListenerError::Interrupted)
        }
    }
}

/// HTTP 204 carrying a fresh `MessageId` and `RelatesTo` naming the inbound message.
pub(crate) fn acknowledge(state: &AppState, inbound: &InboundEnvelope) -> Result<Response, ListenerError> {
    let reply_id = state.correlator.new_message_id();
    let header = |value: &str| {
        HeaderValue::from_str(value).map_err(|e| ListenerError::Internal(e.to_string()))
    };

    let mut headers = HeaderMap::new();
    headers.insert(MESSAGE_ID, header(reply_id.as_str())?);
    headers.insert(RELATES_TO, header(inbound.message_id.as_str())?);
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}
