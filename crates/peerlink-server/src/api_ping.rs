use crate::api::{acknowledge, simulate};
use crate::error::ListenerError;
use crate::middleware::InboundEnvelope;
use crate::AppState;
use axum::{body::Bytes, response::Response, Extension};
use std::sync::Arc;

/// Handler for `PUT /ping`.
///
/// The body is the sender's opaque state digest; it is logged, never interpreted.
pub async fn ping_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(inbound): Extension<InboundEnvelope>,
    body: Bytes,
) -> Result<Response, ListenerError> {
    tracing::info!(
        message_id = %inbound.message_id,
        relates_to = ?inbound.relates_to.as_ref().map(|id| id.as_str()),
        state_hash = %String::from_utf8_lossy(&body),
        "ping received"
    );

    simulate(&state, &state.ping_faults, "ping", &inbound).await?;
    acknowledge(&state, &inbound)
}
