use crate::api::{acknowledge, simulate};
use crate::error::ListenerError;
use crate::middleware::InboundEnvelope;
use crate::AppState;
use axum::{response::Response, Extension, Json};
use peerlink_types::DpacStatus;
use std::sync::Arc;

/// Handler for `PUT /dpac`.
pub async fn dpac_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(inbound): Extension<InboundEnvelope>,
    Json(status): Json<DpacStatus>,
) -> Result<Response, ListenerError> {
    tracing::info!(
        message_id = %inbound.message_id,
        dpa_id = %status.dpa_id,
        channel = %status.channel,
        active = status.active,
        timestamp = %status.timestamp,
        "dpac status received"
    );

    simulate(&state, &state.dpac_faults, "dpac", &inbound).await?;
    acknowledge(&state, &inbound)
}
