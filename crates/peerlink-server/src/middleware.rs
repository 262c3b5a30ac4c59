use axum::{body::Body, http::Request, middleware::Next, response::Response};
use peerlink_correlation::MessageId;
use peerlink_types::headers::{MESSAGE_ID, RELATES_TO};
use peerlink_types::{parse_bearer, BearerHeaderError};
use std::sync::Arc;

use crate::error::ListenerError;
use crate::AppState;

/// Addressing of an accepted inbound message, stored in request extensions.
#[derive(Clone, Debug)]
pub struct InboundEnvelope {
    pub message_id: MessageId,
    pub relates_to: Option<MessageId>,
}

/// Middleware guarding the peer listener endpoints.
///
/// Header syntax is checked before the token policy, so a malformed header
/// is always HTTP 400 and a well-formed but unaccepted token is HTTP 401.
pub async fn peer_auth_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ListenerError> {
    // 1. Authorization: strictly `Bearer <token>`
    let token = {
        let value = req
            .headers()
            .get("authorization")
            .ok_or(BearerHeaderError::Missing)?
            .to_str()
            .map_err(|_| BearerHeaderError::InvalidEncoding)?;
        parse_bearer(value)?.to_string()
    };

    // 2. Addressing headers
    let message_id = match optional_header(&req, MESSAGE_ID)? {
        Some(id) if !id.is_empty() => MessageId::new(id),
        _ => return Err(ListenerError::MissingMessageId),
    };
    let relates_to = optional_header(&req, RELATES_TO)?.map(MessageId::new);

    // 3. Token policy
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ListenerError::Internal("application state missing".to_string()))?
        .clone();
    state.token_policy.admit(&token).await?;

    req.extensions_mut().insert(InboundEnvelope {
        message_id,
        relates_to,
    });

    Ok(next.run(req).await)
}

fn optional_header(req: &Request<Body>, name: &'static str) -> Result<Option<String>, ListenerError> {
    req.headers()
        .get(name)
        .map(|v| {
            v.to_str()
                .map(|s| s.trim().to_string())
                .map_err(|_| ListenerError::UnreadableHeader(name))
        })
        .transpose()
}
