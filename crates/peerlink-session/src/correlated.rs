//! Correlated exchange shared by probes, notifications and lifecycle calls.

use peerlink_correlation::{AddressingError, Correlator, MessageEnvelope};
use peerlink_sts::transport::{exchange, Exchange, TransportError};
use peerlink_types::headers::{MESSAGE_ID, RELATES_TO};
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;

/// What came back from one correlated exchange.
#[derive(Debug)]
pub(crate) enum Reply {
    /// A response arrived and its correlation matched or was absent.
    Answered(Exchange),
    /// A response arrived naming a different message.
    Mismatch {
        error: AddressingError,
        status: StatusCode,
    },
    /// No response: deadline, connection or transport failure.
    Failed(TransportError),
}

/// Stamps `request` with the envelope's addressing headers, sends it within
/// `deadline`, and verifies any `RelatesTo` on the response.
pub(crate) async fn send_correlated(
    correlator: &Correlator,
    envelope: &MessageEnvelope,
    request: RequestBuilder,
    deadline: Duration,
) -> Reply {
    let mut request = request.header(MESSAGE_ID, envelope.message_id().as_str());
    if let Some(prior) = envelope.relates_to() {
        request = request.header(RELATES_TO, prior.as_str());
    }

    let reply = match exchange(request, deadline).await {
        Ok(reply) => reply,
        Err(e) => return Reply::Failed(e),
    };

    // A present but unreadable back-reference still counts as present.
    let echoed = reply
        .headers
        .get(RELATES_TO)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    match correlator.verify(envelope, echoed.as_deref()) {
        Ok(()) => Reply::Answered(reply),
        Err(error) => Reply::Mismatch {
            error,
            status: reply.status,
        },
    }
}
