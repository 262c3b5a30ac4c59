//! Listener error type mapping to HTTP status codes.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use peerlink_types::headers::EXCEPTION;
use peerlink_types::BearerHeaderError;
use thiserror::Error;

/// Errors a listener answers with instead of acknowledging a message.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The `Authorization` header is missing or not `Bearer <token>`.
    #[error("malformed authorization header: {0}")]
    MalformedAuthorization(#[from] BearerHeaderError),

    #[error("missing MessageID header")]
    MissingMessageId,

    /// A header is present but not visible ASCII.
    #[error("unreadable {0} header")]
    UnreadableHeader(&'static str),

    /// The bearer token was well formed but not accepted.
    #[error("bearer token not accepted")]
    InvalidToken,

    /// Token introspection could not be completed.
    #[error("token authority unavailable: {0}")]
    AuthorityUnavailable(String),

    /// The simulated processing delay was cut short by shutdown.
    #[error("processing interrupted")]
    Interrupted,

    /// Fault injection drew a forced failure.
    #[error("injected failure")]
    InjectedFailure,

    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ListenerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ListenerError::MalformedAuthorization(_)
            | ListenerError::MissingMessageId
            | ListenerError::UnreadableHeader(_) => StatusCode::BAD_REQUEST,
            ListenerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ListenerError::AuthorityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ListenerError::Interrupted
            | ListenerError::InjectedFailure
            | ListenerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status != StatusCode::BAD_REQUEST {
            return status.into_response();
        }

        // Client errors explain the defect in the `Exception` header.
        let explanation = HeaderValue::from_str(&self.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("malformed request"));
        (status, [(EXCEPTION, explanation)]).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_header_is_bad_request_with_exception() {
        let response =
            ListenerError::MalformedAuthorization(BearerHeaderError::UnsupportedScheme)
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let exception = response.headers().get(EXCEPTION).unwrap().to_str().unwrap();
        assert!(exception.starts_with("malformed authorization header"));
    }

    #[test]
    fn server_side_failures_carry_no_exception() {
        let response = ListenerError::Interrupted.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(EXCEPTION).is_none());

        let response = ListenerError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
