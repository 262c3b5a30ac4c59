//! Bounded single-exchange HTTP plumbing.
//!
//! A request is sent and its body fully read inside one deadline. When the
//! deadline passes the in-flight future is dropped, so a late completion is
//! discarded and the caller never waits longer than the budget. Nothing is
//! sent to the peer on abandonment.

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Exchange {
    /// Returns a header as a string, if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Failure to complete an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No complete response arrived before the deadline.
    #[error("no response within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange failed after connecting.
    #[error("transport failure: {0}")]
    Other(String),

    /// The endpoint URL could not be formed.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Sends `request` and reads the full response within `deadline`.
///
/// # Errors
///
/// Returns [`TransportError::Timeout`] when the deadline elapses and
/// [`TransportError::Connect`]/[`TransportError::Other`] for network failures.
pub async fn exchange(request: RequestBuilder, deadline: Duration) -> Result<Exchange, TransportError> {
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok::<_, reqwest::Error>(Exchange {
            status,
            headers,
            body,
        })
    };

    match tokio::time::timeout(deadline, call).await {
        Err(_) => Err(TransportError::Timeout(deadline)),
        Ok(Err(e)) => Err(classify(e, deadline)),
        Ok(Ok(exchange)) => Ok(exchange),
    }
}

fn classify(error: reqwest::Error, deadline: Duration) -> TransportError {
    // Connect errors (including connect timeouts) mean the peer was never reached.
    if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_timeout() {
        TransportError::Timeout(deadline)
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Parses a base URL that endpoint paths can be appended to.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] for unparseable URLs and for
/// URLs that cannot carry a path (e.g. `mailto:`).
pub fn parse_base(base: &str) -> Result<Url, TransportError> {
    let url = Url::parse(base.trim())
        .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", base, e)))?;
    if url.cannot_be_a_base() {
        return Err(TransportError::InvalidEndpoint(base.to_string()));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] if `base` cannot carry a path.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::InvalidEndpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
