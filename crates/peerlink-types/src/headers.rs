//! Header names used by the peer message-addressing contract.
//!
//! HTTP header names are case-insensitive; these constants are the lowercase
//! canonical forms so they can be used with `HeaderName::from_static`. On the
//! wire they correspond to `MessageID`, `RelatesTo` and `Exception`.

/// Opaque identifier of the message carried by a request or response.
pub const MESSAGE_ID: &str = "messageid";

/// Back-reference to the `MessageID` a response answers.
pub const RELATES_TO: &str = "relatesto";

/// Human-readable explanation attached to HTTP 400 listener responses.
pub const EXCEPTION: &str = "exception";
