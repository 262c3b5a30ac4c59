//! Credential exchange with the PeerLink security token service (STS).
//!
//! Obtains, introspects and revokes bearer tokens, and manages dynamic client
//! registrations. Every call is a single HTTP exchange joined with an explicit
//! deadline; transport failures never escape as anything other than
//! [`AuthError::Unreachable`].
//!
//! The [`transport`] module holds the bounded-exchange plumbing shared with
//! `peerlink-session`.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{StsClient, StsConfig};
pub use error::AuthError;
pub use transport::{Exchange, TransportError};
