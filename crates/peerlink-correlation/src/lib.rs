//! Message correlation for PeerLink.
//!
//! Every outbound call is stamped with a fresh [`MessageId`]. Responses may
//! echo it back in a `RelatesTo` header; [`verify_correlation`] checks that
//! echo and reports a mismatch as an [`AddressingError`], a protocol defect at
//! the peer that is kept distinct from timeouts and transport failures.
//!
//! Identifiers come from an injected [`IdSequence`] owned by each
//! [`Correlator`] rather than a process-wide counter, so tests can supply
//! deterministic sequences.

mod correlator;
mod message;
mod sequence;

pub use correlator::{verify_correlation, AddressingError, Correlator};
pub use message::{MessageEnvelope, MessageId};
pub use sequence::{ClockSeededCounter, IdSequence, RandomUuid};
