//! Peer session lifecycle and liveness probing for PeerLink.
//!
//! A client peer registers with the gateway authority, keeps its registration
//! record current, and probes peers for liveness. Every outbound call is a
//! single bounded exchange stamped with a fresh message identifier; any
//! `RelatesTo` echoed by the remote side is verified against it.
//!
//! Probe outcomes:
//!
//! | Observation | Probe outcome |
//! |-------------|---------------|
//! | no response before the deadline | `Timeout` |
//! | connection or transport failure | `Unreachable` |
//! | `RelatesTo` names another message | `AddressingMismatch` |
//! | success status, correlation ok | `Alive` |
//! | failure status, correlation ok | `Unreachable` |
//!
//! The prober never retries. Cadence belongs to whatever schedules it.

mod correlated;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod prober;

pub use error::LifecycleError;
pub use lifecycle::{LifecycleConfig, PeerSessionClient, RESET_TIMEOUT};
pub use notify::{DeliveryOutcome, StatusNotifier, NOTIFY_TIMEOUT};
pub use prober::{LivenessProber, PeerEndpoint, PROBE_CONNECT_TIMEOUT, PROBE_READ_TIMEOUT};
