use crate::{ClockSeededCounter, IdSequence, MessageEnvelope, MessageId};
use std::sync::Arc;
use thiserror::Error;

/// A response named a different message in its `RelatesTo` header.
///
/// This is a protocol or addressing defect at the peer, never a transport
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message addressing error: sent {sent}, response relates to {relates_to}")]
pub struct AddressingError {
    pub sent: MessageId,
    pub relates_to: String,
}

/// Checks a response's `RelatesTo` back-reference against the id that was sent.
///
/// An absent back-reference is accepted: the peer simply did not echo
/// correlation.
///
/// # Errors
///
/// Returns [`AddressingError`] when `relates_to` is present and differs from
/// `sent`.
pub fn verify_correlation(sent: &MessageId, relates_to: Option<&str>) -> Result<(), AddressingError> {
    match relates_to {
        None => Ok(()),
        Some(echoed) if echoed == sent.as_str() => Ok(()),
        Some(echoed) => Err(AddressingError {
            sent: sent.clone(),
            relates_to: echoed.to_string(),
        }),
    }
}

/// Stamps outbound messages and verifies their responses.
///
/// Cloning is cheap and clones share the same sequence.
#[derive(Debug, Clone)]
pub struct Correlator {
    sequence: Arc<dyn IdSequence>,
}

impl Correlator {
    pub fn new(sequence: impl IdSequence + 'static) -> Self {
        Self {
            sequence: Arc::new(sequence),
        }
    }

    /// Builds a correlator around an already shared sequence.
    pub fn with_sequence(sequence: Arc<dyn IdSequence>) -> Self {
        Self { sequence }
    }

    pub fn new_message_id(&self) -> MessageId {
        self.sequence.next_id()
    }

    /// Creates the envelope for a new outbound message.
    pub fn envelope(&self, relates_to: Option<MessageId>) -> MessageEnvelope {
        MessageEnvelope::new(self.new_message_id(), relates_to)
    }

    /// Verifies a response against the envelope it answers.
    pub fn verify(
        &self,
        sent: &MessageEnvelope,
        relates_to: Option<&str>,
    ) -> Result<(), AddressingError> {
        verify_correlation(sent.message_id(), relates_to)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(ClockSeededCounter::new())
    }
}
