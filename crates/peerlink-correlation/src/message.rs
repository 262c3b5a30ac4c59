use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Opaque identifier of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Addressing properties of one outbound message.
///
/// Created fresh per call by a [`Correlator`](crate::Correlator) and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    message_id: MessageId,
    relates_to: Option<MessageId>,
    sent_at: SystemTime,
}

impl MessageEnvelope {
    pub(crate) fn new(message_id: MessageId, relates_to: Option<MessageId>) -> Self {
        Self {
            message_id,
            relates_to,
            sent_at: SystemTime::now(),
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// The prior message this one answers, if any.
    pub fn relates_to(&self) -> Option<&MessageId> {
        self.relates_to.as_ref()
    }

    pub fn sent_at(&self) -> SystemTime {
        self.sent_at
    }
}
