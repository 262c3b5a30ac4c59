use crate::MessageId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of message identifiers.
///
/// Implementations must be safe under concurrent calls: no two callers may
/// ever observe the same identifier.
pub trait IdSequence: Send + Sync + fmt::Debug {
    fn next_id(&self) -> MessageId;
}

/// Monotonic counter seeded from the wall clock (milliseconds since the epoch).
#[derive(Debug)]
pub struct ClockSeededCounter {
    next: AtomicU64,
}

impl ClockSeededCounter {
    /// Seeds the counter with the current wall-clock time.
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(seed_millis)
            .unwrap_or(0);
        Self::starting_at(seed)
    }

    /// Starts the counter at a fixed value. Useful for deterministic tests.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
pub(crate) fn seed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl Default for ClockSeededCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSequence for ClockSeededCounter {
    fn next_id(&self) -> MessageId {
        MessageId::new(self.next.fetch_add(1, Ordering::Relaxed).to_string())
    }
}

/// Random 128-bit identifiers (UUID v4).
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUuid;

impl IdSequence for RandomUuid {
    fn next_id(&self) -> MessageId {
        MessageId::new(uuid::Uuid::new_v4().to_string())
    }
}
