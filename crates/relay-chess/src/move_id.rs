use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

const SEQUENCE_BITS: u32 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Identifier of an optimistic move.
///
/// Layout: upper 52 bits = milliseconds since the Unix epoch, lower 12 bits =
/// sequence. Ids from one generator are strictly increasing, so ordering by id
/// is insertion order.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveId(pub u64);

impl MoveId {
    /// Millisecond timestamp encoded in the id.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.0 >> SEQUENCE_BITS
    }

    /// Sequence within the millisecond.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.0 & SEQUENCE_MASK
    }
}

impl fmt::Display for MoveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "optimistic_{}_{}", self.timestamp_ms(), self.sequence())
    }
}

/// Lock-free move id generator.
///
/// Never hands out the same id twice. When the clock stalls or runs backward
/// the generator keeps counting from the last issued timestamp, and when a
/// millisecond's sequence is exhausted it borrows the next millisecond.
pub struct MoveIdGenerator {
    last: AtomicU64,
}

impl MoveIdGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    fn current_timestamp() -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }

    /// Generate the next unique id.
    pub fn next(&self) -> MoveId {
        loop {
            let now = Self::current_timestamp();
            let current = self.last.load(Ordering::Acquire);
            let last_ts = current >> SEQUENCE_BITS;
            let last_seq = current & SEQUENCE_MASK;

            let next = if now > last_ts {
                now << SEQUENCE_BITS
            } else if last_seq < SEQUENCE_MASK {
                (last_ts << SEQUENCE_BITS) | (last_seq + 1)
            } else {
                (last_ts + 1) << SEQUENCE_BITS
            };

            if self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return MoveId(next);
            }
        }
    }
}

impl Default for MoveIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
