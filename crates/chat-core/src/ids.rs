//! Id generation
//!
//! Ids are 64-bit, unique and monotonically increasing. The snowflake layout is
//! 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of node id and 12 bits of
//! per-millisecond sequence.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use crate::traits::Id;

/// 2024-01-01T00:00:00Z
pub const EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;

/// Source of new entity ids
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Id;
}

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: i64,
    sequence: i64,
}

/// Time-ordered id generator
#[derive(Debug)]
pub struct SnowflakeIdGenerator {
    node: i64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
    /// Create a generator for the given node; node ids are masked to 10 bits
    pub fn new(node: u16) -> Self {
        Self {
            node: i64::from(node & MAX_NODE),
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis() - EPOCH_MS
    }
}

impl Default for SnowflakeIdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdGenerator for SnowflakeIdGenerator {
    fn next_id(&self) -> Id {
        let mut state = self.state.lock();
        let now = Self::now_ms();

        // A clock that goes backwards keeps issuing ids from the last seen millisecond.
        if now > state.last_ms {
            state.last_ms = now;
            state.sequence = 0;
        } else {
            state.sequence += 1;
            if state.sequence > MAX_SEQUENCE {
                state.last_ms += 1;
                state.sequence = 0;
            }
        }

        (state.last_ms << (NODE_BITS + SEQUENCE_BITS))
            | (self.node << SEQUENCE_BITS)
            | state.sequence
    }
}

/// Counter-based generator for tests and single-process tools
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn new(start: Id) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Id {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_ids_increase() {
        let generator = SnowflakeIdGenerator::new(7);
        let mut last = 0;
        for _ in 0..10_000 {
            let id = generator.next_id();
            assert!(id > last, "{} is not greater than {}", id, last);
            last = id;
        }
    }

    #[test]
    fn test_snowflake_node_bits() {
        let generator = SnowflakeIdGenerator::new(5);
        let id = generator.next_id();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_NODE), 5);
    }

    #[test]
    fn test_sequential_ids() {
        let generator = SequentialIdGenerator::new(100);
        assert_eq!(generator.next_id(), 100);
        assert_eq!(generator.next_id(), 101);
    }
}
