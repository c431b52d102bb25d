//! Sequence number generation.
//!
//! Every client call gets a fresh sequence number from an [`IdGenerator`].
//! The default [`Snowflake`] packs a millisecond timestamp, a worker id and
//! a per-millisecond counter:
//!
//! ```text
//! ┌───┬───────────────────────┬───────────┬──────────┐
//! │ 0 │ ms since epoch (41)   │ worker(10)│ seq (12) │
//! └───┴───────────────────────┴───────────┴──────────┘
//! ```

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of unique call sequence numbers.
pub trait IdGenerator: Send + Sync + 'static {
    /// Return an id never returned before by this generator.
    fn next_id(&self) -> i64;
}

/// Custom epoch (2020-01-01T00:00:00Z) in milliseconds.
const EPOCH_MS: u64 = 1_577_836_800_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

/// Largest accepted worker id.
pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: u64,
    sequence: u64,
}

/// Snowflake id generator.
#[derive(Debug)]
pub struct Snowflake {
    worker_id: u64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake {
    /// Create a generator for `worker_id` (masked to 10 bits).
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: u64::from(worker_id & MAX_WORKER_ID),
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .saturating_sub(EPOCH_MS)
    }
}

impl Default for Snowflake {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdGenerator for Snowflake {
    fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // A clock that moved backwards keeps the last timestamp.
        let mut now = Self::now_ms().max(state.last_ms);

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Counter exhausted for this millisecond; spin until the
                // clock ticks over.
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = Self::now_ms().max(state.last_ms);
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let id = (now << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;
        (id & i64::MAX as u64) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let gen = Snowflake::default();
        let mut last = gen.next_id();
        for _ in 0..10_000 {
            let id = gen.next_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_ids_are_positive() {
        let gen = Snowflake::new(MAX_WORKER_ID);
        for _ in 0..100 {
            assert!(gen.next_id() > 0);
        }
    }

    #[test]
    fn test_worker_id_encoded() {
        let gen = Snowflake::new(5);
        let id = gen.next_id() as u64;
        assert_eq!((id >> SEQUENCE_BITS) & u64::from(MAX_WORKER_ID), 5);
    }

    #[test]
    fn test_no_collisions_across_threads() {
        let gen = Arc::new(Snowflake::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..5_000).map(|_| gen.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 20_000);
    }

    #[test]
    fn test_exhausted_counter_moves_to_next_millisecond() {
        let gen = Snowflake::default();
        let ids: Vec<i64> = (0..3 * (MAX_SEQUENCE as usize + 1)).map(|_| gen.next_id()).collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        let first_ms = ids[0] as u64 >> (WORKER_BITS + SEQUENCE_BITS);
        let last_ms = *ids.last().unwrap() as u64 >> (WORKER_BITS + SEQUENCE_BITS);
        assert!(last_ms >= first_ms + 2);
    }
}
