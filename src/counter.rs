//! The counter that keeps version 7 UUIDs strictly increasing.
//!
//! Each UUID takes a `(timestamp_ms, clock, sequence)` triple where `clock` is the 12-bit
//! sub-millisecond fraction of the timestamp and `sequence` a 14-bit counter. A newer
//! `(timestamp_ms, clock)` pair is adopted as is with a random sequence whose top bit is cleared
//! to leave room for increments. Otherwise the previous triple is incremented, carrying from the
//! sequence into the clock. When the clock is exhausted too, the caller has to wait for the next
//! millisecond.
//!
//! The previous triple is reused even if the new timestamp is smaller, as long as the rollback
//! stays within ten seconds. A larger rollback resets the counter and thus breaks the monotonic
//! order.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::debug;

const ROLLBACK_ALLOWANCE_MS: i64 = 10_000;
const MAX_CLOCK: u16 = 0x0fff;
const MAX_SEQUENCE: u16 = 0x3fff;

/// The ordered part of a version 7 UUID.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub(crate) struct CounterValue {
    pub timestamp_ms: i64,
    pub clock: u16,
    pub sequence: u16,
}

/// A version 7 counter, either owned by one generator or shared process-wide.
#[derive(Clone, Debug)]
pub(crate) struct MonotonicCounter {
    last: Arc<Mutex<Option<CounterValue>>>,
}

impl MonotonicCounter {
    pub(crate) fn local() -> Self {
        Self {
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns a handle to the process-wide counter.
    pub(crate) fn global() -> Self {
        static GLOBAL: OnceLock<MonotonicCounter> = OnceLock::new();
        GLOBAL.get_or_init(Self::local).clone()
    }

    /// Returns the next value for `candidate`, whose `sequence` holds random bits, or `None` if
    /// the counter is exhausted for the current millisecond.
    pub(crate) fn next(&self, candidate: CounterValue) -> Option<CounterValue> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let seeded = CounterValue {
            clock: candidate.clock & MAX_CLOCK,
            sequence: candidate.sequence & (MAX_SEQUENCE >> 1),
            ..candidate
        };
        let next = match *last {
            Some(prev) if (seeded.timestamp_ms, seeded.clock) <= (prev.timestamp_ms, prev.clock) => {
                if prev.timestamp_ms - seeded.timestamp_ms > ROLLBACK_ALLOWANCE_MS {
                    debug!(
                        from = prev.timestamp_ms,
                        to = seeded.timestamp_ms,
                        "clock went backwards; resetting the counter"
                    );
                    seeded
                } else if prev.sequence < MAX_SEQUENCE {
                    CounterValue {
                        sequence: prev.sequence + 1,
                        ..prev
                    }
                } else if prev.clock < MAX_CLOCK {
                    CounterValue {
                        clock: prev.clock + 1,
                        sequence: seeded.sequence,
                        ..prev
                    }
                } else {
                    return None;
                }
            }
            _ => seeded,
        };
        *last = Some(next);
        Some(next)
    }
}
