//! Timestamp sources producing 100-nanosecond ticks since the Unix epoch.
//!
//! Every timestamp in this crate is an `i64` count of 100-nanosecond ticks relative to
//! 1970-01-01T00:00:00Z. Negative values denote instants before the Unix epoch, which the
//! Gregorian-based versions 1, 2 and 6 can still represent.

use std::sync::{atomic, Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat};
use tracing::debug;

/// Ticks per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 1582-10-15T00:00:00Z, the epoch of versions 1, 2 and 6.
pub const GREGORIAN_EPOCH: i64 = -122_192_928_000_000_000;

/// 1970-01-01T00:00:00Z, the epoch of version 7.
pub const UNIX_EPOCH_TICKS: i64 = 0;

/// 2020-01-01T00:00:00Z, the epoch of the example version 8 layout.
pub const EPOCH_2020: i64 = 15_778_368_000_000_000;

/// A source of the current time.
pub trait TimestampSource: Send + Sync {
    /// Returns the current time in ticks since the Unix epoch.
    fn now(&self) -> i64;
}

/// Converts a [`SystemTime`] into ticks, saturating at the `i64` range.
pub fn from_system_time(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => duration_ticks(d),
        Err(e) => -duration_ticks(e.duration()),
    }
}

/// Converts ticks back into a [`SystemTime`].
pub fn to_system_time(ticks: i64) -> SystemTime {
    let d = Duration::from_nanos(ticks.unsigned_abs().saturating_mul(100));
    if ticks >= 0 {
        UNIX_EPOCH + d
    } else {
        UNIX_EPOCH - d
    }
}

fn duration_ticks(d: Duration) -> i64 {
    i64::try_from(d.as_nanos() / 100).unwrap_or(i64::MAX)
}

/// Renders ticks as an RFC 3339 instant, falling back to the raw tick count.
pub(crate) fn display(ticks: i64) -> String {
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => format!("{ticks} ticks"),
    }
}

/// Returns the process-wide default timestamp source.
pub fn default_source() -> Arc<dyn TimestampSource> {
    static CLOCK: OnceLock<Arc<SystemClock>> = OnceLock::new();
    CLOCK.get_or_init(|| Arc::new(SystemClock::new())).clone()
}

/// A high-resolution clock driven by [`Instant`] and anchored to the wall clock.
///
/// The anchor is checked at most once per second and moved when the wall clock has drifted away
/// by a second or more, e.g. after the system time is adjusted.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    /// Wall-clock ticks at `origin`.
    base: atomic::AtomicI64,
    /// Elapsed ticks at the last drift check.
    checked: atomic::AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            base: atomic::AtomicI64::new(from_system_time(SystemTime::now())),
            checked: atomic::AtomicI64::new(0),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for SystemClock {
    fn now(&self) -> i64 {
        use atomic::Ordering::{AcqRel, Acquire, Relaxed};
        let elapsed = duration_ticks(self.origin.elapsed());
        let checked = self.checked.load(Acquire);
        if elapsed - checked >= TICKS_PER_SECOND
            && self
                .checked
                .compare_exchange(checked, elapsed, AcqRel, Relaxed)
                .is_ok()
        {
            let wall = from_system_time(SystemTime::now());
            let drift = wall - (self.base.load(Acquire) + elapsed);
            if drift.abs() >= TICKS_PER_SECOND {
                debug!(drift_ticks = drift, "re-synchronizing clock with the system time");
                self.base.store(wall - elapsed, atomic::Ordering::Release);
            }
        }
        self.base.load(Acquire) + elapsed
    }
}

/// A wall clock that adds one tick for every repeated reading.
///
/// Useful where the system clock is coarse; repeated readings within one clock tick still yield
/// distinct values.
#[derive(Debug, Default)]
pub struct IncrementalClock {
    state: Mutex<(i64, i64)>,
}

impl IncrementalClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&self, wall: i64) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (last, increment) = &mut *state;
        if wall == *last {
            *increment += 1;
        } else {
            *last = wall;
            *increment = 0;
        }
        wall.saturating_add(*increment)
    }
}

impl TimestampSource for IncrementalClock {
    fn now(&self) -> i64 {
        self.advance(from_system_time(SystemTime::now()))
    }
}

/// Adapts a closure returning [`SystemTime`] into a [`TimestampSource`].
pub struct FnClock<F>(pub F);

impl<F: Fn() -> SystemTime + Send + Sync> TimestampSource for FnClock<F> {
    fn now(&self) -> i64 {
        from_system_time((self.0)())
    }
}
