use std::sync::{Arc, OnceLock};
use std::thread;

use super::{stamp, Generator};
use crate::components;
use crate::counter::{CounterValue, MonotonicCounter};
use crate::fields::Fields;
use crate::random;
use crate::timestamp::{self, TimestampSource, TICKS_PER_MILLISECOND};
use crate::{Result, Uuid, Variant, Version};

/// Generates version 7 UUIDs that increase monotonically.
///
/// The 12 bits after the version hold the sub-millisecond fraction of the timestamp and the 14
/// bits after the variant a counter seeded randomly each millisecond. The remaining 48 bits are
/// random. Generators created with `global = true` share one process-wide counter, so their
/// UUIDs are ordered across instances and threads.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::{Generator, UnixTimeBasedGenerator};
///
/// let g = UnixTimeBasedGenerator::new(false);
/// let a = g.new_uuid()?;
/// let b = g.new_uuid()?;
/// assert!(a < b);
/// # Ok::<(), guidgen::Error>(())
/// ```
pub struct UnixTimeBasedGenerator {
    timestamps: Arc<dyn TimestampSource>,
    counter: MonotonicCounter,
}

impl UnixTimeBasedGenerator {
    pub fn new(global: bool) -> Self {
        let counter = if global {
            MonotonicCounter::global()
        } else {
            MonotonicCounter::local()
        };
        Self::from_parts(timestamp::default_source(), counter)
    }

    pub(crate) fn from_parts(
        timestamps: Arc<dyn TimestampSource>,
        counter: MonotonicCounter,
    ) -> Self {
        Self {
            timestamps,
            counter,
        }
    }

    /// Returns the process-wide generator, which uses the process-wide counter.
    pub fn shared() -> &'static Self {
        static G: OnceLock<UnixTimeBasedGenerator> = OnceLock::new();
        G.get_or_init(|| Self::new(true))
    }

    fn next_value(&self, seed: u16) -> CounterValue {
        loop {
            let ticks = self.timestamps.now();
            let fraction = ticks.rem_euclid(TICKS_PER_MILLISECOND);
            let candidate = CounterValue {
                timestamp_ms: ticks.div_euclid(TICKS_PER_MILLISECOND),
                clock: ((fraction << 12) / TICKS_PER_MILLISECOND) as u16,
                sequence: seed,
            };
            match self.counter.next(candidate) {
                Some(value) => return value,
                None => thread::yield_now(),
            }
        }
    }
}

impl Generator for UnixTimeBasedGenerator {
    fn version(&self) -> Version {
        Version::V7
    }

    fn new_uuid(&self) -> Result<Uuid> {
        let mut uuid = Uuid::from(random::bytes::<16>());
        let seed = {
            let bytes = uuid.as_bytes();
            u16::from_be_bytes([bytes[8], bytes[9]])
        };
        let value = self.next_value(seed);
        components::of_version(Version::V7)
            .set_timestamp(&mut uuid, value.timestamp_ms * TICKS_PER_MILLISECOND)?;
        let bytes = uuid.bytes_mut();
        bytes.set_time_hi_and_version(value.clock, 0x0fff);
        bytes.set_clk_seq_hi_var((value.sequence >> 8) as u8, 0x3f);
        bytes.set_clk_seq_low(value.sequence as u8);
        stamp(&mut uuid, Version::V7, Variant::Rfc4122);
        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Mutex;

    const N_SAMPLES: usize = 100_000;

    struct Fixed(i64);

    impl TimestampSource for Fixed {
        fn now(&self) -> i64 {
            self.0
        }
    }

    /// Generates canonical string
    #[test]
    fn generates_canonical_string() {
        let pattern = r"^[0-9a-f]{8}-[0-9a-f]{4}-7[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$";
        let re = regex::Regex::new(pattern).unwrap();
        let g = UnixTimeBasedGenerator::new(false);
        for _ in 0..1_000 {
            assert!(re.is_match(&g.new_uuid().unwrap().to_string()));
        }
    }

    /// Generates increasing UUIDs
    #[test]
    fn generates_increasing_uuids() {
        let g = UnixTimeBasedGenerator::new(false);
        let mut prev = g.new_uuid().unwrap();
        for _ in 0..N_SAMPLES {
            let curr = g.new_uuid().unwrap();
            assert!(prev < curr);
            assert!(prev.to_string() < curr.to_string());
            prev = curr;
        }
    }

    /// Generates increasing UUIDs even with decreasing or constant timestamp
    #[test]
    fn generates_increasing_uuids_even_with_decreasing_or_constant_timestamp() {
        struct Backwards(Mutex<i64>);
        impl TimestampSource for Backwards {
            fn now(&self) -> i64 {
                let mut t = self.0.lock().unwrap();
                *t -= 3;
                *t
            }
        }

        let ts = 0x0123_4567_89ab * TICKS_PER_MILLISECOND;
        let g = UnixTimeBasedGenerator::from_parts(
            Arc::new(Backwards(Mutex::new(ts + 5_003))),
            MonotonicCounter::local(),
        );
        let mut prev = g.new_uuid().unwrap();
        assert_eq!(prev.timestamp(), Ok(ts));
        for _ in 0..N_SAMPLES {
            let curr = g.new_uuid().unwrap();
            assert!(prev < curr);
            prev = curr;
        }
    }

    /// Encodes the sub-millisecond fraction after the version
    #[test]
    fn encodes_the_sub_millisecond_fraction_after_the_version() {
        let ts = 1_700_000_000_000 * TICKS_PER_MILLISECOND + 5_000;
        let g = UnixTimeBasedGenerator::from_parts(Arc::new(Fixed(ts)), MonotonicCounter::local());
        let e = g.new_uuid().unwrap();
        assert_eq!(e.timestamp(), Ok(ts - 5_000));
        assert_eq!(e.as_bytes().time_hi_and_version(), 0x7800);
    }

    /// Fails on timestamps before the Unix epoch
    #[test]
    fn fails_on_timestamps_before_the_unix_epoch() {
        let g = UnixTimeBasedGenerator::from_parts(
            Arc::new(Fixed(-TICKS_PER_MILLISECOND)),
            MonotonicCounter::local(),
        );
        assert!(matches!(g.new_uuid(), Err(Error::ValueOutOfRange { .. })));
    }

    /// Orders UUIDs across threads sharing the global counter
    #[test]
    fn orders_uuids_across_threads_sharing_the_global_counter() {
        let results = Mutex::new(Vec::new());
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let g = UnixTimeBasedGenerator::new(true);
                    let local: Vec<Uuid> = (0..10_000).map(|_| g.new_uuid().unwrap()).collect();
                    for pair in local.windows(2) {
                        assert!(pair[0] < pair[1]);
                    }
                    results.lock().unwrap().extend(local);
                });
            }
        });
        let mut all = results.into_inner().unwrap();
        let n = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), n);
    }
}
