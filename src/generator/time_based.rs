use std::sync::{Arc, OnceLock};

use super::{stamp, Generator};
use crate::components;
use crate::node_id::{NodeIdProvider, NodeIdSource, PhysicalAddress};
use crate::random;
use crate::state::{ClockDomain, GeneratorState, NodeKind};
use crate::timestamp::{self, TimestampSource};
use crate::{Error, Result, Uuid, Variant, Version};

/// Generates version 1 and version 6 UUIDs.
///
/// The clock sequence is advanced through a [`GeneratorState`] so that UUIDs stay unique when
/// the clock stands still, goes backwards or the node id changes. Generators using the MAC
/// address share one clock domain; generators using random node ids share the other.
///
/// A version 6 generator created with [`NodeIdSource::None`] fills the node field with fresh
/// random bytes on every call while keeping the timestamp and clock sequence ordered.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::{Generator, TimeBasedGenerator};
/// use guidgen::{GeneratorState, NodeIdSource, Version};
/// use std::sync::Arc;
///
/// let state = Arc::new(GeneratorState::new());
/// let g = TimeBasedGenerator::new(Version::V6, NodeIdSource::VolatileRandom, state)?;
/// let a = g.new_uuid()?;
/// let b = g.new_uuid()?;
/// assert!(a.timestamp()? <= b.timestamp()?);
/// # Ok::<(), guidgen::Error>(())
/// ```
pub struct TimeBasedGenerator {
    version: Version,
    timestamps: Arc<dyn TimestampSource>,
    node_ids: Option<NodeIdProvider>,
    clock: ClockDomain,
}

impl TimeBasedGenerator {
    /// Creates a generator of `version` (1 or 6) bound to `state`.
    pub fn new(
        version: Version,
        node_source: NodeIdSource,
        state: Arc<GeneratorState>,
    ) -> Result<Self> {
        let node_ids = NodeIdProvider::from_source(node_source, &state);
        let kind = node_ids.as_ref().map_or(NodeKind::Random, NodeIdProvider::kind);
        Self::from_parts(
            version,
            timestamp::default_source(),
            node_ids,
            ClockDomain::Shared(state, kind),
        )
    }

    pub(crate) fn from_parts(
        version: Version,
        timestamps: Arc<dyn TimestampSource>,
        node_ids: Option<NodeIdProvider>,
        clock: ClockDomain,
    ) -> Result<Self> {
        match (version, &node_ids) {
            (Version::V1, None) => Err(Error::NotSupported("version 1 requires a node id")),
            (Version::V1 | Version::V6, _) => Ok(Self {
                version,
                timestamps,
                node_ids,
                clock,
            }),
            _ => Err(Error::NotSupported("time-based generation of this version")),
        }
    }

    /// Returns the process-wide version 1 generator using the MAC address.
    pub fn version1() -> &'static Self {
        static G: OnceLock<TimeBasedGenerator> = OnceLock::new();
        G.get_or_init(|| {
            Self::with_global_state(Version::V1, NodeIdProvider::Physical(PhysicalAddress::system()))
        })
    }

    /// Returns the process-wide version 1 generator using the persisted random node id.
    pub fn version1_random() -> &'static Self {
        static G: OnceLock<TimeBasedGenerator> = OnceLock::new();
        G.get_or_init(|| {
            let state = GeneratorState::global().clone();
            Self::with_global_state(Version::V1, NodeIdProvider::NonVolatile(state))
        })
    }

    /// Returns the process-wide version 6 generator using the MAC address.
    pub fn version6() -> &'static Self {
        static G: OnceLock<TimeBasedGenerator> = OnceLock::new();
        G.get_or_init(|| {
            Self::with_global_state(Version::V6, NodeIdProvider::Physical(PhysicalAddress::system()))
        })
    }

    /// Returns the process-wide version 6 generator with per-call random node bytes.
    pub fn version6_randomized() -> &'static Self {
        static G: OnceLock<TimeBasedGenerator> = OnceLock::new();
        G.get_or_init(|| Self {
            version: Version::V6,
            timestamps: timestamp::default_source(),
            node_ids: None,
            clock: ClockDomain::Shared(GeneratorState::global().clone(), NodeKind::Random),
        })
    }

    pub(crate) fn with_global_state(version: Version, node_ids: NodeIdProvider) -> Self {
        let kind = node_ids.kind();
        Self {
            version,
            timestamps: timestamp::default_source(),
            node_ids: Some(node_ids),
            clock: ClockDomain::Shared(GeneratorState::global().clone(), kind),
        }
    }

    /// Returns `true` if the node field is randomized on every call.
    pub fn is_randomized(&self) -> bool {
        self.node_ids.is_none()
    }

    /// Reads the clock and node id and advances the clock domain, returning the timestamp,
    /// clock sequence and node id of the next UUID.
    pub(crate) fn next_fields(&self) -> (i64, u16, [u8; 6]) {
        let ts = self.timestamps.now();
        let node_id = self.node_ids.as_ref().map(NodeIdProvider::node_id);
        let sequence = self.clock.refresh(ts, node_id);
        let node_id = node_id.unwrap_or_else(|| {
            let mut node: [u8; 6] = random::bytes();
            node[0] |= 0x01;
            node
        });
        (ts, sequence, node_id)
    }
}

impl Generator for TimeBasedGenerator {
    fn version(&self) -> Version {
        self.version
    }

    fn new_uuid(&self) -> Result<Uuid> {
        let (ts, sequence, node_id) = self.next_fields();
        let c = components::of_version(self.version);
        let mut uuid = Uuid::NIL;
        c.set_timestamp(&mut uuid, ts)?;
        c.set_clock_sequence(&mut uuid, sequence)?;
        c.set_node_id(&mut uuid, node_id)?;
        stamp(&mut uuid, self.version, Variant::Rfc4122);
        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ClockState;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    struct FrozenClock(i64);

    impl TimestampSource for FrozenClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    fn frozen(version: Version, ts: i64) -> TimeBasedGenerator {
        TimeBasedGenerator::from_parts(
            version,
            Arc::new(FrozenClock(ts)),
            Some(NodeIdProvider::Fixed([0x02, 0, 0, 0, 0, 0x01])),
            ClockDomain::Private(Mutex::new(ClockState::new(0x100))),
        )
        .unwrap()
    }

    /// Generates canonical strings of both versions
    #[test]
    fn generates_canonical_strings_of_both_versions() {
        let state = Arc::new(GeneratorState::new());
        for (version, digit) in [(Version::V1, '1'), (Version::V6, '6')] {
            let pattern = format!(
                r"^[0-9a-f]{{8}}-[0-9a-f]{{4}}-{digit}[0-9a-f]{{3}}-[89ab][0-9a-f]{{3}}-[0-9a-f]{{12}}$"
            );
            let re = regex::Regex::new(&pattern).unwrap();
            let g = TimeBasedGenerator::new(version, NodeIdSource::VolatileRandom, state.clone())
                .unwrap();
            for _ in 0..1_000 {
                assert!(re.is_match(&g.new_uuid().unwrap().to_string()));
            }
        }
    }

    /// Increments the clock sequence while the clock stands still
    #[test]
    fn increments_the_clock_sequence_while_the_clock_stands_still() {
        let ts = timestamp::from_system_time(SystemTime::now());
        let g = frozen(Version::V1, ts);
        for i in 0..10u16 {
            let e = g.new_uuid().unwrap();
            assert_eq!(e.timestamp(), Ok(ts));
            assert_eq!(e.clock_sequence(), Ok(0x100 + i));
            assert_eq!(e.node_id(), Ok([0x02, 0, 0, 0, 0, 0x01]));
        }
    }

    /// Generates sortable version 6 strings
    #[test]
    fn generates_sortable_version6_strings() {
        let state = Arc::new(GeneratorState::new());
        let g = TimeBasedGenerator::new(Version::V6, NodeIdSource::NonVolatileRandom, state)
            .unwrap();
        let mut prev = g.new_uuid().unwrap();
        for _ in 0..10_000 {
            let curr = g.new_uuid().unwrap();
            assert!(prev.timestamp().unwrap() <= curr.timestamp().unwrap());
            assert_ne!(prev, curr);
            if prev.timestamp() == curr.timestamp() {
                assert_ne!(prev.clock_sequence(), curr.clock_sequence());
            }
            prev = curr;
        }
    }

    /// Randomizes the node field in randomized mode
    #[test]
    fn randomizes_the_node_field_in_randomized_mode() {
        let state = Arc::new(GeneratorState::new());
        let g = TimeBasedGenerator::new(Version::V6, NodeIdSource::None, state).unwrap();
        assert!(g.is_randomized());
        let a = g.new_uuid().unwrap();
        let b = g.new_uuid().unwrap();
        assert_ne!(a.node_id(), b.node_id());
        assert_eq!(a.node_id().unwrap()[0] & 0x01, 0x01);
    }

    /// Requires a node id for version 1 and rejects other versions
    #[test]
    fn requires_a_node_id_for_version1_and_rejects_other_versions() {
        let state = Arc::new(GeneratorState::new());
        assert!(matches!(
            TimeBasedGenerator::new(Version::V1, NodeIdSource::None, state.clone()),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            TimeBasedGenerator::new(Version::V7, NodeIdSource::PhysicalAddress, state),
            Err(Error::NotSupported(_))
        ));
    }

    /// Fails on clocks before the Gregorian epoch
    #[test]
    fn fails_on_clocks_before_the_gregorian_epoch() {
        let g = frozen(Version::V1, timestamp::GREGORIAN_EPOCH - 1);
        assert!(matches!(g.new_uuid(), Err(Error::ValueOutOfRange { .. })));
    }

    /// Uses the MAC address of the physical domain
    #[test]
    fn uses_the_mac_address_of_the_physical_domain() {
        let g = TimeBasedGenerator::version1();
        let e = g.new_uuid().unwrap();
        assert_eq!(e.node_id(), Ok(PhysicalAddress::system().node_id()));
        let ts = e.timestamp().unwrap();
        let now = timestamp::from_system_time(SystemTime::now());
        assert!((now - ts).abs() < Duration::from_secs(5).as_millis() as i64 * 10_000);
    }

    /// Generates unique UUIDs from many threads sharing the global state
    #[test]
    fn generates_unique_uuids_from_many_threads_sharing_the_global_state() {
        const PER_THREAD: usize = 10_000;
        let all = Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for i in 0..8 {
                let all = &all;
                s.spawn(move || {
                    let g = if i % 2 == 0 {
                        TimeBasedGenerator::version1()
                    } else {
                        TimeBasedGenerator::version6()
                    };
                    let local: Vec<Uuid> = (0..PER_THREAD).map(|_| g.new_uuid().unwrap()).collect();
                    for pair in local.windows(2) {
                        assert!(pair[0].timestamp().unwrap() <= pair[1].timestamp().unwrap());
                    }
                    all.lock().unwrap().extend(local);
                });
            }
        });

        // v1 and v6 share one clock domain, so compare the decoded fields
        let mut fields: Vec<_> = all
            .into_inner()
            .unwrap()
            .iter()
            .map(|e| (e.timestamp().unwrap(), e.clock_sequence().unwrap(), e.node_id().unwrap()))
            .collect();
        let n = fields.len();
        assert_eq!(n, 8 * PER_THREAD);
        fields.sort();
        fields.dedup();
        assert_eq!(fields.len(), n);
    }

    /// Generates unique version 6 UUIDs from many threads in randomized mode
    #[test]
    fn generates_unique_version6_uuids_from_many_threads_in_randomized_mode() {
        let all = Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let g = TimeBasedGenerator::version6_randomized();
                    let mut local: Vec<Uuid> = (0..10_000).map(|_| g.new_uuid().unwrap()).collect();
                    all.lock().unwrap().append(&mut local);
                });
            }
        });
        let mut all = all.into_inner().unwrap();
        let n = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), n);
    }
}
