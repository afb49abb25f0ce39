use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::{Generator, TimeBasedGenerator, UnixTimeBasedGenerator};
use crate::counter::MonotonicCounter;
use crate::node_id::{MacAddressSource, NodeIdProvider, NodeIdSource, PhysicalAddress};
use crate::random;
use crate::state::{ClockDomain, ClockState, GeneratorState, NodeKind};
use crate::timestamp::{self, FnClock, TimestampSource};
use crate::{Error, Result, Version};

enum NodeSetting {
    Source(NodeIdSource),
    Provider(NodeIdProvider),
    Bytes(Vec<u8>),
}

/// Builds version 1, 6 or 7 generators with custom timestamp, clock sequence or node id inputs.
///
/// A version 1 or 6 generator built with a custom timestamp source, initial clock sequence or
/// node id provider tracks its clock sequence privately instead of in the shared
/// [`GeneratorState`]. A version 7 generator always gets its own counter.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::CustomStateBuilder;
/// use guidgen::Version;
/// use std::time::{Duration, SystemTime};
///
/// let g = CustomStateBuilder::new(Version::V1)?
///     .timestamp_provider(|| SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
///     .clock_sequence(0x1234)
///     .node_id(&[0x02, 0x00, 0x5e, 0x10, 0x00, 0x01])
///     .build()?;
/// let e = g.new_uuid()?;
/// assert_eq!(e.clock_sequence()?, 0x1234);
/// assert_eq!(e.node_id()?, [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
/// # Ok::<(), guidgen::Error>(())
/// ```
pub struct CustomStateBuilder {
    version: Version,
    timestamps: Option<Arc<dyn TimestampSource>>,
    clock_sequence: Option<u16>,
    node: Option<NodeSetting>,
    state: Option<Arc<GeneratorState>>,
}

impl CustomStateBuilder {
    /// Starts a builder for `version`, which must be 1, 6 or 7.
    pub fn new(version: Version) -> Result<Self> {
        match version {
            Version::V1 | Version::V6 | Version::V7 => Ok(Self {
                version,
                timestamps: None,
                clock_sequence: None,
                node: None,
                state: None,
            }),
            _ => Err(Error::NotSupported("custom state for this version")),
        }
    }

    /// Reads the time from `provider`.
    pub fn timestamp_provider<F>(self, provider: F) -> Self
    where
        F: Fn() -> SystemTime + Send + Sync + 'static,
    {
        self.timestamp_source(Arc::new(FnClock(provider)))
    }

    pub fn timestamp_source(mut self, source: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = Some(source);
        self
    }

    /// Starts the clock sequence at `value`, which must fit in 14 bits.
    pub fn clock_sequence(mut self, value: u16) -> Self {
        self.clock_sequence = Some(value);
        self
    }

    pub fn node_id_source(mut self, source: NodeIdSource) -> Self {
        self.node = Some(NodeSetting::Source(source));
        self
    }

    /// Calls `provider` for the node id of every UUID.
    pub fn node_id_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> [u8; 6] + Send + Sync + 'static,
    {
        self.node = Some(NodeSetting::Provider(NodeIdProvider::Custom(Arc::new(provider))));
        self
    }

    /// Uses `node_id`, which must be exactly 6 bytes long, for every UUID.
    pub fn node_id(mut self, node_id: &[u8]) -> Self {
        self.node = Some(NodeSetting::Bytes(node_id.to_vec()));
        self
    }

    /// Selects the MAC address from the interfaces reported by `source`.
    pub fn mac_address_source<S: MacAddressSource + 'static>(mut self, source: S) -> Self {
        let physical = Arc::new(PhysicalAddress::new(source));
        self.node = Some(NodeSetting::Provider(NodeIdProvider::Physical(physical)));
        self
    }

    /// Tracks the clock sequence in `state` instead of the process-wide state.
    pub fn state(mut self, state: Arc<GeneratorState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> Result<Box<dyn Generator>> {
        if let Some(value) = self.clock_sequence {
            if value > 0x3fff {
                return Err(Error::out_of_range("clock sequence", 0, 0x3fff));
            }
        }
        let timestamps = self.timestamps.clone();
        if self.version == Version::V7 {
            if self.node.is_some() || self.clock_sequence.is_some() {
                return Err(Error::NotSupported("version 7 has no node id or clock sequence"));
            }
            let timestamps = timestamps.unwrap_or_else(timestamp::default_source);
            return Ok(Box::new(UnixTimeBasedGenerator::from_parts(
                timestamps,
                MonotonicCounter::local(),
            )));
        }

        let state = self.state.unwrap_or_else(|| GeneratorState::global().clone());
        let (node_ids, custom_node) = match self.node {
            None => (Some(NodeIdProvider::Physical(PhysicalAddress::system())), false),
            Some(NodeSetting::Source(source)) => {
                (NodeIdProvider::from_source(source, &state), false)
            }
            Some(NodeSetting::Provider(provider)) => (Some(provider), true),
            Some(NodeSetting::Bytes(bytes)) => {
                let node: [u8; 6] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::out_of_range("node id length", 6, 6))?;
                (Some(NodeIdProvider::Fixed(node)), true)
            }
        };

        let clock = if custom_node || timestamps.is_some() || self.clock_sequence.is_some() {
            let initial = self.clock_sequence.unwrap_or_else(random::shared);
            ClockDomain::Private(Mutex::new(ClockState::new(initial)))
        } else {
            let kind = node_ids.as_ref().map_or(NodeKind::Random, NodeIdProvider::kind);
            ClockDomain::Shared(state, kind)
        };
        let generator = TimeBasedGenerator::from_parts(
            self.version,
            timestamps.unwrap_or_else(timestamp::default_source),
            node_ids,
            clock,
        )?;
        Ok(Box::new(generator))
    }
}

impl TimeBasedGenerator {
    /// Starts a [`CustomStateBuilder`] for `version`.
    pub fn builder(version: Version) -> Result<CustomStateBuilder> {
        CustomStateBuilder::new(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::InterfaceAddress;
    use crate::Uuid;
    use std::time::Duration;

    fn fixed_time() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    /// Starts from the given clock sequence and increments it
    #[test]
    fn starts_from_the_given_clock_sequence_and_increments_it() {
        let g = CustomStateBuilder::new(Version::V6)
            .unwrap()
            .timestamp_provider(fixed_time)
            .clock_sequence(0x3ffe)
            .node_id_source(NodeIdSource::VolatileRandom)
            .build()
            .unwrap();
        let ts = timestamp::from_system_time(fixed_time());
        let seqs: Vec<u16> = (0..3)
            .map(|_| {
                let e = g.new_uuid().unwrap();
                assert_eq!(e.timestamp(), Ok(ts));
                e.clock_sequence().unwrap()
            })
            .collect();
        // the first call only records the node id
        assert_eq!(seqs, [0x3ffe, 0x3fff, 0x0000]);
    }

    /// Calls the node id provider for every UUID
    #[test]
    fn calls_the_node_id_provider_for_every_uuid() {
        let next = std::sync::atomic::AtomicU8::new(0);
        let g = CustomStateBuilder::new(Version::V1)
            .unwrap()
            .node_id_provider(move || {
                let n = next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                [0x03, 0, 0, 0, 0, n]
            })
            .build()
            .unwrap();
        let a = g.new_uuid().unwrap();
        let b = g.new_uuid().unwrap();
        assert_eq!(a.node_id(), Ok([0x03, 0, 0, 0, 0, 0]));
        assert_eq!(b.node_id(), Ok([0x03, 0, 0, 0, 0, 1]));
    }

    /// Selects the MAC address from a custom source
    #[test]
    fn selects_the_mac_address_from_a_custom_source() {
        struct OneInterface;
        impl MacAddressSource for OneInterface {
            fn interfaces(&self) -> Vec<InterfaceAddress> {
                vec![InterfaceAddress {
                    address: [0x00, 0x1b, 0x63, 0x84, 0x45, 0xe6],
                    is_up: true,
                    is_loopback: false,
                    is_tunnel: false,
                }]
            }
        }
        let g = TimeBasedGenerator::builder(Version::V1)
            .unwrap()
            .mac_address_source(OneInterface)
            .build()
            .unwrap();
        let e = g.new_uuid().unwrap();
        assert_eq!(e.node_id(), Ok([0x00, 0x1b, 0x63, 0x84, 0x45, 0xe6]));
    }

    /// Validates the inputs
    #[test]
    fn validates_the_inputs() {
        assert!(matches!(
            CustomStateBuilder::new(Version::V4),
            Err(Error::NotSupported(_))
        ));
        let too_large = CustomStateBuilder::new(Version::V1).unwrap().clock_sequence(0x4000);
        assert!(matches!(too_large.build(), Err(Error::ValueOutOfRange { .. })));
        let short = CustomStateBuilder::new(Version::V1).unwrap().node_id(&[1, 2, 3]);
        assert!(matches!(short.build(), Err(Error::ValueOutOfRange { .. })));
        let v7_node = CustomStateBuilder::new(Version::V7).unwrap().node_id(&[0; 6]);
        assert!(matches!(v7_node.build(), Err(Error::NotSupported(_))));
        let v1_none = CustomStateBuilder::new(Version::V1)
            .unwrap()
            .node_id_source(NodeIdSource::None);
        assert!(matches!(v1_none.build(), Err(Error::NotSupported(_))));
    }

    /// Builds version 7 generators with a private counter
    #[test]
    fn builds_version7_generators_with_a_private_counter() {
        let g = CustomStateBuilder::new(Version::V7)
            .unwrap()
            .timestamp_provider(fixed_time)
            .build()
            .unwrap();
        let mut prev = g.new_uuid().unwrap();
        assert_eq!(prev.timestamp(), Ok(timestamp::from_system_time(fixed_time())));
        for _ in 0..1_000 {
            let curr: Uuid = g.new_uuid().unwrap();
            assert!(prev < curr);
            prev = curr;
        }
    }

    /// Shares the clock domain of the given state without custom inputs
    #[test]
    fn shares_the_clock_domain_of_the_given_state_without_custom_inputs() {
        let state = Arc::new(GeneratorState::new());
        let a = CustomStateBuilder::new(Version::V6)
            .unwrap()
            .node_id_source(NodeIdSource::NonVolatileRandom)
            .state(state.clone())
            .build()
            .unwrap();
        let b = CustomStateBuilder::new(Version::V1)
            .unwrap()
            .node_id_source(NodeIdSource::NonVolatileRandom)
            .state(state)
            .build()
            .unwrap();
        let x = a.new_uuid().unwrap();
        let y = b.new_uuid().unwrap();
        assert_eq!(x.node_id(), y.node_id());
        if x.timestamp() == y.timestamp() {
            assert_ne!(x.clock_sequence(), y.clock_sequence());
        }
    }
}
