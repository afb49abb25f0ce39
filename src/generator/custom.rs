use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use super::{stamp, Generator};
use crate::fields::Fields;
use crate::node_id::{NodeIdProvider, NodeIdSource};
use crate::random;
use crate::state::GeneratorState;
use crate::timestamp::{self, TimestampSource, EPOCH_2020, TICKS_PER_SECOND};
use crate::{Error, Result, Uuid, Variant, Version};

/// Inputs available to a [`CustomFill`] while it builds one UUID.
#[derive(Copy, Clone, Debug)]
pub struct CustomContext {
    timestamp: i64,
    node_id: Option<[u8; 6]>,
}

impl CustomContext {
    /// Returns the current time in 100-nanosecond ticks since the generator's epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the node id, failing with [`Error::NotSupported`] when the generator was created
    /// with [`NodeIdSource::None`].
    pub fn node_id(&self) -> Result<[u8; 6]> {
        self.node_id.ok_or(Error::NotSupported("node id"))
    }
}

/// The layout strategy of a [`CustomGenerator`].
///
/// `fill` receives a UUID of random bytes and may overwrite any bits; the version and variant
/// are stamped afterwards.
pub trait CustomFill: Send + Sync {
    fn fill(&self, ctx: &CustomContext, uuid: &mut Uuid) -> Result<()>;
}

impl<F> CustomFill for F
where
    F: Fn(&CustomContext, &mut Uuid) -> Result<()> + Send + Sync,
{
    fn fill(&self, ctx: &CustomContext, uuid: &mut Uuid) -> Result<()> {
        self(ctx, uuid)
    }
}

/// Generates version 8 UUIDs with a user-supplied layout.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::{CustomContext, CustomGenerator, Generator};
/// use guidgen::{NodeIdSource, Uuid};
///
/// let fill = |ctx: &CustomContext, uuid: &mut Uuid| -> guidgen::Result<()> {
///     let mut bytes = *uuid.as_bytes();
///     bytes[10..].copy_from_slice(&ctx.node_id()?);
///     *uuid = Uuid::from(bytes);
///     Ok(())
/// };
/// let g = CustomGenerator::new(0, NodeIdSource::VolatileRandom, fill);
/// let a = g.new_uuid()?;
/// let b = g.new_uuid()?;
/// assert_eq!(a.as_bytes()[10..], b.as_bytes()[10..]);
/// # Ok::<(), guidgen::Error>(())
/// ```
pub struct CustomGenerator<F> {
    epoch: i64,
    timestamps: Arc<dyn TimestampSource>,
    node_ids: Option<NodeIdProvider>,
    fill: F,
}

impl<F: CustomFill> CustomGenerator<F> {
    /// Creates a generator whose context reports timestamps relative to `epoch`, given in ticks
    /// since the Unix epoch.
    pub fn new(epoch: i64, node_source: NodeIdSource, fill: F) -> Self {
        Self {
            epoch,
            timestamps: timestamp::default_source(),
            node_ids: NodeIdProvider::from_source(node_source, GeneratorState::global()),
            fill,
        }
    }
}

/// The example layout: whole seconds since 2020 in `time_low`, the binary fraction of the
/// second in `time_mid`, then random bits except for the last two node bytes, which hold one
/// byte of the node id and a wrapping sequence.
#[derive(Debug)]
pub struct ExampleFill {
    sequence: AtomicU8,
}

impl ExampleFill {
    pub fn new() -> Self {
        // the first UUID gets sequence 0
        Self {
            sequence: AtomicU8::new(u8::MAX),
        }
    }
}

impl Default for ExampleFill {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomFill for ExampleFill {
    fn fill(&self, ctx: &CustomContext, uuid: &mut Uuid) -> Result<()> {
        let ticks = ctx.timestamp();
        let seconds = ticks.div_euclid(TICKS_PER_SECOND);
        let Ok(seconds) = u32::try_from(seconds) else {
            return Err(Error::out_of_range(
                "timestamp",
                timestamp::display(EPOCH_2020),
                timestamp::display(EPOCH_2020 + (u32::MAX as i64 + 1) * TICKS_PER_SECOND - 1),
            ));
        };
        let fraction = (ticks.rem_euclid(TICKS_PER_SECOND) << 16) / TICKS_PER_SECOND;
        let node = ctx.node_id()?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        let bytes = uuid.bytes_mut();
        bytes.set_time_low(seconds);
        bytes.set_time_mid(fraction as u16);
        bytes[14] = node[4];
        bytes[15] = sequence;
        Ok(())
    }
}

/// The reference version 8 generator built on [`ExampleFill`].
pub type ExampleGenerator = CustomGenerator<ExampleFill>;

impl CustomGenerator<ExampleFill> {
    /// Returns the process-wide example generator.
    pub fn shared() -> &'static Self {
        static G: OnceLock<ExampleGenerator> = OnceLock::new();
        G.get_or_init(|| Self::new(EPOCH_2020, NodeIdSource::NonVolatileRandom, ExampleFill::new()))
    }
}

impl<F: CustomFill> Generator for CustomGenerator<F> {
    fn version(&self) -> Version {
        Version::V8
    }

    fn new_uuid(&self) -> Result<Uuid> {
        let ctx = CustomContext {
            timestamp: self.timestamps.now() - self.epoch,
            node_id: self.node_ids.as_ref().map(NodeIdProvider::node_id),
        };
        let mut uuid = Uuid::from(random::bytes::<16>());
        self.fill.fill(&ctx, &mut uuid)?;
        stamp(&mut uuid, Version::V8, Variant::Rfc4122);
        Ok(uuid)
    }
}
