//! Node id providers for versions 1, 2 and 6.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::debug;

use crate::cache::RefreshingCache;
use crate::random;
use crate::state::{GeneratorState, NodeKind};

/// Where a time-based generator takes its node id from.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum NodeIdSource {
    /// No node id; only valid for generators that randomize the node field on every call.
    None,
    /// The MAC address of a network interface.
    #[default]
    PhysicalAddress,
    /// A random id drawn once per generator instance.
    VolatileRandom,
    /// A random id kept by the [`GeneratorState`] and persisted with it.
    NonVolatileRandom,
}

/// A network interface as reported by a [`MacAddressSource`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct InterfaceAddress {
    pub address: [u8; 6],
    pub is_up: bool,
    pub is_loopback: bool,
    pub is_tunnel: bool,
}

/// Enumerates network interfaces.
pub trait MacAddressSource: Send + Sync {
    fn interfaces(&self) -> Vec<InterfaceAddress>;
}

/// Reads interfaces from the Linux `/sys/class/net` tree. Yields nothing elsewhere.
#[derive(Clone, Debug)]
pub struct SysfsInterfaces {
    root: PathBuf,
}

impl SysfsInterfaces {
    /// ARPHRD values of tunnel devices.
    const TUNNEL_TYPES: [u32; 6] = [768, 769, 776, 778, 823, 65534];
    const LOOPBACK_TYPE: u32 = 772;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_interface(dir: &Path) -> Option<InterfaceAddress> {
        let address = parse_mac(fs::read_to_string(dir.join("address")).ok()?.trim())?;
        let operstate = fs::read_to_string(dir.join("operstate")).unwrap_or_default();
        let kind = fs::read_to_string(dir.join("type"))
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Some(InterfaceAddress {
            address,
            is_up: operstate.trim() == "up",
            is_loopback: kind == Self::LOOPBACK_TYPE,
            is_tunnel: Self::TUNNEL_TYPES.contains(&kind),
        })
    }
}

impl Default for SysfsInterfaces {
    fn default() -> Self {
        Self::new("/sys/class/net")
    }
}

impl MacAddressSource for SysfsInterfaces {
    fn interfaces(&self) -> Vec<InterfaceAddress> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        dirs.sort();
        dirs.iter().filter_map(|d| Self::read_interface(d)).collect()
    }
}

fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(':');
    for e in mac.iter_mut() {
        *e = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(mac)
}

/// Picks the first up, non-loopback, non-tunnel interface with a non-zero address, falling back
/// to any non-loopback interface with a non-zero address.
pub fn select_node_id(interfaces: &[InterfaceAddress]) -> Option<[u8; 6]> {
    let valid = || {
        interfaces
            .iter()
            .filter(|e| e.address != [0; 6] && !e.is_loopback)
    };
    valid()
        .find(|e| e.is_up && !e.is_tunnel)
        .or_else(|| valid().next())
        .map(|e| e.address)
}

/// The MAC address of this host, re-read every second in the background.
pub struct PhysicalAddress {
    cache: Arc<RefreshingCache<Option<[u8; 6]>>>,
}

impl PhysicalAddress {
    /// Watches the interfaces reported by `source`.
    pub fn new<S: MacAddressSource + 'static>(source: S) -> Self {
        let cache = RefreshingCache::spawn("guidgen-mac", Duration::from_secs(1), move || {
            select_node_id(&source.interfaces())
        });
        Self { cache }
    }

    /// Returns the process-wide instance backed by [`SysfsInterfaces`].
    pub fn system() -> Arc<Self> {
        static SYSTEM: OnceLock<Arc<PhysicalAddress>> = OnceLock::new();
        SYSTEM
            .get_or_init(|| Arc::new(Self::new(SysfsInterfaces::default())))
            .clone()
    }

    /// Returns the current MAC address, or a process-wide random id with the multicast bit set
    /// when no suitable interface exists.
    pub fn node_id(&self) -> [u8; 6] {
        static FALLBACK: OnceLock<[u8; 6]> = OnceLock::new();
        match *self.cache.load() {
            Some(address) => address,
            None => *FALLBACK.get_or_init(|| {
                debug!("no usable network interface; using a random node id");
                random::node_id()
            }),
        }
    }
}

/// A resolved node id strategy held by a generator.
#[derive(Clone)]
pub(crate) enum NodeIdProvider {
    Physical(Arc<PhysicalAddress>),
    Volatile([u8; 6]),
    NonVolatile(Arc<GeneratorState>),
    Fixed([u8; 6]),
    Custom(Arc<dyn Fn() -> [u8; 6] + Send + Sync>),
}

impl NodeIdProvider {
    /// Resolves `source`, returning `None` for [`NodeIdSource::None`].
    pub(crate) fn from_source(source: NodeIdSource, state: &Arc<GeneratorState>) -> Option<Self> {
        match source {
            NodeIdSource::None => None,
            NodeIdSource::PhysicalAddress => Some(Self::Physical(PhysicalAddress::system())),
            NodeIdSource::VolatileRandom => Some(Self::Volatile(random::node_id())),
            NodeIdSource::NonVolatileRandom => Some(Self::NonVolatile(state.clone())),
        }
    }

    pub(crate) fn node_id(&self) -> [u8; 6] {
        match self {
            Self::Physical(p) => p.node_id(),
            Self::Volatile(id) | Self::Fixed(id) => *id,
            Self::NonVolatile(state) => state.non_volatile_node_id(),
            Self::Custom(f) => f(),
        }
    }

    /// Returns the clock domain that ids from this provider are tracked in.
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Self::Physical(_) => NodeKind::Physical,
            _ => NodeKind::Random,
        }
    }
}
