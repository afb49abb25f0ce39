//! UUID generators for every version.
//!
//! All generators implement [`Generator`]. [`of_version()`] returns process-wide shared
//! instances bound to [`GeneratorState::global()`](crate::state::GeneratorState::global); the
//! concrete types can also be constructed explicitly with their own state, timestamp source or
//! node id source.
//!
//! ```rust
//! use guidgen::{generator, Uuid, Version};
//!
//! let v4 = generator::of_version(Version::V4)?.new_uuid()?;
//! assert_eq!(v4.version(), Version::V4);
//!
//! let v5 = generator::of_version(Version::V5)?
//!     .new_uuid_from_name(&Uuid::NAMESPACE_DNS, b"www.example.com")?;
//! assert_eq!(v5.to_string(), "2ed6657d-e927-568b-95e1-2665a8aea6a2");
//! # Ok::<(), guidgen::Error>(())
//! ```

use crate::components;
use crate::{DceSecurityDomain, Error, Result, Uuid, Variant, Version};

mod builder;
mod custom;
mod dce;
mod name_based;
mod pool;
mod simple;
mod time_based;
mod unix_time;

pub use builder::CustomStateBuilder;
pub use custom::{CustomContext, CustomFill, CustomGenerator, ExampleFill, ExampleGenerator};
pub use dce::DceSecurityGenerator;
pub use name_based::NameBasedGenerator;
pub use pool::GeneratorPool;
pub use simple::{EmptyGenerator, MaxValueGenerator, RandomGenerator};
pub use time_based::TimeBasedGenerator;
pub use unix_time::UnixTimeBasedGenerator;

/// A source of UUIDs of one version and variant.
pub trait Generator: Send + Sync {
    /// Returns the version of the generated UUIDs.
    fn version(&self) -> Version;

    /// Returns the variant of the generated UUIDs.
    fn variant(&self) -> Variant {
        Variant::Rfc4122
    }

    /// Returns `true` if the generator derives UUIDs from caller input.
    fn requires_input(&self) -> bool {
        false
    }

    /// Generates a new UUID.
    fn new_uuid(&self) -> Result<Uuid>;

    /// Generates a UUID from a namespace and a name.
    fn new_uuid_from_name(&self, _namespace: &Uuid, _name: &[u8]) -> Result<Uuid> {
        Err(Error::NotSupported("name-based generation"))
    }

    /// Generates a DCE Security UUID for `domain`, using the id of the current user or group
    /// when `local_id` is `None`.
    fn new_uuid_dce(&self, _domain: DceSecurityDomain, _local_id: Option<u32>) -> Result<Uuid> {
        Err(Error::NotSupported("DCE Security generation"))
    }

    /// Releases pooled resources. Later calls fail with [`Error::Disposed`] if the generator
    /// owned any; shared generators ignore this.
    fn dispose(&self) {}
}

/// Writes `version` and `variant` over whatever bits the payload left there.
pub(crate) fn stamp(uuid: &mut Uuid, version: Version, variant: Variant) {
    let c = components::of_version(version);
    c.set_version(uuid, version);
    c.set_variant(uuid, variant);
}

/// Returns the process-wide generator for `version`.
///
/// Versions 1 and 6 use the MAC address, version 7 the process-wide counter and version 8 the
/// [`ExampleGenerator`]. Versions 3, 5 and 8 name-based generators are available through
/// [`NameBasedGenerator::shared()`].
pub fn of_version(version: Version) -> Result<&'static dyn Generator> {
    Ok(match version.get() {
        0 => &EmptyGenerator,
        1 => TimeBasedGenerator::version1(),
        2 => DceSecurityGenerator::shared(),
        3 => NameBasedGenerator::shared(crate::HashAlgorithm::Md5),
        4 => &RandomGenerator,
        5 => NameBasedGenerator::shared(crate::HashAlgorithm::Sha1),
        6 => TimeBasedGenerator::version6(),
        7 => UnixTimeBasedGenerator::shared(),
        8 => ExampleGenerator::shared(),
        15 => &MaxValueGenerator,
        _ => return Err(Error::NotSupported("reserved version")),
    })
}

/// Generates a UUID with the process-wide generator for `version`.
pub fn new_uuid(version: Version) -> Result<Uuid> {
    of_version(version)?.new_uuid()
}
