use super::{stamp, Generator};
use crate::{random, Result, Uuid, Variant, Version};

/// Always returns the Nil UUID.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyGenerator;

impl Generator for EmptyGenerator {
    fn version(&self) -> Version {
        Version::EMPTY
    }

    fn variant(&self) -> Variant {
        Variant::Ncs
    }

    fn new_uuid(&self) -> Result<Uuid> {
        Ok(Uuid::NIL)
    }
}

/// Always returns the Max UUID.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaxValueGenerator;

impl Generator for MaxValueGenerator {
    fn version(&self) -> Version {
        Version::MAX
    }

    fn variant(&self) -> Variant {
        Variant::Reserved
    }

    fn new_uuid(&self) -> Result<Uuid> {
        Ok(Uuid::MAX)
    }
}

/// Generates version 4 UUIDs from the thread-local random number generator.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::{Generator, RandomGenerator};
///
/// let uuid = RandomGenerator.new_uuid()?;
/// println!("{uuid}"); // e.g. "2ca4b2ce-6c13-40d4-bccf-37d222820f6f"
/// # Ok::<(), guidgen::Error>(())
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    /// Generates a version 4 UUID. This never fails.
    pub fn generate(&self) -> Uuid {
        let mut uuid = Uuid::from(random::bytes::<16>());
        stamp(&mut uuid, Version::V4, Variant::Rfc4122);
        uuid
    }
}

impl Generator for RandomGenerator {
    fn version(&self) -> Version {
        Version::V4
    }

    fn new_uuid(&self) -> Result<Uuid> {
        Ok(self.generate())
    }
}
