use std::sync::OnceLock;

use super::{stamp, Generator};
use crate::components;
use crate::hashing::{HashAlgorithm, HasherFactory, HasherPool};
use crate::{Result, Uuid, Variant, Version};

/// Generates name-based UUIDs: version 3 (MD5), version 5 (SHA-1) or version 8 (any other hash
/// identified by a hashspace ID).
///
/// The input is the namespace ID followed by the name, prefixed with the hashspace ID for
/// version 8. The leading 16 bytes of the digest become the UUID payload.
///
/// # Examples
///
/// ```rust
/// use guidgen::generator::{Generator, NameBasedGenerator};
/// use guidgen::{HashAlgorithm, Uuid};
///
/// let g = NameBasedGenerator::shared(HashAlgorithm::Sha256);
/// let e = g.new_uuid_from_name(&Uuid::NAMESPACE_DNS, b"www.example.com")?;
/// assert_eq!(e.to_string(), "401835fd-a627-870a-873f-ed73f2bc5b2c");
/// # Ok::<(), guidgen::Error>(())
/// ```
pub struct NameBasedGenerator {
    version: Version,
    hashspace: Option<Uuid>,
    pool: HasherPool,
    shared: bool,
}

impl NameBasedGenerator {
    /// Creates a generator with its own hasher pool. [`Generator::dispose()`] releases the pool.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            version: algorithm.version(),
            hashspace: algorithm.hashspace(),
            pool: HasherPool::new(algorithm.factory()),
            shared: false,
        }
    }

    /// Creates a version 8 generator hashing with hashers from `factory` under `hashspace`.
    ///
    /// Hashers whose output is shorter than 16 bytes are rejected on use.
    pub fn with_factory(hashspace: Uuid, factory: HasherFactory) -> Self {
        Self {
            version: Version::V8,
            hashspace: Some(hashspace),
            pool: HasherPool::new(factory),
            shared: false,
        }
    }

    /// Returns the process-wide generator for `algorithm`.
    pub fn shared(algorithm: HashAlgorithm) -> &'static Self {
        const COUNT: usize = 14;
        static GENERATORS: [OnceLock<NameBasedGenerator>; COUNT] =
            [const { OnceLock::new() }; COUNT];
        let index = match algorithm {
            HashAlgorithm::Md5 => 0,
            HashAlgorithm::Sha1 => 1,
            HashAlgorithm::Sha224 => 2,
            HashAlgorithm::Sha256 => 3,
            HashAlgorithm::Sha384 => 4,
            HashAlgorithm::Sha512 => 5,
            HashAlgorithm::Sha512_224 => 6,
            HashAlgorithm::Sha512_256 => 7,
            HashAlgorithm::Sha3_224 => 8,
            HashAlgorithm::Sha3_256 => 9,
            HashAlgorithm::Sha3_384 => 10,
            HashAlgorithm::Sha3_512 => 11,
            HashAlgorithm::Shake128 => 12,
            HashAlgorithm::Shake256 => 13,
        };
        GENERATORS[index].get_or_init(|| Self {
            shared: true,
            ..Self::new(algorithm)
        })
    }

    /// Returns the hashspace ID of a version 8 generator.
    pub fn hashspace(&self) -> Option<Uuid> {
        self.hashspace
    }
}

impl Generator for NameBasedGenerator {
    fn version(&self) -> Version {
        self.version
    }

    fn requires_input(&self) -> bool {
        true
    }

    /// Hashes an empty name in the Nil namespace.
    fn new_uuid(&self) -> Result<Uuid> {
        self.new_uuid_from_name(&Uuid::NIL, b"")
    }

    fn new_uuid_from_name(&self, namespace: &Uuid, name: &[u8]) -> Result<Uuid> {
        let digest = match &self.hashspace {
            Some(space) => self.pool.digest(&[space.as_bytes(), namespace.as_bytes(), name])?,
            None => self.pool.digest(&[namespace.as_bytes(), name])?,
        };
        let mut uuid = Uuid::NIL;
        let c = components::of_version(self.version);
        match self.version {
            Version::V8 => c.set_custom_data(&mut uuid, &digest)?,
            _ => c.set_hash_data(&mut uuid, &digest)?,
        }
        stamp(&mut uuid, self.version, Variant::Rfc4122);
        Ok(uuid)
    }

    fn dispose(&self) {
        if !self.shared {
            self.pool.dispose();
        }
    }
}
