//! Hash algorithms and pooled hasher instances for name-based UUIDs.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_queue::ArrayQueue;
use sha2::digest::consts::{U32, U64};
use sha2::digest::generic_array::ArrayLength;
use sha2::digest::{
    DynDigest, ExtendableOutput, ExtendableOutputReset, FixedOutput, FixedOutputReset, Output,
    OutputSizeUser, Reset, Update,
};

use crate::{Error, Result, Uuid, Version};

/// Hashspace ID of SHA-224 (59031ca3-fbdb-47fb-9f6c-0f30e2e83145)
pub const HASHSPACE_SHA224: Uuid = Uuid::from_u128(0x59031ca3_fbdb_47fb_9f6c_0f30e2e83145);

/// Hashspace ID of SHA-256 (3fb32780-953c-4464-9cfd-e85dbbe9843d)
pub const HASHSPACE_SHA256: Uuid = Uuid::from_u128(0x3fb32780_953c_4464_9cfd_e85dbbe9843d);

/// Hashspace ID of SHA-384 (e6800581-f333-484b-8778-601ff2b58da8)
pub const HASHSPACE_SHA384: Uuid = Uuid::from_u128(0xe6800581_f333_484b_8778_601ff2b58da8);

/// Hashspace ID of SHA-512 (0fde22f2-e7ba-4fd1-9753-9c2ea88fa3f9)
pub const HASHSPACE_SHA512: Uuid = Uuid::from_u128(0x0fde22f2_e7ba_4fd1_9753_9c2ea88fa3f9);

/// Hashspace ID of SHA-512/224 (003c2038-c4fe-4b95-a672-0c26c1b79542)
pub const HASHSPACE_SHA512_224: Uuid = Uuid::from_u128(0x003c2038_c4fe_4b95_a672_0c26c1b79542);

/// Hashspace ID of SHA-512/256 (9475ad00-3769-4c07-9642-5e7383732306)
pub const HASHSPACE_SHA512_256: Uuid = Uuid::from_u128(0x9475ad00_3769_4c07_9642_5e7383732306);

/// Hashspace ID of SHA3-224 (9768761f-ac5a-419e-a180-7ca239e8025a)
pub const HASHSPACE_SHA3_224: Uuid = Uuid::from_u128(0x9768761f_ac5a_419e_a180_7ca239e8025a);

/// Hashspace ID of SHA3-256 (2034d66b-4047-4553-8f80-70e593176877)
pub const HASHSPACE_SHA3_256: Uuid = Uuid::from_u128(0x2034d66b_4047_4553_8f80_70e593176877);

/// Hashspace ID of SHA3-384 (872fb339-2636-4bdd-bda6-b6dc2a82b1b3)
pub const HASHSPACE_SHA3_384: Uuid = Uuid::from_u128(0x872fb339_2636_4bdd_bda6_b6dc2a82b1b3);

/// Hashspace ID of SHA3-512 (a4920a5d-a8a6-426c-8d14-a6cafbe64c7b)
pub const HASHSPACE_SHA3_512: Uuid = Uuid::from_u128(0xa4920a5d_a8a6_426c_8d14_a6cafbe64c7b);

/// Hashspace ID of SHAKE128 (7ea218f6-629a-425f-9f88-7439d63296bb)
pub const HASHSPACE_SHAKE128: Uuid = Uuid::from_u128(0x7ea218f6_629a_425f_9f88_7439d63296bb);

/// Hashspace ID of SHAKE256 (2e7fc6a4-2919-4edc-b0ba-7d7062ce4f0a)
pub const HASHSPACE_SHAKE256: Uuid = Uuid::from_u128(0x2e7fc6a4_2919_4edc_b0ba_7d7062ce4f0a);

/// A boxed hasher as produced by a [`HasherFactory`].
pub type BoxedHasher = Box<dyn DynDigest + Send>;

/// Creates fresh hasher instances.
pub type HasherFactory = Arc<dyn Fn() -> BoxedHasher + Send + Sync>;

/// The hash algorithms with a well-known name-based UUID mapping.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum HashAlgorithm {
    /// Version 3.
    Md5,
    /// Version 5.
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    /// SHAKE128 read out to 256 bits.
    Shake128,
    /// SHAKE256 read out to 512 bits.
    Shake256,
}

impl HashAlgorithm {
    /// Returns the UUID version produced with this algorithm.
    pub const fn version(self) -> Version {
        match self {
            Self::Md5 => Version::V3,
            Self::Sha1 => Version::V5,
            _ => Version::V8,
        }
    }

    /// Returns the hashspace ID prepended to the input of version 8 UUIDs.
    pub const fn hashspace(self) -> Option<Uuid> {
        match self {
            Self::Md5 | Self::Sha1 => None,
            Self::Sha224 => Some(HASHSPACE_SHA224),
            Self::Sha256 => Some(HASHSPACE_SHA256),
            Self::Sha384 => Some(HASHSPACE_SHA384),
            Self::Sha512 => Some(HASHSPACE_SHA512),
            Self::Sha512_224 => Some(HASHSPACE_SHA512_224),
            Self::Sha512_256 => Some(HASHSPACE_SHA512_256),
            Self::Sha3_224 => Some(HASHSPACE_SHA3_224),
            Self::Sha3_256 => Some(HASHSPACE_SHA3_256),
            Self::Sha3_384 => Some(HASHSPACE_SHA3_384),
            Self::Sha3_512 => Some(HASHSPACE_SHA3_512),
            Self::Shake128 => Some(HASHSPACE_SHAKE128),
            Self::Shake256 => Some(HASHSPACE_SHAKE256),
        }
    }

    /// Returns a factory creating hashers of this algorithm.
    pub fn factory(self) -> HasherFactory {
        match self {
            Self::Md5 => Arc::new(|| Box::new(md5::Md5::default()) as BoxedHasher),
            Self::Sha1 => Arc::new(|| Box::new(sha1::Sha1::default()) as BoxedHasher),
            Self::Sha224 => Arc::new(|| Box::new(sha2::Sha224::default()) as BoxedHasher),
            Self::Sha256 => Arc::new(|| Box::new(sha2::Sha256::default()) as BoxedHasher),
            Self::Sha384 => Arc::new(|| Box::new(sha2::Sha384::default()) as BoxedHasher),
            Self::Sha512 => Arc::new(|| Box::new(sha2::Sha512::default()) as BoxedHasher),
            Self::Sha512_224 => Arc::new(|| Box::new(sha2::Sha512_224::default()) as BoxedHasher),
            Self::Sha512_256 => Arc::new(|| Box::new(sha2::Sha512_256::default()) as BoxedHasher),
            Self::Sha3_224 => Arc::new(|| Box::new(sha3::Sha3_224::default()) as BoxedHasher),
            Self::Sha3_256 => Arc::new(|| Box::new(sha3::Sha3_256::default()) as BoxedHasher),
            Self::Sha3_384 => Arc::new(|| Box::new(sha3::Sha3_384::default()) as BoxedHasher),
            Self::Sha3_512 => Arc::new(|| Box::new(sha3::Sha3_512::default()) as BoxedHasher),
            Self::Shake128 => {
                Arc::new(|| Box::new(FixedXof::<sha3::Shake128, U32>::default()) as BoxedHasher)
            }
            Self::Shake256 => {
                Arc::new(|| Box::new(FixedXof::<sha3::Shake256, U64>::default()) as BoxedHasher)
            }
        }
    }
}

/// An extendable-output function read out to a fixed `N` bytes.
pub struct FixedXof<X, N> {
    xof: X,
    size: PhantomData<N>,
}

impl<X: Default, N> Default for FixedXof<X, N> {
    fn default() -> Self {
        Self {
            xof: X::default(),
            size: PhantomData,
        }
    }
}

impl<X: Clone, N> Clone for FixedXof<X, N> {
    fn clone(&self) -> Self {
        Self {
            xof: self.xof.clone(),
            size: PhantomData,
        }
    }
}

impl<X, N: ArrayLength<u8> + 'static> OutputSizeUser for FixedXof<X, N> {
    type OutputSize = N;
}

impl<X: Update, N> Update for FixedXof<X, N> {
    fn update(&mut self, data: &[u8]) {
        self.xof.update(data);
    }
}

impl<X: Reset, N> Reset for FixedXof<X, N> {
    fn reset(&mut self) {
        self.xof.reset();
    }
}

impl<X, N> FixedOutput for FixedXof<X, N>
where
    X: Update + ExtendableOutput,
    N: ArrayLength<u8> + 'static,
{
    fn finalize_into(self, out: &mut Output<Self>) {
        self.xof.finalize_xof_into(out);
    }
}

impl<X, N> FixedOutputReset for FixedXof<X, N>
where
    X: Update + Reset + ExtendableOutputReset,
    N: ArrayLength<u8> + 'static,
{
    fn finalize_into_reset(&mut self, out: &mut Output<Self>) {
        self.xof.finalize_xof_reset_into(out);
    }
}

/// A bounded pool of idle hashers. A hasher is checked out for exactly one digest, so no two
/// threads ever share an instance.
pub(crate) struct HasherPool {
    factory: HasherFactory,
    idle: ArrayQueue<BoxedHasher>,
    disposed: AtomicBool,
}

impl HasherPool {
    pub(crate) fn new(factory: HasherFactory) -> Self {
        let parallelism = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            factory,
            idle: ArrayQueue::new(parallelism * 2),
            disposed: AtomicBool::new(false),
        }
    }

    /// Hashes the concatenation of `parts` and returns the leading 16 bytes of the digest.
    pub(crate) fn digest(&self, parts: &[&[u8]]) -> Result<[u8; 16]> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut hasher = self.idle.pop().unwrap_or_else(|| (self.factory)());
        if hasher.output_size() < 16 {
            return Err(Error::InvalidOperation("hash output is shorter than 128 bits"));
        }
        for part in parts {
            hasher.update(part);
        }
        let output = hasher.finalize_reset();
        if !self.disposed.load(Ordering::Acquire) {
            // a full pool simply drops the hasher
            let _ = self.idle.push(hasher);
        }
        let mut head = [0u8; 16];
        head.copy_from_slice(&output[..16]);
        Ok(head)
    }

    /// Drops all idle hashers and fails every later call with [`Error::Disposed`].
    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        while self.idle.pop().is_some() {}
    }
}
