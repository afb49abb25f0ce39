use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use tracing::debug;

use super::Generator;
use crate::{DceSecurityDomain, Error, Result, Uuid, Variant, Version};

type Factory = Box<dyn Fn() -> Box<dyn Generator> + Send + Sync>;

/// Spreads generation over a bounded set of generator instances created on demand.
///
/// Each call checks out an idle instance (creating one if none is idle), uses it and returns it
/// to the pool; instances beyond `capacity` are disposed. Useful with generators built by
/// [`CustomStateBuilder`](super::CustomStateBuilder), whose private state serializes callers.
pub struct GeneratorPool {
    factory: Factory,
    idle: ArrayQueue<Box<dyn Generator>>,
    version: Version,
    variant: Variant,
    requires_input: bool,
    disposed: AtomicBool,
}

impl GeneratorPool {
    /// Creates a pool of up to `capacity` idle instances from `factory`.
    ///
    /// One instance is created eagerly to determine the version and variant.
    pub fn new<F>(factory: F, capacity: usize) -> Result<Self>
    where
        F: Fn() -> Box<dyn Generator> + Send + Sync + 'static,
    {
        if capacity == 0 {
            return Err(Error::out_of_range("capacity", 1, usize::MAX));
        }
        let first = factory();
        let pool = Self {
            version: first.version(),
            variant: first.variant(),
            requires_input: first.requires_input(),
            factory: Box::new(factory),
            idle: ArrayQueue::new(capacity),
            disposed: AtomicBool::new(false),
        };
        let _ = pool.idle.push(first);
        Ok(pool)
    }

    /// Returns the number of idle instances.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    fn with_generator<T>(&self, f: impl FnOnce(&dyn Generator) -> Result<T>) -> Result<T> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let generator = match self.idle.pop() {
            Some(g) => g,
            None => {
                let g = (self.factory)();
                if g.version() != self.version || g.variant() != self.variant {
                    g.dispose();
                    return Err(Error::InvalidOperation(
                        "generator factory changed the version or variant",
                    ));
                }
                g
            }
        };
        let result = f(generator.as_ref());
        if self.disposed.load(Ordering::Acquire) {
            generator.dispose();
        } else if let Err(extra) = self.idle.push(generator) {
            debug!("generator pool is full; disposing an instance");
            extra.dispose();
        }
        result
    }
}

impl Generator for GeneratorPool {
    fn version(&self) -> Version {
        self.version
    }

    fn variant(&self) -> Variant {
        self.variant
    }

    fn requires_input(&self) -> bool {
        self.requires_input
    }

    fn new_uuid(&self) -> Result<Uuid> {
        self.with_generator(|g| g.new_uuid())
    }

    fn new_uuid_from_name(&self, namespace: &Uuid, name: &[u8]) -> Result<Uuid> {
        self.with_generator(|g| g.new_uuid_from_name(namespace, name))
    }

    fn new_uuid_dce(&self, domain: DceSecurityDomain, local_id: Option<u32>) -> Result<Uuid> {
        self.with_generator(|g| g.new_uuid_dce(domain, local_id))
    }

    /// Disposes every idle instance; instances in use are disposed when they come back.
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        while let Some(g) = self.idle.pop() {
            g.dispose();
        }
    }
}
