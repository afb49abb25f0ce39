//! Random number sources shared by the generators.
//!
//! Hot paths draw from the thread-local [`rand::rngs::ThreadRng`]. Values that outlive a single
//! call and are shared across threads (initial clock sequences, random node ids) come from a
//! process-wide ChaCha12 generator. On Unix both are reseeded when the process ID changes (i.e.
//! upon process forks) so that parent and child never produce the same stream.

use std::sync::{Mutex, OnceLock, PoisonError};

use rand::rngs::adapter::ReseedingRng;
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha12Core;

/// Fills `dest` from the thread-local generator.
pub(crate) fn fill(dest: &mut [u8]) {
    unix_fork_safety::reseed_thread_rng_upon_pid_change();
    rand::thread_rng().fill_bytes(dest);
}

/// Returns random bytes from the thread-local generator.
pub(crate) fn bytes<const N: usize>() -> [u8; N] {
    let mut dest = [0u8; N];
    fill(&mut dest);
    dest
}

/// Returns a random value from the process-wide generator.
pub(crate) fn shared<T>() -> T
where
    rand::distributions::Standard: rand::distributions::Distribution<T>,
{
    static G: OnceLock<Mutex<SharedRng>> = OnceLock::new();
    let mut g = G
        .get_or_init(|| Mutex::new(SharedRng::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    g.get_mut().gen()
}

/// Returns a random node id with the multicast bit set, which marks it as not being an IEEE 802
/// address.
pub(crate) fn node_id() -> [u8; 6] {
    let mut node: [u8; 6] = shared();
    node[0] |= 0x01;
    node
}

/// The process-wide generator: [`ChaCha12Core`] wrapped with [`ReseedingRng`] to emulate the
/// strategy used by [`rand::rngs::ThreadRng`].
struct SharedRng {
    #[cfg(unix)]
    pid: u32,
    rng: ReseedingRng<ChaCha12Core, OsRng>,
}

impl SharedRng {
    fn new() -> Self {
        let core = ChaCha12Core::from_rng(OsRng)
            .unwrap_or_else(|_| ChaCha12Core::from_seed(rand::random()));
        Self {
            #[cfg(unix)]
            pid: std::process::id(),
            rng: ReseedingRng::new(core, 1024 * 64, OsRng),
        }
    }

    /// Returns the inner generator, replacing it first on Unix if the process ID has changed.
    fn get_mut(&mut self) -> &mut ReseedingRng<ChaCha12Core, OsRng> {
        #[cfg(unix)]
        if self.pid != std::process::id() {
            *self = Self::new();
        }
        &mut self.rng
    }
}

#[cfg(unix)]
mod unix_fork_safety {
    use std::{cell::Cell, process};

    thread_local! {
        static PID: Cell<u32> = Cell::new(process::id());
    }

    /// Reseeds ThreadRng immediately when the process ID changes (i.e. upon process forks),
    /// returning true if ThreadRng is reseeded or false otherwise.
    pub fn reseed_thread_rng_upon_pid_change() -> bool {
        PID.with(|last_pid| {
            let pid = process::id();
            if pid == last_pid.replace(pid) {
                false
            } else {
                // As of rand v0.8.5 and rand_chacha v0.3.1, up to 63 `u32` values have to be used
                // before reseeding after a fork.
                let _: [[u32; 32]; 2] = rand::random();
                true
            }
        })
    }
}

#[cfg(not(unix))]
mod unix_fork_safety {
    pub const fn reseed_thread_rng_upon_pid_change() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    /// Sets the multicast bit of random node ids
    #[test]
    fn sets_the_multicast_bit_of_random_node_ids() {
        for _ in 0..1_000 {
            assert_eq!(super::node_id()[0] & 0x01, 0x01);
        }
    }

    /// Produces distinct values from both sources
    #[test]
    fn produces_distinct_values_from_both_sources() {
        use std::collections::HashSet;
        let a: HashSet<[u8; 16]> = (0..1_000).map(|_| super::bytes()).collect();
        let b: HashSet<u128> = (0..1_000).map(|_| super::shared()).collect();
        assert_eq!(a.len(), 1_000);
        assert_eq!(b.len(), 1_000);
    }
}
