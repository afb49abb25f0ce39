//! A value refreshed in the background and read without locking.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::warn;

/// Holds a snapshot in an [`ArcSwap`] so that readers never block while a background thread
/// replaces it every `period`. The thread exits once the cache is dropped.
pub(crate) struct RefreshingCache<T> {
    snapshot: ArcSwap<T>,
}

impl<T: Send + Sync + 'static> RefreshingCache<T> {
    pub(crate) fn spawn<F>(name: &str, period: Duration, load: F) -> Arc<Self>
    where
        F: Fn() -> T + Send + 'static,
    {
        let cache = Arc::new(Self {
            snapshot: ArcSwap::new(Arc::new(load())),
        });
        let weak: Weak<Self> = Arc::downgrade(&cache);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                thread::sleep(period);
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                cache.snapshot.store(Arc::new(load()));
            });
        if let Err(e) = spawned {
            warn!("could not start {name} refresh thread; value stays fixed: {e}");
        }
        cache
    }

    /// Returns the current snapshot.
    pub(crate) fn load(&self) -> Arc<T> {
        self.snapshot.load_full()
    }
}
