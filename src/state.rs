//! Clock sequence bookkeeping shared by the time-based generators.
//!
//! A [`GeneratorState`] tracks two independent clock domains: one for UUIDs carrying the
//! physical MAC address and one for UUIDs carrying random node ids. Each domain remembers the
//! last timestamp and node id it has seen and increments its 14-bit clock sequence whenever the
//! clock fails to advance or the node id changes, so that no two UUIDs of a domain share the
//! same timestamp, clock sequence and node id.
//!
//! The state can be persisted to a file (see [`storage`](crate::storage)) so that the guarantee
//! holds across process restarts. Persistence failures never surface from the generation path;
//! they are logged, kept as [`GeneratorState::last_storage_error()`] and passed to the listener
//! installed with [`GeneratorState::set_error_listener()`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::random;
use crate::storage::{StateRecord, StorageEvent, StorageFailure, StorageOperation};

/// Minimum delay between two saves that are not caused by a clock sequence or node id change.
const SAVE_INTERVAL: Duration = Duration::from_secs(1);

const CLOCK_SEQUENCE_MASK: u16 = 0x3fff;

type ErrorListener = Arc<dyn Fn(&StorageEvent<'_>) + Send + Sync>;

/// The clock domain a node id belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum NodeKind {
    Physical,
    Random,
}

/// Last observed timestamp, clock sequence and node id of one clock domain.
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct ClockState {
    last_timestamp: i64,
    clock_sequence: u16,
    node_id: Option<[u8; 6]>,
}

impl ClockState {
    pub(crate) fn new(clock_sequence: u16) -> Self {
        Self {
            last_timestamp: i64::MIN,
            clock_sequence: clock_sequence & CLOCK_SEQUENCE_MASK,
            node_id: None,
        }
    }

    fn random() -> Self {
        Self::new(random::shared())
    }

    /// Records a generation at `timestamp` with `node_id`, returning the clock sequence to use
    /// and whether anything other than the timestamp changed.
    pub(crate) fn refresh(&mut self, timestamp: i64, node_id: Option<[u8; 6]>) -> (u16, bool) {
        let mut changed = false;
        let mut increment = timestamp <= self.last_timestamp;
        if let Some(node_id) = node_id {
            match self.node_id.replace(node_id) {
                Some(prev) if prev != node_id => increment = true,
                Some(_) => {}
                None => changed = true,
            }
        }
        if increment {
            self.clock_sequence = self.clock_sequence.wrapping_add(1) & CLOCK_SEQUENCE_MASK;
            changed = true;
        }
        self.last_timestamp = timestamp;
        (self.clock_sequence, changed)
    }
}

struct Storage {
    path: Option<PathBuf>,
    last_save: Option<Instant>,
}

/// A storage failure waiting to be reported.
struct Failure(StorageOperation, PathBuf, StorageError);

/// Process-wide generator state with optional file persistence.
///
/// Most applications use the instance returned by [`GeneratorState::global()`], which the
/// shared generators of [`generator::of_version()`](crate::generator::of_version) are bound
/// to. Independent instances can be created for isolation and handed to generator
/// constructors explicitly.
pub struct GeneratorState {
    physical: Mutex<ClockState>,
    random: Mutex<ClockState>,
    random_node_id: Mutex<Option<[u8; 6]>>,
    storage: Mutex<Storage>,
    listener: RwLock<Option<ErrorListener>>,
    last_error: Mutex<Option<StorageFailure>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GeneratorState {
    /// Creates a state with random clock sequences and no storage file.
    pub fn new() -> Self {
        Self {
            physical: Mutex::new(ClockState::random()),
            random: Mutex::new(ClockState::random()),
            random_node_id: Mutex::new(None),
            storage: Mutex::new(Storage {
                path: None,
                last_save: None,
            }),
            listener: RwLock::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Returns the process-wide instance, creating it on first use.
    pub fn global() -> &'static Arc<GeneratorState> {
        static GLOBAL: OnceLock<Arc<GeneratorState>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(GeneratorState::new()))
    }

    /// Returns the current storage file, if any.
    pub fn storage_path(&self) -> Option<PathBuf> {
        lock(&self.storage).path.clone()
    }

    /// Sets the storage file and loads the state from it, returning `true` if the file was read
    /// successfully.
    ///
    /// The path is kept even when loading fails, so that the next save creates or repairs the
    /// file. Passing `None` detaches the state from any file and returns `false`, as nothing
    /// was loaded.
    pub fn set_storage_path(&self, path: Option<&Path>) -> bool {
        let failure = {
            let mut storage = lock(&self.storage);
            storage.path = path.map(Path::to_path_buf);
            storage.last_save = None;
            let Some(path) = path else {
                return false;
            };
            match StateRecord::load(path) {
                Ok(record) => {
                    debug!(path = %path.display(), "loaded generator state");
                    self.apply(record);
                    return true;
                }
                Err(e) => Failure(StorageOperation::Read, path.to_path_buf(), e),
            }
        };
        self.report(failure);
        false
    }

    /// Installs a listener that receives every storage failure.
    pub fn set_error_listener<F>(&self, listener: F)
    where
        F: Fn(&StorageEvent<'_>) + Send + Sync + 'static,
    {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    /// Returns the most recent storage failure.
    pub fn last_storage_error(&self) -> Option<StorageFailure> {
        lock(&self.last_error).clone()
    }

    /// Writes the current state to the storage file, returning `false` if no file is set or the
    /// write fails.
    pub fn save(&self) -> bool {
        let result = self.save_locked(&mut lock(&self.storage));
        self.finish_save(result)
    }

    /// Discards all clock state, starting over with fresh random clock sequences.
    pub fn reset(&self) {
        *lock(&self.physical) = ClockState::random();
        *lock(&self.random) = ClockState::random();
        *lock(&self.random_node_id) = None;
    }

    /// Returns the persisted random node id, creating one on first use.
    pub(crate) fn non_volatile_node_id(&self) -> [u8; 6] {
        *lock(&self.random_node_id).get_or_insert_with(random::node_id)
    }

    /// Advances the clock domain of `kind` and returns the clock sequence to use.
    pub(crate) fn refresh(&self, kind: NodeKind, timestamp: i64, node_id: Option<[u8; 6]>) -> u16 {
        let (sequence, changed) = lock(self.domain(kind)).refresh(timestamp, node_id);
        self.save_if_due(changed);
        sequence
    }

    fn domain(&self, kind: NodeKind) -> &Mutex<ClockState> {
        match kind {
            NodeKind::Physical => &self.physical,
            NodeKind::Random => &self.random,
        }
    }

    /// Saves after a change, or after [`SAVE_INTERVAL`] unless another thread is saving.
    fn save_if_due(&self, changed: bool) {
        let result = {
            let mut storage = if changed {
                lock(&self.storage)
            } else {
                match self.storage.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(e)) => e.into_inner(),
                    Err(TryLockError::WouldBlock) => return,
                }
            };
            if storage.path.is_none() {
                return;
            }
            let due = storage
                .last_save
                .map_or(true, |last| last.elapsed() >= SAVE_INTERVAL);
            if !(changed || due) {
                return;
            }
            self.save_locked(&mut storage)
        };
        self.finish_save(result);
    }

    /// Writes the snapshot while the storage lock is held; failures are reported by the caller
    /// once the lock is released.
    fn save_locked(&self, storage: &mut Storage) -> Option<Result<(), Failure>> {
        let path = storage.path.clone()?;
        storage.last_save = Some(Instant::now());
        Some(
            self.snapshot()
                .store(&path)
                .map_err(|e| Failure(StorageOperation::Write, path, e)),
        )
    }

    fn finish_save(&self, result: Option<Result<(), Failure>>) -> bool {
        match result {
            Some(Ok(())) => true,
            Some(Err(failure)) => {
                self.report(failure);
                false
            }
            None => false,
        }
    }

    fn snapshot(&self) -> StateRecord {
        let physical = lock(&self.physical).clone();
        let random = lock(&self.random).clone();
        let random_node_id = *lock(&self.random_node_id);
        let timestamp = physical.last_timestamp.max(random.last_timestamp);
        StateRecord {
            timestamp: (timestamp != i64::MIN).then_some(timestamp),
            physical_sequence: Some(physical.clock_sequence),
            random_sequence: Some(random.clock_sequence),
            physical_node_id: physical.node_id,
            random_node_id: random_node_id.or(random.node_id),
        }
    }

    fn apply(&self, record: StateRecord) {
        let restore = |sequence: Option<u16>, node_id| {
            let mut state = sequence.map_or_else(ClockState::random, ClockState::new);
            state.last_timestamp = record.timestamp.unwrap_or(i64::MIN);
            state.node_id = node_id;
            state
        };
        *lock(&self.physical) = restore(record.physical_sequence, record.physical_node_id);
        *lock(&self.random) = restore(record.random_sequence, record.random_node_id);
        *lock(&self.random_node_id) = record.random_node_id;
    }

    /// Logs and records `failure`, then hands it to the listener. Must not be called with the
    /// storage lock held, as the listener may call back into the state.
    fn report(&self, Failure(operation, path, error): Failure) {
        warn!(path = %path.display(), ?operation, "generator state storage failed: {error}");
        *lock(&self.last_error) = Some(StorageFailure {
            operation,
            path: path.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(&StorageEvent {
                operation,
                path: &path,
                error: &error,
            });
        }
    }
}

/// Flushes progress the save throttle has not written yet.
impl Drop for GeneratorState {
    fn drop(&mut self) {
        let storage = self.storage.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = storage.path.take() {
            if let Err(e) = self.snapshot().store(&path) {
                warn!(path = %path.display(), "failed to flush generator state: {e}");
            }
        }
    }
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self::new()
    }
}

/// The clock domain a generator advances: a domain of a shared [`GeneratorState`], or a private
/// one owned by a generator built with custom settings.
pub(crate) enum ClockDomain {
    Shared(Arc<GeneratorState>, NodeKind),
    Private(Mutex<ClockState>),
}

impl ClockDomain {
    pub(crate) fn refresh(&self, timestamp: i64, node_id: Option<[u8; 6]>) -> u16 {
        match self {
            Self::Shared(state, kind) => state.refresh(*kind, timestamp, node_id),
            Self::Private(state) => lock(state).refresh(timestamp, node_id).0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use crate::storage::tests::raw_record;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Increments the clock sequence when the clock does not advance
    #[test]
    fn increments_the_clock_sequence_when_the_clock_does_not_advance() {
        let mut state = ClockState::new(100);
        assert_eq!(state.refresh(10, None), (100, false));
        assert_eq!(state.refresh(11, None), (100, false));
        assert_eq!(state.refresh(11, None), (101, true));
        assert_eq!(state.refresh(5, None), (102, true));
        assert_eq!(state.refresh(6, None), (102, false));
    }

    /// Increments the clock sequence when the node id changes
    #[test]
    fn increments_the_clock_sequence_when_the_node_id_changes() {
        let mut state = ClockState::new(CLOCK_SEQUENCE_MASK);
        assert_eq!(state.refresh(1, Some([1; 6])), (CLOCK_SEQUENCE_MASK, true));
        assert_eq!(state.refresh(2, Some([1; 6])), (CLOCK_SEQUENCE_MASK, false));
        assert_eq!(state.refresh(3, Some([2; 6])), (0, true));
        assert_eq!(state.refresh(3, Some([3; 6])), (1, true));
    }

    /// Reports storage failures to the listener and keeps the last one
    #[test]
    fn reports_storage_failures_to_the_listener_and_keeps_the_last_one() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");
        let state = GeneratorState::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        state.set_error_listener(move |event| {
            assert_eq!(event.operation, StorageOperation::Read);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!state.set_storage_path(Some(path.as_path())));
        let failure = state.last_storage_error().unwrap();
        assert_eq!(failure.kind, StorageErrorKind::FileNotFound);
        assert_eq!(failure.path, path);

        fs::write(&path, [])?;
        assert!(!state.set_storage_path(Some(path.as_path())));
        assert_eq!(
            state.last_storage_error().map(|e| e.kind),
            Some(StorageErrorKind::UnexpectedEndOfData)
        );

        fs::write(&path, raw_record(1234, 0, 0, 0, [0; 6]))?;
        assert!(!state.set_storage_path(Some(path.as_path())));
        assert_eq!(
            state.last_storage_error().map(|e| e.kind),
            Some(StorageErrorKind::InvalidData)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.storage_path(), Some(path));
        Ok(())
    }

    /// Lets the listener call back into the state on the read path
    #[test]
    fn lets_the_listener_call_back_into_the_state_on_the_read_path() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let path = blocker.join("state.bin");

        let state = Arc::new(GeneratorState::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::downgrade(&state);
        let sink = seen.clone();
        state.set_error_listener(move |event| {
            let state = weak.upgrade().unwrap();
            assert_eq!(state.storage_path().as_deref(), Some(event.path));
            let failure = state.last_storage_error().unwrap();
            sink.lock().unwrap().push(failure.operation);
        });

        assert!(!state.set_storage_path(Some(path.as_path())));
        assert_eq!(*seen.lock().unwrap(), [StorageOperation::Read]);
        assert_eq!(
            state.last_storage_error().map(|e| e.kind),
            Some(StorageErrorKind::Io)
        );
        Ok(())
    }

    /// Reports write failures raised while generating without blocking
    #[test]
    fn reports_write_failures_raised_while_generating_without_blocking() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let path = blocker.join("state.bin");

        let state = Arc::new(GeneratorState::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&state);
        let counter = calls.clone();
        state.set_error_listener(move |_| {
            let state = weak.upgrade().unwrap();
            assert!(state.storage_path().is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        state.set_storage_path(Some(path.as_path()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // a new node id forces a save
        state.refresh(NodeKind::Physical, 1, Some([2; 6]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let failure = state.last_storage_error().unwrap();
        assert_eq!(failure.operation, StorageOperation::Write);
        assert_eq!(failure.kind, StorageErrorKind::Io);
        assert_eq!(failure.path, path);

        // timestamp-only progress is throttled
        state.refresh(NodeKind::Physical, 2, Some([2; 6]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(!state.save());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    /// Returns false when detached from a file
    #[test]
    fn returns_false_when_detached_from_a_file() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");
        let state = GeneratorState::new();
        assert!(!state.set_storage_path(Some(path.as_path())));
        assert!(!state.set_storage_path(None));
        assert_eq!(state.storage_path(), None);
        assert!(!state.save());
        Ok(())
    }

    /// Flushes throttled progress when dropped
    #[test]
    fn flushes_throttled_progress_when_dropped() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");
        let state = GeneratorState::new();
        state.set_storage_path(Some(path.as_path()));
        state.refresh(NodeKind::Physical, 1_000, Some([1; 6]));
        state.refresh(NodeKind::Physical, 2_000, Some([1; 6]));
        assert_eq!(StateRecord::load(&path).unwrap().timestamp, Some(1_000));

        drop(state);
        assert_eq!(StateRecord::load(&path).unwrap().timestamp, Some(2_000));
        Ok(())
    }

    /// Resumes a saved state
    #[test]
    fn resumes_a_saved_state() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");
        let first = GeneratorState::new();
        first.set_storage_path(Some(path.as_path()));
        let a = first.refresh(NodeKind::Physical, 1_000, Some([1; 6]));
        let b = first.refresh(NodeKind::Random, 500, None);
        let node = first.non_volatile_node_id();
        assert!(first.save());

        let second = GeneratorState::new();
        assert!(second.set_storage_path(Some(path.as_path())));
        assert_eq!(second.non_volatile_node_id(), node);
        assert_eq!(second.refresh(NodeKind::Physical, 2_000, Some([1; 6])), a);
        assert_eq!(second.refresh(NodeKind::Random, 1_000, None), (b + 1) & CLOCK_SEQUENCE_MASK);
        Ok(())
    }

    /// Honors only flagged fields of a state file
    #[test]
    fn honors_only_flagged_fields_of_a_state_file() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");

        fs::write(&path, raw_record(4122, 0x01 | 0x02, i64::MAX, 42, [0; 6]))?;
        let state = GeneratorState::new();
        assert!(state.set_storage_path(Some(path.as_path())));
        assert_eq!(state.refresh(NodeKind::Random, 0, Some([9; 6])), 43);

        fs::write(&path, raw_record(4122, 0x02, 0, 42, [0; 6]))?;
        let state = GeneratorState::new();
        assert!(state.set_storage_path(Some(path.as_path())));
        assert_eq!(state.refresh(NodeKind::Physical, 0, Some([9; 6])), 42);

        fs::write(&path, raw_record(4122, 0x03_0000, 0, (44 << 16) | 42, [0; 6]))?;
        let state = GeneratorState::new();
        assert!(state.set_storage_path(Some(path.as_path())));
        assert_eq!(state.refresh(NodeKind::Physical, 0, Some([9; 6])), 42);
        assert_eq!(state.refresh(NodeKind::Random, 0, Some([8; 6])), 44);

        let random_node = [0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa];
        fs::write(&path, raw_record(4122, 0x08, 0, 0, random_node))?;
        let state = GeneratorState::new();
        assert!(state.set_storage_path(Some(path.as_path())));
        assert_eq!(state.non_volatile_node_id(), random_node);

        fs::write(&path, raw_record(4122, 0, i64::MAX, 42, random_node))?;
        let state = GeneratorState::new();
        assert!(state.set_storage_path(Some(path.as_path())));
        assert_ne!(state.non_volatile_node_id(), random_node);
        Ok(())
    }
}
