use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use bitmap::Bitmap;
use texgen_core::{CacheKey, GenerationParams, TextureId};

use crate::backend::TextureBackend;
use crate::generation;
use crate::worker::{WorkerPool, WorkerPoolConfig};

const PENDING: u8 = 0;
const READY: u8 = 1;
const FAILED: u8 = 2;

/// Observed state of an entry's payload. Written exactly once by the
/// generation task, read lock-free by every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

/// A filled entry: the CPU texels and the GPU texture they were uploaded
/// to. Immutable from publication until the entry is destroyed.
#[derive(Debug)]
pub struct TexturePayload {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
    pub bitmap: Bitmap,
}

pub(crate) struct CacheSlot {
    pub(crate) key: CacheKey,
    readiness: AtomicU8,
    pub(crate) payload: OnceLock<TexturePayload>,
}

impl CacheSlot {
    fn new(key: CacheKey) -> Self {
        Self {
            key,
            readiness: AtomicU8::new(PENDING),
            payload: OnceLock::new(),
        }
    }

    pub(crate) fn readiness(&self) -> Readiness {
        match self.readiness.load(Ordering::Acquire) {
            PENDING => Readiness::Pending,
            READY => Readiness::Ready,
            FAILED => Readiness::Failed,
            other => panic!("internal invariant violated: readiness flag holds {other}"),
        }
    }

    /// Publish. The payload must already be stored: the Release store is
    /// what makes it visible to lock-free readers.
    pub(crate) fn mark_ready(&self) {
        let previous = self.readiness.swap(READY, Ordering::Release);
        assert_eq!(
            previous, PENDING,
            "internal invariant violated: readiness flag written twice"
        );
    }

    pub(crate) fn mark_failed(&self) {
        let previous = self.readiness.swap(FAILED, Ordering::Release);
        assert_eq!(
            previous, PENDING,
            "internal invariant violated: readiness flag written twice"
        );
    }
}

/// One counted reference to a cache entry. Not clonable: every handle is
/// one refcount unit, created by `acquire`/`create` and consumed by
/// `release`.
pub struct TextureHandle {
    key: CacheKey,
    slot: Arc<CacheSlot>,
    released: bool,
}

impl TextureHandle {
    fn new(key: CacheKey, slot: Arc<CacheSlot>) -> Self {
        Self {
            key,
            slot,
            released: false,
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Lock-free readiness read.
    pub fn readiness(&self) -> Readiness {
        self.slot.readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// The published payload, or None while pending or failed.
    pub fn payload(&self) -> Option<&TexturePayload> {
        match self.readiness() {
            Readiness::Ready => Some(
                self.slot
                    .payload
                    .get()
                    .expect("internal invariant violated: ready entry has no payload"),
            ),
            Readiness::Pending | Readiness::Failed => None,
        }
    }

    pub(crate) fn slot(&self) -> &CacheSlot {
        &self.slot
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TextureHandle")
            .field("key", &self.key)
            .field("readiness", &self.readiness())
            .finish()
    }
}

impl Drop for TextureHandle {
    fn drop(&mut self) {
        if !self.released && !std::thread::panicking() {
            eprintln!(
                "[texture_cache] handle dropped without release; one reference to {:?} is leaked",
                self.key
            );
        }
    }
}

/// Permission to dispatch the generation for a freshly created entry.
/// Returned only by `create`, consumed only by `dispatch`: ownership makes
/// a second generation for the same entry unrepresentable. Dropping a
/// ticket undisposed marks the entry failed so converged waiters observe a
/// terminal state instead of polling forever.
pub struct GenerationTicket {
    slot: Arc<CacheSlot>,
    armed: bool,
}

impl std::fmt::Debug for GenerationTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationTicket")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl GenerationTicket {
    fn new(slot: Arc<CacheSlot>) -> Self {
        Self { slot, armed: true }
    }

    fn disarm(mut self) -> Arc<CacheSlot> {
        self.armed = false;
        Arc::clone(&self.slot)
    }
}

impl Drop for GenerationTicket {
    fn drop(&mut self) {
        if self.armed {
            eprintln!(
                "[texture_cache] generation ticket for {:?} dropped without dispatch; entry marked failed",
                self.slot.key
            );
            self.slot.mark_failed();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    UnknownKey { key: CacheKey },
}

impl fmt::Display for AcquireError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::UnknownKey { key } => {
                write!(formatter, "no cache entry exists for {key:?}")
            }
        }
    }
}

impl std::error::Error for AcquireError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    AlreadyExists { key: CacheKey },
}

impl fmt::Display for CreateError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::AlreadyExists { key } => {
                write!(formatter, "a cache entry already exists for {key:?}")
            }
        }
    }
}

impl std::error::Error for CreateError {}

struct EntryState {
    slot: Arc<CacheSlot>,
    refcount: u32,
}

/// The state generation tasks share with the cache front: the backend and
/// the serialized key-to-entry map. Tasks hold this through an `Arc` so a
/// task can release its own reference from a worker thread.
pub(crate) struct CacheShared {
    backend: Arc<dyn TextureBackend>,
    entries: Mutex<HashMap<CacheKey, EntryState>>,
}

impl CacheShared {
    pub(crate) fn backend(&self) -> &Arc<dyn TextureBackend> {
        &self.backend
    }

    fn has(&self, key: CacheKey) -> bool {
        self.entries
            .lock()
            .expect("cache map poisoned")
            .contains_key(&key)
    }

    fn acquire(&self, key: CacheKey) -> Result<TextureHandle, AcquireError> {
        let mut entries = self.entries.lock().expect("cache map poisoned");
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.refcount += 1;
                Ok(TextureHandle::new(key, Arc::clone(&entry.slot)))
            }
            None => {
                eprintln!("[texture_cache] acquire for absent {key:?}");
                Err(AcquireError::UnknownKey { key })
            }
        }
    }

    fn create(&self, key: CacheKey) -> Result<(TextureHandle, GenerationTicket), CreateError> {
        let mut entries = self.entries.lock().expect("cache map poisoned");
        if entries.contains_key(&key) {
            return Err(CreateError::AlreadyExists { key });
        }
        let slot = Arc::new(CacheSlot::new(key));
        entries.insert(
            key,
            EntryState {
                slot: Arc::clone(&slot),
                refcount: 1,
            },
        );
        if crate::trace_enabled() {
            eprintln!("[texture_cache] created entry for {key:?}");
        }
        Ok((
            TextureHandle::new(key, Arc::clone(&slot)),
            GenerationTicket::new(slot),
        ))
    }

    fn acquire_for_task(&self, key: CacheKey) -> TextureHandle {
        let mut entries = self.entries.lock().expect("cache map poisoned");
        let entry = entries
            .get_mut(&key)
            .expect("internal invariant violated: dispatch target missing from cache");
        entry.refcount += 1;
        TextureHandle::new(key, Arc::clone(&entry.slot))
    }

    pub(crate) fn release(&self, mut handle: TextureHandle) {
        handle.released = true;
        let defunct = {
            let mut entries = self.entries.lock().expect("cache map poisoned");
            let entry = entries
                .get_mut(&handle.key)
                .expect("internal invariant violated: released handle has no cache entry");
            entry.refcount -= 1;
            if entry.refcount == 0 {
                entries.remove(&handle.key).map(|entry| entry.slot)
            } else {
                None
            }
        };
        if let Some(slot) = defunct {
            self.destroy_slot(&slot);
        }
    }

    fn force_drain(&self) {
        let entries = std::mem::take(&mut *self.entries.lock().expect("cache map poisoned"));
        for (key, entry) in entries {
            eprintln!(
                "[texture_cache] shutdown force-drains entry {key:?} with refcount {}",
                entry.refcount
            );
            self.destroy_slot(&entry.slot);
        }
    }

    fn destroy_slot(&self, slot: &CacheSlot) {
        if let Some(payload) = slot.payload.get() {
            self.backend.destroy(payload.texture);
        }
        if crate::trace_enabled() {
            eprintln!("[texture_cache] destroyed entry for {:?}", slot.key);
        }
    }
}

/// Process-wide generated-texture cache. Created once at system start,
/// injected into nodes by `Arc`, shut down explicitly.
pub struct TextureCache {
    shared: Arc<CacheShared>,
    pool: WorkerPool,
}

impl TextureCache {
    pub fn new(backend: Arc<dyn TextureBackend>, pool_config: WorkerPoolConfig) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                backend,
                entries: Mutex::new(HashMap::new()),
            }),
            pool: WorkerPool::new(pool_config),
        }
    }

    pub fn has(&self, key: CacheKey) -> bool {
        self.shared.has(key)
    }

    /// Take one reference on an existing entry, ready or not. Absence is an
    /// invariant violation on the caller's side (check `has` first); it is
    /// reported loudly and left to the caller to treat as a miss.
    pub fn acquire(&self, key: CacheKey) -> Result<TextureHandle, AcquireError> {
        self.shared.acquire(key)
    }

    /// Insert an empty pending entry with refcount one. Check-then-insert
    /// happens under one lock acquisition: of two racing creators exactly
    /// one wins, and the loser converges through `acquire`.
    pub fn create(&self, key: CacheKey) -> Result<(TextureHandle, GenerationTicket), CreateError> {
        self.shared.create(key)
    }

    /// Submit the generation task for a freshly created entry. The task
    /// holds its own reference for the duration of the generation, so the
    /// entry outlives every early consumer release and a fully orphaned
    /// generation still tears its payload down through the refcount path.
    pub fn dispatch(&self, ticket: GenerationTicket, params: GenerationParams) {
        let slot = ticket.disarm();
        let task_ref = self.shared.acquire_for_task(slot.key);
        drop(slot);
        let shared = Arc::clone(&self.shared);
        self.pool
            .submit(move || generation::run(&shared, task_ref, params));
    }

    /// Give back one reference. At zero the entry is removed and its GPU
    /// payload destroyed before this call returns; the driver call is made
    /// after the map lock is dropped.
    pub fn release(&self, handle: TextureHandle) {
        self.shared.release(handle);
    }

    pub fn readiness(&self, handle: &TextureHandle) -> Readiness {
        handle.readiness()
    }

    pub fn is_ready(&self, handle: &TextureHandle) -> bool {
        handle.is_ready()
    }

    /// Teardown barrier: returns once no generation task is queued or
    /// running. The only blocking operation on the evaluation thread.
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }

    /// End-of-process path: drain the workers, then force-release anything
    /// still outstanding. Entries surviving to this point are leaks from
    /// consumers that never released; each is reported.
    pub fn shutdown(self) {
        self.pool.wait_idle();
        self.shared.force_drain();
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn entry_count(&self) -> usize {
        self.shared
            .entries
            .lock()
            .expect("cache map poisoned")
            .len()
    }

    #[cfg(any(test, feature = "test-helpers"))]
    pub fn refcount(&self, key: CacheKey) -> Option<u32> {
        self.shared
            .entries
            .lock()
            .expect("cache map poisoned")
            .get(&key)
            .map(|entry| entry.refcount)
    }
}

#[cfg(test)]
mod tests {
    use super::{AcquireError, CreateError, Readiness, TextureCache};
    use crate::test_support::RecordingBackend;
    use crate::worker::WorkerPoolConfig;
    use std::sync::Arc;
    use texgen_core::{CacheKey, GenerationParams, TextureSize};

    fn cache_with(backend: &Arc<RecordingBackend>, workers: usize) -> Arc<TextureCache> {
        Arc::new(TextureCache::new(
            Arc::clone(backend) as _,
            WorkerPoolConfig {
                worker_count: workers,
            },
        ))
    }

    fn params(size: TextureSize) -> GenerationParams {
        GenerationParams {
            size,
            ..GenerationParams::default()
        }
    }

    fn key_of(size: TextureSize) -> CacheKey {
        CacheKey::derive(&params(size))
    }

    #[test]
    fn acquire_without_entry_is_an_error() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        assert!(!cache.has(key));
        assert_eq!(
            cache.acquire(key).expect_err("no entry yet"),
            AcquireError::UnknownKey { key }
        );
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (handle, ticket) = cache.create(key).expect("first create");
        assert_eq!(
            cache.create(key).expect_err("second create must lose"),
            CreateError::AlreadyExists { key }
        );
        drop(ticket);
        cache.release(handle);
    }

    #[test]
    fn generation_publishes_payload_and_release_destroys_it() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge16);
        let (handle, ticket) = cache.create(key).expect("create");
        assert_eq!(cache.readiness(&handle), Readiness::Pending);

        cache.dispatch(ticket, params(TextureSize::Edge16));
        cache.wait_idle();

        assert!(cache.is_ready(&handle));
        let payload = handle.payload().expect("published payload");
        assert_eq!(payload.width, 16);
        assert_eq!(payload.height, 16);
        assert_eq!(payload.bitmap.width(), 16);
        assert_eq!(backend.alloc_count(), 1);
        assert_eq!(backend.upload_count(), 1);
        assert_eq!(backend.live_count(), 1);

        cache.release(handle);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(backend.destroyed_count(), 1);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn acquired_references_keep_the_entry_alive() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (first, ticket) = cache.create(key).expect("create");
        cache.dispatch(ticket, params(TextureSize::Edge8));
        cache.wait_idle();

        let second = cache.acquire(key).expect("entry exists");
        assert_eq!(cache.refcount(key), Some(2));

        cache.release(first);
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(backend.destroyed_count(), 0);

        cache.release(second);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(backend.destroyed_count(), 1);
    }

    #[test]
    fn failed_allocation_marks_the_entry_failed() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_next_allocs(1);
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (handle, ticket) = cache.create(key).expect("create");
        cache.dispatch(ticket, params(TextureSize::Edge8));
        cache.wait_idle();

        assert_eq!(cache.readiness(&handle), Readiness::Failed);
        assert!(handle.payload().is_none());
        cache.release(handle);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(backend.destroyed_count(), 0);
    }

    #[test]
    fn dropped_ticket_marks_the_entry_failed() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (handle, ticket) = cache.create(key).expect("create");
        drop(ticket);
        assert_eq!(cache.readiness(&handle), Readiness::Failed);
        cache.release(handle);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn racing_creators_converge_on_one_entry_and_one_generation() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 2);
        let key = key_of(TextureSize::Edge32);
        let generation_params = params(TextureSize::Edge32);

        let handles: Vec<_> = std::thread::scope(|scope| {
            (0..8)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    scope.spawn(move || match cache.create(key) {
                        Ok((handle, ticket)) => {
                            cache.dispatch(ticket, generation_params);
                            handle
                        }
                        Err(CreateError::AlreadyExists { .. }) => {
                            cache.acquire(key).expect("loser converges on the entry")
                        }
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|worker| worker.join().expect("racing thread"))
                .collect()
        });

        cache.wait_idle();
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(backend.alloc_count(), 1, "exactly one generation may run");
        assert_eq!(cache.refcount(key), Some(8));

        for handle in handles {
            assert!(handle.is_ready());
            cache.release(handle);
        }
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(backend.destroyed_count(), 1);
    }

    #[test]
    fn orphaned_generation_still_destroys_its_payload() {
        // Every consumer releases while the generation is still blocked in
        // the backend; the task's own reference must carry the entry to
        // completion and then tear it down.
        let backend = Arc::new(RecordingBackend::new());
        backend.close_gate();
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (handle, ticket) = cache.create(key).expect("create");
        cache.dispatch(ticket, params(TextureSize::Edge8));

        cache.release(handle);
        assert_eq!(cache.entry_count(), 1, "task reference keeps the entry");

        backend.open_gate();
        cache.wait_idle();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(backend.alloc_count(), 1);
        assert_eq!(backend.destroyed_count(), 1);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn shutdown_force_drains_outstanding_entries() {
        let backend = Arc::new(RecordingBackend::new());
        let cache = cache_with(&backend, 1);
        let key = key_of(TextureSize::Edge8);
        let (handle, ticket) = cache.create(key).expect("create");
        cache.dispatch(ticket, params(TextureSize::Edge8));
        cache.wait_idle();
        std::mem::forget(handle);

        let cache = Arc::try_unwrap(cache)
            .unwrap_or_else(|_| panic!("cache uniquely owned after wait_idle"));
        cache.shutdown();
        assert_eq!(backend.destroyed_count(), 1);
        assert_eq!(backend.live_count(), 0);
    }
}
