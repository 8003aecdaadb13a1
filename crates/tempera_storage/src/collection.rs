//! Bounded-memory registry of media references.

use crate::{MediaMetrics, MediaReference};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempera_error::{MediaError, MediaErrorKind, TemperaResult};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Tracked {
    reference: Arc<MediaReference>,
    /// Bytes this reference currently contributes to the collection total.
    charged: u64,
}

#[derive(Default)]
struct CollectionState {
    references: HashMap<Uuid, Tracked>,
    current_memory_bytes: u64,
}

impl CollectionState {
    /// Evict the cached reference with the earliest `cached_at`, skipping `exclude`.
    ///
    /// Returns `false` when nothing is left to evict.
    fn evict_oldest_cached(&mut self, exclude: Option<Uuid>, metrics: &MediaMetrics) -> bool {
        let oldest = self
            .references
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .filter_map(|(id, tracked)| tracked.reference.cached_at().map(|at| (*id, at)))
            .min_by_key(|(_, at)| *at)
            .map(|(id, _)| id);

        let Some(id) = oldest else {
            return false;
        };
        self.evict_entry(id, metrics);
        true
    }

    fn evict_entry(&mut self, id: Uuid, metrics: &MediaMetrics) -> u64 {
        let Some(tracked) = self.references.get_mut(&id) else {
            return 0;
        };
        let freed = tracked.reference.evict_from_cache();
        self.current_memory_bytes = self.current_memory_bytes.saturating_sub(tracked.charged);
        tracked.charged = 0;
        if freed > 0 {
            metrics.record_eviction(freed);
            tracing::debug!(%id, freed, remaining = self.current_memory_bytes, "Evicted cached media");
        }
        freed
    }

    fn charge(&mut self, id: Uuid, bytes: u64) {
        if let Some(tracked) = self.references.get_mut(&id) {
            self.current_memory_bytes = self
                .current_memory_bytes
                .saturating_sub(tracked.charged)
                .saturating_add(bytes);
            tracked.charged = bytes;
        }
    }

    /// Charge `id` for the bytes it holds now, then evict other references
    /// until the total fits under `max` or nothing else is cached.
    ///
    /// Returns `false` when the charge was already correct.
    fn settle(&mut self, id: Uuid, max: u64, metrics: &MediaMetrics) -> bool {
        let Some(tracked) = self.references.get(&id) else {
            return false;
        };
        let held = tracked.reference.estimate_memory_usage();
        if held == tracked.charged {
            return false;
        }
        self.charge(id, held);
        while self.current_memory_bytes > max && self.evict_oldest_cached(Some(id), metrics) {}
        true
    }
}

/// Registry of [`MediaReference`]s that keeps cached bytes under a ceiling.
///
/// Registration and loads check the running total against the ceiling and
/// evict the reference with the oldest `cached_at` until the total fits.
/// Eviction only drops bytes; evicted references stay registered and reload
/// on their next access.
///
/// Map and counter live behind one lock that is never held across a load, so
/// a slow loader never blocks other registrations or reads.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tempera_storage::{MediaReference, ReferenceCollection};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let collection = ReferenceCollection::new(1024);
/// let first = Arc::new(MediaReference::from_memory(vec![0u8; 1024], "image/png"));
/// let second = Arc::new(MediaReference::from_memory(vec![1u8; 1024], "image/png"));
/// let first_id = collection.add(first.clone())?;
/// collection.add(second)?;
///
/// // Registering the second payload pushed the first one out.
/// assert!(!first.is_cached());
/// assert_eq!(collection.memory_usage(), 1024);
/// # let _ = first_id;
/// # Ok(())
/// # }
/// ```
pub struct ReferenceCollection {
    max_memory_bytes: u64,
    inner: RwLock<CollectionState>,
    metrics: MediaMetrics,
}

impl ReferenceCollection {
    /// Empty collection with the given ceiling and its own metrics.
    pub fn new(max_memory_bytes: u64) -> Self {
        Self::with_metrics(max_memory_bytes, MediaMetrics::new())
    }

    /// Empty collection reporting into an existing metrics collector.
    pub fn with_metrics(max_memory_bytes: u64, metrics: MediaMetrics) -> Self {
        Self {
            max_memory_bytes,
            inner: RwLock::new(CollectionState::default()),
            metrics,
        }
    }

    /// Configured ceiling in bytes.
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_bytes
    }

    /// Metrics handle for this collection.
    pub fn metrics(&self) -> &MediaMetrics {
        &self.metrics
    }

    /// Register a reference.
    ///
    /// When the collection is at or over its ceiling, older cached bytes are
    /// evicted first. A reference that arrives already cached (e.g. built
    /// with [`MediaReference::from_memory`]) is charged immediately, and other
    /// references are evicted until the total fits again.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::DuplicateId`] if the ID is already registered.
    #[tracing::instrument(skip(self, reference), fields(id = %reference.id(), source = %reference.source()))]
    pub fn add(&self, reference: Arc<MediaReference>) -> TemperaResult<Uuid> {
        let id = reference.id();
        let mut state = self.write_state();

        if state.references.contains_key(&id) {
            return Err(MediaError::new(MediaErrorKind::DuplicateId(id.to_string())).into());
        }

        while state.current_memory_bytes >= self.max_memory_bytes
            && state.evict_oldest_cached(None, &self.metrics)
        {}

        state.references.insert(id, Tracked { reference, charged: 0 });
        state.settle(id, self.max_memory_bytes, &self.metrics);
        self.metrics.record_registration();

        tracing::debug!(
            memory_usage = state.current_memory_bytes,
            max_memory = self.max_memory_bytes,
            "Registered media reference"
        );
        Ok(id)
    }

    /// Look up a registered reference.
    pub fn get(&self, id: Uuid) -> Option<Arc<MediaReference>> {
        self.read_state()
            .references
            .get(&id)
            .map(|tracked| Arc::clone(&tracked.reference))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: Uuid) -> bool {
        self.read_state().references.contains_key(&id)
    }

    /// IDs of all registered references.
    pub fn ids(&self) -> Vec<Uuid> {
        self.read_state().references.keys().copied().collect()
    }

    /// Number of registered references.
    pub fn len(&self) -> usize {
        self.read_state().references.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read_state().references.is_empty()
    }

    /// Bytes currently charged against the ceiling.
    pub fn memory_usage(&self) -> u64 {
        self.read_state().current_memory_bytes
    }

    /// Load the bytes of a registered reference.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::NotFound`] for an unknown ID, or the
    /// reference's load error.
    pub async fn load_bytes(&self, id: Uuid) -> TemperaResult<Arc<[u8]>> {
        self.load(id, None).await
    }

    /// [`ReferenceCollection::load_bytes`] that gives up when `cancel` fires.
    pub async fn load_bytes_with(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> TemperaResult<Arc<[u8]>> {
        self.load(id, Some(cancel)).await
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn load(&self, id: Uuid, cancel: Option<&CancellationToken>) -> TemperaResult<Arc<[u8]>> {
        let reference = self
            .get(id)
            .ok_or_else(|| MediaError::new(MediaErrorKind::NotFound(id.to_string())))?;

        if !reference.is_cached() {
            let mut state = self.write_state();
            while state.current_memory_bytes >= self.max_memory_bytes
                && state.evict_oldest_cached(Some(id), &self.metrics)
            {}
        }

        match reference.fetch(cancel).await {
            Ok((bytes, fresh)) => {
                if fresh {
                    let size = bytes.len() as u64;
                    self.metrics.record_load(size);
                    let mut state = self.write_state();
                    state.settle(id, self.max_memory_bytes, &self.metrics);
                    tracing::debug!(
                        size,
                        memory_usage = state.current_memory_bytes,
                        "Loaded media into collection"
                    );
                } else {
                    self.metrics.record_cache_hit();
                    // Bytes may have been loaded through the reference directly.
                    if self.write_state().settle(id, self.max_memory_bytes, &self.metrics) {
                        tracing::debug!("Charged media cached outside the collection");
                    }
                }
                Ok(bytes)
            }
            Err(err) => {
                self.metrics.record_load_failure();
                Err(err.into())
            }
        }
    }

    /// Evict the cached reference with the earliest `cached_at`.
    ///
    /// Returns `false` when no reference holds cached bytes.
    pub fn evict_oldest_cached(&self) -> bool {
        self.write_state().evict_oldest_cached(None, &self.metrics)
    }

    /// Drop the cached bytes of one reference, keeping it registered.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::NotFound`] for an unknown ID.
    pub fn evict(&self, id: Uuid) -> TemperaResult<u64> {
        let mut state = self.write_state();
        if !state.references.contains_key(&id) {
            return Err(MediaError::new(MediaErrorKind::NotFound(id.to_string())).into());
        }
        Ok(state.evict_entry(id, &self.metrics))
    }

    /// Drop the cached bytes of every reference. Returns the bytes released.
    pub fn evict_all(&self) -> u64 {
        let mut state = self.write_state();
        let ids: Vec<Uuid> = state.references.keys().copied().collect();
        let freed: u64 = ids
            .into_iter()
            .map(|id| state.evict_entry(id, &self.metrics))
            .sum();
        state.current_memory_bytes = 0;
        freed
    }

    /// Unregister a reference and release its cached bytes.
    pub fn remove(&self, id: Uuid) -> Option<Arc<MediaReference>> {
        let mut state = self.write_state();
        state.evict_entry(id, &self.metrics);
        let removed = state.references.remove(&id).map(|tracked| tracked.reference);
        if removed.is_some() {
            tracing::debug!(%id, memory_usage = state.current_memory_bytes, "Removed media reference");
        }
        removed
    }

    /// Evict everything and forget every reference.
    pub fn clear(&self) {
        let mut state = self.write_state();
        for tracked in state.references.values() {
            tracked.reference.evict_from_cache();
        }
        let count = state.references.len();
        state.references.clear();
        state.current_memory_bytes = 0;
        if count > 0 {
            tracing::debug!(count, "Cleared media collection");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CollectionState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CollectionState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ReferenceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("ReferenceCollection")
            .field("references", &state.references.len())
            .field("memory_usage", &state.current_memory_bytes)
            .field("max_memory_bytes", &self.max_memory_bytes)
            .finish()
    }
}
