//! Tests for memory accounting and eviction in the reference collection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempera_core::MediaSource;
use tempera_storage::{
    LoadedMedia, Loader, MediaError, MediaErrorKind, MediaReference, ReferenceCollection,
};
use uuid::Uuid;

/// Loader returning `size` bytes per call.
struct SizedLoader {
    size: usize,
    calls: AtomicUsize,
}

impl SizedLoader {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Loader for SizedLoader {
    fn name(&self) -> &str {
        "sized"
    }

    async fn load(&self, _source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LoadedMedia::new(vec![0u8; self.size]))
    }
}

struct FailingLoader;

#[async_trait::async_trait]
impl Loader for FailingLoader {
    fn name(&self) -> &str {
        "failing"
    }

    async fn load(&self, _source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        Err(MediaError::loader("failing", "connection refused"))
    }
}

fn lazy(collection: &ReferenceCollection, size: usize) -> (Uuid, Arc<MediaReference>) {
    let reference = Arc::new(MediaReference::new(
        MediaSource::url(format!("https://cdn.example/{}", size)),
        SizedLoader::new(size),
    ));
    let id = collection.add(Arc::clone(&reference)).unwrap();
    (id, reference)
}

#[tokio::test]
async fn test_registration_does_not_charge_until_loaded() {
    let collection = ReferenceCollection::new(1000);
    let (id, reference) = lazy(&collection, 400);

    assert_eq!(collection.memory_usage(), 0);
    collection.load_bytes(id).await.unwrap();
    assert_eq!(collection.memory_usage(), 400);
    assert!(reference.is_cached());

    // Cached hit does not charge twice.
    collection.load_bytes(id).await.unwrap();
    assert_eq!(collection.memory_usage(), 400);

    let snapshot = collection.metrics().snapshot();
    assert_eq!(snapshot.registrations, 1);
    assert_eq!(snapshot.loads, 1);
    assert_eq!(snapshot.cache_hits, 1);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let collection = ReferenceCollection::new(1000);
    let err = collection.load_bytes(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(
        err.as_media().map(|e| &e.kind),
        Some(MediaErrorKind::NotFound(_))
    ));
    assert!(collection.evict(Uuid::new_v4()).is_err());
}

#[tokio::test]
async fn test_oldest_cached_is_evicted_first() {
    let collection = ReferenceCollection::new(1000);
    let (a, ref_a) = lazy(&collection, 400);
    let (b, ref_b) = lazy(&collection, 400);
    let (c, ref_c) = lazy(&collection, 400);

    collection.load_bytes(a).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    collection.load_bytes(b).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    collection.load_bytes(c).await.unwrap();

    assert!(!ref_a.is_cached());
    assert!(ref_b.is_cached());
    assert!(ref_c.is_cached());
    assert_eq!(collection.memory_usage(), 800);
    assert_eq!(collection.len(), 3);
    assert_eq!(collection.metrics().snapshot().evictions, 1);
}

#[tokio::test]
async fn test_memory_stays_within_budget_across_loads() {
    let max = 1000;
    let collection = ReferenceCollection::new(max);
    let sizes = [300, 450, 200, 600, 100, 350, 500];
    let ids: Vec<Uuid> = sizes.iter().map(|&s| lazy(&collection, s).0).collect();

    for round in 0..3 {
        for (i, id) in ids.iter().enumerate() {
            if (i + round) % 2 == 0 {
                collection.load_bytes(*id).await.unwrap();
                assert!(
                    collection.memory_usage() <= max,
                    "usage {} exceeds {}",
                    collection.memory_usage(),
                    max
                );
            }
        }
    }
}

#[tokio::test]
async fn test_in_memory_registration_evicts_previous_payload() {
    let collection = ReferenceCollection::new(1024 * 1024);
    let x = Arc::new(MediaReference::from_memory(vec![1u8; 2 * 1024 * 1024], "image/jpeg"));
    let y = Arc::new(MediaReference::from_memory(vec![2u8; 2 * 1024 * 1024], "image/jpeg"));

    collection.add(Arc::clone(&x)).unwrap();
    let y_id = collection.add(Arc::clone(&y)).unwrap();
    collection.load_bytes(y_id).await.unwrap();

    assert!(!x.is_cached());
    assert!(y.is_cached());
    assert_eq!(collection.memory_usage(), y.estimate_memory_usage());
}

#[tokio::test]
async fn test_failed_load_is_not_charged() {
    let collection = ReferenceCollection::new(1000);
    let reference = Arc::new(MediaReference::new(
        MediaSource::url("https://cdn.example/down"),
        Arc::new(FailingLoader),
    ));
    let id = collection.add(reference).unwrap();

    assert!(collection.load_bytes(id).await.is_err());
    assert_eq!(collection.memory_usage(), 0);
    assert_eq!(collection.metrics().snapshot().load_failures, 1);
}

#[tokio::test]
async fn test_evict_and_reload_recharges() {
    let collection = ReferenceCollection::new(1000);
    let loader = SizedLoader::new(250);
    let reference = Arc::new(MediaReference::new(
        MediaSource::url("https://cdn.example/reload"),
        loader.clone(),
    ));
    let id = collection.add(reference).unwrap();

    collection.load_bytes(id).await.unwrap();
    assert_eq!(collection.evict(id).unwrap(), 250);
    assert_eq!(collection.memory_usage(), 0);

    collection.load_bytes(id).await.unwrap();
    assert_eq!(collection.memory_usage(), 250);
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clear_resets_everything() {
    let collection = ReferenceCollection::new(1000);
    let (a, ref_a) = lazy(&collection, 100);
    let (b, _) = lazy(&collection, 200);
    collection.load_bytes(a).await.unwrap();
    collection.load_bytes(b).await.unwrap();

    assert_eq!(collection.evict_all(), 300);
    assert_eq!(collection.memory_usage(), 0);
    assert_eq!(collection.len(), 2);

    collection.load_bytes(a).await.unwrap();
    collection.clear();
    assert!(collection.is_empty());
    assert_eq!(collection.memory_usage(), 0);
    assert!(!ref_a.is_cached());
}

#[tokio::test]
async fn test_precached_additions_stay_within_budget() {
    let collection = ReferenceCollection::new(1000);
    let a = Arc::new(MediaReference::from_memory(vec![1u8; 600], "image/png"));
    let b = Arc::new(MediaReference::from_memory(vec![2u8; 600], "image/png"));
    let c = Arc::new(MediaReference::from_memory(vec![3u8; 300], "image/png"));

    collection.add(Arc::clone(&a)).unwrap();
    collection.add(Arc::clone(&b)).unwrap();
    assert!(!a.is_cached());
    assert!(b.is_cached());
    assert_eq!(collection.memory_usage(), 600);

    collection.add(Arc::clone(&c)).unwrap();
    assert!(b.is_cached());
    assert!(c.is_cached());
    assert_eq!(collection.memory_usage(), 900);
    assert_eq!(collection.metrics().snapshot().evictions, 1);
}

#[tokio::test]
async fn test_bytes_loaded_outside_the_collection_are_charged() {
    let collection = ReferenceCollection::new(1000);
    let (a, ref_a) = lazy(&collection, 700);
    let (b, ref_b) = lazy(&collection, 500);
    collection.load_bytes(a).await.unwrap();

    // Loaded behind the collection's back: not yet charged.
    ref_b.get_bytes().await.unwrap();
    assert_eq!(collection.memory_usage(), 700);

    // The next access through the collection charges it and trims.
    collection.load_bytes(b).await.unwrap();
    assert_eq!(collection.memory_usage(), 500);
    assert!(!ref_a.is_cached());
    assert!(ref_b.is_cached());
}
