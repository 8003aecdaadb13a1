//! Tests for the context store: typed values, media registration, and memory bounds.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempera_context::{ContextConfig, ContextEntry, ContextErrorKind, ContextStore, ContextValue};
use tempera_core::{MediaSource, SourceType};
use tempera_storage::{
    LoadErrorPolicy, LoadedMedia, Loader, LoaderRegistry, MediaError, MediaErrorKind,
    MediaMetrics,
};

const MIB: usize = 1024 * 1024;

struct CountingLoader {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingLoader {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }
}

#[async_trait::async_trait]
impl Loader for CountingLoader {
    fn name(&self) -> &str {
        "counting"
    }

    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::loader("counting", "503 from origin"));
        }
        Ok(LoadedMedia::new(source.locator().as_bytes().to_vec()).with_mime_type("image/png"))
    }
}

fn store_with_url_loader(loader: Arc<CountingLoader>, config: ContextConfig) -> ContextStore {
    let loaders = LoaderRegistry::with_defaults().with_loader(SourceType::Url, loader);
    ContextStore::with_loaders(config, loaders)
}

fn media_error_kind(err: &tempera_error::TemperaError) -> Option<&MediaErrorKind> {
    err.as_media().map(|e| &e.kind)
}

#[test]
fn test_typed_getters() {
    let store = ContextStore::default();
    store.set("count", 3);
    store.set("ratio", 0.5);
    store.set("flag", true);
    store.set("caption", "a cat");

    assert_eq!(store.get_int("count").unwrap(), 3);
    assert_eq!(store.get_float("count").unwrap(), 3.0);
    assert_eq!(store.get_float("ratio").unwrap(), 0.5);
    assert!(store.get_bool("flag").unwrap());
    assert_eq!(store.get_text("caption").unwrap(), "a cat");
    assert_eq!(store.get("caption"), Some(ContextValue::Text("a cat".into())));
    assert_eq!(store.keys(), vec!["caption", "count", "flag", "ratio"]);
}

#[test]
fn test_type_mismatch_and_missing_key() {
    let store = ContextStore::default();
    store.set("caption", "a cat");

    let err = store.get_int("caption").unwrap_err();
    match &err.as_context().unwrap().kind {
        ContextErrorKind::TypeMismatch {
            key,
            expected,
            actual,
        } => {
            assert_eq!(key, "caption");
            assert_eq!(expected, "int");
            assert_eq!(actual, "text");
        }
        other => panic!("unexpected kind {:?}", other),
    }

    let err = store.get_text("missing").unwrap_err();
    assert!(matches!(
        err.as_context().map(|e| &e.kind),
        Some(ContextErrorKind::KeyNotFound(_))
    ));
}

#[test]
fn test_json_round_trip_through_store() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Review {
        score: u8,
        tags: Vec<String>,
    }

    let store = ContextStore::default();
    let review = Review {
        score: 4,
        tags: vec!["sharp".into(), "bright".into()],
    };
    store.set_json("review", &review).unwrap();

    assert_eq!(store.get_as::<Review>("review").unwrap(), review);
    assert_eq!(store.get_object("review").unwrap()["score"], 4);
    assert!(store.get_as::<Vec<u8>>("review").is_err());
}

#[tokio::test]
async fn test_media_key_is_not_a_scalar() {
    let store = ContextStore::default();
    store
        .set_image_from_memory("photo", vec![7u8; 64], "image/png")
        .unwrap();
    store.set("caption", "a cat");

    let err = store.get_text("photo").unwrap_err();
    match &err.as_context().unwrap().kind {
        ContextErrorKind::TypeMismatch { actual, .. } => assert_eq!(actual, "media"),
        other => panic!("unexpected kind {:?}", other),
    }
    assert!(store.get("photo").is_none());

    let err = store.load_image_bytes("caption").await.unwrap_err();
    assert!(matches!(
        err.as_context().map(|e| &e.kind),
        Some(ContextErrorKind::NotMedia(_))
    ));
    assert_eq!(store.media_keys(), vec!["photo"]);
}

#[tokio::test]
async fn test_second_large_image_evicts_the_first() {
    let config = ContextConfig::default().with_max_memory_bytes(MIB as u64);
    let store = ContextStore::new(config);

    store
        .set_image_from_memory("x", vec![1u8; 2 * MIB], "image/jpeg")
        .unwrap();
    store
        .set_image_from_memory("y", vec![2u8; 2 * MIB], "image/jpeg")
        .unwrap();
    let bytes = store.load_image_bytes("y").await.unwrap();
    assert_eq!(bytes.len(), 2 * MIB);

    let x = store.image_reference("x").unwrap();
    let y = store.image_reference("y").unwrap();
    assert!(!x.is_cached());
    assert!(y.is_cached());
    assert_eq!(store.memory_usage(), y.estimate_memory_usage());

    // Evicted in-memory payloads reload from their own loader.
    assert_eq!(store.load_image_bytes("x").await.unwrap()[0], 1);
}

#[tokio::test]
async fn test_registration_is_lazy_and_loads_once() {
    let loader = CountingLoader::ok();
    let store = store_with_url_loader(loader.clone(), ContextConfig::default());

    store
        .set_image_from_url("remote", "https://cdn.example/a.png")
        .unwrap();
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.memory_usage(), 0);

    store.load_image_bytes("remote").await.unwrap();
    store.load_image_bytes("remote").await.unwrap();
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.memory_usage(), "https://cdn.example/a.png".len() as u64);

    let snapshot = store.metrics().snapshot();
    assert_eq!(snapshot.loads, 1);
    assert_eq!(snapshot.cache_hits, 1);
}

#[test]
fn test_url_without_loader_is_rejected() {
    let store = ContextStore::default();
    let err = store
        .set_image_from_url("remote", "https://cdn.example/a.png")
        .unwrap_err();
    assert!(matches!(media_error_kind(&err), Some(MediaErrorKind::NoLoader(_))));
    assert!(!store.contains_key("remote"));

    let err = store
        .set_image_from_object_store("blob", "bucket", "cats/a.png")
        .unwrap_err();
    assert!(matches!(media_error_kind(&err), Some(MediaErrorKind::NoLoader(_))));
}

#[test]
fn test_inline_payload_limit() {
    let config = ContextConfig::default().with_max_inline_bytes(1024);
    let store = ContextStore::new(config);

    let err = store
        .set_image_from_memory("big", vec![0u8; 1025], "image/png")
        .unwrap_err();
    assert!(matches!(
        media_error_kind(&err),
        Some(MediaErrorKind::TooLarge {
            size: 1025,
            limit: 1024
        })
    ));
    assert!(store.is_empty());
    assert!(store.set_image_from_memory("ok", vec![0u8; 1024], "image/png").is_ok());
}

#[tokio::test]
async fn test_delete_releases_media() {
    let store = ContextStore::default();
    let id = store
        .set_image_from_memory("photo", vec![9u8; 4096], "image/png")
        .unwrap();
    assert!(store.collection().contains(id));
    assert_eq!(store.memory_usage(), 4096);

    assert!(store.delete("photo"));
    assert!(!store.collection().contains(id));
    assert_eq!(store.memory_usage(), 0);
    assert!(!store.delete("photo"));
}

#[tokio::test]
async fn test_overwriting_media_releases_previous_reference() {
    let store = ContextStore::default();
    let first = store
        .set_image_from_memory("photo", vec![1u8; 512], "image/png")
        .unwrap();
    let second = store
        .set_image_from_memory("photo", vec![2u8; 256], "image/png")
        .unwrap();

    assert_ne!(first, second);
    assert!(!store.collection().contains(first));
    assert_eq!(store.entry("photo"), Some(ContextEntry::Media(second)));
    assert_eq!(store.memory_usage(), 256);

    store.set("photo", "now text");
    assert!(!store.collection().contains(second));
    assert!(store.collection().is_empty());
    assert_eq!(store.memory_usage(), 0);
}

#[tokio::test]
async fn test_overwrite_under_pressure_keeps_other_media() {
    let store = ContextStore::new(ContextConfig::default().with_max_memory_bytes(1000));
    let other = store
        .set_image_from_memory("other", vec![7u8; 400], "image/png")
        .unwrap();
    store
        .set_image_from_memory("photo", vec![1u8; 500], "image/png")
        .unwrap();
    let replaced = store
        .set_image_from_memory("photo", vec![2u8; 500], "image/png")
        .unwrap();

    assert!(store.collection().contains(other));
    assert!(store.collection().get(other).unwrap().is_cached());
    assert_eq!(store.entry("photo"), Some(ContextEntry::Media(replaced)));
    assert_eq!(store.memory_usage(), 900);
    assert_eq!(store.metrics().snapshot().evictions, 0);
    let bytes = store.load_image_bytes("other").await.unwrap();
    assert_eq!(&*bytes, &[7u8; 400][..]);
}

#[tokio::test]
async fn test_sticky_policy_until_evicted() {
    let loader = CountingLoader::failing();
    let store = store_with_url_loader(loader.clone(), ContextConfig::default());
    store
        .set_image_from_url("remote", "https://cdn.example/down.png")
        .unwrap();

    assert!(store.load_image_bytes("remote").await.is_err());
    assert!(store.load_image_bytes("remote").await.is_err());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    store.evict_image_cache("remote").unwrap();
    assert!(store.load_image_bytes("remote").await.is_err());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_policy_from_config() {
    let loader = CountingLoader::failing();
    let config = ContextConfig::default().with_load_error_policy(LoadErrorPolicy::Retry);
    let store = store_with_url_loader(loader.clone(), config);
    store
        .set_image_from_url("remote", "https://cdn.example/down.png")
        .unwrap();

    assert!(store.load_image_bytes("remote").await.is_err());
    assert!(store.load_image_bytes("remote").await.is_err());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_file_and_base64_sources() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\nrest").unwrap();

    let store = ContextStore::default();
    store
        .set_image_from_file("file", path.to_string_lossy().to_string())
        .unwrap();
    store
        .set_image_from_base64("inline", "data:image/gif;base64,aGVsbG8=")
        .unwrap();

    let bytes = store.load_image_bytes("file").await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));

    // Base64 sources come back as-is without a load.
    let url = store.get_image_data_url("inline").await.unwrap();
    assert_eq!(url, "data:image/gif;base64,aGVsbG8=");
    assert!(!store.image_reference("inline").unwrap().is_cached());
    assert_eq!(store.image_reference("inline").unwrap().mime_type(), "image/gif");

    let url = store.get_image_data_url("file").await.unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
    assert_eq!(store.memory_usage(), bytes.len() as u64);
}

#[tokio::test]
async fn test_clear_and_shared_metrics() {
    let metrics = MediaMetrics::new();
    let first = ContextStore::with_metrics(
        ContextConfig::default(),
        LoaderRegistry::with_defaults(),
        metrics.clone(),
    );
    let second = ContextStore::with_metrics(
        ContextConfig::default(),
        LoaderRegistry::with_defaults(),
        metrics.clone(),
    );

    first
        .set_image_from_memory("a", vec![0u8; 10], "image/png")
        .unwrap();
    second
        .set_image_from_memory("b", vec![0u8; 10], "image/png")
        .unwrap();
    assert_eq!(metrics.snapshot().registrations, 2);

    first.set("note", "kept until clear");
    first.clear();
    assert!(first.is_empty());
    assert_eq!(first.memory_usage(), 0);
    assert_eq!(second.len(), 1);
}
