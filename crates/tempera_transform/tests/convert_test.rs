//! Tests for converter selection, caching, and the built-in converters.

mod common;

use common::{noise_image, png};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempera_cache::CacheConfig;
use tempera_core::{ImageFormat, MediaSource};
use tempera_error::TemperaResult;
use tempera_storage::{Base64Loader, LoadedMedia, Loader, MediaError, MediaReference};
use tempera_transform::{
    ConversionErrorKind, ConversionOutput, ConversionTarget, Converter, ConverterChain,
};

/// Converter with a fixed score that counts conversions.
struct FixedConverter {
    name: &'static str,
    score: u32,
    calls: AtomicUsize,
}

impl FixedConverter {
    fn new(name: &'static str, score: u32) -> Arc<Self> {
        Arc::new(Self {
            name,
            score,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Converter for FixedConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn can_convert(&self, _source: &MediaReference, target: ConversionTarget) -> bool {
        target == ConversionTarget::Url
    }

    fn score(&self, _source: &MediaReference, _target: ConversionTarget) -> u32 {
        self.score
    }

    async fn convert(
        &self,
        _source: &MediaReference,
        _target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ConversionOutput::Text(self.name.to_string()))
    }
}

struct StaticLoader(Vec<u8>);

#[async_trait::async_trait]
impl Loader for StaticLoader {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self, _source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        Ok(LoadedMedia::new(self.0.clone()).with_mime_type("image/png"))
    }
}

fn url_reference() -> MediaReference {
    MediaReference::new(
        MediaSource::url("https://cdn.example/cat.png"),
        Arc::new(StaticLoader(png(&noise_image(16, 16, 2)))),
    )
}

#[tokio::test]
async fn test_highest_score_wins_and_ties_go_to_first_registered() {
    let mut chain = ConverterChain::new(CacheConfig::default());
    let low = FixedConverter::new("low", 10);
    let first = FixedConverter::new("first", 50);
    let second = FixedConverter::new("second", 50);
    chain.register(low);
    chain.register(first);
    chain.register(second);

    let reference = url_reference();
    let picked = chain.find_converter(&reference, ConversionTarget::Url).unwrap();
    assert_eq!(picked.name(), "first");
    assert!(chain.find_converter(&reference, ConversionTarget::Bytes).is_none());
}

#[tokio::test]
async fn test_outputs_are_cached() {
    let mut chain = ConverterChain::new(CacheConfig::default());
    let converter = FixedConverter::new("only", 1);
    chain.register(converter.clone());
    let reference = url_reference();

    chain.convert(&reference, ConversionTarget::Url).await.unwrap();
    chain.convert(&reference, ConversionTarget::Url).await.unwrap();

    assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.cache_len(), 1);
    chain.clear_cache();
    assert_eq!(chain.cache_len(), 0);
}

#[tokio::test]
async fn test_missing_route_is_no_converter() {
    let chain = ConverterChain::new(CacheConfig::default());
    let err = chain
        .convert(&url_reference(), ConversionTarget::Base64)
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_conversion().map(|e| &e.kind),
        Some(ConversionErrorKind::NoConverter { .. })
    ));
}

#[tokio::test]
async fn test_default_routes_for_url_source() {
    let chain = ConverterChain::with_defaults(CacheConfig::default());
    let reference = url_reference();

    // Uncached remote bytes go through the downloader...
    let picked = chain.find_converter(&reference, ConversionTarget::Bytes).unwrap();
    assert_eq!(picked.name(), "download");

    let url = chain.convert(&reference, ConversionTarget::Url).await.unwrap();
    assert_eq!(url.as_text(), Some("https://cdn.example/cat.png"));

    // ...and once cached the URL converter is preferred.
    reference.get_bytes().await.unwrap();
    let picked = chain.find_converter(&reference, ConversionTarget::Bytes).unwrap();
    assert_eq!(picked.name(), "url");
    assert_eq!(
        chain.find_converter(&reference, ConversionTarget::DataUrl).unwrap().name(),
        "base64"
    );
}

#[tokio::test]
async fn test_image_conversion_reencodes() {
    let chain = ConverterChain::with_defaults(CacheConfig::default());
    let reference = url_reference();

    let output = chain
        .convert(&reference, ConversionTarget::Image(ImageFormat::Jpeg))
        .await
        .unwrap();

    match output {
        ConversionOutput::Bytes { bytes, mime_type } => {
            assert_eq!(mime_type, "image/jpeg");
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (16, 16));
        }
        other => panic!("expected bytes, got {:?}", other),
    }
}

#[tokio::test]
async fn test_base64_of_memory_reference() {
    let chain = ConverterChain::with_defaults(CacheConfig::default());
    let reference = MediaReference::from_memory(b"hi".to_vec(), "text/plain");

    let output = chain.convert(&reference, ConversionTarget::Base64).await.unwrap();
    assert_eq!(output.as_text(), Some("aGk="));
}

#[tokio::test]
async fn test_bytes_route_for_local_sources() {
    let chain = ConverterChain::with_defaults(CacheConfig::default());

    let memory = MediaReference::from_memory(b"hi".to_vec(), "text/plain");
    let output = chain.convert(&memory, ConversionTarget::Bytes).await.unwrap();
    match output {
        ConversionOutput::Bytes { bytes, mime_type } => {
            assert_eq!(&*bytes, b"hi");
            assert_eq!(mime_type, "text/plain");
        }
        other => panic!("expected bytes, got {:?}", other),
    }

    let inline = MediaReference::new(MediaSource::base64("aGk="), Arc::new(Base64Loader));
    let picked = chain.find_converter(&inline, ConversionTarget::Bytes).unwrap();
    assert_eq!(picked.name(), "download");
    let output = chain.convert(&inline, ConversionTarget::Bytes).await.unwrap();
    assert_eq!(output.as_bytes().map(|bytes| bytes.len()), Some(2));
}
