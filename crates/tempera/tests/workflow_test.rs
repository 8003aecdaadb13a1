//! End-to-end tests: register media in a store, then resize and convert it.

use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tempera::{
    ContextConfig, ConversionOutput, ConversionTarget, ImageFormat, MediaErrorKind,
    TelemetryConfig, Tempera, TemperaConfig,
};

/// RGB noise, so the PNG stays roughly as large as the raw pixels.
fn fixture_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 7;
    let img = RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn tempera() -> Tempera {
    Tempera::new(TemperaConfig::bundled_defaults().unwrap()).unwrap()
}

#[tokio::test]
async fn test_resize_image_from_store() {
    // Another test binary may already own the global subscriber.
    let _ = tempera::init_telemetry_with_config(
        TelemetryConfig::new("tempera-tests").with_log_level("tempera=debug"),
    );
    let tempera = tempera();
    let store = tempera.context_store();
    store
        .set_image_from_memory("photo", fixture_png(600, 400), "image/png")
        .unwrap();

    let thumb = tempera.resize_image(&store, "photo", "gallery").await.unwrap();
    assert!(thumb.resized);
    assert_eq!(thumb.strategy_name, "thumbnail");
    assert_eq!((thumb.width, thumb.height), (Some(256), Some(256)));
    assert_eq!(thumb.mime_type, "image/jpeg");

    let vision = tempera
        .resize_image(&store, "photo", "vision.describe")
        .await
        .unwrap();
    assert_eq!(vision.strategy_name, "vision_optimized");
    assert_eq!((vision.width, vision.height), (Some(600), Some(400)));

    let again = tempera.resize_image(&store, "photo", "gallery").await.unwrap();
    assert!(again.cache_hit);
    assert_eq!(tempera.pipeline().stats().cache_hits, 1);
}

#[tokio::test]
async fn test_convert_image_from_store() {
    let tempera = tempera();
    let store = tempera.context_store();
    store
        .set_image_from_memory("photo", fixture_png(32, 32), "image/png")
        .unwrap();

    let output = tempera
        .convert_image(&store, "photo", ConversionTarget::Image(ImageFormat::Webp))
        .await
        .unwrap();
    match &output {
        ConversionOutput::Bytes { bytes, mime_type } => {
            assert_eq!(mime_type, "image/webp");
            assert_eq!(image::guess_format(bytes).unwrap(), image::ImageFormat::WebP);
        }
        other => panic!("expected bytes, got {:?}", other),
    }

    let data_url = tempera
        .convert_image(&store, "photo", ConversionTarget::DataUrl)
        .await
        .unwrap();
    assert!(data_url.as_text().unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_stores_share_metrics_but_not_keys() {
    let tempera = tempera();
    let first = tempera.context_store();
    let second = tempera.context_store();

    first
        .set_image_from_memory("a", vec![1u8; 128], "image/png")
        .unwrap();
    second
        .set_image_from_memory("b", vec![2u8; 128], "image/png")
        .unwrap();

    assert!(!first.contains_key("b"));
    assert_eq!(tempera.metrics().snapshot().registrations, 2);
}

#[tokio::test]
async fn test_context_limits_come_from_config() {
    let config = TemperaConfig::bundled_defaults()
        .unwrap()
        .with_context(ContextConfig::default().with_max_inline_bytes(16));
    let tempera = Tempera::new(config).unwrap();
    let store = tempera.context_store();

    let err = store
        .set_image_from_memory("big", vec![0u8; 17], "image/png")
        .unwrap_err();
    assert!(matches!(
        err.as_media().map(|e| &e.kind),
        Some(MediaErrorKind::TooLarge { .. })
    ));

    let err = store
        .set_image_from_url("remote", "https://cdn.example/cat.png")
        .unwrap_err();
    assert!(matches!(
        err.as_media().map(|e| &e.kind),
        Some(MediaErrorKind::NoLoader(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = TemperaConfig::default()
        .with_context(ContextConfig::default().with_max_memory_bytes(0));
    assert!(Tempera::new(config).is_err());
}

#[tokio::test]
async fn test_converted_media_counts_against_store_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    let payload = fixture_png(40, 30);
    std::fs::write(&path, &payload).unwrap();

    let tempera = tempera();
    let store = tempera.context_store();
    store
        .set_image_from_file("photo", path.to_string_lossy().to_string())
        .unwrap();
    assert_eq!(store.memory_usage(), 0);

    tempera
        .convert_image(&store, "photo", ConversionTarget::Image(ImageFormat::Jpeg))
        .await
        .unwrap();

    assert!(store.image_reference("photo").unwrap().is_cached());
    assert_eq!(store.memory_usage(), payload.len() as u64);
}
