// End-to-end pipeline tests: origin fetch, transform, fallback, authorization

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use s3imageserver::pipeline::{Authorizer, Dispatcher};
use s3imageserver::s3::S3Origin;
use s3imageserver::transform::ImageTransformer;
use tempfile::{NamedTempFile, TempDir};

use super::test_harness::{photos_config, png_fixture, MockS3};

fn dispatcher(config: &s3imageserver::config::Config) -> Dispatcher {
    Dispatcher::new(
        config,
        Arc::new(S3Origin::new().unwrap()),
        Arc::new(ImageTransformer),
        None,
    )
}

fn fallback_png(width: u32, height: u32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&png_fixture(width, height)).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_cold_request_is_resized_cached_and_served() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(400, 200))
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    let response = dispatcher
        .dispatch("/photos/cat.jpg", Some("w=100&h=100"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, Some("image/webp"));
    let img = image::load_from_memory(&response.body).unwrap();
    assert_eq!((img.width(), img.height()), (100, 100));

    dispatcher.flush().await;
    let cached = std::fs::read(cache.path().join("photos_w100_h100_ctrue_cat.webp")).unwrap();
    assert_eq!(Bytes::from(cached), response.body);
    assert_eq!(s3.request_count(), 1);
}

#[tokio::test]
async fn test_format_override_and_fit_mode() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/wide.png", 200, png_fixture(400, 200))
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    let response = dispatcher
        .dispatch("/photos/wide.png", Some("w=80&h=80&c=false&f=png"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, Some("image/png"));
    let img = image::load_from_memory(&response.body).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (80, 80));
    // Letterbox bands are white
    assert_eq!(img.get_pixel(40, 1), &image::Rgba([255, 255, 255, 255]));

    dispatcher.flush().await;
    assert!(cache.path().join("photos_w80_h80_cfalse_wide.png").exists());
}

#[tokio::test]
async fn test_configured_path_prefix_is_prepended_to_key() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/originals/cat.jpg", 200, png_fixture(20, 20))
        .start()
        .await;
    let mut config = photos_config(&s3.endpoint, cache.path(), "");
    config.handlers[0].s3.path = "originals/".to_string();
    let dispatcher = dispatcher(&config);

    let response = dispatcher.dispatch("/photos/cat.jpg", None).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_origin_error_serves_resized_fallback_with_404() {
    let cache = TempDir::new().unwrap();
    let fallback = fallback_png(300, 300);
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 403, b"<Error>AccessDenied</Error>".to_vec())
        .start()
        .await;
    let extra = format!("    error_image: \"{}\"", fallback.path().display());
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), &extra));

    let response = dispatcher.dispatch("/photos/cat.jpg", Some("w=50&h=50")).await;

    assert_eq!(response.status, 404);
    assert_eq!(response.content_length(), response.body.len());
    let img = image::load_from_memory(&response.body).unwrap();
    assert_eq!((img.width(), img.height()), (50, 50));

    // Nothing is cached for failures
    dispatcher.flush().await;
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_fallback_served_verbatim_when_resize_disabled() {
    let cache = TempDir::new().unwrap();
    let fallback = fallback_png(30, 30);
    let s3 = MockS3::new().start().await;
    let extra = format!(
        "    error_image: \"{}\"\n    error_resize_crop: false",
        fallback.path().display()
    );
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), &extra));

    let response = dispatcher.dispatch("/photos/missing.jpg", Some("w=10")).await;

    assert_eq!(response.status, 404);
    assert_eq!(response.body, Bytes::from(std::fs::read(fallback.path()).unwrap()));
    assert_eq!(response.content_type, Some("image/png"));
}

#[tokio::test]
async fn test_no_fallback_configured_is_empty_404() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new().start().await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    let response = dispatcher.dispatch("/photos/missing.jpg", None).await;

    assert_eq!(response.status, 404);
    assert!(response.body.is_empty());
    assert_eq!(response.content_type, None);
}

#[tokio::test]
async fn test_disallowed_extension_never_reaches_origin() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.bmp", 200, png_fixture(10, 10))
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    for query in [None, Some("w=10&h=10"), Some("c=false&f=png")] {
        let response = dispatcher.dispatch("/photos/cat.bmp", query).await;
        assert_eq!(response.status, 404);
    }
    assert_eq!(s3.request_count(), 0);
}

#[tokio::test]
async fn test_undecodable_source_is_served_unchanged() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/broken.jpg", 200, b"not really a jpeg".to_vec())
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    let response = dispatcher.dispatch("/photos/broken.jpg", Some("w=10")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Bytes::from_static(b"not really a jpeg"));
    assert_eq!(response.content_type, None);
}

#[tokio::test]
async fn test_authorizer_rejects_bad_token() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(20, 20))
        .start()
        .await;
    let authorizer: Authorizer = Arc::new(|token: &str| token == "let-me-in");
    let dispatcher = Dispatcher::new(
        &photos_config(&s3.endpoint, cache.path(), ""),
        Arc::new(S3Origin::new().unwrap()),
        Arc::new(ImageTransformer),
        Some(authorizer),
    );

    let rejected = dispatcher.dispatch("/photos/cat.jpg", Some("t=nope")).await;
    assert_eq!(rejected.status, 404);
    assert_eq!(s3.request_count(), 0);

    let accepted = dispatcher
        .dispatch("/photos/cat.jpg", Some("t=let-me-in"))
        .await;
    assert_eq!(accepted.status, 200);
    assert_eq!(s3.request_count(), 1);
}

#[tokio::test]
async fn test_concurrent_cold_requests_share_one_fetch() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(64, 64))
        .delay(Duration::from_millis(200))
        .start()
        .await;
    let dispatcher = Arc::new(dispatcher(&photos_config(&s3.endpoint, cache.path(), "")));

    let mut handles = vec![];
    for _ in 0..10 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.dispatch("/photos/cat.jpg", Some("w=32&h=32")).await
        }));
    }

    let mut bodies = vec![];
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, 200);
        bodies.push(response.body);
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(s3.request_count(), 1);
}
