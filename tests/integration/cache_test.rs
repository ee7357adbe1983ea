// Disk cache behaviour seen through the dispatcher: hits, staleness, TTL modes

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use s3imageserver::config::Config;
use s3imageserver::pipeline::Dispatcher;
use s3imageserver::s3::S3Origin;
use s3imageserver::transform::ImageTransformer;
use tempfile::TempDir;

use super::test_harness::{photos_config, png_fixture, MockS3};

const ENTRY: &str = "photos_w100_h100_ctrue_cat.webp";

fn dispatcher(config: &Config) -> Dispatcher {
    Dispatcher::new(
        config,
        Arc::new(S3Origin::new().unwrap()),
        Arc::new(ImageTransformer),
        None,
    )
}

fn write_entry(path: &Path, contents: &[u8], age: Duration) {
    std::fs::write(path, contents).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[tokio::test]
async fn test_fresh_entry_is_served_without_origin() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(200, 200))
        .start()
        .await;
    write_entry(&cache.path().join(ENTRY), b"cached bytes", Duration::from_secs(10));
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    let response = dispatcher
        .dispatch("/photos/cat.jpg", Some("w=100&h=100"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Bytes::from_static(b"cached bytes"));
    assert_eq!(s3.request_count(), 0);
}

#[tokio::test]
async fn test_stale_entry_is_refetched_and_replaced() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(200, 200))
        .start()
        .await;
    let entry = cache.path().join(ENTRY);
    write_entry(&entry, b"old bytes", Duration::from_secs(120));
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), "    cache_time: 60"));

    let response = dispatcher
        .dispatch("/photos/cat.jpg", Some("w=100&h=100"))
        .await;

    assert_eq!(response.status, 200);
    assert_ne!(response.body, Bytes::from_static(b"old bytes"));
    assert_eq!(s3.request_count(), 1);

    dispatcher.flush().await;
    assert_eq!(Bytes::from(std::fs::read(&entry).unwrap()), response.body);
}

#[tokio::test]
async fn test_forever_ttl_serves_ancient_entries() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new().start().await;
    write_entry(
        &cache.path().join(ENTRY),
        b"ancient",
        Duration::from_secs(10 * 365 * 24 * 3600),
    );
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), "    cache_time: 0"));

    let response = dispatcher
        .dispatch("/photos/cat.jpg", Some("w=100&h=100"))
        .await;

    assert_eq!(response.body, Bytes::from_static(b"ancient"));
    assert_eq!(s3.request_count(), 0);
}

#[tokio::test]
async fn test_disabled_ttl_ignores_and_never_writes_cache() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(200, 200))
        .start()
        .await;
    let entry = cache.path().join(ENTRY);
    write_entry(&entry, b"ignored", Duration::ZERO);
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), "    cache_time: -1"));

    for _ in 0..2 {
        let response = dispatcher
            .dispatch("/photos/cat.jpg", Some("w=100&h=100"))
            .await;
        assert_eq!(response.status, 200);
        assert_ne!(response.body, Bytes::from_static(b"ignored"));
    }
    dispatcher.flush().await;

    assert_eq!(s3.request_count(), 2);
    assert_eq!(std::fs::read(&entry).unwrap(), b"ignored");
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_cache_directory_is_created_on_first_write() {
    let root = TempDir::new().unwrap();
    let cache_dir = root.path().join("not").join("yet");
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(50, 50))
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, &cache_dir, ""));

    let response = dispatcher.dispatch("/photos/cat.jpg", None).await;
    assert_eq!(response.status, 200);

    dispatcher.flush().await;
    assert!(cache_dir.join("photos_w0_h0_ctrue_cat.webp").exists());
}

#[tokio::test]
async fn test_variants_are_cached_separately() {
    let cache = TempDir::new().unwrap();
    let s3 = MockS3::new()
        .object("/photo-bucket/cat.jpg", 200, png_fixture(50, 50))
        .start()
        .await;
    let dispatcher = dispatcher(&photos_config(&s3.endpoint, cache.path(), ""));

    dispatcher.dispatch("/photos/cat.jpg", Some("w=10")).await;
    dispatcher.dispatch("/photos/cat.jpg", Some("w=20")).await;
    dispatcher.dispatch("/photos/cat.jpg", Some("w=10&f=jpg")).await;
    dispatcher.flush().await;

    for name in [
        "photos_w10_h0_ctrue_cat.webp",
        "photos_w20_h0_ctrue_cat.webp",
        "photos_w10_h0_ctrue_cat.jpg",
    ] {
        assert!(cache.path().join(name).exists(), "{}", name);
    }
    assert_eq!(s3.request_count(), 3);
}
