//! Disk cache lookups and write-back

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::backend::DiskBackend;
use crate::cache::background::{WorkItem, WorkQueue, WorkTicket};
use crate::cache::{is_fresh, CacheKey, CacheLookup};
use crate::descriptor::TransformSpec;

/// Filesystem cache of transformed images
#[derive(Clone)]
pub struct DiskCache {
    backend: Arc<dyn DiskBackend>,
    queue: WorkQueue,
}

impl DiskCache {
    pub fn new(backend: Arc<dyn DiskBackend>, queue: WorkQueue) -> Self {
        Self { backend, queue }
    }

    /// Cache file location for a spec
    pub fn entry_path(spec: &TransformSpec) -> PathBuf {
        CacheKey::for_spec(spec).path(&spec.cache_root)
    }

    /// Look up the variant described by `spec`
    ///
    /// Stale entries are queued for removal and reported as `Stale`. Backend
    /// errors are logged and reported as `Miss`. Callers skip the lookup
    /// entirely when the spec's TTL disables caching.
    pub async fn lookup(&self, spec: &TransformSpec) -> CacheLookup {
        let path = Self::entry_path(spec);

        let modified = match self.backend.modified(&path).await {
            Ok(Some(modified)) => modified,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache stat failed");
                return CacheLookup::Miss;
            }
        };

        // Entries stamped in the future count as brand new
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if !is_fresh(spec.cache_ttl, age) {
            tracing::debug!(
                path = %path.display(),
                age_secs = age.as_secs(),
                "Cache entry expired, scheduling removal"
            );
            drop(self.queue.submit(WorkItem::Remove { path }));
            return CacheLookup::Stale;
        }

        match self.backend.read_file(&path).await {
            Ok(data) => {
                tracing::debug!(path = %path.display(), bytes = data.len(), "Served from cache");
                CacheLookup::Hit(data)
            }
            Err(e) => {
                // Removed between stat and read, or unreadable
                tracing::warn!(path = %path.display(), error = %e, "Cache read failed");
                CacheLookup::Miss
            }
        }
    }

    /// Queue the transformed image for persistence. Never blocks.
    pub fn write_back(&self, spec: &TransformSpec, data: Bytes) -> WorkTicket {
        self.queue.submit(WorkItem::Write {
            path: Self::entry_path(spec),
            data,
        })
    }

    /// Wait for all queued writes and removals to finish
    pub async fn flush(&self) {
        self.queue.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::disk::MockDiskBackend;
    use crate::cache::CacheTtl;
    use crate::descriptor::TransformParams;
    use std::path::Path;

    fn spec(ttl: CacheTtl) -> TransformSpec {
        TransformSpec {
            route_prefix: "photos".to_string(),
            bucket: "bucket".to_string(),
            object_key: "cat.jpg".to_string(),
            file_name: "cat.jpg".to_string(),
            params: TransformParams {
                width: 100,
                height: 100,
                ..TransformParams::default()
            },
            cache_ttl: ttl,
            cache_root: PathBuf::from("/cache"),
            fallback_image: None,
            fallback_resize: true,
        }
    }

    fn cache(backend: &MockDiskBackend) -> DiskCache {
        let backend: Arc<dyn DiskBackend> = Arc::new(backend.clone());
        DiskCache::new(backend.clone(), WorkQueue::new(backend))
    }

    const ENTRY: &str = "/cache/photos_w100_h100_ctrue_cat.webp";

    #[tokio::test]
    async fn test_lookup_miss() {
        let backend = MockDiskBackend::new();
        let result = cache(&backend).lookup(&spec(CacheTtl::Seconds(60))).await;
        assert_eq!(result, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_lookup_fresh_hit() {
        let backend = MockDiskBackend::new();
        backend.insert(Path::new(ENTRY), b"cached", SystemTime::now());

        let result = cache(&backend).lookup(&spec(CacheTtl::Seconds(60))).await;
        assert_eq!(result, CacheLookup::Hit(Bytes::from_static(b"cached")));
    }

    #[tokio::test]
    async fn test_lookup_stale_schedules_removal() {
        let backend = MockDiskBackend::new();
        let written = SystemTime::now() - Duration::from_secs(120);
        backend.insert(Path::new(ENTRY), b"cached", written);
        let cache = cache(&backend);

        let result = cache.lookup(&spec(CacheTtl::Seconds(60))).await;
        assert_eq!(result, CacheLookup::Stale);

        cache.flush().await;
        assert!(!backend.contains(Path::new(ENTRY)));
    }

    #[tokio::test]
    async fn test_lookup_forever_never_stale() {
        let backend = MockDiskBackend::new();
        backend.insert(Path::new(ENTRY), b"ancient", SystemTime::UNIX_EPOCH);

        let result = cache(&backend).lookup(&spec(CacheTtl::Forever)).await;
        assert_eq!(result, CacheLookup::Hit(Bytes::from_static(b"ancient")));
    }

    #[tokio::test]
    async fn test_lookup_future_mtime_is_fresh() {
        let backend = MockDiskBackend::new();
        let future = SystemTime::now() + Duration::from_secs(3600);
        backend.insert(Path::new(ENTRY), b"skewed", future);

        let result = cache(&backend).lookup(&spec(CacheTtl::Seconds(1))).await;
        assert_eq!(result, CacheLookup::Hit(Bytes::from_static(b"skewed")));
    }

    #[tokio::test]
    async fn test_lookup_backend_error_is_miss() {
        let backend = MockDiskBackend::new();
        backend.insert(Path::new(ENTRY), b"cached", SystemTime::now());
        backend.set_permission_denied(true);

        let result = cache(&backend).lookup(&spec(CacheTtl::Seconds(60))).await;
        assert_eq!(result, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_write_back_persists_at_key_path() {
        let backend = MockDiskBackend::new();
        let cache = cache(&backend);

        cache
            .write_back(&spec(CacheTtl::Seconds(60)), Bytes::from_static(b"new"))
            .wait()
            .await
            .unwrap();

        assert!(backend.contains(Path::new(ENTRY)));
    }
}
