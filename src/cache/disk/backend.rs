//! Backend trait for filesystem operations

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::SystemTime;

use crate::cache::CacheError;

/// Abstraction over filesystem operations used by the disk cache
#[async_trait]
pub trait DiskBackend: Send + Sync {
    /// Read entire file contents
    async fn read_file(&self, path: &Path) -> Result<Bytes, CacheError>;

    /// Last-modified time, or `None` when the file does not exist
    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>, CacheError>;

    /// Write file contents atomically (using temp file + rename)
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), CacheError>;

    /// Delete a file. Deleting a missing file succeeds.
    async fn delete_file(&self, path: &Path) -> Result<(), CacheError>;
}
