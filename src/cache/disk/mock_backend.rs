//! Mock disk backend for testing (in-memory HashMap storage)

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::backend::DiskBackend;
use crate::cache::CacheError;

/// Mock backend that stores files in memory for testing
#[derive(Clone, Default)]
pub struct MockDiskBackend {
    files: Arc<RwLock<HashMap<PathBuf, (Bytes, SystemTime)>>>,
    /// Simulate errors if true
    simulate_permission_denied: Arc<RwLock<bool>>,
}

impl MockDiskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable permission denied simulation for testing
    pub fn set_permission_denied(&self, enabled: bool) {
        *self.simulate_permission_denied.write() = enabled;
    }

    /// Store a file with an explicit modification time
    pub fn insert(&self, path: &Path, data: &'static [u8], modified: SystemTime) {
        self.files
            .write()
            .insert(path.to_path_buf(), (Bytes::from_static(data), modified));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    /// Get number of stored files
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    fn check_permission(&self) -> Result<(), CacheError> {
        if *self.simulate_permission_denied.read() {
            return Err(CacheError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Simulated permission denied",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DiskBackend for MockDiskBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, CacheError> {
        self.check_permission()?;
        self.files
            .read()
            .get(path)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| {
                CacheError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "File not found",
                ))
            })
    }

    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>, CacheError> {
        self.check_permission()?;
        Ok(self.files.read().get(path).map(|(_, modified)| *modified))
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), CacheError> {
        self.check_permission()?;
        self.files
            .write()
            .insert(path.to_path_buf(), (data, SystemTime::now()));
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), CacheError> {
        self.check_permission()?;
        self.files.write().remove(path);
        Ok(())
    }
}
