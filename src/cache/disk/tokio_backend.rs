//! Tokio-based filesystem backend (portable, works on all platforms)

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use super::backend::DiskBackend;
use crate::cache::CacheError;

/// Portable filesystem backend using tokio::fs
#[derive(Debug, Default)]
pub struct TokioFsBackend;

impl TokioFsBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiskBackend for TokioFsBackend {
    async fn read_file(&self, path: &Path) -> Result<Bytes, CacheError> {
        let data = tokio::fs::read(path).await?;
        Ok(Bytes::from(data))
    }

    async fn modified(&self, path: &Path) -> Result<Option<SystemTime>, CacheError> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<(), CacheError> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Unique temp name in the same directory so concurrent writers never
        // share a temp file and the rename stays on one filesystem
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<(), CacheError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
