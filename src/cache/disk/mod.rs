//! Disk-based cache for transformed images
//!
//! The filesystem is the only index: an entry exists when its file exists,
//! and its age is the file's modification time.

pub use self::backend::DiskBackend;
pub use self::disk_cache::DiskCache;
pub use self::tokio_backend::TokioFsBackend;

#[cfg(test)]
pub(crate) use self::mock_backend::MockDiskBackend;

mod backend;
mod disk_cache;
mod tokio_backend;

#[cfg(test)]
mod mock_backend;
