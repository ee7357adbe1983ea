//! Cache error types
//!
//! Disk cache failures are never fatal to a request: lookups degrade to a
//! miss and write-back failures are logged.

/// Cache error types
#[derive(Debug)]
pub enum CacheError {
    /// I/O error from the filesystem backend
    IoError(std::io::Error),
    /// The background work queue has shut down
    QueueClosed,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::IoError(err) => write!(f, "I/O error: {}", err),
            CacheError::QueueClosed => write!(f, "Cache work queue closed"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err)
    }
}
