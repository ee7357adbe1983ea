//! Cache module
//!
//! Transformed variants are stored as plain files under each handler's cache
//! root. There is no in-memory index and no size bound: a file's presence is
//! the entry, and its modification time is its age.

use bytes::Bytes;
use std::time::Duration;

pub mod background;
pub mod disk;
mod error;
mod key;

pub use background::{WorkItem, WorkQueue, WorkTicket};
pub use disk::{DiskBackend, DiskCache, TokioFsBackend};
pub use error::CacheError;
pub use key::CacheKey;

/// How long a cached variant stays fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Never read from or written to the cache
    Disabled,
    /// Entries never expire
    Forever,
    Seconds(u64),
}

impl CacheTtl {
    /// Map the configured value: negative disables, 0 never expires
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            s if s < 0 => CacheTtl::Disabled,
            0 => CacheTtl::Forever,
            s => CacheTtl::Seconds(s as u64),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CacheTtl::Disabled)
    }
}

/// Whether an entry of the given age may still be served
pub fn is_fresh(ttl: CacheTtl, age: Duration) -> bool {
    match ttl {
        CacheTtl::Disabled => false,
        CacheTtl::Forever => true,
        CacheTtl::Seconds(seconds) => Duration::from_secs(seconds) > age,
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Bytes),
    Miss,
    /// Entry existed but had expired; its removal has been queued
    Stale,
}
