// s3imageserver library
//
// On-demand image transformation in front of S3: resize, crop and re-encode
// originals, cache the variants on local disk, degrade to a fallback image.

pub mod cache;
pub mod coalescing;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod fallback;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod s3;
pub mod transform;
