// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Query parameter carrying the caller's authorization token
pub const TOKEN_QUERY_PARAM: &str = "t";

// =============================================================================
// S3 defaults
// =============================================================================

/// Default S3 operation timeout in seconds
pub const DEFAULT_S3_TIMEOUT_SECS: u64 = 20;

/// Default S3 region used for request signing
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Canned ACL header value sent with every origin fetch
pub const S3_PUBLIC_READ_ACL: &str = "public-read";

// =============================================================================
// Transform defaults
// =============================================================================

/// Requested width and height are clamped to this many pixels
pub const MAX_DIMENSION: u32 = 3064;

/// Encoder quality for lossy output formats
pub const OUTPUT_QUALITY: u8 = 75;

/// Decoded sources above this pixel count are rejected (image bomb protection)
pub const MAX_SOURCE_PIXELS: u64 = 50_000_000;

/// Canvas fill used when fitting without crop (opaque white)
pub const EXTEND_BACKGROUND: [u8; 4] = [255, 255, 255, 255];

/// File extensions accepted when a handler does not configure its own list
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

// =============================================================================
// Cache defaults
// =============================================================================

/// Default cache TTL in seconds (one week). 0 never expires, negative disables caching.
pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 604_800;
