//! Shared constants used across rusty-cache crates.

/// Block size for ranged-HTTP segmented downloads (4MB).
pub const DOWNLOAD_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Default number of concurrent block fetches for segmented downloads.
pub const DOWNLOAD_CONCURRENCY: usize = 10;

/// Retries per segment beyond the first attempt.
pub const SEGMENT_MAX_RETRIES: u32 = 5;

/// Per-attempt timeout for a single segment fetch (30s).
pub const SEGMENT_ATTEMPT_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for metadata probes (30s).
pub const PROBE_TIMEOUT_MS: u64 = 30_000;

/// Socket read (idle) timeout for the ranged-HTTP transport (5s).
pub const SOCKET_READ_TIMEOUT_MS: u64 = 5_000;

/// Part size for SDK-managed downloads (128MB).
/// Parts are fetched strictly in sequence; the backend may parallelize
/// within a part.
pub const SDK_PART_SIZE: u64 = 128 * 1024 * 1024;

/// Per-part timeout for SDK-managed downloads (1 hour).
pub const SDK_PART_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Interval between periodic progress lines (1s).
pub const PROGRESS_DISPLAY_INTERVAL_MS: u64 = 1_000;

/// Root namespace for cache objects within a bucket.
/// Resolution and save must agree on this exactly.
pub const CACHE_NAMESPACE: &str = "caches";

/// Salt folded into every cache version fingerprint.
/// Bumping it invalidates all previously saved caches.
pub const CACHE_VERSION_SALT: &str = "1.0";

/// Largest object a single in-memory buffer can hold on this platform.
/// Objects beyond this must go through the segmented path.
pub const MAX_BUFFER_LENGTH: u64 = isize::MAX as u64;
