//! Shared data structures for cache operations.

use serde::{Deserialize, Serialize};

use rusty_cache_common::constants::{
    CACHE_NAMESPACE, DOWNLOAD_BLOCK_SIZE, DOWNLOAD_CONCURRENCY, PROBE_TIMEOUT_MS,
    SDK_PART_SIZE, SDK_PART_TIMEOUT_MS, SEGMENT_ATTEMPT_TIMEOUT_MS, SEGMENT_MAX_RETRIES,
};
use rusty_cache_common::version::CompressionMethod;

use crate::error::CacheError;

/// Outcome of cache-key resolution.
///
/// Either a concrete storage object to download (`object_key` present) or
/// a miss carrying only the computed version - the signal that nothing is
/// restorable but future saves should use this version. Created fresh per
/// restore call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cache key this entry resolved to. On a miss this is the
    /// primary key the caller should save under.
    pub cache_key: String,
    /// Version fingerprint computed for this request.
    pub cache_version: String,
    /// Full storage object key, when a stored cache matched.
    pub object_key: Option<String>,
}

impl CacheEntry {
    /// Entry for a resolved storage object.
    pub fn hit(
        cache_key: impl Into<String>,
        cache_version: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            cache_version: cache_version.into(),
            object_key: Some(object_key.into()),
        }
    }

    /// Structured miss: no restorable object, version preserved for a
    /// future save.
    pub fn miss(primary_key: impl Into<String>, cache_version: impl Into<String>) -> Self {
        Self {
            cache_key: primary_key.into(),
            cache_version: cache_version.into(),
            object_key: None,
        }
    }

    /// Whether resolution found a restorable object.
    pub fn is_hit(&self) -> bool {
        self.object_key.is_some()
    }
}

/// Backend credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Configuration for the storage backend and cache namespace.
///
/// Constructed once at client-construction time and threaded through every
/// component; nothing reads the environment after this point.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Bucket name.
    pub bucket: String,
    /// Backend region.
    pub region: String,
    /// Repository identifier used to partition the cache namespace.
    pub repository: String,
    /// Credentials; None falls back to the backend's default chain.
    pub credentials: Option<Credentials>,
    /// Custom endpoint. Non-default endpoints imply path-style,
    /// non-TLS access.
    pub endpoint: Option<String>,
}

impl StorageSettings {
    /// Read settings from the environment, once.
    ///
    /// `RUSTY_CACHE_BUCKET` and `RUSTY_CACHE_REPOSITORY` are required;
    /// `AWS_REGION` defaults to us-east-1; `AWS_ACCESS_KEY_ID` /
    /// `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN` and
    /// `RUSTY_CACHE_ENDPOINT` are optional.
    pub fn from_env() -> Result<Self, CacheError> {
        let bucket: String = require_env("RUSTY_CACHE_BUCKET")?;
        let repository: String = require_env("RUSTY_CACHE_REPOSITORY")?;
        let region: String =
            std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let credentials: Option<Credentials> = match (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(access_key_id), Ok(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            }),
            _ => None,
        };

        Ok(Self {
            bucket,
            region,
            repository,
            credentials,
            endpoint: std::env::var("RUSTY_CACHE_ENDPOINT").ok(),
        })
    }
}

fn require_env(name: &str) -> Result<String, CacheError> {
    std::env::var(name).map_err(|_| CacheError::InvalidConfig {
        message: format!("{name} is not set"),
    })
}

/// Bucket and repository-scoped namespace for cache objects.
///
/// Resolution and save derive object keys through the same instance, so a
/// saved cache is always reachable by a later restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLocation {
    /// Bucket name.
    pub bucket: String,
    /// Repository identifier partitioning the namespace.
    pub repository: String,
}

impl CacheLocation {
    /// Create a new cache location.
    pub fn new(bucket: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            repository: repository.into(),
        }
    }

    /// Full object key for a cache key.
    /// Returns: "caches/{repository}/{key}"
    pub fn object_key(&self, cache_key: &str) -> String {
        format!("{}/{}/{}", CACHE_NAMESPACE, self.repository, cache_key)
    }

    /// Prefix under which all of this repository's caches live.
    pub fn key_prefix(&self) -> String {
        format!("{}/{}/", CACHE_NAMESPACE, self.repository)
    }

    /// Recover the cache key from a full object key.
    pub fn cache_key_of<'a>(&self, object_key: &'a str) -> &'a str {
        object_key
            .strip_prefix(&self.key_prefix())
            .unwrap_or(object_key)
    }
}

/// How the transfer engine reaches the backend. Chosen once at
/// construction based on backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// The backend exposes a native chunked-transfer client.
    ManagedSdk,
    /// The backend is reached over plain HTTP; the engine segments
    /// ranged requests itself.
    RangedHttp,
}

/// Retry policy for a single transfer attempt.
///
/// Retries are unconditional - no backoff, no error-type filtering.
/// A timed-out attempt counts as a failed attempt.
#[derive(Debug, Clone)]
pub struct SegmentRetrySettings {
    /// Additional tries beyond the first attempt.
    pub max_retries: u32,
    /// Deadline for each individual attempt.
    pub attempt_timeout_ms: u64,
}

impl Default for SegmentRetrySettings {
    fn default() -> Self {
        Self {
            max_retries: SEGMENT_MAX_RETRIES,
            attempt_timeout_ms: SEGMENT_ATTEMPT_TIMEOUT_MS,
        }
    }
}

/// Options for cache-key resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Compression method folded into the version fingerprint.
    pub compression: Option<CompressionMethod>,
    /// Allow restoring archives produced on a different OS.
    pub cross_os_archive: bool,
}

impl ResolveOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method.
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = Some(method);
        self
    }

    /// Allow cross-OS archive restore.
    pub fn with_cross_os_archive(mut self, allowed: bool) -> Self {
        self.cross_os_archive = allowed;
        self
    }
}

/// Options for download operations.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum concurrent block fetches on the segmented path.
    pub concurrency: usize,
    /// Block size for the segmented path.
    pub block_size: u64,
    /// Part size for the SDK-managed path.
    pub part_size: u64,
    /// Per-part timeout for the SDK-managed path. Expiry aborts the
    /// transfer; parts are not retried.
    pub part_timeout_ms: u64,
    /// Timeout for metadata probes.
    pub probe_timeout_ms: u64,
    /// Retry policy for individual segment fetches.
    pub retry: SegmentRetrySettings,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DOWNLOAD_CONCURRENCY,
            block_size: DOWNLOAD_BLOCK_SIZE,
            part_size: SDK_PART_SIZE,
            part_timeout_ms: SDK_PART_TIMEOUT_MS,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            retry: SegmentRetrySettings::default(),
        }
    }
}

impl DownloadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent block fetches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the block size for the segmented path.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the part size for the SDK-managed path.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    /// Set the per-part timeout for the SDK-managed path.
    pub fn with_part_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.part_timeout_ms = timeout_ms;
        self
    }

    /// Set the retry policy for individual segment fetches.
    pub fn with_retry(mut self, retry: SegmentRetrySettings) -> Self {
        self.retry = retry;
        self
    }
}

/// Options for save operations.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Probe for an existing object before uploading and skip the upload
    /// when the cache is already present.
    pub check_existing: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            check_existing: true,
        }
    }
}

impl SaveOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control the pre-upload existence check.
    pub fn with_check_existing(mut self, check: bool) -> Self {
        self.check_existing = check;
        self
    }
}
