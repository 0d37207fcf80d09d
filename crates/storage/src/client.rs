//! Caller-facing cache client.
//!
//! `CacheClient` exposes the three operations the surrounding
//! orchestration needs:
//!
//! - `resolve_cache_entry` - turn candidate keys into at most one object
//! - `download` - transfer a resolved object to a local file
//! - `save` - upload an archive under a cache key; never fails the build
//!
//! The transfer strategy is fixed at construction from the backend
//! capability: backends with a native chunked-transfer client use the
//! SDK-managed path, plain HTTP/CDN backends use the segmented path.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusty_cache_common::constants::SOCKET_READ_TIMEOUT_MS;

use crate::download::{HttpRangeClient, SegmentedDownloader};
use crate::error::CacheError;
use crate::resolver::CacheKeyResolver;
use crate::traits::{RangeClient, StorageClient};
use crate::transfer::SdkDownloader;
use crate::types::{
    CacheEntry, CacheLocation, DownloadOptions, ResolveOptions, SaveOptions, StorageSettings,
    TransferMode,
};

/// High-level cache operations over a storage backend.
pub struct CacheClient {
    /// The storage backend.
    storage: Arc<dyn StorageClient>,
    /// Ranged transport, present in `RangedHttp` mode.
    range_client: Option<Arc<dyn RangeClient>>,
    /// Backend settings.
    settings: StorageSettings,
    /// Cache namespace shared by resolution and save.
    location: CacheLocation,
    /// Transfer strategy chosen at construction.
    mode: TransferMode,
}

impl CacheClient {
    /// Create a cache client.
    ///
    /// # Arguments
    /// * `settings` - Backend settings, read once at construction
    /// * `storage` - Storage backend implementation
    /// * `mode` - Transfer strategy, per backend capability
    pub fn new(
        settings: StorageSettings,
        storage: Arc<dyn StorageClient>,
        mode: TransferMode,
    ) -> Result<Self, CacheError> {
        let range_client: Option<Arc<dyn RangeClient>> = match mode {
            TransferMode::RangedHttp => Some(Arc::new(HttpRangeClient::new(
                Duration::from_millis(SOCKET_READ_TIMEOUT_MS),
            )?)),
            TransferMode::ManagedSdk => None,
        };
        let location = CacheLocation::new(&settings.bucket, &settings.repository);

        Ok(Self {
            storage,
            range_client,
            settings,
            location,
            mode,
        })
    }

    /// Replace the ranged transport (for testing).
    pub fn with_range_client(mut self, client: Arc<dyn RangeClient>) -> Self {
        self.range_client = Some(client);
        self
    }

    /// The namespace this client reads and writes.
    pub fn location(&self) -> &CacheLocation {
        &self.location
    }

    /// Resolve candidate keys to a cache entry.
    ///
    /// Returns a hit with a storage object key, or a miss carrying the
    /// computed version for a future save.
    pub async fn resolve_cache_entry(
        &self,
        keys: &[String],
        path_selectors: &[String],
        options: &ResolveOptions,
    ) -> Result<CacheEntry, CacheError> {
        CacheKeyResolver::new(self.storage.as_ref(), self.location.clone())
            .resolve(keys, path_selectors, options)
            .await
    }

    /// Download a resolved object to `destination`.
    ///
    /// # Arguments
    /// * `object_key` - Full object key from a resolved `CacheEntry`
    /// * `destination` - Local path for the archive
    /// * `options` - Transfer tuning
    ///
    /// # Returns
    /// Total bytes written.
    pub async fn download(
        &self,
        object_key: &str,
        destination: &Path,
        options: &DownloadOptions,
    ) -> Result<u64, CacheError> {
        match self.mode {
            TransferMode::ManagedSdk => {
                SdkDownloader::new(self.storage.as_ref(), options.clone())
                    .download(&self.settings.bucket, object_key, destination)
                    .await
            }
            TransferMode::RangedHttp => {
                let range_client: &Arc<dyn RangeClient> =
                    self.range_client.as_ref().ok_or_else(|| {
                        CacheError::InvalidConfig {
                            message: "ranged transport is not configured".to_string(),
                        }
                    })?;
                let url: String = self.object_url(object_key);
                SegmentedDownloader::new(range_client.as_ref(), options.clone())
                    .download(&url, destination)
                    .await
            }
        }
    }

    /// Upload a cache archive under `cache_key`.
    ///
    /// Failures are logged with backend diagnostics and swallowed: a
    /// failed cache save must never fail the calling build.
    pub async fn save(&self, cache_key: &str, archive_path: &Path, options: &SaveOptions) {
        let object_key: String = self.location.object_key(cache_key);

        if options.check_existing {
            match self.storage.head_object(&self.settings.bucket, &object_key).await {
                Ok(Some(_)) => {
                    tracing::info!(cache_key, "cache already exists, skipping upload");
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    // Existence checking is an optimization only.
                    tracing::debug!(error = %err, "existence check failed, uploading anyway");
                }
            }
        }

        let archive_size: u64 = match tokio::fs::metadata(archive_path).await {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                tracing::warn!(
                    path = %archive_path.display(),
                    error = %err,
                    "cannot read cache archive, skipping save"
                );
                return;
            }
        };

        tracing::debug!(cache_key, bytes = archive_size, "uploading cache archive");
        let started: Instant = Instant::now();

        match self
            .storage
            .put_object_from_file(
                &self.settings.bucket,
                &object_key,
                &archive_path.display().to_string(),
            )
            .await
        {
            Ok(()) => {
                let elapsed: f64 = started.elapsed().as_secs_f64().max(f64::EPSILON);
                let rate_mbs: f64 = archive_size as f64 / (1024.0 * 1024.0) / elapsed;
                tracing::info!(cache_key, bytes = archive_size, rate_mbs, "cache saved");
            }
            Err(err) => {
                let request_id: Option<String> = match &err {
                    CacheError::Network { request_id, .. } => request_id.clone(),
                    _ => None,
                };
                tracing::warn!(
                    cache_key,
                    error = %err,
                    request_id = request_id.as_deref().unwrap_or("unknown"),
                    "cache save failed, continuing without saving"
                );
            }
        }
    }

    /// URL of an object on the ranged-HTTP path.
    ///
    /// A custom endpoint uses path-style, plain-HTTP addressing; without
    /// one the bucket's virtual-hosted TLS URL is used.
    fn object_url(&self, object_key: &str) -> String {
        match &self.settings.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.settings.bucket,
                object_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.settings.bucket, self.settings.region, object_key
            ),
        }
    }
}
