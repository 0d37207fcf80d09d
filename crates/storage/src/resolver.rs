//! Cache-key resolution.
//!
//! Resolution turns an ordered list of candidate keys into at most one
//! storage object:
//!
//! 1. Compute the version fingerprint for the request.
//! 2. Probe the exact object derived from the first (primary) key.
//! 3. Failing that, walk the remaining restore keys in the order supplied
//!    - a deliberate priority list - and return the most recently
//!    modified object under the first prefix that has any.
//! 4. Otherwise return a structured miss carrying only the version.
//!
//! Probing is best-effort: backend errors on the primary probe downgrade
//! to "no match", and a listing error skips that restore key rather than
//! aborting resolution.

use rusty_cache_common::version::compute_version;

use crate::error::CacheError;
use crate::traits::{ObjectInfo, StorageClient};
use crate::types::{CacheEntry, CacheLocation, ResolveOptions};

/// Resolves candidate cache keys against the storage backend.
pub struct CacheKeyResolver<'a, C: StorageClient + ?Sized> {
    /// The storage client for head/list operations.
    client: &'a C,
    /// Cache namespace configuration.
    location: CacheLocation,
}

impl<'a, C: StorageClient + ?Sized> CacheKeyResolver<'a, C> {
    /// Create a new resolver.
    pub fn new(client: &'a C, location: CacheLocation) -> Self {
        Self { client, location }
    }

    /// Resolve a primary key plus fallback restore keys to a cache entry.
    ///
    /// # Arguments
    /// * `keys` - Non-empty ordered candidates; the first is the primary
    ///   key, the rest are restore-key prefixes tried in order
    /// * `path_selectors` - Ordered path selectors defining what is cached
    /// * `options` - Compression / cross-OS settings for the version
    ///
    /// # Returns
    /// A hit pointing at a storage object, or a miss carrying the
    /// computed version. Never fails on backend "not found".
    pub async fn resolve(
        &self,
        keys: &[String],
        path_selectors: &[String],
        options: &ResolveOptions,
    ) -> Result<CacheEntry, CacheError> {
        let Some((primary_key, restore_keys)) = keys.split_first() else {
            return Err(CacheError::InvalidConfig {
                message: "at least one cache key is required".to_string(),
            });
        };

        let cache_version: String =
            compute_version(path_selectors, options.compression, options.cross_os_archive);

        // Exact match on the primary key. Probing is best-effort: any
        // backend error here is a miss, not a failure.
        let object_key: String = self.location.object_key(primary_key);
        match self.client.head_object(&self.location.bucket, &object_key).await {
            Ok(Some(_)) => {
                tracing::debug!(cache_key = %primary_key, "exact cache hit");
                return Ok(CacheEntry::hit(primary_key, cache_version, object_key));
            }
            Ok(None) => {
                tracing::debug!(cache_key = %primary_key, "no exact match");
            }
            Err(err) => {
                tracing::debug!(
                    cache_key = %primary_key,
                    error = %err,
                    "primary key probe failed, treating as no match"
                );
            }
        }

        for restore_key in restore_keys {
            let prefix: String = self.location.object_key(restore_key);
            let objects: Vec<ObjectInfo> =
                match self.client.list_objects(&self.location.bucket, &prefix).await {
                    Ok(objects) => objects,
                    Err(err) => {
                        tracing::warn!(
                            restore_key = %restore_key,
                            error = %err,
                            "listing restore key failed, skipping"
                        );
                        continue;
                    }
                };

            if objects.is_empty() {
                tracing::warn!(restore_key = %restore_key, "no cache found for restore key");
                continue;
            }

            // Latest modification wins; on a timestamp tie the first
            // listed object is kept.
            let mut newest: &ObjectInfo = &objects[0];
            for candidate in &objects[1..] {
                if candidate.last_modified > newest.last_modified {
                    newest = candidate;
                }
            }

            let matched_key: &str = self.location.cache_key_of(&newest.key);
            tracing::debug!(
                restore_key = %restore_key,
                cache_key = %matched_key,
                "restored from fallback key"
            );
            return Ok(CacheEntry::hit(matched_key, cache_version, newest.key.clone()));
        }

        Ok(CacheEntry::miss(primary_key, cache_version))
    }
}
