//! Backend traits for object storage and ranged HTTP transport.

use async_trait::async_trait;

use crate::error::CacheError;

/// Metadata for a stored object, from head operations.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Content length in bytes, when the backend advertises one.
    pub size: Option<u64>,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
}

/// Information about a stored object, from list operations.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modified timestamp (Unix epoch seconds).
    pub last_modified: Option<i64>,
}

/// Low-level object-storage operations - implemented by each backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Check if an object exists and return its metadata.
    /// Returns None if the object doesn't exist.
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, CacheError>;

    /// List objects with prefix, following pagination to the end.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, CacheError>;

    /// Download one byte range into memory. The backend may parallelize
    /// internally within the range.
    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, CacheError>;

    /// Streamed whole-object download to a file path.
    /// Returns the number of bytes written.
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &str,
    ) -> Result<u64, CacheError>;

    /// Upload from a file path (streams for large files).
    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &str,
    ) -> Result<(), CacheError>;
}

/// Ranged HTTP transport - used when the backend is reached over plain
/// HTTP/CDN rather than the native SDK.
#[async_trait]
pub trait RangeClient: Send + Sync {
    /// HEAD-equivalent metadata probe.
    ///
    /// Returns the advertised content length, or None when the response
    /// carries no valid non-negative length. Transport failures are
    /// errors.
    async fn content_length(&self, url: &str) -> Result<Option<u64>, CacheError>;

    /// GET one inclusive byte range (`bytes=start-end`).
    async fn get_range(&self, url: &str, start: u64, end: u64) -> Result<Vec<u8>, CacheError>;
}
