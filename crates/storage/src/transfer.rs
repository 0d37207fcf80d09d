//! SDK-managed download path.
//!
//! Used when the backend exposes a native chunked-transfer client. The
//! object is fetched as a sequence of large parts; within a part the
//! backend is free to parallelize and retry on its own, so this path
//! imposes only an outer per-part deadline and does not retry - an
//! expired deadline cancels the in-flight call (the timed-out future is
//! dropped) and aborts the whole transfer.
//!
//! When the backend cannot advertise a content length, the path falls
//! back to a single streamed whole-object download with no manual
//! segmentation.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use rusty_cache_common::constants::{MAX_BUFFER_LENGTH, PROGRESS_DISPLAY_INTERVAL_MS};
use rusty_cache_common::progress::ProgressTracker;

use crate::error::CacheError;
use crate::traits::StorageClient;
use crate::types::DownloadOptions;

/// Downloader delegating chunk management to the native backend client.
pub struct SdkDownloader<'a, C: StorageClient + ?Sized> {
    /// The storage client.
    client: &'a C,
    /// Download options.
    options: DownloadOptions,
}

impl<'a, C: StorageClient + ?Sized> SdkDownloader<'a, C> {
    /// Create a new SDK-managed downloader.
    pub fn new(client: &'a C, options: DownloadOptions) -> Self {
        Self { client, options }
    }

    /// Download `key` from `bucket` into `destination`.
    ///
    /// # Returns
    /// Total bytes written.
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<u64, CacheError> {
        let metadata = self
            .client
            .head_object(bucket, key)
            .await?
            .ok_or_else(|| CacheError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        match metadata.size {
            Some(length) => self.download_parts(bucket, key, destination, length).await,
            None => {
                tracing::debug!(key, "content length unknown, using streamed download");
                let written: u64 = self
                    .client
                    .get_object_to_file(bucket, key, &destination.display().to_string())
                    .await?;
                tracing::info!(bytes = written, "streamed download complete");
                Ok(written)
            }
        }
    }

    /// Sequential part loop with an outer per-part deadline.
    async fn download_parts(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        length: u64,
    ) -> Result<u64, CacheError> {
        if length > MAX_BUFFER_LENGTH {
            tracing::warn!(
                length,
                max = MAX_BUFFER_LENGTH,
                "object exceeds the platform buffer limit; use the segmented path"
            );
        }

        tracing::debug!(length, "starting SDK-managed download");

        let tracker: Arc<ProgressTracker> = Arc::new(ProgressTracker::new(length));
        let timer = tracker.start_display_timer(Duration::from_millis(PROGRESS_DISPLAY_INTERVAL_MS));

        let outcome: Result<(), CacheError> = self
            .fetch_parts(bucket, key, destination, length, &tracker)
            .await;

        match outcome {
            Ok(()) => {
                tracker.finish(timer);
                tracing::info!(bytes = length, "SDK-managed download complete");
                Ok(length)
            }
            Err(err) => {
                timer.abort();
                Err(err)
            }
        }
    }

    async fn fetch_parts(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
        length: u64,
        tracker: &ProgressTracker,
    ) -> Result<(), CacheError> {
        // Parts must each fit in one in-memory buffer.
        let part_size: u64 = self.options.part_size.min(MAX_BUFFER_LENGTH).max(1);
        let part_timeout: Duration = Duration::from_millis(self.options.part_timeout_ms);

        let path: String = destination.display().to_string();
        let mut file: File = File::create(destination)
            .await
            .map_err(|err| CacheError::io(path.as_str(), err))?;

        let mut offset: u64 = 0;
        while offset < length {
            let part_length: u64 = part_size.min(length - offset);
            tracker.next_segment(part_length);

            // The backend call manages its own sub-chunk concurrency and
            // retries; on deadline expiry the future is dropped, which
            // cancels the in-flight call, and the transfer aborts.
            let fetch = self.client.get_object_range(bucket, key, offset, part_length);
            let buffer: Vec<u8> = match tokio::time::timeout(part_timeout, fetch).await {
                Ok(result) => result?,
                Err(_elapsed) => {
                    return Err(CacheError::Timeout {
                        operation: format!("part download at offset {offset}"),
                        timeout_ms: self.options.part_timeout_ms,
                    });
                }
            };

            if buffer.len() as u64 != part_length {
                return Err(CacheError::SizeMismatch {
                    key: key.to_string(),
                    expected: part_length,
                    actual: buffer.len() as u64,
                });
            }

            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|err| CacheError::io(path.as_str(), err))?;
            file.write_all(&buffer)
                .await
                .map_err(|err| CacheError::io(path.as_str(), err))?;

            tracker.set_segment_received(part_length);
            tracing::debug!(
                index = tracker.segment_index(),
                offset,
                part_length,
                "part written"
            );
            offset += part_length;
        }

        file.flush()
            .await
            .map_err(|err| CacheError::io(path.as_str(), err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::traits::{ObjectInfo, ObjectMetadata};

    /// Storage backend over an in-memory buffer.
    struct FakeStorage {
        data: Vec<u8>,
        advertise_length: bool,
        exists: bool,
        /// Parts at these offsets hang until cancelled.
        hang_offsets: Vec<u64>,
        range_calls: AtomicU32,
        streamed_calls: AtomicU32,
        /// Offsets requested, in order.
        requested_offsets: Mutex<Vec<u64>>,
    }

    impl FakeStorage {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                advertise_length: true,
                exists: true,
                hang_offsets: Vec::new(),
                range_calls: AtomicU32::new(0),
                streamed_calls: AtomicU32::new(0),
                requested_offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn head_object(
            &self,
            _bucket: &str,
            _key: &str,
        ) -> Result<Option<ObjectMetadata>, CacheError> {
            if !self.exists {
                return Ok(None);
            }
            Ok(Some(ObjectMetadata {
                size: self.advertise_length.then(|| self.data.len() as u64),
                last_modified: None,
            }))
        }

        async fn list_objects(
            &self,
            _bucket: &str,
            _prefix: &str,
        ) -> Result<Vec<ObjectInfo>, CacheError> {
            unimplemented!("not used by transfer")
        }

        async fn get_object_range(
            &self,
            _bucket: &str,
            _key: &str,
            offset: u64,
            length: u64,
        ) -> Result<Vec<u8>, CacheError> {
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            self.requested_offsets
                .lock()
                .expect("offsets lock poisoned")
                .push(offset);
            if self.hang_offsets.contains(&offset) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let start = offset as usize;
            let end = (offset + length) as usize;
            Ok(self.data[start..end].to_vec())
        }

        async fn get_object_to_file(
            &self,
            _bucket: &str,
            _key: &str,
            file_path: &str,
        ) -> Result<u64, CacheError> {
            self.streamed_calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(file_path, &self.data)
                .await
                .map_err(|err| CacheError::io(file_path, err))?;
            Ok(self.data.len() as u64)
        }

        async fn put_object_from_file(
            &self,
            _bucket: &str,
            _key: &str,
            _file_path: &str,
        ) -> Result<(), CacheError> {
            unimplemented!("not used by download")
        }
    }

    fn pattern_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 239) as u8).collect()
    }

    fn part_options(part_size: u64, part_timeout_ms: u64) -> DownloadOptions {
        DownloadOptions::default()
            .with_part_size(part_size)
            .with_part_timeout_ms(part_timeout_ms)
    }

    #[tokio::test]
    async fn test_parts_fetched_sequentially() {
        let data: Vec<u8> = pattern_data(250);
        let storage = FakeStorage::new(data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SdkDownloader::new(&storage, part_options(100, 60_000));
        let written: u64 = downloader.download("bucket", "key", &dest).await.unwrap();

        assert_eq!(written, 250);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
        // Three parts, strictly in order.
        assert_eq!(
            *storage.requested_offsets.lock().unwrap(),
            vec![0, 100, 200]
        );
    }

    #[tokio::test]
    async fn test_single_part_object() {
        let data: Vec<u8> = pattern_data(50);
        let storage = FakeStorage::new(data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SdkDownloader::new(&storage, part_options(100, 60_000));
        downloader.download("bucket", "key", &dest).await.unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
        assert_eq!(storage.range_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_length_falls_back_to_streamed() {
        let data: Vec<u8> = pattern_data(120);
        let mut storage = FakeStorage::new(data.clone());
        storage.advertise_length = false;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SdkDownloader::new(&storage, part_options(100, 60_000));
        let written: u64 = downloader.download("bucket", "key", &dest).await.unwrap();

        assert_eq!(written, 120);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), data);
        assert_eq!(storage.streamed_calls.load(Ordering::SeqCst), 1);
        assert_eq!(storage.range_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let mut storage = FakeStorage::new(Vec::new());
        storage.exists = false;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SdkDownloader::new(&storage, part_options(100, 60_000));
        let result = downloader.download("bucket", "key", &dest).await;

        assert!(matches!(result, Err(CacheError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_part_timeout_aborts_transfer() {
        let data: Vec<u8> = pattern_data(250);
        let mut storage = FakeStorage::new(data);
        storage.hang_offsets.push(100);
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        // Tight deadline so the hanging second part expires quickly.
        let downloader = SdkDownloader::new(&storage, part_options(100, 50));
        let result = downloader.download("bucket", "key", &dest).await;

        match result {
            Err(CacheError::Timeout { operation, .. }) => {
                assert!(operation.contains("offset 100"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // No retry after a part deadline: the hanging offset was
        // requested exactly once.
        assert_eq!(
            storage
                .requested_offsets
                .lock()
                .unwrap()
                .iter()
                .filter(|o| **o == 100)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_zero_length_object() {
        let storage = FakeStorage::new(Vec::new());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("empty.bin");

        let downloader = SdkDownloader::new(&storage, part_options(100, 60_000));
        let written: u64 = downloader.download("bucket", "key", &dest).await.unwrap();

        assert_eq!(written, 0);
        assert!(tokio::fs::read(&dest).await.unwrap().is_empty());
    }
}
