//! Segmented download engine for ranged-HTTP backends.
//!
//! Used when the cache bucket is reached over plain HTTP/CDN rather than
//! the native SDK. The engine:
//!
//! - Probes the object's content length (HEAD-equivalent, retried)
//! - Partitions the object into fixed-size blocks
//! - Runs a bounded pool of concurrent range requests
//! - Writes each completed block at its exact byte offset as it arrives
//!
//! Completion order is not deterministic: blocks are written
//! first-to-finish, and correctness relies only on the offset-indexed
//! write. A block leaves the in-flight set only once it has fully
//! succeeded or permanently failed; any permanent failure aborts the
//! whole download.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use rusty_cache_common::constants::PROGRESS_DISPLAY_INTERVAL_MS;
use rusty_cache_common::progress::ProgressTracker;

use crate::error::CacheError;
use crate::retry::with_retry;
use crate::segment::{generate_blocks, BlockInfo};
use crate::traits::RangeClient;
use crate::types::{DownloadOptions, SegmentRetrySettings};

/// Ranged HTTP transport backed by reqwest.
pub struct HttpRangeClient {
    client: reqwest::Client,
}

impl HttpRangeClient {
    /// Create a client with the given socket read (idle) timeout.
    ///
    /// The read timeout aborts a request when no bytes arrive for a
    /// stretch; the failure feeds the segment retry loop like any other
    /// transport error.
    pub fn new(socket_read_timeout: Duration) -> Result<Self, CacheError> {
        let client: reqwest::Client = reqwest::Client::builder()
            .read_timeout(socket_read_timeout)
            .build()
            .map_err(|err| {
                CacheError::network(format!("failed to build HTTP client: {err}"), false)
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RangeClient for HttpRangeClient {
    async fn content_length(&self, url: &str) -> Result<Option<u64>, CacheError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|err| CacheError::network(err.to_string(), true))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::network(
                format!("metadata probe returned status {status}"),
                true,
            ));
        }

        // Parsed by hand so a malformed header reads as absent rather
        // than a transport failure.
        let length: Option<u64> = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        Ok(length)
    }

    async fn get_range(&self, url: &str, start: u64, end: u64) -> Result<Vec<u8>, CacheError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|err| CacheError::network(err.to_string(), true))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::network(
                format!("range request {start}-{end} returned status {status}"),
                true,
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| CacheError::network(err.to_string(), true))?;
        Ok(bytes.to_vec())
    }
}

/// Concurrent block downloader over a ranged transport.
pub struct SegmentedDownloader<'a, R: RangeClient + ?Sized> {
    /// The ranged transport.
    client: &'a R,
    /// Download options.
    options: DownloadOptions,
}

impl<'a, R: RangeClient + ?Sized> SegmentedDownloader<'a, R> {
    /// Create a new segmented downloader.
    pub fn new(client: &'a R, options: DownloadOptions) -> Self {
        Self { client, options }
    }

    /// Download the object at `url` into `destination`.
    ///
    /// # Returns
    /// Total bytes written.
    ///
    /// # Errors
    /// Fails if the content length cannot be determined or any block
    /// exhausts its retry budget.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, CacheError> {
        // Metadata probes use the caller's configured overall timeout
        // rather than the per-segment budget.
        let probe_settings = SegmentRetrySettings {
            max_retries: self.options.retry.max_retries,
            attempt_timeout_ms: self.options.probe_timeout_ms,
        };
        let length: u64 = with_retry("content length probe", &probe_settings, || {
            self.client.content_length(url)
        })
        .await?
        .ok_or_else(|| CacheError::InvalidMetadata {
            message: "response did not include a valid content length".to_string(),
        })?;

        tracing::debug!(length, "starting segmented download");

        let tracker: Arc<ProgressTracker> = Arc::new(ProgressTracker::new(length));
        let timer = tracker.start_display_timer(Duration::from_millis(PROGRESS_DISPLAY_INTERVAL_MS));

        let outcome: Result<(), CacheError> =
            self.fetch_blocks(url, destination, length, &tracker).await;

        match outcome {
            Ok(()) => {
                tracker.finish(timer);
                tracing::info!(bytes = length, "segmented download complete");
                Ok(length)
            }
            Err(err) => {
                timer.abort();
                Err(err)
            }
        }
    }

    /// Run the bounded fetch pool and write blocks as they complete.
    async fn fetch_blocks(
        &self,
        url: &str,
        destination: &Path,
        length: u64,
        tracker: &ProgressTracker,
    ) -> Result<(), CacheError> {
        let path: String = destination.display().to_string();
        let mut file: File = File::create(destination)
            .await
            .map_err(|err| CacheError::io(path.as_str(), err))?;

        let blocks: Vec<BlockInfo> = generate_blocks(length, self.options.block_size);
        let concurrency: usize = self.options.concurrency.max(1);

        let client: &R = self.client;
        let fetches = stream::iter(blocks.into_iter().map(|block| {
            let retry_settings: SegmentRetrySettings = self.options.retry.clone();
            let offset: u64 = block.offset;
            let expected: u64 = block.length;
            let range_end: u64 = offset + expected - 1;
            async move {
                let bytes: Vec<u8> = with_retry("segment fetch", &retry_settings, || async move {
                    let bytes: Vec<u8> = client.get_range(url, offset, range_end).await?;
                    if bytes.len() as u64 != expected {
                        return Err(CacheError::network(
                            format!(
                                "range {}-{} returned {} bytes, expected {}",
                                offset,
                                range_end,
                                bytes.len(),
                                expected
                            ),
                            true,
                        ));
                    }
                    Ok(bytes)
                })
                .await?;
                Ok::<(BlockInfo, Vec<u8>), CacheError>((block, bytes))
            }
        }));

        // First-to-finish draining: completed blocks are written at their
        // offset as they settle, in whatever order the network produces
        // them. An error drops the stream, cancelling in-flight fetches.
        let mut completed = fetches.buffer_unordered(concurrency);
        while let Some(result) = completed.next().await {
            let (block, bytes): (BlockInfo, Vec<u8>) = result?;

            file.seek(SeekFrom::Start(block.offset))
                .await
                .map_err(|err| CacheError::io(path.as_str(), err))?;
            file.write_all(&bytes)
                .await
                .map_err(|err| CacheError::io(path.as_str(), err))?;

            tracker.advance(block.length);
            tracing::debug!(
                index = block.index,
                offset = block.offset,
                length = block.length,
                "block written"
            );
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
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Ranged transport over an in-memory buffer, with switches for
    /// failure injection, completion reordering and concurrency auditing.
    struct FakeRangeClient {
        data: Vec<u8>,
        advertise_length: bool,
        /// offset -> remaining failures to inject before succeeding.
        failures: Mutex<HashMap<u64, u32>>,
        reorder: bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeRangeClient {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                advertise_length: true,
                failures: Mutex::new(HashMap::new()),
                reorder: false,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn fail_offset(self, offset: u64, times: u32) -> Self {
            self.failures
                .lock()
                .expect("failures lock poisoned")
                .insert(offset, times);
            self
        }
    }

    #[async_trait]
    impl RangeClient for FakeRangeClient {
        async fn content_length(&self, _url: &str) -> Result<Option<u64>, CacheError> {
            if self.advertise_length {
                Ok(Some(self.data.len() as u64))
            } else {
                Ok(None)
            }
        }

        async fn get_range(&self, _url: &str, start: u64, end: u64) -> Result<Vec<u8>, CacheError> {
            let current: usize = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            // Make the first block the slowest so later blocks settle
            // before it and writes happen out of submission order.
            if self.reorder {
                let delay_ms: u64 = if start == 0 { 40 } else { 1 };
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let inject_failure: bool = {
                let mut failures = self.failures.lock().expect("failures lock poisoned");
                match failures.get_mut(&start) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        true
                    }
                    _ => false,
                }
            };

            let result: Result<Vec<u8>, CacheError> = if inject_failure {
                Err(CacheError::network("injected failure", true))
            } else {
                Ok(self.data[start as usize..=end as usize].to_vec())
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn pattern_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn options(concurrency: usize, block_size: u64) -> DownloadOptions {
        DownloadOptions::default()
            .with_concurrency(concurrency)
            .with_block_size(block_size)
    }

    async fn read_file(path: &Path) -> Vec<u8> {
        tokio::fs::read(path).await.expect("read destination")
    }

    #[tokio::test]
    async fn test_download_three_blocks_concurrency_two() {
        // 10,000,000 bytes at 4MB blocks: 4194304 + 4194304 + 1611392.
        let data: Vec<u8> = pattern_data(10_000_000);
        let client = FakeRangeClient::new(data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(2, 4 * 1024 * 1024));
        let written: u64 = downloader.download("http://cache/object", &dest).await.unwrap();

        assert_eq!(written, 10_000_000);
        assert_eq!(read_file(&dest).await, data);
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_out_of_order_completion_writes_correctly() {
        let data: Vec<u8> = pattern_data(1_000);
        let mut client = FakeRangeClient::new(data.clone());
        client.reorder = true;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(4, 100));
        downloader.download("http://cache/object", &dest).await.unwrap();

        assert_eq!(read_file(&dest).await, data);
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let data: Vec<u8> = pattern_data(5_000);
        let mut client = FakeRangeClient::new(data.clone());
        client.reorder = true;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(3, 100));
        downloader.download("http://cache/object", &dest).await.unwrap();

        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_concurrency_one_is_sequential() {
        let data: Vec<u8> = pattern_data(450);
        let client = FakeRangeClient::new(data.clone());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(1, 100));
        downloader.download("http://cache/object", &dest).await.unwrap();

        assert_eq!(read_file(&dest).await, data);
        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_length_object() {
        let client = FakeRangeClient::new(Vec::new());
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("empty.bin");

        let downloader = SegmentedDownloader::new(&client, options(4, 100));
        let written: u64 = downloader.download("http://cache/object", &dest).await.unwrap();

        assert_eq!(written, 0);
        assert!(read_file(&dest).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_length_fails() {
        let mut client = FakeRangeClient::new(pattern_data(100));
        client.advertise_length = false;
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(2, 100));
        let result = downloader.download("http://cache/object", &dest).await;

        assert!(matches!(result, Err(CacheError::InvalidMetadata { .. })));
    }

    #[tokio::test]
    async fn test_segment_recovers_within_retry_budget() {
        // The block at offset 100 fails max_retries times, then succeeds.
        let data: Vec<u8> = pattern_data(300);
        let client = FakeRangeClient::new(data.clone()).fail_offset(100, 5);
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(2, 100));
        downloader.download("http://cache/object", &dest).await.unwrap();

        assert_eq!(read_file(&dest).await, data);
    }

    #[tokio::test]
    async fn test_segment_exhausting_retries_aborts_download() {
        // max_retries + 1 failures: the budget is spent and the download
        // fails as a whole.
        let data: Vec<u8> = pattern_data(300);
        let client = FakeRangeClient::new(data).fail_offset(100, 6);
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("archive.bin");

        let downloader = SegmentedDownloader::new(&client, options(2, 100));
        let result = downloader.download("http://cache/object", &dest).await;

        assert!(matches!(result, Err(CacheError::Network { .. })));
    }
}
