//! Cache-key resolution and segmented transfer engine.
//!
//! This crate turns candidate cache keys into storage objects and moves
//! multi-gigabyte archives to and from an object-storage backend with
//! bounded concurrency, partial-failure recovery and integrity checking.
//! It is generic over two backend seams:
//!
//! - **StorageClient** - the native object-storage SDK (head, list,
//!   ranged get, streamed get, put)
//! - **RangeClient** - a plain HTTP transport supporting HEAD and
//!   `Range: bytes=` requests, for buckets fronted by a CDN
//!
//! Two download strategies are selected at construction time by backend
//! capability: `SegmentedDownloader` fans fixed-size blocks out over a
//! bounded pool of ranged HTTP requests, writing each block at its exact
//! offset as it completes; `SdkDownloader` walks large sequential parts
//! and lets the native client manage sub-chunk concurrency within each.

mod client;
mod download;
mod error;
mod resolver;
mod retry;
mod segment;
mod traits;
mod transfer;
mod types;

pub use client::CacheClient;
pub use download::{HttpRangeClient, SegmentedDownloader};
pub use error::CacheError;
pub use resolver::CacheKeyResolver;
pub use retry::with_retry;
pub use segment::{expected_block_count, generate_blocks, BlockInfo};
pub use traits::{ObjectInfo, ObjectMetadata, RangeClient, StorageClient};
pub use transfer::SdkDownloader;
pub use types::{
    CacheEntry, CacheLocation, Credentials, DownloadOptions, ResolveOptions, SaveOptions,
    SegmentRetrySettings, StorageSettings, TransferMode,
};

// Re-export the version/compression API alongside the resolver that
// consumes it.
pub use rusty_cache_common::version::{compute_version, CompressionMethod};
