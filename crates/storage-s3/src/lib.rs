//! AWS SDK S3 backend for rusty-cache.
//!
//! Implements the `StorageClient` seam on top of `aws-sdk-s3`. The SDK
//! handles connection pooling, transient-error retry and streaming; this
//! crate maps head/list/ranged-get/streamed-get/put onto those
//! primitives and carries backend diagnostics (request ids, error codes)
//! into the cache error taxonomy.

mod client;

pub use client::S3StorageClient;
