//! AWS SDK S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::RequestId;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use rusty_cache_storage::{
    CacheError, ObjectInfo, ObjectMetadata, StorageClient, StorageSettings,
};

/// StorageClient implementation using the AWS SDK for Rust.
///
/// The SDK provides connection pooling, its own transient-error retry and
/// streaming for large objects; this client maps those operations onto
/// the storage seam and surfaces backend diagnostics (request ids, error
/// codes) on failures.
pub struct S3StorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
}

impl S3StorageClient {
    /// Create a client from backend settings.
    ///
    /// Explicit credentials take precedence over the default provider
    /// chain. A custom endpoint switches to path-style addressing, which
    /// non-AWS S3 implementations generally require.
    pub async fn new(settings: &StorageSettings) -> Result<Self, CacheError> {
        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "rusty-cache",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;

        let s3_client: S3Client = match settings.endpoint {
            Some(ref endpoint) => {
                let config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                S3Client::from_conf(config)
            }
            None => S3Client::new(&sdk_config),
        };

        Ok(Self { s3_client })
    }

    /// Create a client from an existing S3Client (for testing).
    pub fn from_client(s3_client: S3Client) -> Self {
        Self { s3_client }
    }
}

/// Map an SDK service error onto the cache error taxonomy, preserving
/// the backend's diagnostics.
fn backend_error<E>(err: E, retryable: bool) -> CacheError
where
    E: ProvideErrorMetadata + RequestId + std::fmt::Display,
{
    let message: String = match err.code() {
        Some(code) => format!("{err} (code: {code})"),
        None => err.to_string(),
    };
    CacheError::Network {
        message,
        retryable,
        request_id: err.request_id().map(str::to_string),
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, CacheError> {
        let result = self
            .s3_client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let last_modified: Option<i64> = output
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                Ok(Some(ObjectMetadata {
                    size: output.content_length().map(|l| l as u64),
                    last_modified,
                }))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(backend_error(service_err, false))
                }
            }
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, CacheError> {
        let mut objects: Vec<ObjectInfo> = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|err| backend_error(err.into_service_error(), true))?;

            for obj in response.contents() {
                let last_modified: Option<i64> = obj
                    .last_modified()
                    .and_then(|dt| dt.to_millis().ok())
                    .map(|ms| ms / 1000);

                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().map(|s| s as u64).unwrap_or(0),
                    last_modified,
                });
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, CacheError> {
        let range_end: u64 = offset + length - 1;
        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(format!("bytes={offset}-{range_end}"))
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    CacheError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    backend_error(service_err, true)
                }
            })?;

        let data: Vec<u8> = response
            .body
            .collect()
            .await
            .map_err(|err| CacheError::network(err.to_string(), true))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &str,
    ) -> Result<u64, CacheError> {
        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    CacheError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    backend_error(service_err, true)
                }
            })?;

        let advertised: Option<u64> = response.content_length().map(|l| l as u64);

        // Create parent directories if needed
        if let Some(parent) = Path::new(file_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| CacheError::io(parent.display().to_string(), err))?;
        }

        let mut file: File = File::create(file_path)
            .await
            .map_err(|err| CacheError::io(file_path, err))?;

        let mut written: u64 = 0;
        let mut body = response.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|err| CacheError::network(err.to_string(), true))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|err| CacheError::io(file_path, err))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|err| CacheError::io(file_path, err))?;

        // Validate the streamed size against the advertised length.
        if let Some(expected) = advertised {
            if written != expected {
                return Err(CacheError::SizeMismatch {
                    key: key.to_string(),
                    expected,
                    actual: written,
                });
            }
        }

        Ok(written)
    }

    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        file_path: &str,
    ) -> Result<(), CacheError> {
        let body = ByteStream::from_path(Path::new(file_path))
            .await
            .map_err(|err| CacheError::Io {
                path: file_path.to_string(),
                message: err.to_string(),
            })?;

        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| backend_error(err.into_service_error(), true))?;

        Ok(())
    }
}
