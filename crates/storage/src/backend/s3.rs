//! S3-compatible object store.
//!
//! This module provides an object store implementation for S3-compatible
//! services including AWS S3, Backblaze B2, MinIO, and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration (`key_id`,
//! `key_secret` and, for temporary credentials, a session token).

use crate::error::{ErrorKind, Result};
use crate::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Connection settings for an [`S3Store`].
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    /// Optional key prefix (acts as virtual directory).
    pub prefix: Option<String>,
    /// AWS region or provider-specific region (e.g., "us-west-004" for Backblaze).
    pub region: String,
    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
    pub session_token: Option<String>,
}

/// S3-compatible object store.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use thermo_storage::backend::{S3Settings, S3Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = S3Store::new("device-archive", S3Settings {
///     bucket: "device-archive".to_string(),
///     region: "eu-west-2".to_string(),
///     key_id: "access_key_id".to_string(),
///     key_secret: "secret_access_key".to_string(),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Store {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<ObjectKey>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Store {
    /// Create a new S3 object store.
    pub async fn new(name: impl Into<String>, settings: S3Settings) -> Result<Self> {
        let prefix = settings.prefix.as_deref().filter(|p| !p.trim_matches('/').is_empty()).map(ObjectKey::new).transpose()?;
        let credentials =
            Credentials::new(settings.key_id, settings.key_secret, settings.session_token, None, "thermo-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(settings.region))
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = settings.endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: settings.bucket,
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &ObjectKey) -> String {
        full_key(self.prefix.as_ref(), key)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    ///
    /// Only returns `None` if the semaphore was closed, which never happens.
    async fn acquire_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.rate_limiter.acquire().await.ok()
    }

    fn map_sdk_error<E, R>(err: &SdkError<E, R>, key: &str) -> ErrorKind
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                ErrorKind::Network(DisplayErrorContext(err).to_string())
            },
            _ if err.code() == Some("AccessDenied") => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::BackendError(DisplayErrorContext(err).to_string()),
        }
    }
}

fn full_key(prefix: Option<&ObjectKey>, key: &ObjectKey) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        let full = self.full_key(key);
        let _permit = self.acquire_permit().await;
        match self.client.head_object().bucket(&self.bucket).key(&full).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => exn::bail!(Self::map_sdk_error(&err, &full)),
        }
    }

    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let full = self.full_key(key);
        let _permit = self.acquire_permit().await;
        let output = match self.client.get_object().bucket(&self.bucket).key(&full).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(key.to_string()))
            },
            Err(err) => exn::bail!(Self::map_sdk_error(&err, &full)),
        };
        let body = output.body.collect().await.or_raise(|| ErrorKind::Network(format!("reading body of {full}")))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        let full = self.full_key(key);
        let _permit = self.acquire_permit().await;
        let content_type = match key.as_str().rsplit_once('.').map(|(_, ext)| ext) {
            Some("json") => "application/json",
            _ => "application/octet-stream",
        };
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|err| Self::map_sdk_error(&err, &full))?;
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, local: &Path) -> Result<u64> {
        let full = self.full_key(key);
        let size = tokio::fs::metadata(local).await.map_err(ErrorKind::Io)?.len();
        let body = ByteStream::from_path(local)
            .await
            .or_raise(|| ErrorKind::BackendError(format!("opening staged file {}", local.display())))?;
        let _permit = self.acquire_permit().await;
        // A PUT either stores the complete object or nothing at all.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|err| Self::map_sdk_error(&err, &full))?;
        tracing::debug!(store = %self.name, key = %full, bytes = size, "Uploaded object");
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, "site/2024-01-01/a.csv", "site/2024-01-01/a.csv")]
    #[case(Some("raw"), "site/2024-01-01/a.csv", "raw/site/2024-01-01/a.csv")]
    #[case(Some("raw/"), "site/thermal/b.png", "raw/site/thermal/b.png")]
    #[case(Some("/raw/devices/"), "state.json", "raw/devices/state.json")]
    fn test_full_key(#[case] prefix: Option<&str>, #[case] key: &str, #[case] expected: &str) {
        let prefix = prefix.map(|p| ObjectKey::new(p).unwrap());
        let key = ObjectKey::new(key).unwrap();
        assert_eq!(full_key(prefix.as_ref(), &key), expected);
    }

    #[tokio::test]
    async fn test_empty_prefix_is_ignored() {
        let store = S3Store::new("s3", S3Settings {
            bucket: "bucket".to_string(),
            prefix: Some("/".to_string()),
            region: "us-east-1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(store.full_key(&ObjectKey::new("a/b.csv").unwrap()), "a/b.csv");
    }

    #[tokio::test]
    async fn test_traversing_prefix_is_rejected() {
        let result = S3Store::new("s3", S3Settings {
            bucket: "bucket".to_string(),
            prefix: Some("../escape".to_string()),
            region: "us-east-1".to_string(),
            ..Default::default()
        })
        .await;
        assert!(result.is_err());
    }
}
