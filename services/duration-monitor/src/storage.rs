use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised by the object storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to list objects under {prefix}: {message}")]
    List { prefix: String, message: String },

    #[error("Failed to fetch object {key}: {message}")]
    Fetch { key: String, message: String },
}

/// One listing request against the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    /// Key prefix to list under
    pub prefix: String,
    /// Group keys into common prefixes at this delimiter
    pub delimiter: Option<String>,
    /// Token returned by the previous page
    pub continuation_token: Option<String>,
    /// Page size hint
    pub max_keys: Option<i32>,
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    /// Folder-like prefixes (only populated when a delimiter is set)
    pub common_prefixes: Vec<String>,
    /// Object keys on this page
    pub keys: Vec<String>,
    /// Token for the next page, `None` when this is the last page
    pub next_token: Option<String>,
}

/// Minimal object storage surface the monitor needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single page of keys and common prefixes
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, StorageError>;

    /// Fetch the full content of an object
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// S3-compatible object store
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new store client
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "Object store client initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(prefix = %request.prefix))]
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, StorageError> {
        let mut builder = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix);

        if let Some(ref delimiter) = request.delimiter {
            builder = builder.delimiter(delimiter);
        }
        if let Some(ref token) = request.continuation_token {
            builder = builder.continuation_token(token);
        }
        if let Some(max_keys) = request.max_keys {
            builder = builder.max_keys(max_keys);
        }

        let response = builder.send().await.map_err(|e| StorageError::List {
            prefix: request.prefix.clone(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(String::from))
            .collect();

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(String::from))
            .collect();

        let truncated = response.is_truncated().unwrap_or(false);
        let token = response.next_continuation_token();
        if truncated && token.is_none() {
            warn!(
                prefix = %request.prefix,
                "Truncated listing without continuation token, stopping pagination"
            );
        }
        let next_token = next_page_token(truncated, token);

        Ok(ListPage {
            common_prefixes,
            keys,
            next_token,
        })
    }

    #[instrument(skip(self))]
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Fetch {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let body = output.body.collect().await.map_err(|e| StorageError::Fetch {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let bytes = body.into_bytes().to_vec();
        debug!(key = %key, size_bytes = bytes.len(), "Object fetched");

        Ok(bytes)
    }
}

/// Token for the following page; only a truncated page with a token continues
fn next_page_token(is_truncated: bool, token: Option<&str>) -> Option<String> {
    if is_truncated {
        token.map(String::from)
    } else {
        None
    }
}
