use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod s3;

pub use s3::S3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage credentials are missing")]
    MissingCredentials,
    #[error("invalid object storage endpoint: {0}")]
    Endpoint(String),
    #[error("object storage responded with status {0}")]
    Status(u16),
    #[error("failed to reach object storage")]
    Transport(#[from] reqwest::Error),
}

/// A browser-ready form for uploading one object straight to the bucket.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadForm {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

/// The object storage backend. Keys are opaque; no call checks that an object exists.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn presigned_get(&self, key: &str, ttl: u64) -> Result<String, StorageError>;

    async fn presigned_post(&self, key: &str, content_type: &str, ttl: u64) -> Result<UploadForm, StorageError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
