//! Object storage abstraction over an S3-compatible backend (MinIO in
//! production). Grounded on the S3 client wrapper pattern this pack's
//! `sideseat-sideseat` example uses for its own file storage layer: a thin
//! `#[async_trait]` trait in front of `aws-sdk-s3`, so pipeline code never
//! depends on the SDK directly and tests can swap in an in-memory fake.

mod memory;
mod s3;

pub use memory::InMemoryBlobStore;
pub use s3::S3BlobStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
  #[error("object not found: {0}")]
  NotFound(String),
  #[error("object store request failed: {0}")]
  Request(String),
}

/// One object under a bucket/key, as bytes plus the key it was listed at.
#[derive(Debug, Clone)]
pub struct ListedObject {
  pub key: String,
  pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
  /// List every object key under `prefix` in the given bucket.
  async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListedObject>, BlobStoreError>;

  /// Download one object's full body.
  async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError>;

  /// Upload `data` to `key`, overwriting any existing object.
  async fn put(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), BlobStoreError>;

  async fn exists(&self, bucket: &str, key: &str) -> Result<bool, BlobStoreError>;

  /// Delete one object. A missing object is not an error (idempotent
  /// cleanup, mirroring `ResourceManager::dispose`'s not-found-is-fine
  /// policy for local scratch files).
  async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError>;

  /// Delete every object under `prefix`. Used to clear source objects once
  /// a task has been fully materialized into the scratch directory.
  async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<(), BlobStoreError> {
    for object in self.list(bucket, prefix).await? {
      self.delete(bucket, &object.key).await?;
    }
    Ok(())
  }
}
