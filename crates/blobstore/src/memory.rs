//! An in-memory `BlobStore` for pipeline/worker tests, so integration tests
//! don't need a running MinIO.

use crate::{BlobStore, BlobStoreError, ListedObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryBlobStore {
  objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn seed(&self, bucket: &str, key: &str, data: Vec<u8>) {
    self
      .objects
      .lock()
      .unwrap()
      .insert((bucket.to_string(), key.to_string()), data);
  }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
  async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListedObject>, BlobStoreError> {
    let objects = self.objects.lock().unwrap();
    Ok(
      objects
        .iter()
        .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
        .map(|((_, k), v)| ListedObject {
          key: k.clone(),
          size: v.len() as u64,
        })
        .collect(),
    )
  }

  async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError> {
    self
      .objects
      .lock()
      .unwrap()
      .get(&(bucket.to_string(), key.to_string()))
      .cloned()
      .ok_or_else(|| BlobStoreError::NotFound(key.to_string()))
  }

  async fn put(&self, bucket: &str, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), BlobStoreError> {
    self
      .objects
      .lock()
      .unwrap()
      .insert((bucket.to_string(), key.to_string()), data);
    Ok(())
  }

  async fn exists(&self, bucket: &str, key: &str) -> Result<bool, BlobStoreError> {
    Ok(self.objects.lock().unwrap().contains_key(&(bucket.to_string(), key.to_string())))
  }

  async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
    self.objects.lock().unwrap().remove(&(bucket.to_string(), key.to_string()));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_then_get_round_trips() {
    let store = InMemoryBlobStore::new();
    store.put("bucket", "k1", b"hello".to_vec(), "text/plain").await.unwrap();
    assert_eq!(store.get("bucket", "k1").await.unwrap(), b"hello");
  }

  #[tokio::test]
  async fn list_filters_by_prefix() {
    let store = InMemoryBlobStore::new();
    store.seed("b", "archive-files/u1/t1/a.pdf", vec![1]);
    store.seed("b", "archive-files/u1/t2/b.pdf", vec![2]);
    let listed = store.list("b", "archive-files/u1/t1/").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "archive-files/u1/t1/a.pdf");
  }

  #[tokio::test]
  async fn delete_is_idempotent() {
    let store = InMemoryBlobStore::new();
    store.delete("b", "missing").await.unwrap();
  }

  #[tokio::test]
  async fn exists_reflects_state() {
    let store = InMemoryBlobStore::new();
    assert!(!store.exists("b", "k").await.unwrap());
    store.put("b", "k", vec![1], "application/octet-stream").await.unwrap();
    assert!(store.exists("b", "k").await.unwrap());
  }
}
