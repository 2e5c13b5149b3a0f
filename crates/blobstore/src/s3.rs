//! S3-compatible client, grounded on `sideseat-sideseat`'s `S3Storage`:
//! custom endpoint + `force_path_style(true)` so the same client code works
//! against MinIO as against real S3, `head_object` for existence checks, and
//! `list_objects_v2` continuation-token pagination for prefix listing.

use crate::{BlobStore, BlobStoreError, ListedObject};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use pipeline_core::ObjectStoreConfig;

pub struct S3BlobStore {
  client: Client,
}

impl S3BlobStore {
  pub async fn new(config: &ObjectStoreConfig) -> Self {
    let scheme = if config.use_ssl { "https" } else { "http" };
    let endpoint_url = format!("{scheme}://{}", config.endpoint);

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
      .endpoint_url(endpoint_url)
      .credentials_provider(aws_sdk_s3::config::Credentials::new(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
        None,
        "resume-pipeline",
      ));
    if let Some(region) = &config.region {
      loader = loader.region(aws_config::Region::new(region.clone()));
    } else {
      loader = loader.region(aws_config::Region::new("us-east-1"));
    }
    let sdk_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
      .force_path_style(true)
      .build();

    Self {
      client: Client::from_conf(s3_config),
    }
  }

  fn is_not_found(err: &aws_sdk_s3::error::SdkError<impl std::fmt::Debug>) -> bool {
    format!("{err:?}").contains("NotFound") || format!("{err:?}").contains("NoSuchKey")
  }
}

#[async_trait]
impl BlobStore for S3BlobStore {
  async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ListedObject>, BlobStoreError> {
    let mut objects = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
      let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
      if let Some(token) = &continuation_token {
        request = request.continuation_token(token);
      }
      let response = request
        .send()
        .await
        .map_err(|e| BlobStoreError::Request(e.to_string()))?;

      for object in response.contents() {
        if let Some(key) = object.key() {
          objects.push(ListedObject {
            key: key.to_string(),
            size: object.size().unwrap_or(0) as u64,
          });
        }
      }

      if response.is_truncated().unwrap_or(false) {
        continuation_token = response.next_continuation_token().map(String::from);
      } else {
        break;
      }
    }

    Ok(objects)
  }

  async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError> {
    let response = self
      .client
      .get_object()
      .bucket(bucket)
      .key(key)
      .send()
      .await
      .map_err(|e| {
        if Self::is_not_found(&e) {
          BlobStoreError::NotFound(key.to_string())
        } else {
          BlobStoreError::Request(e.to_string())
        }
      })?;

    let bytes = response
      .body
      .collect()
      .await
      .map_err(|e| BlobStoreError::Request(e.to_string()))?
      .into_bytes();
    Ok(bytes.to_vec())
  }

  async fn put(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), BlobStoreError> {
    self
      .client
      .put_object()
      .bucket(bucket)
      .key(key)
      .body(ByteStream::from(data))
      .content_type(content_type)
      .send()
      .await
      .map_err(|e| BlobStoreError::Request(e.to_string()))?;
    Ok(())
  }

  async fn exists(&self, bucket: &str, key: &str) -> Result<bool, BlobStoreError> {
    match self.client.head_object().bucket(bucket).key(key).send().await {
      Ok(_) => Ok(true),
      Err(e) if Self::is_not_found(&e) => Ok(false),
      Err(e) => Err(BlobStoreError::Request(e.to_string())),
    }
  }

  async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
    self
      .client
      .delete_object()
      .bucket(bucket)
      .key(key)
      .send()
      .await
      .map_err(|e| BlobStoreError::Request(e.to_string()))?;
    Ok(())
  }
}
