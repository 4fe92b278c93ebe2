use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use bytes::Bytes;
use common::Result;
use std::sync::Arc;
use aws_sdk_s3::Client as S3Client;
use crate::storage::S3Manager;

/// Key/value view of one bucket. Keys are relative to the bucket root.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<()>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    fn bucket(&self) -> &str;
}

// Implement for S3
pub struct S3Storage {
    bucket: String,
    client: Arc<S3Client>,
}

impl S3Storage {
    pub async fn new(s3_manager: Arc<S3Manager>, bucket: &str) -> Result<Self> {
        let client = s3_manager.get_client(bucket).await?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

fn storage_error<E, R>(e: SdkError<E, R>) -> common::Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match e {
        SdkError::ServiceError(err) => common::Error::Storage(err.into_err().to_string()),
        _ => common::Error::Storage(e.to_string()),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let body = Bytes::copy_from_slice(data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) if err.err().is_no_such_key() => {
                    common::Error::NotFound(format!("s3://{}/{}", self.bucket, key))
                }
                other => storage_error(other),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| common::Error::Storage(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(storage_error)?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        Ok(keys)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match head {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    /// Client aimed at a closed local port so every call fails at dispatch.
    fn unreachable_storage() -> S3Storage {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        S3Storage {
            bucket: "lake".to_string(),
            client: Arc::new(S3Client::from_conf(config)),
        }
    }

    #[tokio::test]
    async fn transport_failures_surface_as_storage_errors() {
        let storage = unreachable_storage();

        let listed = storage.list_objects("raw/sales").await.unwrap_err();
        assert!(matches!(listed, common::Error::Storage(_)));

        // A failed HEAD is an error, not "absent".
        let head = storage.check_file_exists("raw/sales/x.json").await.unwrap_err();
        assert!(matches!(head, common::Error::Storage(_)));
    }
}
