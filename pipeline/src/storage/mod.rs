pub mod generic;
pub mod s3;

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use common::config::{StorageBackend, StorageSettings};
use common::Result;
use std::sync::Arc;
use tracing::info;

use generic::ObjectStoreStorage;
use s3::{ObjectStorage, S3Storage};

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl From<&StorageSettings> for S3Config {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            region: settings.region.clone(),
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
        }
    }
}

/// Process-wide S3 client cache, one client per bucket.
#[derive(Clone)]
pub struct S3Manager {
    pub config: S3Config,
    client_cache: Arc<dashmap::DashMap<String, Arc<S3Client>>>,
}

impl S3Manager {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client_cache: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub async fn get_client(&self, bucket: &str) -> Result<Arc<S3Client>> {
        if let Some(client) = self.client_cache.get(bucket) {
            return Ok(client.clone());
        }

        let mut builder = match (&self.config.access_key, &self.config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "static");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(self.config.region.clone()))
                    .credentials_provider(credentials)
            }
            _ => {
                // Fall back to the default provider chain (env, profile, instance role).
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &self.config.endpoint {
            url::Url::parse(endpoint)?;
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Arc::new(aws_sdk_s3::Client::from_conf(builder.build()));
        self.client_cache.insert(bucket.to_string(), client.clone());
        Ok(client)
    }

    /// Verifies that a bucket exists and is accessible
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        let client = self.get_client(bucket).await?;

        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => Err(common::Error::Storage(format!(
                "Cannot access bucket '{}': {}",
                bucket, e
            ))),
        }
    }
}

/// Opens the configured data-lake bucket.
pub async fn open_storage(settings: &StorageSettings) -> Result<Arc<dyn ObjectStorage>> {
    info!(backend = ?settings.backend, bucket = %settings.bucket, "Opening data lake storage");

    let storage: Arc<dyn ObjectStorage> = match settings.backend {
        StorageBackend::S3 => {
            let manager = Arc::new(S3Manager::new(S3Config::from(settings)));
            manager.verify_bucket_exists(&settings.bucket).await?;
            Arc::new(S3Storage::new(manager, &settings.bucket).await?)
        }
        StorageBackend::Local => {
            Arc::new(ObjectStoreStorage::local(&settings.bucket, &settings.root)?)
        }
        StorageBackend::Memory => Arc::new(ObjectStoreStorage::in_memory(&settings.bucket)),
    };

    Ok(storage)
}

/// Joins key segments with single slashes.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Final path segment of an object key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_normalizes_slashes() {
        assert_eq!(join_key("silver/sales/", "/sales_year=2025"), "silver/sales/sales_year=2025");
        assert_eq!(join_key("", "gold"), "gold");
        assert_eq!(join_key("a", "b/"), "a/b/");
    }

    #[test]
    fn file_name_takes_last_segment() {
        assert_eq!(file_name("raw/sales/sales_20250101_000000.json"), "sales_20250101_000000.json");
        assert_eq!(file_name("top.json"), "top.json");
    }

    #[tokio::test]
    async fn memory_backend_opens_without_network() {
        let settings = StorageSettings {
            backend: StorageBackend::Memory,
            bucket: "lake".to_string(),
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            root: "./data".to_string(),
        };

        let storage = open_storage(&settings).await.unwrap();
        assert_eq!(storage.bucket(), "lake");
    }
}
