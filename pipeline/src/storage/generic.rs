use async_trait::async_trait;
use common::Result;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;

use crate::storage::s3::ObjectStorage;

/// `ObjectStorage` over any `object_store` backend (local disk, memory).
pub struct ObjectStoreStorage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorage {
    pub fn new(bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.to_string(),
            store,
        }
    }

    pub fn in_memory(bucket: &str) -> Self {
        Self::new(bucket, Arc::new(InMemory::new()))
    }

    /// Local directory layout: `<root>/<bucket>/<key>`.
    pub fn local(bucket: &str, root: &str) -> Result<Self> {
        let dir = std::path::Path::new(root).join(bucket);
        std::fs::create_dir_all(&dir)?;
        let store = LocalFileSystem::new_with_prefix(&dir)?;
        Ok(Self::new(bucket, Arc::new(store)))
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.store
            .put(&Path::from(key), PutPayload::from(data.to_vec()))
            .await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let result = self.store.get(&Path::from(key)).await?;
        Ok(result.bytes().await?.to_vec())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        let prefix_path = Path::from(prefix);
        let listing = if prefix.is_empty() {
            self.store.list(None)
        } else {
            self.store.list(Some(&prefix_path))
        };

        let keys = listing
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<String>>()
            .await?;
        Ok(keys)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<()> {
        self.store
            .copy(&Path::from(from_key), &Path::from(to_key))
            .await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.store.delete(&Path::from(key)).await?;
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
