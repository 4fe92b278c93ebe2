use common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::storage::s3::ObjectStorage;
use crate::storage::{file_name, join_key};
use crate::utils::paths::{parse_renamed_file_name, renamed_file_name};

const OUTPUT_EXTENSION: &str = "parquet";

/// Gives engine-named fragments in a partition their contract names,
/// `sales_<job_timestamp>_<00000>.parquet`.
pub struct OutputRenamer {
    storage: Arc<dyn ObjectStorage>,
}

impl OutputRenamer {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Renames every fragment under `partition_prefix` and returns the
    /// `(old, new)` key pairs in sequence order. Files already carrying a
    /// contract name are left alone, so a rerun after a partial failure only
    /// picks up what is left.
    pub async fn rename_partition(
        &self,
        partition_prefix: &str,
        job_timestamp: &str,
    ) -> Result<Vec<(String, String)>> {
        let listing = self.storage.list_objects(partition_prefix).await?;

        let mut next_sequence = 0;
        let mut fragments = Vec::new();
        for key in listing {
            let name = file_name(&key);
            if !name.ends_with(&format!(".{}", OUTPUT_EXTENSION)) {
                continue;
            }
            match parse_renamed_file_name(name) {
                Some((stamp, sequence)) => {
                    if stamp == job_timestamp {
                        next_sequence = next_sequence.max(sequence + 1);
                    }
                    debug!(key = %key, "Already renamed, skipping");
                }
                None => fragments.push(key),
            }
        }
        fragments.sort();

        let mut renamed = Vec::with_capacity(fragments.len());
        for (offset, from) in fragments.into_iter().enumerate() {
            let new_name = renamed_file_name(job_timestamp, next_sequence + offset, OUTPUT_EXTENSION);
            let to = join_key(partition_prefix, &new_name);
            self.move_object(&from, &to).await?;
            renamed.push((from, to));
        }

        info!(
            partition = %partition_prefix,
            files = renamed.len(),
            job_timestamp = %job_timestamp,
            "Silver: fragments renamed"
        );
        Ok(renamed)
    }

    /// Copy, confirm, then delete. The source is never removed before the
    /// copy is visible at the destination.
    async fn move_object(&self, from: &str, to: &str) -> Result<()> {
        let rename_error = |reason: String| Error::Rename {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };

        self.storage
            .copy_object(from, to)
            .await
            .map_err(|e| rename_error(format!("copy failed: {}", e)))?;

        let copied = self
            .storage
            .check_file_exists(to)
            .await
            .map_err(|e| rename_error(format!("copy not confirmed: {}", e)))?;
        if !copied {
            return Err(rename_error("copy not visible at destination".to_string()));
        }

        if let Err(e) = self.storage.delete_object(from).await {
            // Undo the copy so the partition holds one file per fragment.
            if let Err(cleanup) = self.storage.delete_object(to).await {
                error!(key = %to, error = %cleanup, "Failed to roll back renamed copy");
            }
            return Err(rename_error(format!("delete of original failed: {}", e)));
        }

        debug!(from = %from, to = %to, "Renamed");
        Ok(())
    }
}
