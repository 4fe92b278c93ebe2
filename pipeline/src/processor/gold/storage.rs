use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::join_key;
use crate::storage::s3::ObjectStorage;
use crate::utils::paths::GoldTable;

pub struct StorageManager {
    storage: Arc<dyn ObjectStorage>,
    gold_prefix: String,
}

impl StorageManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, gold_prefix: &str) -> Self {
        Self {
            storage,
            gold_prefix: gold_prefix.to_string(),
        }
    }

    /// Replaces the contents of a gold sub-path with one headered CSV file.
    pub async fn overwrite_table(
        &self,
        table: GoldTable,
        batch: &RecordBatch,
        write_id: &str,
    ) -> Result<String> {
        let prefix = table.prefix(&self.gold_prefix);

        for stale in self.storage.list_objects(&prefix).await? {
            self.storage
                .delete_object(&stale)
                .await
                .map_err(|e| Error::Write(format!("clearing {}: {}", stale, e)))?;
            debug!(key = %stale, "Removed previous gold output");
        }

        let key = join_key(&prefix, &format!("part-00000-{}.csv", write_id));
        let body = encode_csv(batch)?;
        self.storage
            .put_object(&key, &body)
            .await
            .map_err(|e| Error::Write(format!("s3://{}/{}: {}", self.storage.bucket(), key, e)))?;

        info!(table = table.table_name(), key = %key, rows = batch.num_rows(), "Gold: table written");
        Ok(key)
    }
}

pub fn encode_csv(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(b',')
        .build(Vec::new());
    writer.write(batch)?;
    Ok(writer.into_inner())
}
