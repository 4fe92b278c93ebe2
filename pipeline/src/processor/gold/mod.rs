pub mod storage;
pub mod transform;

use chrono::{DateTime, Utc};
use common::config::{PartitionOrder, PathSettings, SilverSettings};
use common::{Error, Result};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::processor::checkpoint::{JobRun, JobTracker};
use crate::processor::locator::latest_silver_partition;
use crate::storage::s3::ObjectStorage;
use crate::utils::arrow::parquet_to_batches;
use crate::utils::paths::GoldTable;

use storage::StorageManager;
use transform::DataTransformer;

pub const JOB_NAME: &str = "silver_to_gold";

/// Outcome of one silver to gold run.
#[derive(Debug, Clone, PartialEq)]
pub struct GoldReport {
    pub partition_prefix: String,
    pub silver_rows: usize,
    /// `(table name, object key, rows)` in write order.
    pub tables: Vec<(String, String, usize)>,
}

pub struct GoldProcessor {
    storage: Arc<dyn ObjectStorage>,
    transformer: DataTransformer,
    storage_manager: StorageManager,
    tracker: JobTracker,
    silver_prefix: String,
    partition_order: PartitionOrder,
}

impl GoldProcessor {
    pub fn new(storage: Arc<dyn ObjectStorage>, paths: &PathSettings, silver: &SilverSettings) -> Self {
        Self {
            transformer: DataTransformer::new(),
            storage_manager: StorageManager::new(storage.clone(), &paths.gold_prefix),
            tracker: JobTracker::new(storage.clone(), &paths.jobs_prefix),
            silver_prefix: paths.silver_prefix.clone(),
            partition_order: silver.partition_order,
            storage,
        }
    }

    /// Rebuilds all four gold datasets from the latest silver partition.
    pub async fn process_to_gold(&self, started_at: DateTime<Utc>) -> Result<GoldReport> {
        let mut run = JobRun::start(JOB_NAME, started_at);

        match self.run(&mut run).await {
            Ok(report) => {
                run.succeed();
                run.outputs = report.tables.iter().map(|(_, key, _)| key.clone()).collect();
                self.tracker.commit_quietly(&run).await;
                Ok(report)
            }
            Err(e) => {
                error!(stage = JOB_NAME, error = %e, metrics = ?run.metrics, "Gold: run failed");
                run.fail(&e);
                self.tracker.commit_quietly(&run).await;
                Err(e)
            }
        }
    }

    async fn run(&self, run: &mut JobRun) -> Result<GoldReport> {
        let partition_prefix =
            latest_silver_partition(self.storage.as_ref(), &self.silver_prefix, self.partition_order)
                .await?;
        info!(stage = JOB_NAME, partition = %partition_prefix, "Gold: loading silver partition");

        let mut files: Vec<String> = self
            .storage
            .list_objects(&partition_prefix)
            .await?
            .into_iter()
            .filter(|key| key.ends_with(".parquet"))
            .collect();
        if files.is_empty() {
            return Err(Error::NotFound(format!(
                "No parquet files in s3://{}/{}",
                self.storage.bucket(),
                partition_prefix
            )));
        }
        // Read order decides which dimension attributes win.
        files.sort();

        let mut batches = Vec::new();
        for key in &files {
            let content = self.storage.get_object(key).await?;
            batches.extend(parquet_to_batches(content)?);
        }

        let silver = self.transformer.recast(batches).await?;
        run.metric("silver_rows", silver.num_rows());
        info!(stage = JOB_NAME, rows = silver.num_rows(), files = files.len(), "Gold: silver rows loaded");

        let tables = self.transformer.decompose(&silver)?;
        let write_id = Uuid::new_v4().to_string();

        let mut written = Vec::with_capacity(GoldTable::ALL.len());
        for table in GoldTable::ALL {
            let batch = tables.get(table);
            let key = self
                .storage_manager
                .overwrite_table(table, batch, &write_id)
                .await?;
            run.metric(&format!("{}_rows", table.table_name()), batch.num_rows());
            written.push((table.table_name().to_string(), key, batch.num_rows()));
        }

        Ok(GoldReport {
            partition_prefix,
            silver_rows: silver.num_rows(),
            tables: written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::checkpoint::RunStatus;
    use crate::storage::generic::ObjectStoreStorage;

    fn processor(storage: Arc<ObjectStoreStorage>) -> GoldProcessor {
        GoldProcessor::new(storage, &PathSettings::default(), &SilverSettings::default())
    }

    #[tokio::test]
    async fn partition_without_parquet_is_not_found() {
        let storage = Arc::new(ObjectStoreStorage::in_memory("lake"));
        storage
            .put_object("silver/sales/sales_year=2025/sales_month=1/sales_day=1/_SUCCESS", b"")
            .await
            .unwrap();

        let err = processor(storage.clone()).process_to_gold(Utc::now()).await.unwrap_err();

        assert!(err.is_not_found());
        let runs = JobTracker::new(storage, "_jobs").runs(JOB_NAME).await.unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn empty_silver_location_fails() {
        let storage = Arc::new(ObjectStoreStorage::in_memory("lake"));
        let err = processor(storage).process_to_gold(Utc::now()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
