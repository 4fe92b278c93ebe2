pub mod rename;
pub mod storage;
pub mod transform;
pub mod types;

use chrono::{DateTime, Utc};
use common::config::{PathSettings, SilverSettings};
use common::Result;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::processor::checkpoint::{JobRun, JobTracker, sha256_hex};
use crate::processor::locator::latest_raw_object;
use crate::processor::validation::SchemaValidator;
use crate::storage::s3::ObjectStorage;
use crate::utils::paths::{SilverPartition, job_timestamp};

use rename::OutputRenamer;
use storage::StorageManager;
use transform::DataTransformer;
use types::SilverCounts;

pub const JOB_NAME: &str = "raw_to_silver";
const RAW_EXTENSION: &str = "json";

/// Outcome of one raw to silver run.
#[derive(Debug, Clone, PartialEq)]
pub struct SilverReport {
    pub source_key: String,
    /// `None` when no row survived cleaning and nothing was written.
    pub partition_prefix: Option<String>,
    pub files: Vec<String>,
    pub counts: SilverCounts,
}

impl SilverReport {
    pub fn written_rows(&self) -> usize {
        self.counts.after_quality_filter
    }
}

pub struct SilverProcessor {
    storage: Arc<dyn ObjectStorage>,
    validator: SchemaValidator,
    storage_manager: StorageManager,
    renamer: OutputRenamer,
    tracker: JobTracker,
    raw_prefix: String,
    silver_prefix: String,
}

impl SilverProcessor {
    pub fn new(storage: Arc<dyn ObjectStorage>, paths: &PathSettings, silver: &SilverSettings) -> Self {
        Self {
            validator: SchemaValidator::new(),
            storage_manager: StorageManager::new(storage.clone(), silver.max_rows_per_file),
            renamer: OutputRenamer::new(storage.clone()),
            tracker: JobTracker::new(storage.clone(), &paths.jobs_prefix),
            raw_prefix: paths.raw_prefix.clone(),
            silver_prefix: paths.silver_prefix.clone(),
            storage,
        }
    }

    /// Cleans the newest raw drop into a new day partition stamped with
    /// `processed_at`. The run is checkpointed whether it succeeds or not.
    pub async fn process_to_silver(&self, processed_at: DateTime<Utc>) -> Result<SilverReport> {
        let mut run = JobRun::start(JOB_NAME, processed_at);

        match self.run(processed_at, &mut run).await {
            Ok(report) => {
                run.succeed();
                run.outputs = report.files.clone();
                self.tracker.commit_quietly(&run).await;
                Ok(report)
            }
            Err(e) => {
                error!(stage = JOB_NAME, error = %e, metrics = ?run.metrics, "Silver: run failed");
                run.fail(&e);
                self.tracker.commit_quietly(&run).await;
                Err(e)
            }
        }
    }

    async fn run(&self, processed_at: DateTime<Utc>, run: &mut JobRun) -> Result<SilverReport> {
        let source_key =
            latest_raw_object(self.storage.as_ref(), &self.raw_prefix, RAW_EXTENSION).await?;
        info!(stage = JOB_NAME, source = %source_key, "Silver: loading raw file");

        let content = self.storage.get_object(&source_key).await?;
        run.input_sha256 = Some(sha256_hex(&content));

        let loaded = self.validator.load(&content);
        run.metric("input_rows", loaded.records.len());
        info!(stage = JOB_NAME, rows = loaded.records.len(), "Silver: raw rows loaded");

        let (rows, counts) = DataTransformer::new(processed_at).transform(loaded);
        run.metric("malformed_lines", counts.malformed_lines);
        run.metric("after_dedup", counts.after_dedup);
        run.metric("after_key_filter", counts.after_key_filter);
        run.metric("after_quality_filter", counts.after_quality_filter);

        if rows.is_empty() {
            info!(stage = JOB_NAME, source = %source_key, "Silver: no admissible rows, nothing written");
            return Ok(SilverReport {
                source_key,
                partition_prefix: None,
                files: Vec::new(),
                counts,
            });
        }

        let partition_prefix = SilverPartition::from_datetime(processed_at).prefix(&self.silver_prefix);
        let write_id = Uuid::new_v4().to_string();
        self.storage_manager
            .append_partition(&rows, &partition_prefix, &write_id)
            .await?;

        let renamed = self
            .renamer
            .rename_partition(&partition_prefix, &job_timestamp(processed_at))
            .await?;
        let files: Vec<String> = renamed.into_iter().map(|(_, to)| to).collect();
        run.metric("files_written", files.len());

        info!(
            stage = JOB_NAME,
            partition = %partition_prefix,
            rows = rows.len(),
            files = files.len(),
            "Silver: partition written"
        );

        Ok(SilverReport {
            source_key,
            partition_prefix: Some(partition_prefix),
            files,
            counts,
        })
    }
}
