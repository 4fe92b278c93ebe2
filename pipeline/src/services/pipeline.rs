use chrono::Utc;
use common::Result;
use common::config::Settings;
use std::sync::Arc;
use tracing::info;

use crate::crawler::{CrawlerClient, TriggerResponse, trigger_crawler};
use crate::processor::{GoldProcessor, GoldReport, SilverProcessor, SilverReport};
use crate::storage::open_storage;
use crate::storage::s3::ObjectStorage;
use crate::warehouse::{LoadPlan, WarehouseClient, load_gold};

/// Both stages of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub silver: SilverReport,
    pub gold: GoldReport,
}

/// Wires the stages to one data-lake bucket.
pub struct PipelineService {
    settings: Settings,
    storage: Arc<dyn ObjectStorage>,
    silver: SilverProcessor,
    gold: GoldProcessor,
}

impl PipelineService {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let storage = open_storage(&settings.storage).await?;
        Ok(Self::with_storage(settings, storage))
    }

    pub fn with_storage(settings: &Settings, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            silver: SilverProcessor::new(storage.clone(), &settings.paths, &settings.silver),
            gold: GoldProcessor::new(storage.clone(), &settings.paths, &settings.silver),
            settings: settings.clone(),
            storage,
        }
    }

    pub fn storage(&self) -> Arc<dyn ObjectStorage> {
        self.storage.clone()
    }

    pub async fn run_raw_to_silver(&self) -> Result<SilverReport> {
        self.silver.process_to_silver(Utc::now()).await
    }

    pub async fn run_silver_to_gold(&self) -> Result<GoldReport> {
        self.gold.process_to_gold(Utc::now()).await
    }

    /// Raw to silver, then silver to gold. Gold does not run if silver fails.
    pub async fn run_all(&self) -> Result<PipelineReport> {
        let silver = self.run_raw_to_silver().await?;
        let gold = self.run_silver_to_gold().await?;
        info!(
            silver_rows = silver.written_rows(),
            gold_partition = %gold.partition_prefix,
            "Pipeline run complete"
        );
        Ok(PipelineReport { silver, gold })
    }

    pub fn load_plan(&self) -> Result<LoadPlan> {
        LoadPlan::for_gold(
            self.storage.bucket(),
            &self.settings.paths.gold_prefix,
            &self.settings.warehouse,
        )
    }

    pub async fn load_warehouse(&self, client: &dyn WarehouseClient) -> Result<usize> {
        let plan = self.load_plan()?;
        load_gold(client, &plan).await
    }

    pub async fn trigger_crawler(&self, client: &dyn CrawlerClient) -> TriggerResponse {
        trigger_crawler(client, self.settings.crawler.name.as_deref()).await
    }
}
