pub mod crawler;
pub mod processor;
pub mod schema;
pub mod services;
pub mod storage;
pub mod utils;
pub mod warehouse;

use common::config::{LoggingSettings, Settings};
use common::Result;
use services::pipeline::{PipelineReport, PipelineService};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let _ = if logging.json {
        fmt().json().with_env_filter(filter).try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
}

pub async fn run_raw_to_silver(settings: &Settings) -> Result<()> {
    let service = PipelineService::new(settings).await?;
    let report = service.run_raw_to_silver().await?;
    println!(
        "Silver: {} of {} rows written from {} ({} files)",
        report.written_rows(),
        report.counts.input_rows,
        report.source_key,
        report.files.len()
    );
    Ok(())
}

pub async fn run_silver_to_gold(settings: &Settings) -> Result<()> {
    let service = PipelineService::new(settings).await?;
    let report = service.run_silver_to_gold().await?;
    println!("Gold: rebuilt from {}", report.partition_prefix);
    for (table, key, rows) in &report.tables {
        println!("  {:<13} {:>8} rows  {}", table, rows, key);
    }
    Ok(())
}

pub async fn run_all(settings: &Settings) -> Result<PipelineReport> {
    let service = PipelineService::new(settings).await?;
    service.run_all().await
}

/// Prints the warehouse statements for the current gold layout.
pub fn print_load_plan(settings: &Settings) -> Result<()> {
    let plan = warehouse::LoadPlan::for_gold(
        &settings.storage.bucket,
        &settings.paths.gold_prefix,
        &settings.warehouse,
    )?;
    for statement in plan.statements() {
        println!("{}", statement);
    }
    Ok(())
}
