use async_trait::async_trait;
use common::Result;
use serde::Serialize;
use tracing::{error, info};

/// Starts a catalog crawler by name.
#[async_trait]
pub trait CrawlerClient: Send + Sync {
    async fn start_crawler(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerResponse {
    pub status_code: u16,
    pub body: String,
}

/// Triggers the configured crawler and reports the outcome as a status code
/// instead of an error: 400 without a name, 500 when the client fails.
pub async fn trigger_crawler(client: &dyn CrawlerClient, name: Option<&str>) -> TriggerResponse {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return TriggerResponse {
            status_code: 400,
            body: "Missing crawler name".to_string(),
        };
    };

    match client.start_crawler(name).await {
        Ok(()) => {
            info!(crawler = %name, "Crawler triggered");
            TriggerResponse {
                status_code: 200,
                body: format!("Crawler '{}' triggered successfully.", name),
            }
        }
        Err(e) => {
            error!(crawler = %name, error = %e, "Failed to start crawler");
            TriggerResponse {
                status_code: 500,
                body: format!("Error starting crawler: {}", e),
            }
        }
    }
}
